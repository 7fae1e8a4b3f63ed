use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Sparkline};
use ratatui::Frame;

use super::grid;
use super::mode::TuiState;
use crate::shared::{EngineSnapshot, NUM_SLICES};

pub fn render(frame: &mut Frame, area: Rect, snap: &EngineSnapshot, ts: &TuiState, blink_on: bool) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),  // lcd screen
            Constraint::Length(4),  // waveform
            Constraint::Min(12),    // pad grid
        ])
        .split(area);

    draw_screen(frame, sections[0], snap, ts);
    draw_waveform(frame, sections[1], snap);
    draw_keypad(frame, sections[2], snap, blink_on);
}

fn draw_screen(frame: &mut Frame, area: Rect, snap: &EngineSnapshot, ts: &TuiState) {
    let mut flags: Vec<Span> = Vec::new();
    let flag = |on: bool, label: &'static str| {
        if on {
            Span::styled(label, Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD))
        } else {
            Span::styled(label, Style::default().fg(Color::DarkGray))
        }
    };
    flags.push(flag(snap.playing, " PLAY "));
    flags.push(flag(snap.auto_mode, " AUTO "));
    flags.push(flag(snap.sequence_mode, " SEQ "));
    flags.push(flag(snap.reverse_held, " REV "));
    flags.push(flag(snap.stutter_held, " STUT "));

    let status = Line::from(vec![
        Span::raw(format!(
            "BPM {:>5.1}  x{:<3}  {}  CHAOS {:>3.0}%  ",
            snap.bpm,
            snap.time_multiplier,
            snap.quantize.label(),
            snap.chaos * 100.0,
        )),
    ]);

    let knobs = Line::from(format!(
        "PAGE {:?}   [{}] {}   [{}] {}",
        snap.param_page,
        snap.knob_a_label,
        fmt_knob(snap.knob_a_value),
        snap.knob_b_label,
        fmt_knob(snap.knob_b_value),
    ));

    let seq_line = if ts.seq_edit {
        Line::from(Span::styled(
            format!("SEQ> {}_", ts.seq_buffer),
            Style::default().fg(Color::Yellow),
        ))
    } else if snap.sequence_mode {
        Line::from(format!(
            "SEQ {}  [{}/{}]",
            snap.sequence_text,
            snap.sequence_position + 1,
            snap.sequence_length,
        ))
    } else if !snap.sequence_text.is_empty() {
        Line::from(Span::styled(
            format!("SEQ {}  (stopped)", snap.sequence_text),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from("")
    };

    let bottom = if let Some(err) = &snap.error {
        Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        ))
    } else if !snap.is_loaded {
        Line::from(Span::styled(
            "no sample loaded (pass a wav path or drop one in the cwd)",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from("")
    };

    let text = vec![status, Line::from(flags), knobs, seq_line, bottom];
    let screen = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    frame.render_widget(screen, area);
}

fn draw_waveform(frame: &mut Frame, area: Rect, snap: &EngineSnapshot) {
    let data: Vec<u64> = match &snap.envelope {
        Some(env) => env.iter().map(|&v| (v * 64.0) as u64).collect(),
        None => vec![0; area.width as usize],
    };
    let spark = Sparkline::default()
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Cyan))
        .data(&data);
    frame.render_widget(spark, area);
}

fn draw_keypad(frame: &mut Frame, area: Rect, snap: &EngineSnapshot, blink_on: bool) {
    let mut pads_lit = [false; NUM_SLICES];
    if let Some(active) = snap.active_slice {
        // steady when played by hand, blinking while the machine drives
        let lit = if snap.auto_mode || snap.sequence_mode {
            blink_on
        } else {
            true
        };
        if active < NUM_SLICES {
            pads_lit[active] = lit;
        }
    }
    grid::draw_pad_grid(frame, area, &pads_lit);
}

fn fmt_knob(v: f64) -> String {
    if v.abs() >= 1000.0 {
        format!("{:.1}k", v / 1000.0)
    } else if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}
