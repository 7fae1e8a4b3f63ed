use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::mode::TuiState;
use crate::shared::InputEvent;

const SEQ_CHARS: &str = "1234qwerasdfzxcv.- ";

// poll for input from the terminal, resolve keys to semantic events for
// the middle layer. the sequence edit buffer lives in TuiState; keys go
// there instead of the pads while it is open.
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        return Ok(match key.kind {
            KeyEventKind::Press => handle_press(key.code, ts),
            // real release events when the terminal reports them; the
            // uppercase variants below cover terminals that don't
            KeyEventKind::Release => handle_release(key.code),
            _ => vec![],
        });
    }
    Ok(vec![])
}

fn handle_press(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    if ts.seq_edit {
        return handle_seq_edit(code, ts);
    }

    match code {
        KeyCode::Esc => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::ToggleAuto],

        // any keys on the 4x4 grid pad
        KeyCode::Char(c @ ('1' | '2' | '3' | '4'
            | 'q' | 'w' | 'e' | 'r'
            | 'a' | 's' | 'd' | 'f'
            | 'z' | 'x' | 'c' | 'v')) => {
            if let Some(n) = char_to_pad(c) {
                vec![InputEvent::Trigger(n)]
            } else {
                vec![]
            }
        }

        // held performance modifiers, lowercase = down and shifted = up
        KeyCode::Char('g') => vec![InputEvent::ReverseDown],
        KeyCode::Char('G') => vec![InputEvent::ReverseUp],
        KeyCode::Char('h') => vec![InputEvent::StutterDown],
        KeyCode::Char('H') => vec![InputEvent::StutterUp],

        // pages and switches
        KeyCode::Char('t') => vec![InputEvent::NextParamPage],
        KeyCode::Char('u') => vec![InputEvent::ToggleQuantize],
        KeyCode::Char('i') => vec![InputEvent::CycleTimeMult],
        KeyCode::Char('m') => vec![InputEvent::ToggleFilterMode],

        // knobs for more continuous control
        KeyCode::Char('[') => vec![InputEvent::KnobTurnA(-0.05)],
        KeyCode::Char(']') => vec![InputEvent::KnobTurnA(0.05)],
        KeyCode::Char('-') => vec![InputEvent::KnobTurnB(-0.05)],
        KeyCode::Char('=') => vec![InputEvent::KnobTurnB(0.05)],

        // sequences and export
        KeyCode::Char('/') => {
            ts.seq_edit = true;
            vec![]
        }
        KeyCode::Enter => {
            if ts.sequence_mode {
                vec![InputEvent::StopSequence]
            } else {
                vec![]
            }
        }
        KeyCode::Char('j') => vec![InputEvent::ExportRange { keep: true }],
        KeyCode::Char('J') => vec![InputEvent::ExportRange { keep: false }],
        KeyCode::Char('o') => vec![InputEvent::ExportSequence],

        _ => vec![],
    }
}

fn handle_release(code: KeyCode) -> Vec<InputEvent> {
    match code {
        KeyCode::Char('g') => vec![InputEvent::ReverseUp],
        KeyCode::Char('h') => vec![InputEvent::StutterUp],
        _ => vec![],
    }
}

fn handle_seq_edit(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc => {
            ts.seq_edit = false;
            ts.seq_buffer.clear();
            vec![]
        }
        KeyCode::Enter => {
            ts.seq_edit = false;
            let text = std::mem::take(&mut ts.seq_buffer);
            if text.trim().is_empty() {
                vec![]
            } else {
                vec![InputEvent::PlaySequence(text)]
            }
        }
        KeyCode::Backspace => {
            ts.seq_buffer.pop();
            vec![]
        }
        KeyCode::Char(c) => {
            if SEQ_CHARS.contains(c.to_ascii_lowercase()) {
                ts.seq_buffer.push(c);
            }
            vec![]
        }
        _ => vec![],
    }
}

// convert char to pad index
fn char_to_pad(c: char) -> Option<u8> {
    let idx = match c {
        '1' => 0, '2' => 1, '3' => 2, '4' => 3,
        'q' => 4, 'w' => 5, 'e' => 6, 'r' => 7,
        'a' => 8, 's' => 9, 'd' => 10, 'f' => 11,
        'z' => 12, 'x' => 13, 'c' => 14, 'v' => 15,
        _ => return None,
    };
    Some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_cover_every_slice() {
        let mut ts = TuiState::default();
        let mut seen = [false; 16];
        for c in "1234qwerasdfzxcv".chars() {
            match handle_press(KeyCode::Char(c), &mut ts).as_slice() {
                [InputEvent::Trigger(n)] => seen[*n as usize] = true,
                other => panic!("unexpected events for {c}: {other:?}"),
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn seq_edit_captures_pad_keys_until_enter() {
        let mut ts = TuiState::default();
        assert!(handle_press(KeyCode::Char('/'), &mut ts).is_empty());
        assert!(ts.seq_edit);
        // pad keys now go into the buffer, not the pads
        for c in "1.-2".chars() {
            assert!(handle_press(KeyCode::Char(c), &mut ts).is_empty());
        }
        // junk is not buffered
        assert!(handle_press(KeyCode::Char('!'), &mut ts).is_empty());
        assert_eq!(ts.seq_buffer, "1.-2");

        let events = handle_press(KeyCode::Enter, &mut ts);
        assert_eq!(events, vec![InputEvent::PlaySequence("1.-2".into())]);
        assert!(!ts.seq_edit);
        assert!(ts.seq_buffer.is_empty());
    }

    #[test]
    fn seq_edit_escape_cancels_without_playing() {
        let mut ts = TuiState::default();
        handle_press(KeyCode::Char('/'), &mut ts);
        handle_press(KeyCode::Char('1'), &mut ts);
        assert!(handle_press(KeyCode::Esc, &mut ts).is_empty());
        assert!(!ts.seq_edit);
        assert!(ts.seq_buffer.is_empty());
    }

    #[test]
    fn enter_stops_a_running_sequence() {
        let mut ts = TuiState::default();
        assert!(handle_press(KeyCode::Enter, &mut ts).is_empty());
        ts.sequence_mode = true;
        assert_eq!(
            handle_press(KeyCode::Enter, &mut ts),
            vec![InputEvent::StopSequence]
        );
    }

    #[test]
    fn empty_sequence_buffer_plays_nothing() {
        let mut ts = TuiState::default();
        handle_press(KeyCode::Char('/'), &mut ts);
        handle_press(KeyCode::Char(' '), &mut ts);
        assert!(handle_press(KeyCode::Enter, &mut ts).is_empty());
    }
}
