mod shared;
mod tui;
mod audio_api;
mod audio;
mod engine;
mod export;
mod loader;
mod middle;

use std::path::PathBuf;

use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use middle::Middle;
use shared::InputEvent;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    // Enable keyboard enhancement for real press/release detection.
    // Falls back gracefully if the terminal doesn't support it.
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let audio = audio::start_audio()?;
    let mut middle = Middle::new(audio.clock());

    // sample comes from the command line, or the first wav in the cwd
    let sample_path: Option<PathBuf> = std::env::args().nth(1).map(PathBuf::from).or_else(|| {
        let cwd = std::env::current_dir().unwrap_or_default();
        loader::sample_loader::default_sample(&cwd)
    });
    if let Some(path) = sample_path {
        match middle.load_sample_path(&path) {
            Ok(cmd) => audio.send(cmd),
            Err(e) => log::warn!("could not load {}: {e}", path.display()),
        }
    }

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(shared::SCHEDULE_INTERVAL_MS);
    let blink_start = std::time::Instant::now();
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let blink_on = (blink_start.elapsed().as_millis() / 250) % 2 == 0;
        let snap = middle.snapshot();

        tui_state.sequence_mode = snap.sequence_mode;
        tui_state.param_page = snap.param_page;

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &snap, &tui_state, blink_on);
        })?;

        let events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for event in events {
            if event == InputEvent::Quit {
                drop(term);
                drop(audio);
                return Ok(());
            }
            for cmd in middle.handle_input(event) {
                audio.send(cmd);
            }
        }

        // commit everything due inside the lookahead window
        for cmd in middle.tick() {
            audio.send(cmd);
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
