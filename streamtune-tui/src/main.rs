use std::io;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
};
use streamtune_core::{Player, PlayerHandle, commands::AudioCommand};

mod cli;
mod router;
mod routes;
mod state;
mod ui;

use cli::Cli;
use router::Router;
use routes::playback::PlaybackRoute;
use state::AppState;

type Backend = CrosstermBackend<io::Stdout>;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tui_logger for TUI log display
    tui_logger::init_logger(log::LevelFilter::Debug)
        .map_err(|e| anyhow!("Failed to init tui_logger: {e}"))?;
    tui_logger::set_default_level(log::LevelFilter::Debug);

    let config = cli.into_config()?;
    log::info!(
        "Starting streamtune ({} backend, {} kbps) against {}",
        config.backend,
        config.bitrate,
        config.catalog_url
    );

    let (player, handle) = Player::new(config);
    let player_thread = player.spawn()?;

    handle.send(AudioCommand::FetchCatalog)?;

    let mut terminal = setup_terminal()?;
    let result = run_tui(&mut terminal, &handle);
    restore_terminal(&mut terminal)?;

    // The loop may have ended on an error; make sure the player stops either way
    let _ = handle.send(AudioCommand::Quit);
    if player_thread.join().is_err() {
        log::error!("Player thread panicked");
    }

    result
}

fn setup_terminal() -> anyhow::Result<Terminal<Backend>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Terminal<Backend>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_tui(terminal: &mut Terminal<Backend>, handle: &PlayerHandle) -> anyhow::Result<()> {
    let mut state = AppState::new();
    let mut router = Router::new(Box::new(PlaybackRoute));

    loop {
        // Handle player responses
        while let Ok(response) = handle.resp_rx.try_recv() {
            state.handle_response(response);
        }
        if state.shutdown {
            break;
        }

        terminal.draw(|f| ui::draw(f, &state, &router))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let should_quit = handle_global_keys(key.code, &mut state, handle, &mut router)?;
                    if should_quit {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Handle global keys and delegate route-specific input to router
fn handle_global_keys(
    key: KeyCode,
    state: &mut AppState,
    handle: &PlayerHandle,
    router: &mut Router,
) -> anyhow::Result<bool> {
    let command = match key {
        KeyCode::Char('q') => {
            let _ = handle.send(AudioCommand::Quit);
            return Ok(true);
        }
        KeyCode::Tab => {
            router.next_tab(state, handle)?;
            return Ok(false);
        }
        KeyCode::Char(' ') => Some(AudioCommand::TogglePlayPause),
        KeyCode::Char('n') => Some(AudioCommand::Next),
        KeyCode::Char('p') => Some(AudioCommand::Previous),
        KeyCode::Char('l') => Some(AudioCommand::ToggleLoop),
        KeyCode::Char('s') => Some(AudioCommand::ToggleShuffle),
        _ => None,
    };

    if let Some(command) = command {
        handle.send(command)?;
        return Ok(false);
    }

    // Delegate to the current route's input handler
    let action = router.current_mut().handle_input(key, state, handle)?;
    router.execute_action(action, state, handle)?;
    Ok(false)
}
