mod audio;
mod auth;
mod config;
mod controller;
mod logging;
mod model;
mod view;
#[cfg(test)]
mod test_support;

use std::io;
use anyhow::Result;
use std::time::Duration;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use audio::LibrespotDevice;
use auth::CredentialStore;
use config::GameConfig;
use controller::{GameController, SdkBuilder};
use model::SpotifyClient;
use view::GameView;

type Game = GameController<SpotifyClient, SpotifyClient, LibrespotDevice>;

/// How long the signed-out notice stays up before the game exits
const SIGNED_OUT_NOTICE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("=== Guess The Track Starting ===");

    let config = GameConfig::from_env();
    tracing::info!(
        playlist_id = %config.catalog.playlist_id,
        market = %config.catalog.market,
        snippet_ms = config.snippet.as_millis() as u64,
        "Configuration loaded"
    );

    let credential = auth::sign_in(&config).await?;
    let store = CredentialStore::new(credential);

    let spotify = SpotifyClient::new();
    let sdk_builder: SdkBuilder<LibrespotDevice> = Box::new(LibrespotDevice::new);
    let controller: Game = GameController::new(
        spotify.clone(),
        spotify,
        sdk_builder,
        &config,
        store.accessor(),
        store.sign_out_hook(),
    );

    // librespot is linked in, so the SDK is available right away.
    controller.sdk_loaded();

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let view = GameView {
        device_name: &config.device.name,
        snippet: config.snippet,
    };
    let res = run_app(&mut terminal, &controller, &view).await;

    controller.teardown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    match res {
        Ok(true) => eprintln!("Your session has ended. Please sign in again."),
        Ok(false) => {}
        Err(err) => tracing::error!(error = ?err, "Application error"),
    }

    tracing::info!("Guess The Track shutting down");
    Ok(())
}

/// Returns `true` when the loop ended because of a forced sign-out.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    controller: &Game,
    view: &GameView<'_>,
) -> io::Result<bool> {
    loop {
        let state = controller.snapshot();
        let remaining = controller.snippet_remaining();

        terminal.draw(|f| {
            view.render(f, &state, remaining);
        })?;

        if state.signed_out {
            tokio::time::sleep(SIGNED_OUT_NOTICE).await;
            return Ok(true);
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Err(e) = controller.handle_key_event(key).await {
                    tracing::warn!(error = %e, "Key handling failed");
                }
            }
        }

        if controller.should_quit() {
            return Ok(false);
        }
    }
}
