//! Key event handling

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::model::{CatalogApi, PlayerApi};
use super::device::PlaybackSdk;
use super::GameController;

impl<C: CatalogApi, P: PlayerApi, S: PlaybackSdk> GameController<C, P, S> {
    pub async fn handle_key_event(&self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.request_quit(),
            KeyCode::Char('q') | KeyCode::Char('Q') if ctrl => self.request_quit(),
            KeyCode::Char('p') | KeyCode::Char('P') if ctrl => self.spawn_play(),
            KeyCode::F(5) => self.spawn_play(),
            KeyCode::Char('s') | KeyCode::Char('S') if ctrl => {
                let controller = self.clone();
                tokio::spawn(async move { controller.stop_playback().await });
            }
            KeyCode::Char('n') | KeyCode::Char('N') if ctrl => {
                let controller = self.clone();
                tokio::spawn(async move { controller.load_new_track().await });
            }
            KeyCode::Char('d') | KeyCode::Char('D') if ctrl => self.dismiss_error(),
            KeyCode::Enter => {
                if self.snapshot().can_guess() {
                    let controller = self.clone();
                    tokio::spawn(async move { controller.submit_guess().await });
                }
            }
            KeyCode::Backspace => self.inner.model.pop_guess_char(),
            KeyCode::Char(c) if !ctrl => {
                if !self.inner.model.is_revealed() {
                    self.inner.model.push_guess_char(c);
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn spawn_play(&self) {
        let controller = self.clone();
        tokio::spawn(async move { controller.play_snippet().await });
    }
}
