//! Session state owned by the game controller

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::error::GameError;
use super::types::{guess_matches, ErrorKind, GameState, Track};

#[derive(Default)]
struct Session {
    state: GameState,
    bootstrapped: bool,
    /// Bumped whenever the round is reset or revealed
    round: u64,
}

/// Game state behind a short-lived lock; never held across an await.
///
/// `None` means the session was detached by teardown: reads return a blank
/// state and writes from late completions are dropped.
pub struct GameModel {
    session: Mutex<Option<Session>>,
}

impl GameModel {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(Some(Session::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut Session)) {
        match self.lock().as_mut() {
            Some(session) => f(session),
            None => tracing::trace!("Dropping state update for a detached session"),
        }
    }

    pub fn snapshot(&self) -> GameState {
        self.lock().as_ref().map(|s| s.state.clone()).unwrap_or_default()
    }

    pub fn is_detached(&self) -> bool {
        self.lock().is_none()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.lock().as_ref().and_then(|s| s.state.current_track.clone())
    }

    pub fn is_revealed(&self) -> bool {
        self.lock().as_ref().is_some_and(|s| s.state.revealed)
    }

    /// Changes every time the round is reset or revealed. Work started in an
    /// earlier round compares against this before it takes effect.
    pub fn round(&self) -> u64 {
        self.lock().as_ref().map_or(0, |s| s.round)
    }

    // ========================================================================
    // Track loading
    // ========================================================================

    /// Claims the single loading slot. `None` while another load is in flight
    /// or after teardown; the slot is released when the guard drops.
    pub fn begin_loading(&self) -> Option<LoadingGuard<'_>> {
        let mut guard = self.lock();
        let session = guard.as_mut()?;
        if session.state.is_loading {
            return None;
        }
        session.state.is_loading = true;
        Some(LoadingGuard {
            model: self,
            finished: false,
        })
    }

    /// Resets the round before a new resolution starts.
    pub fn clear_round(&self) {
        self.update(|s| {
            s.round += 1;
            s.state.error = None;
            s.state.revealed = false;
            s.state.guess_correct = None;
        });
    }

    fn finish_loading(&self, result: Result<Track, GameError>) {
        self.update(|s| {
            s.state.is_loading = false;
            match result {
                Ok(track) => {
                    s.state.current_track = Some(track);
                    s.state.guess.clear();
                }
                Err(err) => {
                    s.state.error = Some(err.descriptor());
                    s.state.current_track = None;
                }
            }
        });
    }

    /// The one-shot autoload: true only the first time the device comes up
    /// with nothing loaded, nothing loading and no error showing.
    pub fn take_bootstrap(&self) -> bool {
        let mut guard = self.lock();
        let Some(session) = guard.as_mut() else {
            return false;
        };
        let idle = session.state.current_track.is_none()
            && !session.state.is_loading
            && session.state.error.is_none();
        if session.bootstrapped || !idle {
            return false;
        }
        session.bootstrapped = true;
        true
    }

    // ========================================================================
    // Errors
    // ========================================================================

    pub fn set_error(&self, err: &GameError) {
        let descriptor = err.descriptor();
        self.update(|s| s.state.error = Some(descriptor));
    }

    /// Records `err` unless another error is already showing.
    pub fn set_error_if_clear(&self, err: &GameError) {
        let descriptor = err.descriptor();
        self.update(|s| {
            if s.state.error.is_none() {
                s.state.error = Some(descriptor);
            }
        });
    }

    pub fn clear_error(&self) {
        self.update(|s| s.state.error = None);
    }

    /// Clears the showing error only if it is of `kind`.
    pub fn clear_error_of(&self, kind: ErrorKind) {
        self.update(|s| {
            if s.state.error.as_ref().is_some_and(|e| e.kind == kind) {
                s.state.error = None;
            }
        });
    }

    // ========================================================================
    // Guessing
    // ========================================================================

    pub fn set_guess(&self, guess: String) {
        self.update(|s| s.state.guess = guess);
    }

    pub fn push_guess_char(&self, c: char) {
        self.update(|s| s.state.guess.push(c));
    }

    pub fn pop_guess_char(&self) {
        self.update(|s| {
            s.state.guess.pop();
        });
    }

    /// Reveals the answer and scores the guess against the loaded title.
    pub fn reveal(&self) {
        self.update(|s| {
            s.round += 1;
            s.state.revealed = true;
            s.state.guess_correct = s
                .state
                .current_track
                .as_ref()
                .map(|track| guess_matches(&s.state.guess, &track.title));
        });
    }

    // ========================================================================
    // Device mirrors and session end
    // ========================================================================

    pub fn set_device_paused(&self, paused: bool) {
        self.update(|s| s.state.device_paused = Some(paused));
    }

    pub fn mark_signed_out(&self) {
        self.update(|s| s.state.signed_out = true);
    }

    pub fn detach(&self) {
        if self.lock().take().is_some() {
            tracing::debug!("Game state detached");
        }
    }
}

impl Default for GameModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the loading slot. `finish` records the outcome; dropping it
/// unfinished (cancelled or panicking load) still clears `is_loading`.
pub struct LoadingGuard<'a> {
    model: &'a GameModel,
    finished: bool,
}

impl LoadingGuard<'_> {
    pub fn finish(mut self, result: Result<Track, GameError>) {
        self.finished = true;
        self.model.finish_loading(result);
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.model.update(|s| s.state.is_loading = false);
        }
    }
}
