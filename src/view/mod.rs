//! View module - UI rendering
//!
//! Renders a `GameState` snapshot with ratatui:
//!
//! - `utils`: Shared helpers (formatting, popup placement)
//! - `layout`: Top bar, track card, guess input and key hints
//! - `progress`: Snippet progress bar
//! - `overlays`: Error notification and signed-out notice

mod utils;
mod layout;
mod progress;
mod overlays;

use std::time::Duration;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::model::GameState;

pub struct GameView<'a> {
    pub device_name: &'a str,
    pub snippet: Duration,
}

impl GameView<'_> {
    pub fn render(&self, frame: &mut Frame, state: &GameState, remaining: Option<Duration>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title + device
                Constraint::Min(0),    // Track card
                Constraint::Length(3), // Guess input
                Constraint::Length(3), // Snippet progress
                Constraint::Length(1), // Key hints
            ])
            .split(frame.area());

        layout::render_top_bar(frame, chunks[0], state, self.device_name);
        layout::render_track_card(frame, chunks[1], state);
        layout::render_guess_input(frame, chunks[2], state);
        progress::render_snippet_bar(frame, chunks[3], state, remaining, self.snippet);
        layout::render_key_hints(frame, chunks[4], state);

        if state.signed_out {
            overlays::render_signed_out(frame);
        } else if let Some(error) = &state.error {
            overlays::render_error_notification(frame, error);
        }
    }
}
