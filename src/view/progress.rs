//! Snippet progress bar rendering

use std::time::Duration;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Gauge},
    Frame,
};

use crate::model::GameState;
use super::utils::format_duration;

pub fn render_snippet_bar(
    frame: &mut Frame,
    area: Rect,
    state: &GameState,
    remaining: Option<Duration>,
    snippet: Duration,
) {
    let elapsed = remaining.map(|r| snippet.saturating_sub(r)).unwrap_or_default();

    let status_text = if state.is_playing {
        " ▶ Playing snippet"
    } else if state.current_track.is_some() {
        " ⏸  Stopped"
    } else {
        " No track"
    };

    let device_text = match state.device_paused {
        Some(true) => " device paused ",
        Some(false) => " device playing ",
        None => "",
    };

    let progress_ratio = if state.is_playing && !snippet.is_zero() {
        (elapsed.as_secs_f64() / snippet.as_secs_f64()).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let time_str = format!(
        "{} / {}",
        format_duration(elapsed.as_millis() as u32),
        format_duration(snippet.as_millis() as u32)
    );

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} ", status_text))
                .title_bottom(Line::from(device_text).right_aligned()),
        )
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(progress_ratio)
        .label(time_str);

    frame.render_widget(gauge, area);
}
