//! Layout rendering (top bar, track card, guess input, key hints)

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph, Wrap},
    Frame,
};

use crate::model::GameState;
use super::utils::truncate_string;

pub fn render_top_bar(frame: &mut Frame, area: Rect, state: &GameState, device_name: &str) {
    let (status, color) = if state.player_ready {
        ("● ready", Color::Green)
    } else {
        ("○ connecting", Color::Yellow)
    };

    let line = Line::from(vec![
        Span::styled(
            " Guess The Track ",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format!("🎵 {} ", device_name), Style::default().fg(Color::Cyan)),
        Span::styled(status, Style::default().fg(color)),
    ]);

    let bar = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(bar, area);
}

pub fn render_track_card(frame: &mut Frame, area: Rect, state: &GameState) {
    let width = area.width.saturating_sub(4) as usize;
    let dim = Style::default().fg(Color::DarkGray);

    let lines: Vec<Line> = match (&state.current_track, state.is_loading) {
        (_, true) => vec![Line::from(Span::styled("Finding a track...", dim))],
        (None, false) => vec![Line::from(Span::styled("No track loaded. Ctrl+N to load one.", dim))],
        (Some(track), false) if state.revealed => {
            let mut lines = vec![
                Line::from(Span::styled(
                    truncate_string(&track.title, width),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(truncate_string(&track.artist, width), Style::default().fg(Color::Cyan))),
            ];
            if let Some(url) = &track.artwork_url {
                lines.push(Line::from(Span::styled(truncate_string(url, width), dim)));
            }
            lines.push(Line::raw(""));
            lines.push(match state.guess_correct {
                Some(true) => Line::from(Span::styled(
                    "Correct!",
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )),
                Some(false) => Line::from(Span::styled(
                    "Not quite.",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                None => Line::raw(""),
            });
            lines
        }
        (Some(_), false) => vec![
            Line::from(Span::styled(
                "? ? ?",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled("Listen to the snippet and guess the title", dim)),
        ],
    };

    let card = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Track ")
                .padding(Padding::vertical(1)),
        );
    frame.render_widget(card, area);
}

pub fn render_guess_input(frame: &mut Frame, area: Rect, state: &GameState) {
    let active = state.can_guess();
    let style = if active {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let text = if state.guess.is_empty() && active {
        "Type the title and press Enter..."
    } else {
        &state.guess
    };

    let input = Paragraph::new(text).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Your guess ")
            .padding(Padding::horizontal(1))
            .border_style(style),
    );
    frame.render_widget(input, area);
}

pub fn render_key_hints(frame: &mut Frame, area: Rect, state: &GameState) {
    let key = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let off = Style::default().fg(Color::DarkGray);
    let hint = |keys: &'static str, label: &'static str, enabled: bool| {
        vec![
            Span::styled(keys, if enabled { key } else { off }),
            Span::raw(format!(" {}  ", label)),
        ]
    };

    let spans: Vec<Span> = [
        hint("Ctrl+P/F5", "play", state.can_play()),
        hint("Ctrl+S", "stop", state.is_playing),
        hint("Enter", "guess", state.can_guess()),
        hint("Ctrl+N", "new track", !state.is_loading),
        hint("Esc", "quit", true),
    ]
    .into_iter()
    .flatten()
    .collect();

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
