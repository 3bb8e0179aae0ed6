//! Overlay rendering (error notification, signed-out notice)

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::model::ErrorDescriptor;
use super::utils::centered_rect;

pub fn render_error_notification(frame: &mut Frame, error: &ErrorDescriptor) {
    let area = frame.area();

    let popup_width = 52.min(area.width.saturating_sub(4));
    let inner_width = popup_width.saturating_sub(4).max(1) as usize;

    let error_line_count = error.message.chars().count().div_ceil(inner_width) as u16;
    let hint_lines = if error.retryable { 2 } else { 0 };

    // Borders plus message plus optional retry hint
    let popup_height = 2 + error_line_count.max(1) + hint_lines;
    let popup_area = centered_rect(area, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let mut lines = vec![Line::from(Span::styled(
        error.message.clone(),
        Style::default().fg(Color::Red),
    ))];
    if error.retryable {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "Ctrl+N to try a new track",
            Style::default().fg(Color::Yellow),
        )));
    }

    let error_widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Error (Ctrl+D to dismiss) ")
                .title_style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
                .style(Style::default().bg(Color::Black)),
        );

    frame.render_widget(error_widget, popup_area);
}

pub fn render_signed_out(frame: &mut Frame) {
    let popup_area = centered_rect(frame.area(), 44, 5);
    frame.render_widget(Clear, popup_area);

    let notice = Paragraph::new(vec![
        Line::from(Span::styled(
            "Your session has ended.",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::raw("Please sign in again."),
    ])
    .centered()
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Signed out ")
            .style(Style::default().bg(Color::Black)),
    );

    frame.render_widget(notice, popup_area);
}
