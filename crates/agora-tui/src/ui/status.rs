//! Status bar
//!
//! Displays live connection state, the room's message count and the latest
//! status text. A pending alert takes the whole bar until dismissed.

use agora_app::App;
use agora_core::Moment;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

/// Render the status bar.
pub fn render<I: Moment>(frame: &mut Frame, app: &App<I>, alert: Option<&str>, area: Rect) {
    if let Some(alert) = alert {
        let line = Line::from(vec![
            Span::styled(" ! ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(alert.to_string()),
            Span::styled("  (press any key)", Style::default().fg(Color::Gray)),
        ]);
        let paragraph =
            Paragraph::new(line).style(Style::default().bg(Color::Red).fg(Color::White));
        frame.render_widget(paragraph, area);
        return;
    }

    let connection = if app.is_connected() {
        Span::styled("Connected", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("Offline (REST)", Style::default().fg(Color::Yellow))
    };

    let mut info = format!(" | Messages: {}", app.store().len());
    if app.is_sending() {
        info.push_str(" | Sending...");
    }
    if let Some(status) = app.status() {
        info.push_str(" | ");
        info.push_str(status);
    }

    let line = Line::from(vec![
        Span::raw(" "),
        connection,
        Span::styled(info, Style::default().fg(Color::Gray)),
    ]);

    let paragraph =
        Paragraph::new(line).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(paragraph, area);
}
