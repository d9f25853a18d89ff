//! Chat area
//!
//! Displays the room's messages, oldest at the top, and who is typing.

use agora_app::App;
use agora_core::Moment;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

const BORDER_SIZE: u16 = 2;

/// Render the message list.
pub fn render<I: Moment>(frame: &mut Frame, app: &App<I>, area: Rect) {
    let room = app.config().room_id().map_or_else(String::new, |room| format!(" {room} "));
    let block = Block::default().borders(Borders::ALL).title(room);

    let items: Vec<ListItem> = if app.store().is_empty() {
        vec![ListItem::new(Line::from(Span::styled(
            "No messages yet",
            Style::default().fg(Color::DarkGray),
        )))]
    } else {
        app.store()
            .iter()
            .map(|message| {
                let mut spans = vec![
                    Span::styled(
                        message.created_time.format("%H:%M").to_string(),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::raw(" "),
                    Span::styled(
                        message.sender_label().to_string(),
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(" "),
                    Span::raw(message.message.clone()),
                ];
                if let Some(count) = message.read_count.filter(|count| *count > 0) {
                    spans.push(Span::styled(format!(" ({count})"), Style::default().fg(Color::Yellow)));
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    let visible_height = usize::from(area.height.saturating_sub(BORDER_SIZE));
    let skip = items.len().saturating_sub(visible_height);
    let visible_items: Vec<_> = items.into_iter().skip(skip).collect();

    frame.render_widget(List::new(visible_items).block(block), area);
}

/// Render the typing line.
pub fn render_typing<I: Moment>(frame: &mut Frame, app: &App<I>, area: Rect) {
    let text = match app.typing_users() {
        [] => String::new(),
        [one] => format!(" {one} is typing..."),
        many => format!(" {} are typing...", many.join(", ")),
    };

    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC));
    frame.render_widget(paragraph, area);
}
