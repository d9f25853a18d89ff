//! Draft line
//!
//! The bordered input box under the chat. Empty drafts show a dimmed hint;
//! while a send is in flight the draft is greyed out and the cursor hidden.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::LineEditor;

const PROMPT: &str = "> ";
const HINT: &str = "Type a message, Enter to send, Esc to leave";

/// Render the draft line.
pub fn render(frame: &mut Frame, editor: &LineEditor, sending: bool, area: Rect) {
    let draft = if editor.buffer().is_empty() {
        Span::styled(HINT, Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
    } else if sending {
        Span::styled(editor.buffer(), Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(editor.buffer())
    };

    let border = if sending { Color::DarkGray } else { Color::White };
    let paragraph = Paragraph::new(Line::from(vec![Span::raw(PROMPT), draft]))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(border)));
    frame.render_widget(paragraph, area);

    if sending {
        return;
    }

    // Inside the left border, after the prompt; clamped to the right border.
    let first = area.x.saturating_add(1 + PROMPT.len() as u16);
    let last = area.x.saturating_add(area.width).saturating_sub(2);
    let offset = u16::try_from(editor.cursor()).unwrap_or(u16::MAX);
    frame.set_cursor_position((first.saturating_add(offset).min(last), area.y.saturating_add(1)));
}
