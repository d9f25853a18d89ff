//! UI rendering
//!
//! Rendering functions that convert App state into terminal output using
//! ratatui widgets. All functions are pure (no I/O), taking state and
//! returning widget trees.

mod chat;
mod input;
mod status;

use agora_app::App;
use agora_core::Moment;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};

use crate::LineEditor;

/// Render the entire UI.
pub fn render<I: Moment>(frame: &mut Frame, app: &App<I>, editor: &LineEditor, alert: Option<&str>) {
    const CHAT_MIN_HEIGHT: u16 = 3;
    const TYPING_HEIGHT: u16 = 1;
    const INPUT_HEIGHT: u16 = 3;
    const STATUS_HEIGHT: u16 = 1;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(CHAT_MIN_HEIGHT),
            Constraint::Length(TYPING_HEIGHT),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(frame.area());

    let [chat_area, typing_area, input_area, status_area] = chunks.as_ref() else {
        return;
    };

    chat::render(frame, app, *chat_area);
    chat::render_typing(frame, app, *typing_area);
    input::render(frame, editor, app.is_sending(), *input_area);
    status::render(frame, app, alert, *status_area);
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use agora_app::{AppConfig, AppEvent};
    use agora_client::Notice;
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn renders_messages_typing_and_status() {
        let mut app: App<Instant> =
            App::new(AppConfig { group: 7, room: 3, ..AppConfig::default() });
        let message = serde_json::from_value(serde_json::json!({
            "id": 101,
            "message": "hello",
            "username": "alice",
            "nickname": "Alice",
            "createdTime": "2024-05-01T12:00:00",
        }))
        .unwrap();
        app.handle(AppEvent::Notice(Notice::ConnectionChanged(true)));
        app.handle(AppEvent::Notice(Notice::Message(message)));
        app.handle(AppEvent::Notice(Notice::TypingUsers(vec!["bob".to_string()])));

        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        let editor = LineEditor::new();
        terminal.draw(|frame| render(frame, &app, &editor, None)).unwrap();

        let text = screen(&terminal);
        assert!(text.contains("Alice"));
        assert!(text.contains("hello"));
        assert!(text.contains("bob is typing"));
        assert!(text.contains("Connected"));
    }

    #[test]
    fn alert_replaces_status_line() {
        let app: App<Instant> = App::new(AppConfig { group: 7, room: 3, ..AppConfig::default() });

        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        let editor = LineEditor::new();
        terminal.draw(|frame| render(frame, &app, &editor, Some("send failed"))).unwrap();

        assert!(screen(&terminal).contains("send failed"));
    }

    #[test]
    fn empty_draft_shows_hint() {
        let app: App<Instant> = App::new(AppConfig { group: 7, room: 3, ..AppConfig::default() });

        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        let mut editor = LineEditor::new();
        terminal.draw(|frame| render(frame, &app, &editor, None)).unwrap();
        assert!(screen(&terminal).contains("Type a message"));

        editor.sync("draft");
        terminal.draw(|frame| render(frame, &app, &editor, None)).unwrap();
        let text = screen(&terminal);
        assert!(text.contains("> draft"));
        assert!(!text.contains("Type a message"));
    }
}
