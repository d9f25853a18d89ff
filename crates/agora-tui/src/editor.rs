//! Draft editing for the TUI.
//!
//! This module owns the text input state (buffer, cursor) and turns key
//! events into [`UserInput`]. Every change to the buffer is reported as
//! [`UserInput::Edit`] so the room view can debounce typing notifications.

use agora_app::UserInput;

/// Key input events from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Character input.
    Char(char),
    /// Enter/Return key.
    Enter,
    /// Backspace key.
    Backspace,
    /// Delete key.
    Delete,
    /// Escape key.
    Esc,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Home key.
    Home,
    /// End key.
    End,
}

/// Single-line draft editor.
///
/// The cursor counts characters, not bytes.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
    cursor: usize,
}

impl LineEditor {
    /// Create an empty editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Handle a key. Returns the resulting user input, if any.
    pub fn handle(&mut self, key: Key) -> Option<UserInput> {
        match key {
            Key::Char(c) => {
                let at = self.byte_offset(self.cursor);
                self.buffer.insert(at, c);
                self.cursor += 1;
                Some(self.edited())
            },
            Key::Backspace => {
                if self.cursor == 0 {
                    return None;
                }
                self.cursor -= 1;
                let at = self.byte_offset(self.cursor);
                self.buffer.remove(at);
                Some(self.edited())
            },
            Key::Delete => {
                if self.cursor >= self.len() {
                    return None;
                }
                let at = self.byte_offset(self.cursor);
                self.buffer.remove(at);
                Some(self.edited())
            },
            Key::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                None
            },
            Key::Right => {
                self.cursor = (self.cursor + 1).min(self.len());
                None
            },
            Key::Home => {
                self.cursor = 0;
                None
            },
            Key::End => {
                self.cursor = self.len();
                None
            },
            Key::Enter => Some(UserInput::Submit),
            Key::Esc => Some(UserInput::Quit),
        }
    }

    /// Adopt the view's draft if it changed underneath, e.g. cleared after a
    /// successful send.
    pub fn sync(&mut self, draft: &str) {
        if self.buffer != draft {
            self.buffer = draft.to_string();
            self.cursor = self.len();
        }
    }

    fn edited(&self) -> UserInput {
        UserInput::Edit(self.buffer.clone())
    }

    fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.buffer.char_indices().nth(chars).map_or(self.buffer.len(), |(at, _)| at)
    }
}
