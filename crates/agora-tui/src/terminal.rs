//! Terminal driver for the TUI.
//!
//! Implements the [`Driver`] trait for terminal I/O using crossterm for
//! keyboard events and ratatui for rendering. Networking is not the driver's
//! concern: the live channel and the REST fallback sit behind the runtime's
//! bridge.

use std::{
    io::{self, Stdout, stdout},
    time::Duration,
};

use agora_app::{App, Driver, UserInput};
use crossterm::{
    ExecutableCommand,
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use thiserror::Error;
use tokio::time::Instant;

use crate::{Key, LineEditor, ui};

/// How long one input poll waits for a key.
const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error from terminal operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Terminal driver implementing the [`Driver`] trait.
///
/// Owns the draft editor and the pending alert, if any. An alert stays on
/// the status bar until the next key press.
pub struct TerminalDriver {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    event_stream: EventStream,
    editor: LineEditor,
    alert: Option<String>,
}

impl TerminalDriver {
    /// Enter raw mode and the alternate screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be set up.
    pub fn new() -> Result<Self, TerminalError> {
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

        Ok(Self {
            terminal,
            event_stream: EventStream::new(),
            editor: LineEditor::new(),
            alert: None,
        })
    }

    /// Convert a crossterm key event to a [`Key`].
    fn convert_key(event: KeyEvent) -> Option<Key> {
        match event.code {
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => Some(Key::Esc),
            KeyCode::Char(c) => Some(Key::Char(c)),
            KeyCode::Enter => Some(Key::Enter),
            KeyCode::Backspace => Some(Key::Backspace),
            KeyCode::Delete => Some(Key::Delete),
            KeyCode::Esc => Some(Key::Esc),
            KeyCode::Left => Some(Key::Left),
            KeyCode::Right => Some(Key::Right),
            KeyCode::Home => Some(Key::Home),
            KeyCode::End => Some(Key::End),
            _ => None,
        }
    }

    fn restore(&mut self) {
        if let Err(err) = disable_raw_mode() {
            tracing::debug!(%err, "failed to leave raw mode");
        }
        if let Err(err) = stdout().execute(LeaveAlternateScreen) {
            tracing::debug!(%err, "failed to leave alternate screen");
        }
    }
}

impl Driver for TerminalDriver {
    type Error = TerminalError;
    type Instant = Instant;

    async fn poll_input(&mut self) -> Result<Option<UserInput>, Self::Error> {
        tokio::select! {
            biased;

            maybe_event = self.event_stream.next() => match maybe_event {
                Some(Ok(Event::Key(key_event))) if key_event.kind == KeyEventKind::Press => {
                    if self.alert.take().is_some() {
                        return Ok(None);
                    }
                    Ok(Self::convert_key(key_event).and_then(|key| self.editor.handle(key)))
                },
                Some(Ok(_)) => Ok(None),
                Some(Err(e)) => Err(TerminalError::Io(e)),
                None => Ok(Some(UserInput::Quit)),
            },

            () = tokio::time::sleep(INPUT_POLL_TIMEOUT) => Ok(None),
        }
    }

    fn render(&mut self, app: &App<Instant>) -> Result<(), Self::Error> {
        self.editor.sync(app.draft());

        let editor = &self.editor;
        let alert = self.alert.as_deref();
        self.terminal.draw(|frame| {
            ui::render(frame, app, editor, alert);
        })?;
        Ok(())
    }

    fn alert(&mut self, message: &str) -> Result<(), Self::Error> {
        tracing::debug!(%message, "showing alert");
        self.alert = Some(message.to_string());
        Ok(())
    }

    fn stop(&mut self) {
        self.restore();
    }
}

impl Drop for TerminalDriver {
    fn drop(&mut self) {
        self.restore();
    }
}
