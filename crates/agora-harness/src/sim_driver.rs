//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the terminal driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`agora_app::Runtime`] orchestration code runs in both production and
//! simulation.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use agora_app::{App, Driver, UserInput};
use thiserror::Error;

use crate::sim_env::SimInstant;

/// Error type for simulation driver.
#[derive(Debug, Clone, Error)]
#[error("sim driver: {0}")]
pub struct SimDriverError(pub String);

/// What the view showed at one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Message ids, in display order.
    pub message_ids: Vec<u64>,
    /// Draft at render time.
    pub draft: String,
    /// Whether the live channel was up.
    pub connected: bool,
    /// Users shown as typing.
    pub typing: Vec<String>,
    /// Status line.
    pub status: Option<String>,
}

/// Shared state for input injection and inspection.
#[derive(Debug, Default)]
struct SharedState {
    inputs: VecDeque<UserInput>,
    renders: Vec<Rendered>,
    alerts: Vec<String>,
    fail_render: bool,
    stopped: bool,
}

/// Simulation driver for deterministic testing.
///
/// Clones share state: a test keeps one to script input and inspect output
/// while the runtime owns another.
#[derive(Debug, Clone, Default)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
}

impl SimDriver {
    /// Create a new simulation driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue user input.
    pub fn push_input(&self, input: UserInput) {
        self.lock().inputs.push_back(input);
    }

    /// Queue typing `text` into the draft and submitting it.
    pub fn type_and_submit(&self, text: &str) {
        let mut state = self.lock();
        state.inputs.push_back(UserInput::Edit(text.to_string()));
        state.inputs.push_back(UserInput::Submit);
    }

    /// True if queued input remains.
    pub fn has_pending(&self) -> bool {
        !self.lock().inputs.is_empty()
    }

    /// Most recent render.
    pub fn last_render(&self) -> Option<Rendered> {
        self.lock().renders.last().cloned()
    }

    /// Number of renders so far.
    pub fn render_count(&self) -> usize {
        self.lock().renders.len()
    }

    /// Alerts shown so far.
    pub fn alerts(&self) -> Vec<String> {
        self.lock().alerts.clone()
    }

    /// Make the next renders fail.
    pub fn fail_renders(&self) {
        self.lock().fail_render = true;
    }

    /// True once the runtime stopped the driver.
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    async fn poll_input(&mut self) -> Result<Option<UserInput>, Self::Error> {
        Ok(self.lock().inputs.pop_front())
    }

    fn render(&mut self, app: &App<SimInstant>) -> Result<(), Self::Error> {
        let mut state = self.lock();
        if state.fail_render {
            return Err(SimDriverError("render failed".to_string()));
        }

        state.renders.push(Rendered {
            message_ids: app.store().ids(),
            draft: app.draft().to_string(),
            connected: app.is_connected(),
            typing: app.typing_users().to_vec(),
            status: app.status().map(str::to_string),
        });
        Ok(())
    }

    fn alert(&mut self, message: &str) -> Result<(), Self::Error> {
        self.lock().alerts.push(message.to_string());
        Ok(())
    }

    fn stop(&mut self) {
        self.lock().stopped = true;
    }
}
