//! Generic runtime for application orchestration.
//!
//! The Runtime drives the room view event loop, coordinating between:
//! - [`App`]: room view state machine
//! - [`Bridge`]: live channel and REST fallback
//! - [`Driver`]: platform-specific user I/O

use std::time::Duration;

use agora_client::ChatApi;
use agora_core::Environment;

use crate::{App, AppAction, AppConfig, AppEvent, Bridge, Driver, LiveChannel, RuntimeError, UserInput};

/// Pause between loop cycles when nothing is pending.
pub const STEP_INTERVAL: Duration = Duration::from_millis(50);

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific user I/O driver
/// - `E`: Environment providing time
/// - `L`: Live channel of the session
/// - `A`: REST fallback
pub struct Runtime<D, E, L, A>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    env: E,
    app: App<E::Instant>,
    bridge: Bridge<L, A>,
}

impl<D, E, L, A> Runtime<D, E, L, A>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
    L: LiveChannel,
    A: ChatApi,
{
    /// Create a runtime for the room in `config`.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::MissingRoom` if the group or room id is absent
    pub fn new(
        driver: D,
        env: E,
        config: AppConfig,
        live: L,
        api: A,
    ) -> Result<Self, RuntimeError<D::Error>> {
        let room = config.room_id().ok_or(RuntimeError::MissingRoom)?;
        Ok(Self { driver, env, app: App::new(config), bridge: Bridge::new(room, live, api) })
    }

    /// Run the main event loop until the user quits.
    ///
    /// The live session is torn down and the driver stopped on every exit
    /// path, including driver errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), RuntimeError<D::Error>> {
        let result = self.run_loop().await;

        self.bridge.teardown().await;
        self.driver.stop();
        result
    }

    async fn run_loop(&mut self) -> Result<(), RuntimeError<D::Error>> {
        self.mount().await?;

        loop {
            if self.step().await? {
                return Ok(());
            }
            self.env.sleep(STEP_INTERVAL).await;
        }
    }

    /// Show the view and load recent messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn mount(&mut self) -> Result<(), RuntimeError<D::Error>> {
        let now = self.env.now();
        let actions = self.app.mount(now);
        self.process_actions(actions).await
    }

    /// Process one cycle of the event loop: user input, then session
    /// notices, then a tick.
    ///
    /// Returns `true` if the user quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn step(&mut self) -> Result<bool, RuntimeError<D::Error>> {
        let input = self.driver.poll_input().await.map_err(RuntimeError::Driver)?;
        let now = self.env.now();

        let actions = match input {
            Some(UserInput::Quit) => return Ok(true),
            Some(UserInput::Edit(text)) => self.app.edit_draft(text, now),
            Some(UserInput::Submit) => self.app.submit(),
            None => vec![],
        };
        self.process_actions(actions).await?;

        for event in self.bridge.poll_notices() {
            let actions = self.app.handle(event);
            self.process_actions(actions).await?;
        }

        let now = self.env.now();
        let actions = self.app.handle(AppEvent::Tick { now });
        self.process_actions(actions).await?;

        Ok(false)
    }

    /// Tear the live session down without stopping the driver.
    pub async fn teardown(&mut self) {
        self.bridge.teardown().await;
    }

    async fn process_actions(&mut self, initial: Vec<AppAction>) -> Result<(), RuntimeError<D::Error>> {
        let mut pending = initial;

        while !pending.is_empty() {
            let actions = std::mem::take(&mut pending);

            for action in actions {
                match action {
                    AppAction::Render => self.driver.render(&self.app).map_err(RuntimeError::Driver)?,
                    AppAction::Alert { message } => {
                        self.driver.alert(&message).map_err(RuntimeError::Driver)?;
                    },

                    // Session operations go through the bridge
                    AppAction::TrySend { .. }
                    | AppAction::SendViaFallback { .. }
                    | AppAction::FetchMessages
                    | AppAction::StartTyping
                    | AppAction::StopTyping
                    | AppAction::MarkRead { .. } => {
                        let events = self.bridge.process_app_action(action).await;
                        for event in events {
                            pending.extend(self.app.handle(event));
                        }
                    },
                }
            }
        }

        Ok(())
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App<E::Instant> {
        &self.app
    }

    /// Get a reference to the Driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Get a reference to the Bridge
    pub fn bridge(&self) -> &Bridge<L, A> {
        &self.bridge
    }
}
