//! Wiring for multi-user chat scenarios.
//!
//! A [`SimWorld`] owns one broker and one clock. Every participant that
//! joins gets its own runtime, live channel, fallback API and driver, all
//! talking to the shared broker on the shared clock.

use std::time::Duration;

use agora_app::{AppConfig, Runtime, RuntimeError};
use agora_client::{Credential, SessionOptions};

use crate::{
    sim_api::SimApi,
    sim_broker::SimBroker,
    sim_driver::{SimDriver, SimDriverError},
    sim_env::{SimClock, SimEnv},
    sim_live::SimLive,
};

/// Runtime type used by every participant.
pub type SimRuntime = Runtime<SimDriver, SimEnv, SimLive, SimApi>;

/// Shared broker and clock.
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    /// The chat server.
    pub broker: SimBroker,
    /// Virtual time.
    pub clock: SimClock,
}

/// One user with a mounted room view.
pub struct Participant {
    /// Scripted input and recorded output.
    pub driver: SimDriver,
    /// Handle on the participant's fallback API.
    pub api: SimApi,
    /// The orchestration loop under test.
    pub runtime: SimRuntime,
}

impl SimWorld {
    /// World around `broker` with a fresh clock.
    pub fn new(broker: SimBroker) -> Self {
        Self { broker, clock: SimClock::new() }
    }

    /// Environment on the world clock.
    pub fn env(&self) -> SimEnv {
        SimEnv::with_clock(self.clock.clone())
    }

    /// Open a room view for `username` on `(group, room)`.
    ///
    /// The bearer token is the username; the broker takes it as identity.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::MissingRoom` if either id is zero
    pub fn join(
        &self,
        username: &str,
        group: u64,
        room: u64,
    ) -> Result<Participant, RuntimeError<SimDriverError>> {
        let credential = Credential::new(username);
        let live =
            SimLive::start(&self.broker, self.env(), SessionOptions::for_room(group, room), &credential);
        let api = SimApi::new(&self.broker, username);
        let driver = SimDriver::new();

        let config =
            AppConfig { group, room, username: Some(username.to_string()), ..AppConfig::default() };
        let runtime = Runtime::new(driver.clone(), self.env(), config, live, api.clone())?;

        Ok(Participant { driver, api, runtime })
    }

    /// Move virtual time forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

impl Participant {
    /// Mount the view and run cycles until the live channel settles.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn mount(&mut self) -> Result<(), RuntimeError<SimDriverError>> {
        self.runtime.mount().await?;
        self.step().await?;
        Ok(())
    }

    /// Run one runtime cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn step(&mut self) -> Result<bool, RuntimeError<SimDriverError>> {
        self.runtime.step().await
    }

    /// Run cycles until all scripted input is consumed, then one more so
    /// that notices raised by the last input are seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn settle(&mut self) -> Result<(), RuntimeError<SimDriverError>> {
        while self.driver.has_pending() {
            self.step().await?;
        }
        self.step().await?;
        Ok(())
    }

    /// Message ids currently shown.
    pub fn message_ids(&self) -> Vec<u64> {
        self.runtime.app().store().ids()
    }
}
