//! Deterministic simulation harness for Agora chat sessions.
//!
//! In-memory implementations of the environment, the chat server, the live
//! channel, the REST fallback and the user-facing driver. Tests run the
//! production [`agora_app::Runtime`] and [`agora_client::Session`] against
//! them on a virtual clock, so reconnects, typing expiry and fallback sends
//! are reproducible without sockets or real time.
//!
//! # Components
//!
//! - [`SimEnv`] / [`SimClock`]: manually advanced time
//! - [`SimBroker`]: STOMP broker and message log in one
//! - [`SimLive`]: session pumped against the broker
//! - [`SimApi`]: fallback API over the broker's log
//! - [`SimDriver`]: scripted input, recorded renders and alerts
//! - [`SimWorld`]: wires participants to a shared broker and clock

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod scenario;
pub mod sim_api;
pub mod sim_broker;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_live;

pub use scenario::{Participant, SimRuntime, SimWorld};
pub use sim_api::SimApi;
pub use sim_broker::{ConnectionId, SimBroker};
pub use sim_driver::{Rendered, SimDriver, SimDriverError};
pub use sim_env::{SimClock, SimEnv, SimInstant};
pub use sim_live::SimLive;
