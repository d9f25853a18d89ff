//! Heart-beat header and negotiation.
//!
//! Each side of a STOMP connection advertises `heart-beat:cx,cy`: it can send
//! a heart-beat at least every `cx` ms and wants to receive one every `cy`
//! ms. Zero means "cannot" / "does not want". The effective interval in each
//! direction is the larger of what the sender offers and what the receiver
//! asks for, and is disabled if either side says zero.

use std::time::Duration;

use crate::errors::{ProtocolError, Result};

/// Advertised heart-beat capabilities of one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeat {
    /// Smallest interval at which this side can send heart-beats.
    pub outgoing: Duration,
    /// Interval at which this side wants to receive heart-beats.
    pub incoming: Duration,
}

/// Intervals in effect after both sides advertised their capabilities.
///
/// Expressed from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiated {
    /// Send a heart-beat at least this often. `None` if disabled.
    pub send_every: Option<Duration>,
    /// Expect traffic from the server at least this often. `None` if disabled.
    pub expect_every: Option<Duration>,
}

impl HeartBeat {
    /// Heart-beats disabled in both directions (`0,0`).
    pub const DISABLED: Self = Self { outgoing: Duration::ZERO, incoming: Duration::ZERO };

    /// Create a heart-beat advertisement.
    pub fn new(outgoing: Duration, incoming: Duration) -> Self {
        Self { outgoing, incoming }
    }

    /// Parse a `heart-beat` header value (`cx,cy` in milliseconds).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidHeartBeat` if the value is not two
    ///   comma-separated non-negative integers
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || ProtocolError::InvalidHeartBeat(value.to_string());

        let (cx, cy) = value.split_once(',').ok_or_else(invalid)?;
        let cx = cx.trim().parse::<u64>().map_err(|_| invalid())?;
        let cy = cy.trim().parse::<u64>().map_err(|_| invalid())?;

        Ok(Self { outgoing: Duration::from_millis(cx), incoming: Duration::from_millis(cy) })
    }

    /// Header value for this advertisement.
    pub fn to_header_value(&self) -> String {
        format!("{},{}", self.outgoing.as_millis(), self.incoming.as_millis())
    }

    /// Combine the client's advertisement with the server's.
    pub fn negotiate(client: Self, server: Self) -> Negotiated {
        Negotiated {
            send_every: effective(client.outgoing, server.incoming),
            expect_every: effective(server.outgoing, client.incoming),
        }
    }
}

fn effective(offered: Duration, wanted: Duration) -> Option<Duration> {
    if offered.is_zero() || wanted.is_zero() { None } else { Some(offered.max(wanted)) }
}
