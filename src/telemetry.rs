//! Push channel from the controller.
//!
//! One WebSocket session at a time on the controller's telemetry port, JSON envelopes
//! fanned out to every registered handler, fixed-delay reconnect on loss.

pub mod channel;
pub mod connector;
pub mod types;

pub use channel::{TelemetryChannel, DEFAULT_RECONNECT_DELAY, DEFAULT_TELEMETRY_PORT};
pub use connector::{TelemetryConnector, TelemetrySession, WsConnector};
pub use types::{AlertEvent, ChannelState, StateUpdate, TelemetryEvent, TelemetryHandler};
