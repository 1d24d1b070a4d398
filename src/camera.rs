//! Camera power and stream state machine
//!
//! `Off -> Idle -> Connecting -> Live`, `Connecting -> Failed` after the stream
//! timeout, and any state back to `Off` on power-off, which also cuts the stream.

pub mod board;
pub mod liveness;
pub mod types;

pub use board::CameraBoard;
pub use liveness::{FixedDelayProbe, LivenessProbe};
pub use types::{CameraId, CameraState, PowerState, StreamState, CAMERA_COUNT};
