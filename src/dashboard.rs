//! Operator-facing session: wires the gateway, telemetry, detection, camera and vault
//! pieces together and exposes the intents the operator can issue.

pub mod context;
pub mod operations;
pub mod poller;
pub mod status_board;

pub use context::{ContextParts, DashboardContext};
pub use operations::{GalleryView, RemoteImage};
pub use poller::PollIntervals;
pub use status_board::{StatusBoard, StatusTiles};
