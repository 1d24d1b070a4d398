//! Optional local HTTP interface (`warp`) exposing the dashboard state and the vault.
pub mod types;
pub mod web_server;

pub use web_server::WebServer;
