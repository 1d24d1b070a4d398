//! Resilient request gateway
//!
//! Every call to the controller or a camera goes through [`RequestGateway`]:
//! - `address`: dotted-quad(:port) validation and URL normalization
//! - `rate_governor`: per-minute ceiling and minimum inter-request spacing
//! - `credentials`: opt-in bearer credential and CSRF token
//! - `transport`: the HTTP transport seam (`reqwest` in production)
//! - `request_gateway`: deadline enforcement and status normalization

pub mod address;
pub mod credentials;
pub mod rate_governor;
pub mod request_gateway;
pub mod transport;

pub use address::EndpointAddress;
pub use credentials::SessionCredentials;
pub use rate_governor::RateGovernor;
pub use request_gateway::{GatewayResponse, RequestGateway};
pub use transport::{HttpTransport, Method, OutboundRequest, RequestOptions, Transport, TransportResponse};
