//! Controller-side collaborators: where devices live and the controller's HTTP API.

pub mod address_book;
pub mod controller_api;
pub mod types;

pub use address_book::{AddressBook, Addresses};
pub use controller_api::ControllerApi;
pub use types::{WifiConfig, WifiNetwork, WifiStatus};
