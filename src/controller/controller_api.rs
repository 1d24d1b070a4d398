use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use reqwest::Url;

use super::address_book::{AddressBook, Addresses};
use super::types::{WifiConfig, WifiConfigResult, WifiNetwork, WifiStatus};
use crate::error_handling::types::{GatewayError, SetupError};
use crate::gateway::{EndpointAddress, GatewayResponse, RequestGateway, RequestOptions};
use crate::telemetry::types::StateUpdate;

pub const WIFI_STATUS_TIMEOUT: Duration = Duration::from_secs(3);
pub const WIFI_SCAN_TIMEOUT: Duration = Duration::from_secs(10);
pub const WIFI_CONFIG_TIMEOUT: Duration = Duration::from_secs(15);
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(3);
pub const LOGS_TIMEOUT: Duration = Duration::from_secs(2);
pub const GALLERY_TIMEOUT: Duration = Duration::from_secs(2);
pub const ARM_TIMEOUT: Duration = Duration::from_secs(3);

/// Typed calls against the controller's HTTP endpoints.
pub struct ControllerApi {
    gateway: Arc<RequestGateway>,
    addresses: Arc<AddressBook>,
}

impl ControllerApi {
    pub fn new(gateway: Arc<RequestGateway>, addresses: Arc<AddressBook>) -> Self {
        Self { gateway, addresses }
    }

    pub fn addresses(&self) -> &Arc<AddressBook> {
        &self.addresses
    }

    fn url(&self, path: &str) -> String {
        self.addresses.controller().url(path)
    }

    async fn call_ok(
        &self,
        path: &str,
        options: RequestOptions,
        timeout: Duration,
    ) -> Result<GatewayResponse, GatewayError> {
        let response = self.gateway.call(&self.url(path), options, timeout).await?;
        if response.is_success() {
            Ok(response)
        } else {
            warn!("{} answered HTTP {}", path, response.status);
            Err(GatewayError::UnexpectedStatus(response.status))
        }
    }

    pub async fn wifi_status(&self) -> Result<WifiStatus, GatewayError> {
        self.call_ok("/wifi/status", RequestOptions::get(), WIFI_STATUS_TIMEOUT)
            .await?
            .json()
    }

    pub async fn scan_networks(&self) -> Result<Vec<WifiNetwork>, GatewayError> {
        self.call_ok("/wifi/scan", RequestOptions::post(), WIFI_SCAN_TIMEOUT)
            .await?
            .json()
    }

    /// Sends a validated Wi-Fi configuration. When the controller reports its new
    /// address, the address book is re-derived from it and returned.
    pub async fn configure_wifi(&self, config: &WifiConfig) -> Result<Option<Addresses>, SetupError> {
        config.validate()?;
        let options = RequestOptions::post().with_json(config)?;
        let response = self.call_ok("/wifi/config", options, WIFI_CONFIG_TIMEOUT).await?;

        // The controller restarts right after answering; an unreadable body is not a failure
        let result: WifiConfigResult = response.json().unwrap_or_default();
        info!("Configuration saved, controller is restarting");

        let Some(ip) = result.ip.filter(|ip| !ip.is_empty()) else {
            return Ok(None);
        };
        let controller = EndpointAddress::parse(&ip)?;
        let addresses = Addresses::derived_from(controller);
        if let Err(e) = self.addresses.update(addresses.clone()) {
            warn!("Failed to persist new addresses: {}", e);
        }
        Ok(Some(addresses))
    }

    /// `GET /status`. Same shape as the telemetry `state_update` envelope.
    pub async fn status(&self) -> Result<StateUpdate, GatewayError> {
        self.call_ok("/status", RequestOptions::get(), STATUS_TIMEOUT)
            .await?
            .json()
    }

    /// Newline-delimited log, blank lines dropped.
    pub async fn logs(&self) -> Result<Vec<String>, GatewayError> {
        let text = self
            .call_ok("/api/logs", RequestOptions::get(), LOGS_TIMEOUT)
            .await?
            .text();
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// File names held by the controller's own storage.
    pub async fn gallery(&self) -> Result<Vec<String>, GatewayError> {
        self.call_ok("/gallery.json", RequestOptions::get(), GALLERY_TIMEOUT)
            .await?
            .json()
    }

    /// URL of a file from [`ControllerApi::gallery`], with the name percent-encoded.
    pub fn captured_url(&self, name: &str) -> Result<String, GatewayError> {
        if matches!(name, "" | "." | "..") {
            return Err(GatewayError::MalformedResponse(format!("bad file name {:?}", name)));
        }
        let base = self.url("/captured/");
        let mut url =
            Url::parse(&base).map_err(|e| GatewayError::InvalidAddress(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidAddress(base.clone()))?
            .pop_if_empty()
            .push(name);
        Ok(url.to_string())
    }

    pub async fn set_armed(&self, armed: bool) -> Result<(), GatewayError> {
        let path = format!("/arm?state={}", if armed { 1 } else { 0 });
        self.call_ok(&path, RequestOptions::get(), ARM_TIMEOUT).await?;
        info!("System {}", if armed { "armed" } else { "disarmed" });
        Ok(())
    }
}
