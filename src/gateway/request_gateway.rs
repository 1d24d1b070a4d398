use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use serde::de::DeserializeOwned;

use super::address::EndpointAddress;
use super::credentials::SessionCredentials;
use super::rate_governor::RateGovernor;
use super::transport::{OutboundRequest, RequestOptions, Transport};
use crate::error_handling::types::GatewayError;

/// Successful (non 401/429) device answer. Any status other than those two is
/// handed back for the caller to interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        serde_json::from_slice(&self.body).map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The single path every outbound device call goes through.
///
/// Order of checks per call:
/// 1. address validation (no cost spent on a bad target)
/// 2. rate admission (may wait)
/// 3. header injection (`Authorization` / `X-CSRF-Token` only when cached)
/// 4. deadline-bounded transport call
/// 5. status normalization (401 clears the credential, 429 is `Throttled`)
pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    governor: RateGovernor,
    credentials: Arc<SessionCredentials>,
}

impl RequestGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        governor: RateGovernor,
        credentials: Arc<SessionCredentials>,
    ) -> Self {
        Self {
            transport,
            governor,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Arc<SessionCredentials> {
        &self.credentials
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    pub async fn call(
        &self,
        url: &str,
        options: RequestOptions,
        timeout: Duration,
    ) -> Result<GatewayResponse, GatewayError> {
        let (address, path) = EndpointAddress::split_url(url).map_err(|e| {
            error!("Invalid URL format: {}", url);
            e
        })?;

        self.governor.admit_or_wait().await?;

        let request = self.build_request(address.url(&path), options);
        debug!("{:?} {}", request.method, request.url);

        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(GatewayError::Timeout)) | Err(_) => {
                error!("Request timeout after {:?}: {}", timeout, url);
                return Err(GatewayError::Timeout);
            }
            Ok(Err(e)) => {
                error!("Fetch error for {}: {}", url, e);
                return Err(e);
            }
        };

        match response.status {
            401 => {
                error!("Authentication required by {}", address);
                self.credentials.clear_token();
                Err(GatewayError::Unauthenticated)
            }
            429 => {
                warn!("Device {} is rate limiting us", address);
                Err(GatewayError::Throttled)
            }
            status => Ok(GatewayResponse {
                status,
                body: response.body,
            }),
        }
    }

    fn build_request(&self, url: String, options: RequestOptions) -> OutboundRequest {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ];
        headers.extend(options.headers);
        if let Some(token) = self.credentials.bearer() {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        if let Some(csrf) = self.credentials.csrf() {
            headers.push(("X-CSRF-Token".to_string(), csrf));
        }

        OutboundRequest {
            method: options.method,
            url,
            headers,
            body: options.body,
        }
    }
}
