//! Wire-level HTTP transport behind the gateway.
//!
//! The gateway only needs "send this request, give me status and body". Keeping that
//! behind a trait lets tests count calls and simulate slow or failing devices.

use futures_util::future::BoxFuture;
use log::trace;

use crate::error_handling::types::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Caller-side description of a request, before the gateway adds its own headers.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::Get,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post() -> Self {
        Self {
            method: Method::Post,
            ..Self::get()
        }
    }

    pub fn with_json<T: serde::Serialize>(mut self, value: &T) -> Result<Self, GatewayError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        self.body = Some(body);
        Ok(self)
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

/// Fully resolved request as handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl OutboundRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait Transport: Send + Sync {
    /// Sends the request and reads the whole body.
    ///
    /// Dropping the returned future must abort the underlying request.
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<TransportResponse, GatewayError>>;
}

/// `reqwest` backed transport. No cookie store is configured, so no ambient
/// credentials ever leave the process.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::TransportFailure(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<TransportResponse, GatewayError>> {
        Box::pin(async move {
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
            };
            let mut builder = self.client.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(classify)?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(classify)?.to_vec();
            trace!("{} -> {} ({} bytes)", request.url, status, body.len());
            Ok(TransportResponse { status, body })
        })
    }
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::TransportFailure(err.to_string())
    }
}
