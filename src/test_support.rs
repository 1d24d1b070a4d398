//! Shared doubles for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::controller::address_book::{AddressBook, Addresses};
use crate::error_handling::types::GatewayError;
use crate::gateway::{
    EndpointAddress, OutboundRequest, RateGovernor, RequestGateway, SessionCredentials, Transport,
    TransportResponse,
};
use crate::storage::settings_store::MemorySettings;

struct Route {
    pattern: String,
    status: u16,
    body: Vec<u8>,
}

/// Answers by the first route whose pattern is contained in the request URL.
/// Unrouted URLs fail as unreachable.
#[derive(Default)]
pub struct StubTransport {
    routes: Mutex<Vec<Route>>,
    seen: Mutex<Vec<OutboundRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, pattern: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.routes.lock().unwrap().push(Route {
            pattern: pattern.to_string(),
            status,
            body: body.into(),
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|r| r.url.clone()).collect()
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for StubTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<TransportResponse, GatewayError>> {
        let answer = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|route| request.url.contains(&route.pattern))
            .map(|route| TransportResponse {
                status: route.status,
                body: route.body.clone(),
            })
            .ok_or_else(|| GatewayError::TransportFailure(format!("unreachable: {}", request.url)));
        self.seen.lock().unwrap().push(request);
        Box::pin(async move { answer })
    }
}

/// Gateway over the stub with a generous ceiling and no spacing.
pub fn gateway(transport: Arc<StubTransport>) -> Arc<RequestGateway> {
    let credentials = Arc::new(SessionCredentials::load(Arc::new(MemorySettings::new())));
    Arc::new(RequestGateway::new(
        transport,
        RateGovernor::new(1000, Duration::ZERO),
        credentials,
    ))
}

/// Controller at 192.168.4.1, cameras at .2 to .5.
pub fn address_book() -> Arc<AddressBook> {
    let controller = EndpointAddress::parse("192.168.4.1").unwrap();
    Arc::new(AddressBook::load(
        Arc::new(MemorySettings::new()),
        Addresses::derived_from(controller),
    ))
}
