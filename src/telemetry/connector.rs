//! Socket seam of the telemetry channel.
//!
//! The channel owns the lifecycle (connect, pump, close, back off); a connector only
//! knows how to open one session and read text frames from it.

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use log::debug;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error_handling::types::TelemetryError;

pub trait TelemetryConnector: Send + Sync {
    fn connect<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn TelemetrySession>, TelemetryError>>;
}

pub trait TelemetrySession: Send {
    /// Next text frame. `None` once the peer closed the session.
    fn next_text(&mut self) -> BoxFuture<'_, Option<Result<String, TelemetryError>>>;

    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// WebSocket connector (`tokio-tungstenite`).
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl TelemetryConnector for WsConnector {
    fn connect<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn TelemetrySession>, TelemetryError>> {
        Box::pin(async move {
            let (stream, _response) = tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| TelemetryError::ConnectFailed(e.to_string()))?;
            Ok(Box::new(WsSession { stream }) as Box<dyn TelemetrySession>)
        })
    }
}

struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TelemetrySession for WsSession {
    fn next_text(&mut self) -> BoxFuture<'_, Option<Result<String, TelemetryError>>> {
        Box::pin(async move {
            while let Some(frame) = self.stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                    Ok(Message::Close(_)) => return None,
                    // Ping/pong are answered by tungstenite, binary frames are not part of the protocol
                    Ok(_) => continue,
                    Err(e) => return Some(Err(TelemetryError::ReceiveFailed(e.to_string()))),
                }
            }
            None
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self.stream.close(None).await {
                debug!("Telemetry socket close: {}", e);
            }
        })
    }
}
