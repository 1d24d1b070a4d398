//! Stream readiness detection.
//!
//! The cameras' MJPEG streams give no load-complete signal, so readiness is a
//! strategy: production assumes a stream is live after a short fixed delay.

use std::time::Duration;

use futures_util::future::BoxFuture;

pub const DEFAULT_LIVENESS_DELAY: Duration = Duration::from_secs(2);

pub trait LivenessProbe: Send + Sync {
    /// Resolves to true once the stream at `stream_url` is considered live.
    fn wait_until_live<'a>(&'a self, stream_url: &'a str) -> BoxFuture<'a, bool>;
}

/// Assumes live after a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelayProbe {
    delay: Duration,
}

impl FixedDelayProbe {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelayProbe {
    fn default() -> Self {
        Self::new(DEFAULT_LIVENESS_DELAY)
    }
}

impl LivenessProbe for FixedDelayProbe {
    fn wait_until_live<'a>(&'a self, _stream_url: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            true
        })
    }
}
