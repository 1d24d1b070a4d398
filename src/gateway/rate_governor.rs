//! Admission control for outbound device calls.
//!
//! A fixed one-minute window with a hard ceiling, plus a minimum spacing between two
//! admitted calls. The window state sits behind a fair `tokio::sync::Mutex` that is
//! held across the spacing wait, so callers are admitted strictly in the order they
//! asked.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error_handling::types::GatewayError;

pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 60;
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(1000);
const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct RateWindow {
    request_count: u32,
    window_start: Instant,
    last_admitted: Option<Instant>,
}

/// Snapshot of the governor's counters, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateStatus {
    pub request_count: u32,
    pub ceiling: u32,
}

pub struct RateGovernor {
    window: Mutex<RateWindow>,
    ceiling: u32,
    min_spacing: Duration,
}

impl RateGovernor {
    pub fn new(ceiling: u32, min_spacing: Duration) -> Self {
        Self {
            window: Mutex::new(RateWindow {
                request_count: 0,
                window_start: Instant::now(),
                last_admitted: None,
            }),
            ceiling,
            min_spacing,
        }
    }

    /// Grants admission or fails with [`GatewayError::RateExceeded`].
    ///
    /// May suspend the caller for the rest of the minimum spacing.
    pub async fn admit_or_wait(&self) -> Result<(), GatewayError> {
        let mut window = self.window.lock().await;
        let now = Instant::now();

        if now.duration_since(window.window_start) > WINDOW {
            debug!(
                "Rate window expired after {} requests, starting a new one",
                window.request_count
            );
            window.request_count = 0;
            window.window_start = now;
        }

        if window.request_count >= self.ceiling {
            warn!(
                "Rate limit exceeded ({} requests in the current window)",
                window.request_count
            );
            return Err(GatewayError::RateExceeded);
        }
        window.request_count += 1;

        if let Some(last) = window.last_admitted {
            let gap = now.duration_since(last);
            if gap < self.min_spacing {
                tokio::time::sleep(self.min_spacing - gap).await;
            }
        }
        window.last_admitted = Some(Instant::now());
        Ok(())
    }

    pub async fn status(&self) -> RateStatus {
        let window = self.window.lock().await;
        RateStatus {
            request_count: window.request_count,
            ceiling: self.ceiling,
        }
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS_PER_MINUTE, DEFAULT_MIN_SPACING)
    }
}
