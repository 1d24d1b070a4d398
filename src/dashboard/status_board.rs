use std::collections::HashSet;
use std::sync::{Mutex, RwLock};

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::Notify;

use crate::error_handling::types::GatewayError;
use crate::telemetry::types::{ChannelState, StateUpdate, TelemetryEvent, TelemetryHandler, KERNEL_BOOT};

const NO_ALERT: &str = "NONE";
/// Distinct alert texts remembered before the set starts over.
const MAX_SEEN_ALERTS: usize = 128;

/// Derived display state of the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusTiles {
    pub system: String,
    pub alert: String,
    pub activity: String,
    /// Header line: armed state, `CONNECTED`, `OFFLINE` or `ERROR`
    pub header: String,
}

impl Default for StatusTiles {
    fn default() -> Self {
        Self {
            system: "--".to_string(),
            alert: NO_ALERT.to_string(),
            activity: "CLEAR".to_string(),
            header: "--".to_string(),
        }
    }
}

impl StatusTiles {
    pub fn from_state(state: &StateUpdate) -> Self {
        let armed = if state.armed { "ARMED" } else { "DISARMED" };
        let alert = match state.log.as_deref() {
            Some(log) if !log.is_empty() => log.to_string(),
            _ => NO_ALERT.to_string(),
        };
        let activity = if state.prox > 0.0 {
            format!("OBJ @ {}cm", state.prox)
        } else {
            "CLEAR".to_string()
        };
        Self {
            system: armed.to_string(),
            alert,
            activity,
            header: armed.to_string(),
        }
    }
}

/// Controller status as shown to the operator, fed by the telemetry channel and by
/// the polling fallback.
#[derive(Default)]
pub struct StatusBoard {
    tiles: RwLock<StatusTiles>,
    logs: RwLock<Vec<String>>,
    logs_wanted: Notify,
    seen_alerts: Mutex<HashSet<String>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tiles(&self) -> StatusTiles {
        self.tiles.read().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.read().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn set_logs(&self, logs: Vec<String>) {
        if let Ok(mut slot) = self.logs.write() {
            *slot = logs;
        }
    }

    /// Resolves once a pushed state carried a fresh log entry.
    pub async fn logs_wanted(&self) {
        self.logs_wanted.notified().await;
    }

    pub fn apply_state(&self, state: &StateUpdate) {
        self.replace(StatusTiles::from_state(state));
    }

    /// Applies a polled `/status` outcome. Returns the alert text the first time a
    /// given alert is seen.
    pub fn apply_poll(&self, outcome: Result<StateUpdate, GatewayError>) -> Option<String> {
        let state = match outcome {
            Ok(state) => state,
            Err(GatewayError::MalformedResponse(e)) => {
                warn!("Status update error: {}", e);
                self.set_system("ERROR");
                return None;
            }
            Err(e) => {
                debug!("Status unavailable: {}", e);
                self.set_system("OFFLINE");
                return None;
            }
        };

        self.apply_state(&state);
        if state.log.as_deref() == Some(NO_ALERT) {
            // Alert cleared: the same text may be raised again later
            if let Ok(mut seen) = self.seen_alerts.lock() {
                seen.clear();
            }
            return None;
        }
        let log = state.log.filter(|log| !log.is_empty() && log != KERNEL_BOOT)?;
        let first_time = self
            .seen_alerts
            .lock()
            .map(|mut seen| {
                if seen.len() >= MAX_SEEN_ALERTS && !seen.contains(&log) {
                    seen.clear();
                }
                seen.insert(log.clone())
            })
            .unwrap_or(false);
        if first_time {
            warn!("ALERT - Pyramid: {}", log);
            Some(log)
        } else {
            None
        }
    }

    fn set_system(&self, text: &str) {
        if let Ok(mut tiles) = self.tiles.write() {
            tiles.system = text.to_string();
            tiles.header = text.to_string();
        }
    }

    fn replace(&self, next: StatusTiles) {
        if let Ok(mut tiles) = self.tiles.write() {
            *tiles = next;
        }
    }
}

impl TelemetryHandler for StatusBoard {
    fn on_message(&self, event: &TelemetryEvent) {
        if let TelemetryEvent::StateUpdate(state) = event {
            self.apply_state(state);
            if state.has_fresh_log() {
                self.logs_wanted.notify_one();
            }
        }
    }

    fn on_state_change(&self, state: ChannelState) {
        if state == ChannelState::Open {
            if let Ok(mut tiles) = self.tiles.write() {
                tiles.header = "CONNECTED".to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state(armed: bool, log: Option<&str>, prox: f64) -> StateUpdate {
        StateUpdate {
            armed,
            log: log.map(str::to_string),
            prox,
        }
    }

    #[test]
    fn tiles_from_state() {
        let tiles = StatusTiles::from_state(&state(true, Some("MOTION"), 42.0));
        assert_eq!(tiles.system, "ARMED");
        assert_eq!(tiles.alert, "MOTION");
        assert_eq!(tiles.activity, "OBJ @ 42cm");

        let tiles = StatusTiles::from_state(&state(false, None, 0.0));
        assert_eq!(tiles.system, "DISARMED");
        assert_eq!(tiles.alert, "NONE");
        assert_eq!(tiles.activity, "CLEAR");
    }

    #[test]
    fn poll_failures_mark_offline_or_error() {
        let board = StatusBoard::new();
        board.apply_poll(Err(GatewayError::Timeout));
        assert_eq!(board.tiles().system, "OFFLINE");

        board.apply_poll(Err(GatewayError::MalformedResponse("eof".into())));
        assert_eq!(board.tiles().system, "ERROR");
        assert_eq!(board.tiles().header, "ERROR");
    }

    #[test]
    fn alerts_are_raised_once_per_key() {
        let board = StatusBoard::new();
        assert_eq!(board.apply_poll(Ok(state(true, Some("NONE"), 0.0))), None);
        assert_eq!(board.apply_poll(Ok(state(true, Some(KERNEL_BOOT), 0.0))), None);
        assert_eq!(
            board.apply_poll(Ok(state(true, Some("INTRUDER_CAM2"), 30.0))),
            Some("INTRUDER_CAM2".to_string())
        );
        assert_eq!(board.apply_poll(Ok(state(true, Some("INTRUDER_CAM2"), 30.0))), None);
        assert_eq!(
            board.apply_poll(Ok(state(true, Some("INTRUDER_CAM3"), 30.0))),
            Some("INTRUDER_CAM3".to_string())
        );
    }

    #[test]
    fn cleared_alert_may_be_raised_again() {
        let board = StatusBoard::new();
        let intruder = || Ok(state(true, Some("INTRUDER_CAM2"), 30.0));
        assert!(board.apply_poll(intruder()).is_some());
        assert!(board.apply_poll(intruder()).is_none());

        assert_eq!(board.apply_poll(Ok(state(true, Some("NONE"), 0.0))), None);
        assert!(board.seen_alerts.lock().unwrap().is_empty());
        assert!(board.apply_poll(intruder()).is_some());
    }

    #[test]
    fn remembered_alerts_stay_bounded() {
        let board = StatusBoard::new();
        for n in 0..MAX_SEEN_ALERTS * 3 {
            let text = format!("MOTION_{}", n);
            assert_eq!(board.apply_poll(Ok(state(true, Some(&text), 1.0))), Some(text));
            assert!(board.seen_alerts.lock().unwrap().len() <= MAX_SEEN_ALERTS);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_fresh_log_requests_a_log_reload() {
        let board = StatusBoard::new();
        board.on_state_change(ChannelState::Open);
        assert_eq!(board.tiles().header, "CONNECTED");

        board.on_message(&TelemetryEvent::StateUpdate(state(false, Some(KERNEL_BOOT), 0.0)));
        let waited = tokio::time::timeout(Duration::from_millis(50), board.logs_wanted()).await;
        assert!(waited.is_err());

        board.on_message(&TelemetryEvent::StateUpdate(state(true, Some("MOTION"), 5.0)));
        let waited = tokio::time::timeout(Duration::from_millis(50), board.logs_wanted()).await;
        assert!(waited.is_ok());
        assert_eq!(board.tiles().activity, "OBJ @ 5cm");
    }
}
