use serde::{Deserialize, Serialize};

/// Marker the controller reports in `log` right after boot; never an alert.
pub const KERNEL_BOOT: &str = "KERNEL_BOOT";
/// Alert `type` raised by the controller's person detector.
pub const HUMAN_TARGET: &str = "HUMAN_TARGET";

/// Inbound JSON envelope, discriminated by its `event` tag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event")]
pub enum TelemetryEvent {
    #[serde(rename = "state_update")]
    StateUpdate(StateUpdate),
    #[serde(rename = "alert")]
    Alert(AlertEvent),
    /// Well-formed envelope with an event name we do not consume
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateUpdate {
    #[serde(default)]
    pub armed: bool,
    #[serde(default)]
    pub log: Option<String>,
    /// Proximity reading in centimetres, 0 when nothing is in range
    #[serde(default)]
    pub prox: f64,
}

impl StateUpdate {
    /// True when `log` carries a fresh entry worth reloading the log view for.
    pub fn has_fresh_log(&self) -> bool {
        matches!(self.log.as_deref(), Some(log) if !log.is_empty() && log != KERNEL_BOOT)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub cam_id: i64,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl AlertEvent {
    pub fn is_human_target(&self) -> bool {
        self.kind == HUMAN_TARGET
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
}

/// A consumer of inbound telemetry. Handlers are invoked in registration order and
/// every handler sees every parsed message.
pub trait TelemetryHandler: Send + Sync {
    fn on_message(&self, event: &TelemetryEvent);

    fn on_state_change(&self, _state: ChannelState) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_envelopes() {
        let ev: TelemetryEvent =
            serde_json::from_str(r#"{"event":"state_update","armed":true,"log":"MOTION","prox":42}"#)
                .unwrap();
        match ev {
            TelemetryEvent::StateUpdate(s) => {
                assert!(s.armed);
                assert_eq!(s.prox, 42.0);
                assert!(s.has_fresh_log());
            }
            other => panic!("unexpected {other:?}"),
        }

        let ev: TelemetryEvent =
            serde_json::from_str(r#"{"event":"alert","type":"HUMAN_TARGET","cam_id":3}"#).unwrap();
        assert_eq!(
            ev,
            TelemetryEvent::Alert(AlertEvent {
                kind: HUMAN_TARGET.into(),
                cam_id: 3,
                confidence: None
            })
        );
    }

    #[test]
    fn unknown_event_and_garbage() {
        let ev: TelemetryEvent = serde_json::from_str(r#"{"event":"heartbeat"}"#).unwrap();
        assert_eq!(ev, TelemetryEvent::Unknown);
        assert!(serde_json::from_str::<TelemetryEvent>("not json").is_err());
        assert!(serde_json::from_str::<TelemetryEvent>(r#"{"armed":true}"#).is_err());
    }

    #[test]
    fn boot_log_is_not_fresh() {
        let s = StateUpdate {
            armed: false,
            log: Some(KERNEL_BOOT.into()),
            prox: 0.0,
        };
        assert!(!s.has_fresh_log());
    }
}
