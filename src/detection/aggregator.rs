use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDate, Utc};
use log::{debug, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::types::{DetectionNotice, DetectionSummary, StatBlock, DEFAULT_CONFIDENCE, DETECTION_WINDOW};
use crate::camera::types::{CameraId, CAMERA_COUNT};
use crate::storage::settings_store::{
    SettingsStore, KEY_DETECTIONS_TODAY, KEY_DETECTION_COUNT, KEY_LIFETIME_DETECTIONS,
    KEY_STATS_DATE, KEY_TOTAL_CONFIDENCE,
};
use crate::telemetry::types::{ChannelState, TelemetryEvent, TelemetryHandler};

const STATS_DATE_FORMAT: &str = "%Y-%m-%d";

/// Shared between the aggregator and its expiry tasks.
#[derive(Default)]
struct Inner {
    stats: StatBlock,
    /// Bumped on every detection; an expiry only clears its own window.
    generation: [u64; CAMERA_COUNT],
}

/// Turns detection alerts into rolling statistics and per-camera alert windows.
///
/// The daily counters are persisted on every detection and rolled over lazily:
/// [`DetectionAggregator::load`] resets them when the stored date is not today.
pub struct DetectionAggregator {
    settings: Arc<dyn SettingsStore>,
    inner: Arc<Mutex<Inner>>,
    expiries: Mutex<HashMap<CameraId, JoinHandle<()>>>,
    /// Lifetime count of the last block written to settings.
    persisted: Mutex<u64>,
    window: Duration,
    notices: broadcast::Sender<DetectionNotice>,
    online: AtomicBool,
}

impl DetectionAggregator {
    pub fn load(settings: Arc<dyn SettingsStore>) -> Self {
        Self::load_on(settings, Local::now().date_naive())
    }

    /// Loads persisted counters as of `today`.
    pub fn load_on(settings: Arc<dyn SettingsStore>, today: NaiveDate) -> Self {
        let stats = read_stats(settings.as_ref(), today);
        let (notices, _) = broadcast::channel(64);
        Self {
            settings,
            inner: Arc::new(Mutex::new(Inner {
                stats,
                generation: [0; CAMERA_COUNT],
            })),
            expiries: Mutex::new(HashMap::new()),
            persisted: Mutex::new(0),
            window: DETECTION_WINDOW,
            notices,
            online: AtomicBool::new(false),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Records one detection. Returns false when `cam_id` is not a camera.
    ///
    /// Must be called from inside a tokio runtime; the window expiry is a spawned task.
    pub fn on_detection(&self, cam_id: i64, confidence: f64) -> bool {
        let cam = match CameraId::new(cam_id) {
            Ok(cam) => cam,
            Err(e) => {
                debug!("Ignoring detection: {}", e);
                return false;
            }
        };

        let (generation, snapshot) = {
            let Ok(mut inner) = self.inner.lock() else {
                return false;
            };
            let stats = &mut inner.stats;
            stats.detections_today += 1;
            stats.detection_count += 1;
            stats.lifetime_detections += 1;
            stats.total_confidence += confidence;
            stats.last_detection = Some(Utc::now());
            stats.active[cam.index()] = true;
            let snapshot = stats.clone();

            inner.generation[cam.index()] += 1;
            (inner.generation[cam.index()], snapshot)
        };
        self.persist(&snapshot);

        let _ = self.notices.send(DetectionNotice::Raised { cam, confidence });
        info!(
            "Detection: camera {} - confidence {:.1}%",
            cam,
            confidence * 100.0
        );

        self.restart_window(cam, generation);
        true
    }

    fn restart_window(&self, cam: CameraId, generation: u64) {
        let inner = self.inner.clone();
        let notices = self.notices.clone();
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let cleared = match inner.lock() {
                Ok(mut inner) if inner.generation[cam.index()] == generation => {
                    inner.stats.active[cam.index()] = false;
                    true
                }
                _ => false,
            };
            if cleared {
                let _ = notices.send(DetectionNotice::Cleared { cam });
            }
        });

        if let Ok(mut expiries) = self.expiries.lock() {
            if let Some(previous) = expiries.insert(cam, handle) {
                previous.abort();
            }
        }
    }

    /// Writes `stats` unless a later block has already been written.
    fn persist(&self, stats: &StatBlock) {
        let Ok(mut persisted) = self.persisted.lock() else {
            return;
        };
        if *persisted >= stats.lifetime_detections {
            return;
        }
        *persisted = stats.lifetime_detections;
        let today = Local::now().date_naive().format(STATS_DATE_FORMAT).to_string();
        let writes = [
            (KEY_STATS_DATE, today),
            (KEY_DETECTIONS_TODAY, stats.detections_today.to_string()),
            (KEY_TOTAL_CONFIDENCE, stats.total_confidence.to_string()),
            (KEY_DETECTION_COUNT, stats.detection_count.to_string()),
            (KEY_LIFETIME_DETECTIONS, stats.lifetime_detections.to_string()),
        ];
        for (key, value) in writes {
            if let Err(e) = self.settings.set(key, &value) {
                warn!("Failed to persist {}: {}", key, e);
            }
        }
    }

    pub fn stats(&self) -> StatBlock {
        self.inner
            .lock()
            .map(|inner| inner.stats.clone())
            .unwrap_or_default()
    }

    pub fn is_active(&self, cam: CameraId) -> bool {
        self.stats().is_active(cam)
    }

    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary::render(&self.stats(), self.online.load(Ordering::SeqCst), Utc::now())
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<DetectionNotice> {
        self.notices.subscribe()
    }
}

impl Drop for DetectionAggregator {
    fn drop(&mut self) {
        if let Ok(expiries) = self.expiries.lock() {
            for handle in expiries.values() {
                handle.abort();
            }
        }
    }
}

impl TelemetryHandler for DetectionAggregator {
    fn on_message(&self, event: &TelemetryEvent) {
        if let TelemetryEvent::Alert(alert) = event {
            if alert.is_human_target() {
                self.on_detection(alert.cam_id, alert.confidence.unwrap_or(DEFAULT_CONFIDENCE));
            }
        }
    }

    fn on_state_change(&self, state: ChannelState) {
        self.online.store(state == ChannelState::Open, Ordering::SeqCst);
    }
}

fn read_stats(settings: &dyn SettingsStore, today: NaiveDate) -> StatBlock {
    let lifetime_detections = parse_or_zero(settings, KEY_LIFETIME_DETECTIONS);
    let saved_date = settings
        .get(KEY_STATS_DATE)
        .and_then(|raw| NaiveDate::parse_from_str(&raw, STATS_DATE_FORMAT).ok());

    if saved_date == Some(today) {
        return StatBlock {
            detections_today: parse_or_zero(settings, KEY_DETECTIONS_TODAY),
            total_confidence: parse_or_zero(settings, KEY_TOTAL_CONFIDENCE),
            detection_count: parse_or_zero(settings, KEY_DETECTION_COUNT),
            lifetime_detections,
            ..StatBlock::default()
        };
    }

    info!("New day, resetting detection statistics");
    let resets = [
        (KEY_STATS_DATE, today.format(STATS_DATE_FORMAT).to_string()),
        (KEY_DETECTIONS_TODAY, "0".to_string()),
        (KEY_TOTAL_CONFIDENCE, "0".to_string()),
        (KEY_DETECTION_COUNT, "0".to_string()),
    ];
    for (key, value) in resets {
        if let Err(e) = settings.set(key, &value) {
            warn!("Failed to persist {}: {}", key, e);
        }
    }
    StatBlock {
        lifetime_detections,
        ..StatBlock::default()
    }
}

fn parse_or_zero<T: std::str::FromStr + Default>(settings: &dyn SettingsStore, key: &str) -> T {
    settings
        .get(key)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default()
}
