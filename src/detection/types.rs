use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::camera::types::{CameraId, CAMERA_COUNT};

/// How long a camera stays flagged after its most recent detection.
pub const DETECTION_WINDOW: Duration = Duration::from_secs(5);
/// Confidence used when an alert does not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.85;

/// Rolling detection statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct StatBlock {
    pub detections_today: u64,
    pub total_confidence: f64,
    pub detection_count: u64,
    /// Never reset by the daily rollover
    pub lifetime_detections: u64,
    pub last_detection: Option<DateTime<Utc>>,
    pub active: [bool; CAMERA_COUNT],
}

impl Default for StatBlock {
    fn default() -> Self {
        Self {
            detections_today: 0,
            total_confidence: 0.0,
            detection_count: 0,
            lifetime_detections: 0,
            last_detection: None,
            active: [false; CAMERA_COUNT],
        }
    }
}

impl StatBlock {
    /// `None` until at least one detection has been counted.
    pub fn average_confidence(&self) -> Option<f64> {
        if self.detection_count == 0 {
            None
        } else {
            Some(self.total_confidence / self.detection_count as f64)
        }
    }

    pub fn is_active(&self, cam: CameraId) -> bool {
        self.active[cam.index()]
    }

    pub fn active_cameras(&self) -> Vec<CameraId> {
        CameraId::ALL
            .into_iter()
            .filter(|cam| self.is_active(*cam))
            .collect()
    }
}

/// Transient per-camera alert state changes, for overlays and operator notices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionNotice {
    Raised { cam: CameraId, confidence: f64 },
    Cleared { cam: CameraId },
}

/// Display-ready rendering of a [`StatBlock`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub status: String,
    pub detections_today: u64,
    pub average_confidence: String,
    pub last_detection: String,
    pub lifetime_detections: u64,
    pub active_cameras: Vec<CameraId>,
}

impl DetectionSummary {
    pub fn render(stats: &StatBlock, online: bool, now: DateTime<Utc>) -> Self {
        let active_cameras = stats.active_cameras();
        let status = if !active_cameras.is_empty() {
            format!("Detecting ({})", active_cameras.len())
        } else if online {
            "Active".to_string()
        } else {
            "Offline".to_string()
        };

        let average_confidence = match stats.average_confidence() {
            Some(avg) => format!("{:.0}%", avg * 100.0),
            None => "--".to_string(),
        };

        let last_detection = match stats.last_detection {
            Some(at) => format_elapsed((now - at).num_seconds()),
            None => "None".to_string(),
        };

        Self {
            status,
            detections_today: stats.detections_today,
            average_confidence,
            last_detection,
            lifetime_detections: stats.lifetime_detections,
            active_cameras,
        }
    }
}

/// `Ns ago`, `Nm ago` or `Nh ago`, truncating.
pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        format!("{}s ago", seconds)
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else {
        format!("{}h ago", seconds / 3600)
    }
}
