//! Detection alert aggregation: daily/lifetime counters, confidence average and the
//! transient per-camera "detecting" windows.

pub mod aggregator;
pub mod types;

pub use aggregator::DetectionAggregator;
pub use types::{format_elapsed, DetectionNotice, DetectionSummary, StatBlock};
