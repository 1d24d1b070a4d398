use std::sync::Arc;

use log::{debug, info};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::context::DashboardContext;

/// Background refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub status: Duration,
    pub gallery: Duration,
}

/// Keeps the dashboard fresh: starts the telemetry channel, then polls status and
/// logs every `status` tick (status polling is skipped while telemetry is open),
/// the controller gallery every `gallery` tick, and the logs whenever a pushed
/// state carries a fresh entry. Returns after `shutdown` flips to `true`.
pub async fn run(ctx: Arc<DashboardContext>, intervals: PollIntervals, mut shutdown: watch::Receiver<bool>) {
    ctx.telemetry.start().await;
    info!("Dashboard polling started");

    let mut status_tick = interval(intervals.status);
    status_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut gallery_tick = interval(intervals.gallery);
    gallery_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = status_tick.tick() => {
                ctx.refresh_status().await;
                let _ = ctx.refresh_logs().await;
            }
            _ = gallery_tick.tick() => {
                if let Err(e) = ctx.refresh_gallery().await {
                    debug!("Controller gallery unavailable: {}", e);
                }
            }
            _ = ctx.status.logs_wanted() => {
                let _ = ctx.refresh_logs().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    ctx.telemetry.stop().await;
    info!("Dashboard polling stopped");
}
