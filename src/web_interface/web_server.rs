use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::{Filter, Rejection, Reply};

use super::types::{ApiError, PowerQuery, PowerResponse, SnapshotResponse, StatusResponse};
use crate::camera::types::CameraId;
use crate::dashboard::DashboardContext;
use crate::error_handling::types::{CameraError, GatewayError};

const DASHBOARD_HTML: &str = r#"<html><head><title>Pyramid</title></head>
<body><h1>Pyramid is running</h1>
<p>See <a href="/api/status">/api/status</a>, <a href="/api/stats">/api/stats</a>,
<a href="/api/cameras">/api/cameras</a> and <a href="/api/vault">/api/vault</a> for JSON.</p>
</body></html>"#;

/// Local HTTP API over a running dashboard
pub struct WebServer {
    ctx: Arc<DashboardContext>,
}

impl WebServer {
    pub fn new(ctx: Arc<DashboardContext>) -> Self {
        Self { ctx }
    }

    /// Serves until the task is dropped.
    pub async fn start(&self, port: u16) {
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        info!("Web interface listening on http://{}", addr);
        warp::serve(self.routes()).run(addr).await;
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let ctx = self.ctx.clone();
        let with_ctx = warp::any().map(move || ctx.clone());

        // GET / -> dashboard
        let dashboard = warp::path::end()
            .and(warp::get())
            .map(|| reply::html(DASHBOARD_HTML));

        let status = warp::path!("api" / "status")
            .and(warp::get())
            .and(with_ctx.clone())
            .and_then(get_status);

        let stats = warp::path!("api" / "stats")
            .and(warp::get())
            .and(with_ctx.clone())
            .and_then(get_stats);

        let cameras = warp::path!("api" / "cameras")
            .and(warp::get())
            .and(with_ctx.clone())
            .and_then(get_cameras);

        let vault = warp::path!("api" / "vault")
            .and(warp::get())
            .and(with_ctx.clone())
            .and_then(get_vault);

        let vault_image = warp::path!("api" / "vault" / i64 / "image")
            .and(warp::get())
            .and(with_ctx.clone())
            .and_then(get_vault_image);

        let arm = warp::path!("api" / "arm")
            .and(warp::post())
            .and(with_ctx.clone())
            .and_then(post_arm);

        let disarm = warp::path!("api" / "disarm")
            .and(warp::post())
            .and(with_ctx.clone())
            .and_then(post_disarm);

        let power = warp::path!("api" / "cameras" / i64 / "power")
            .and(warp::post())
            .and(warp::query::<PowerQuery>())
            .and(with_ctx.clone())
            .and_then(post_power);

        let snapshot = warp::path!("api" / "cameras" / i64 / "snapshot")
            .and(warp::post())
            .and(with_ctx)
            .and_then(post_snapshot);

        dashboard
            .or(status)
            .or(stats)
            .or(cameras)
            .or(vault)
            .or(vault_image)
            .or(arm)
            .or(disarm)
            .or(power)
            .or(snapshot)
    }
}

fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
    reply::with_status(reply::json(&ApiError::new(message)), status).into_response()
}

fn gateway_error_reply(e: &GatewayError) -> Response {
    let status = match e {
        GatewayError::RateExceeded | GatewayError::Throttled => StatusCode::TOO_MANY_REQUESTS,
        GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::InvalidRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    error_reply(status, e.to_string())
}

fn camera_error_reply(e: &CameraError) -> Response {
    match e {
        CameraError::InvalidCamera(_) => error_reply(StatusCode::BAD_REQUEST, e.to_string()),
        CameraError::NotConfigured(_) => error_reply(StatusCode::NOT_FOUND, e.to_string()),
        CameraError::PoweredOff(_) => error_reply(StatusCode::CONFLICT, e.to_string()),
        CameraError::Gateway(inner) => gateway_error_reply(inner),
        CameraError::Storage(_) => error_reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

pub(crate) async fn get_status(ctx: Arc<DashboardContext>) -> Result<Response, Rejection> {
    let body = StatusResponse {
        tiles: ctx.status.tiles(),
        telemetry: ctx.telemetry.state(),
        logs: ctx.status.logs(),
    };
    Ok(reply::json(&body).into_response())
}

pub(crate) async fn get_stats(ctx: Arc<DashboardContext>) -> Result<Response, Rejection> {
    Ok(reply::json(&ctx.detection_summary()).into_response())
}

pub(crate) async fn get_cameras(ctx: Arc<DashboardContext>) -> Result<Response, Rejection> {
    Ok(reply::json(&ctx.cameras.states()).into_response())
}

pub(crate) async fn get_vault(ctx: Arc<DashboardContext>) -> Result<Response, Rejection> {
    Ok(reply::json(&ctx.gallery().await).into_response())
}

pub(crate) async fn get_vault_image(id: i64, ctx: Arc<DashboardContext>) -> Result<Response, Rejection> {
    let res = match ctx.vault.get(id).await {
        Ok(Some(record)) => reply::with_header(record.image, "Content-Type", "image/jpeg").into_response(),
        Ok(None) => error_reply(StatusCode::NOT_FOUND, "Snapshot not found"),
        Err(e) => {
            warn!("Vault read failed: {}", e);
            error_reply(StatusCode::SERVICE_UNAVAILABLE, "Vault offline")
        }
    };
    Ok(res)
}

pub(crate) async fn post_arm(ctx: Arc<DashboardContext>) -> Result<Response, Rejection> {
    Ok(match ctx.arm().await {
        Ok(tiles) => reply::json(&tiles).into_response(),
        Err(e) => gateway_error_reply(&e),
    })
}

pub(crate) async fn post_disarm(ctx: Arc<DashboardContext>) -> Result<Response, Rejection> {
    Ok(match ctx.disarm().await {
        Ok(tiles) => reply::json(&tiles).into_response(),
        Err(e) => gateway_error_reply(&e),
    })
}

pub(crate) async fn post_power(
    id: i64,
    query: PowerQuery,
    ctx: Arc<DashboardContext>,
) -> Result<Response, Rejection> {
    let desired = match query.desired() {
        Ok(desired) => desired,
        Err(message) => return Ok(error_reply(StatusCode::BAD_REQUEST, message)),
    };
    let outcome = match desired {
        Some(power) => ctx.set_power(id, power).await,
        None => ctx.toggle_power(id).await,
    };
    Ok(match outcome {
        Ok(power) => match CameraId::new(id) {
            Ok(cam_id) => reply::json(&PowerResponse { cam_id, power }).into_response(),
            Err(e) => camera_error_reply(&e),
        },
        Err(e) => camera_error_reply(&e),
    })
}

pub(crate) async fn post_snapshot(id: i64, ctx: Arc<DashboardContext>) -> Result<Response, Rejection> {
    Ok(match ctx.take_snapshot(id).await {
        Ok(record) => {
            let status = if record.is_some() {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let body = SnapshotResponse {
                archived: record.is_some(),
                record,
            };
            reply::with_status(reply::json(&body), status).into_response()
        }
        Err(e) => camera_error_reply(&e),
    })
}
