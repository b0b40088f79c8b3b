use crate::camera::{self, Camera, RegistryError};
use crate::dashboard::responses::{
    DashboardResponse, ErrorCode, ErrorResponse, HealthStatus, HealthSuccessResponse, SystemStatus,
};
use crate::dashboard::status::{StatusParams, compute_status, last_check, system_status};
use crate::incident_log::{self, LogRecord};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Where the dashboard reads from. Both files are re-read on every request.
#[derive(Debug, Clone)]
pub struct DashboardContext {
    pub cameras_path: PathBuf,
    pub incident_log_path: PathBuf,
    pub params: StatusParams,
}

pub enum DashboardReply {
    Success(Box<DashboardResponse>),
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl IntoResponse for DashboardReply {
    fn into_response(self) -> Response {
        match self {
            DashboardReply::Success(body) => (StatusCode::OK, Json(*body)).into_response(),
            DashboardReply::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

/// Both files are read on the blocking pool.
pub async fn get_dashboard(State(context): State<Arc<DashboardContext>>) -> Response {
    let now = Utc::now();
    let timezone = context.params.timezone;
    match tokio::task::spawn_blocking(move || build_dashboard_response(&context, now)).await {
        Ok(reply) => reply.into_response(),
        Err(err) => worker_failure(&err, timezone, now),
    }
}

pub enum HealthReply {
    Success {
        status: StatusCode,
        body: HealthSuccessResponse,
    },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl IntoResponse for HealthReply {
    fn into_response(self) -> Response {
        match self {
            HealthReply::Success { status, body } => (status, Json(body)).into_response(),
            HealthReply::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_health(State(context): State<Arc<DashboardContext>>) -> Response {
    let now = Utc::now();
    let timezone = context.params.timezone;
    match tokio::task::spawn_blocking(move || build_health_response(&context, now)).await {
        Ok(reply) => reply.into_response(),
        Err(err) => worker_failure(&err, timezone, now),
    }
}

fn worker_failure(err: &JoinError, timezone: Tz, now: DateTime<Utc>) -> Response {
    error!(error = %err, "Dashboard worker failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(internal_error_body(timezone, now)),
    )
        .into_response()
}

fn build_dashboard_response(context: &DashboardContext, now: DateTime<Utc>) -> DashboardReply {
    let cameras = match load_cameras(context) {
        Ok(cameras) => cameras,
        Err(err) => {
            error!(error = %err, "Failed to load camera registry");
            return DashboardReply::Error {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: internal_error_body(context.params.timezone, now),
            };
        }
    };
    let records = match load_records(context) {
        Ok(records) => records,
        Err(err) => {
            error!(error = %err, "Failed to read incident log");
            return DashboardReply::Error {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: internal_error_body(context.params.timezone, now),
            };
        }
    };

    DashboardReply::Success(Box::new(compute_status(
        now,
        &cameras,
        &records,
        &context.params,
    )))
}

fn build_health_response(context: &DashboardContext, now: DateTime<Utc>) -> HealthReply {
    let records = match load_records(context) {
        Ok(records) => records,
        Err(err) => {
            error!(error = %err, "Failed to read incident log");
            return HealthReply::Error {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: internal_error_body(context.params.timezone, now),
            };
        }
    };

    let last = last_check(&records);
    let (status_code, status) = match system_status(now, last) {
        SystemStatus::Healthy => (StatusCode::OK, HealthStatus::Ok),
        SystemStatus::Unknown => (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::NoData),
        SystemStatus::Degraded | SystemStatus::Attention => {
            (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Stale)
        }
    };
    let timezone = context.params.timezone;

    HealthReply::Success {
        status: status_code,
        body: HealthSuccessResponse {
            status,
            last_check: last.map(|ts| ts.with_timezone(&timezone).to_rfc3339()),
            timestamp: now.with_timezone(&timezone).to_rfc3339(),
        },
    }
}

/// A registry that does not exist yet is an empty list.
fn load_cameras(context: &DashboardContext) -> Result<Vec<Camera>, RegistryError> {
    match camera::load_registry(&context.cameras_path) {
        Ok(cameras) => Ok(cameras),
        Err(RegistryError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}

fn load_records(context: &DashboardContext) -> Result<Vec<LogRecord>, incident_log::LogError> {
    incident_log::read_all(&context.incident_log_path)
}

fn internal_error_body(timezone: Tz, now: DateTime<Utc>) -> ErrorResponse {
    ErrorResponse {
        error_code: ErrorCode::InternalError,
        error_message: INTERNAL_ERROR_MESSAGE.to_string(),
        timestamp: now.with_timezone(&timezone).to_rfc3339(),
    }
}
