use crate::risk::IncidentType;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Healthy,
    Degraded,
    Attention,
    Unknown,
}

impl SystemStatus {
    pub fn color(self) -> &'static str {
        match self {
            SystemStatus::Healthy => "green",
            SystemStatus::Degraded => "amber",
            SystemStatus::Attention => "red",
            SystemStatus::Unknown => "gray",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            SystemStatus::Healthy => "Monitoring active",
            SystemStatus::Degraded => "Monitoring delayed",
            SystemStatus::Attention => "No recent checks",
            SystemStatus::Unknown => "No checks recorded yet",
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DashboardResponse {
    pub now: String,
    pub system_status: SystemStatus,
    pub status_color: &'static str,
    pub status_message: &'static str,
    pub last_check: Option<String>,
    pub next_check: Option<String>,
    pub camera_count: usize,
    pub live_incident_count: usize,
    pub live_incidents: Vec<LiveIncident>,
    pub cameras: Vec<CameraCard>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LiveIncident {
    pub camera: String,
    pub highway: String,
    pub incident_type: IncidentType,
    pub risk: f64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CameraCard {
    pub id: String,
    pub name: String,
    pub highway: String,
    pub image_url: Option<String>,
    pub last_risk: Option<f64>,
    pub last_incident_type: Option<IncidentType>,
    pub last_timestamp: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Stale,
    NoData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub last_check: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InternalError,
}
