//! Dashboard view computed from the camera registry and the incident log.

use crate::camera::Camera;
use crate::config::{Config, ConfigError};
use crate::dashboard::responses::{CameraCard, DashboardResponse, LiveIncident, SystemStatus};
use crate::incident_log::LogRecord;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

pub const HEALTHY_WITHIN_MINUTES: i64 = 5;
pub const DEGRADED_WITHIN_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusParams {
    pub timezone: Tz,
    /// Records at or above this risk count as live even when not alerted
    pub risk_threshold: f64,
    pub live_window: Duration,
    /// Expected gap between runs, used for `next_check`
    pub run_interval: Duration,
}

impl Default for StatusParams {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Vancouver,
            risk_threshold: crate::alert::DEFAULT_RISK_THRESHOLD,
            live_window: Duration::minutes(crate::config::DEFAULT_LIVE_WINDOW_MINUTES),
            run_interval: Duration::minutes(3),
        }
    }
}

impl StatusParams {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let run_interval = Duration::from_std(config.run_interval())
            .map_err(|err| ConfigError::Invalid(format!("run interval out of range: {err}")))?;
        Ok(Self {
            timezone: config.scoring_policy()?.timezone,
            risk_threshold: config.alert_policy()?.risk_threshold,
            live_window: config.live_window()?,
            run_interval,
        })
    }
}

/// Latest record timestamp across all cameras.
pub fn last_check(records: &[LogRecord]) -> Option<DateTime<FixedOffset>> {
    records.iter().map(|r| r.timestamp).max()
}

pub fn system_status(now: DateTime<Utc>, last_check: Option<DateTime<FixedOffset>>) -> SystemStatus {
    let Some(last_check) = last_check else {
        return SystemStatus::Unknown;
    };
    let age = now.signed_duration_since(last_check);
    if age <= Duration::minutes(HEALTHY_WITHIN_MINUTES) {
        SystemStatus::Healthy
    } else if age <= Duration::minutes(DEGRADED_WITHIN_MINUTES) {
        SystemStatus::Degraded
    } else {
        SystemStatus::Attention
    }
}

pub fn compute_status(
    now: DateTime<Utc>,
    cameras: &[Camera],
    records: &[LogRecord],
    params: &StatusParams,
) -> DashboardResponse {
    let local = |ts: &DateTime<FixedOffset>| ts.with_timezone(&params.timezone).to_rfc3339();

    let mut live: Vec<&LogRecord> = records
        .iter()
        .filter(|r| r.incident_type.is_some())
        .filter(|r| r.alerted || r.risk >= params.risk_threshold)
        .filter(|r| now.signed_duration_since(r.timestamp) <= params.live_window)
        .collect();
    live.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let live_incidents: Vec<LiveIncident> = live
        .into_iter()
        .filter_map(|r| {
            Some(LiveIncident {
                camera: r.camera.clone(),
                highway: r.highway.clone().unwrap_or_else(|| "?".to_string()),
                incident_type: r.incident_type?,
                risk: r.risk,
                timestamp: local(&r.timestamp),
            })
        })
        .collect();

    let mut latest: HashMap<&str, &LogRecord> = HashMap::new();
    for record in records {
        let newer = latest
            .get(record.camera.as_str())
            .is_none_or(|prev| record.timestamp > prev.timestamp);
        if newer {
            latest.insert(record.camera.as_str(), record);
        }
    }

    let cards = cameras
        .iter()
        .map(|camera| {
            let record = latest.get(camera.name.as_str());
            CameraCard {
                id: camera.id.clone(),
                name: camera.name.clone(),
                highway: camera.highway_label().to_string(),
                image_url: camera.image_url.clone(),
                last_risk: record.map(|r| r.risk),
                last_incident_type: record.and_then(|r| r.incident_type),
                last_timestamp: record.map(|r| local(&r.timestamp)),
            }
        })
        .collect();

    let last = last_check(records);
    let status = system_status(now, last);

    DashboardResponse {
        now: now.with_timezone(&params.timezone).to_rfc3339(),
        system_status: status,
        status_color: status.color(),
        status_message: status.message(),
        last_check: last.as_ref().map(local),
        next_check: last.map(|ts| local(&(ts + params.run_interval))),
        camera_count: cameras.len(),
        live_incident_count: live_incidents.len(),
        live_incidents,
        cameras: cards,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RawMetrics;
    use crate::risk::IncidentType;
    use crate::smoothing::SmoothedMetrics;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 20, 0, 0).unwrap()
    }

    fn record(
        camera: &str,
        minutes_ago: i64,
        risk: f64,
        incident: Option<IncidentType>,
        alerted: bool,
    ) -> LogRecord {
        LogRecord {
            timestamp: (now() - Duration::minutes(minutes_ago)).fixed_offset(),
            camera: camera.to_string(),
            camera_id: camera.to_lowercase(),
            highway: Some("1".to_string()),
            risk,
            incident_type: incident,
            metrics_raw: RawMetrics::default(),
            metrics_smoothed: SmoothedMetrics::default(),
            alerted,
        }
    }

    fn camera(name: &str) -> Camera {
        Camera {
            id: name.to_lowercase(),
            name: name.to_string(),
            highway: None,
            image_url: Some(format!("https://cams.test/{name}.jpg")),
        }
    }

    #[test]
    fn status_follows_age_of_last_check() {
        let at = |minutes: i64| Some((now() - Duration::minutes(minutes)).fixed_offset());

        assert_eq!(system_status(now(), None), SystemStatus::Unknown);
        assert_eq!(system_status(now(), at(5)), SystemStatus::Healthy);
        assert_eq!(system_status(now(), at(6)), SystemStatus::Degraded);
        assert_eq!(system_status(now(), at(15)), SystemStatus::Degraded);
        assert_eq!(system_status(now(), at(16)), SystemStatus::Attention);
    }

    #[test]
    fn empty_inputs_report_unknown() {
        let view = compute_status(now(), &[], &[], &StatusParams::default());

        assert_eq!(view.system_status, SystemStatus::Unknown);
        assert_eq!(view.status_color, "gray");
        assert_eq!(view.last_check, None);
        assert_eq!(view.next_check, None);
        assert_eq!(view.camera_count, 0);
        assert_eq!(view.now, "2026-03-10T13:00:00-07:00");
    }

    #[test]
    fn live_incidents_are_recent_qualifying_and_newest_first() {
        let records = vec![
            record("Malahat", 20, 63.0, Some(IncidentType::MajorSlowdown), false),
            record("Malahat", 45, 90.0, Some(IncidentType::BlockedOrClosedLane), true),
            record("Colwood", 10, 42.0, Some(IncidentType::MajorSlowdown), false),
            record("Colwood", 2, 49.0, Some(IncidentType::MajorSlowdown), true),
            record("Langford", 1, 0.0, None, false),
        ];

        let view = compute_status(now(), &[], &records, &StatusParams::default());

        let cameras: Vec<&str> = view.live_incidents.iter().map(|i| i.camera.as_str()).collect();
        assert_eq!(cameras, vec!["Colwood", "Malahat"]);
        assert_eq!(view.live_incident_count, 2);
        assert_eq!(view.live_incidents[0].timestamp, "2026-03-10T12:58:00-07:00");
    }

    #[test]
    fn cameras_show_their_latest_record() {
        let records = vec![
            record("Malahat", 3, 90.0, Some(IncidentType::BlockedOrClosedLane), true),
            record("Malahat", 9, 0.0, None, false),
        ];
        let cameras = vec![camera("Malahat"), camera("Colwood")];

        let view = compute_status(now(), &cameras, &records, &StatusParams::default());

        assert_eq!(view.system_status, SystemStatus::Healthy);
        assert_eq!(view.camera_count, 2);
        assert_eq!(view.cameras[0].last_risk, Some(90.0));
        assert_eq!(
            view.cameras[0].last_incident_type,
            Some(IncidentType::BlockedOrClosedLane)
        );
        assert_eq!(view.cameras[0].highway, "?");
        assert_eq!(view.cameras[1].last_risk, None);
        assert_eq!(view.last_check.as_deref(), Some("2026-03-10T12:57:00-07:00"));
        assert_eq!(view.next_check.as_deref(), Some("2026-03-10T13:00:00-07:00"));
    }
}
