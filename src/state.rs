use crate::alert::AlertState;
use crate::metrics::RawMetrics;
use crate::risk::IncidentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: RawMetrics,
}

/// Everything persisted for one camera between runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraState {
    /// Oldest first
    #[serde(default)]
    pub metric_history: VecDeque<MetricSample>,
    #[serde(default)]
    pub alert: AlertState,
}

impl CameraState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample and drop the oldest ones beyond `capacity`.
    pub fn push_sample(&mut self, sample: MetricSample, capacity: usize) {
        self.metric_history.push_back(sample);
        while self.metric_history.len() > capacity {
            self.metric_history.pop_front();
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &MetricSample> {
        self.metric_history.iter()
    }

    pub fn last_alert_time(&self) -> Option<DateTime<Utc>> {
        match self.alert {
            AlertState::Quiet => None,
            AlertState::Alerted { since, .. } => Some(since),
        }
    }

    pub fn last_incident_type(&self) -> Option<IncidentType> {
        match self.alert {
            AlertState::Quiet => None,
            AlertState::Alerted { incident, .. } => Some(incident),
        }
    }

    pub fn last_risk(&self) -> Option<f64> {
        match self.alert {
            AlertState::Quiet => None,
            AlertState::Alerted { risk, .. } => Some(risk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(minute: u32, motion: f64) -> MetricSample {
        MetricSample {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 12, 8, minute, 0).unwrap(),
            metrics: RawMetrics {
                motion_score: motion,
                ..RawMetrics::default()
            },
        }
    }

    #[test]
    fn history_never_exceeds_capacity() {
        let mut state = CameraState::new();
        for i in 0..12 {
            state.push_sample(sample(i, f64::from(i)), 5);
            assert!(state.metric_history.len() <= 5);
        }

        let kept: Vec<f64> = state.history().map(|s| s.metrics.motion_score).collect();
        assert_eq!(kept, vec![7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn quiet_state_has_no_alert_context() {
        let state = CameraState::new();
        assert_eq!(state.last_alert_time(), None);
        assert_eq!(state.last_incident_type(), None);
        assert_eq!(state.last_risk(), None);
    }

    #[test]
    fn state_round_trips_through_json() -> Result<(), serde_json::Error> {
        let mut state = CameraState::new();
        state.push_sample(sample(1, 3.5), 5);
        state.alert = AlertState::Alerted {
            incident: IncidentType::MajorSlowdown,
            since: Utc.with_ymd_and_hms(2026, 1, 12, 8, 2, 0).unwrap(),
            risk: 91.0,
        };

        let json = serde_json::to_string(&state)?;
        let restored: CameraState = serde_json::from_str(&json)?;

        assert_eq!(restored, state);
        assert_eq!(restored.last_incident_type(), Some(IncidentType::MajorSlowdown));
        Ok(())
    }

    #[test]
    fn empty_object_loads_as_default() -> Result<(), serde_json::Error> {
        let state: CameraState = serde_json::from_str("{}")?;
        assert_eq!(state, CameraState::default());
        Ok(())
    }
}
