//! Commute-aware incident classification.
//!
//! The cascade is evaluated top to bottom and the first matching rule wins:
//!
//! | rule | condition                                              | base |
//! |------|--------------------------------------------------------|------|
//! | 1    | motion < 2.0 and occupancy > 0.45                      | 90   |
//! | 2    | motion < 5.0 and occupancy > 0.35                      | 70   |
//! | 3    | motion < 5.0 and brightness < 60 and edges < 0.03      | 60   |
//!
//! The base risk is then scaled by the highway weight and, inside a commute
//! window, by the commute multiplier. Hours are local wall-clock hours in
//! the configured timezone.

use crate::camera::Camera;
use crate::smoothing::SmoothedMetrics;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_WEIGHT: f64 = 0.6;
pub const COMMUTE_MULTIPLIER: f64 = 1.3;
const VISIBILITY_BASE_RISK: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    BlockedOrClosedLane,
    MajorSlowdown,
    SevereVisibilityDisruption,
}

impl IncidentType {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentType::BlockedOrClosedLane => "blocked_or_closed_lane",
            IncidentType::MajorSlowdown => "major_slowdown",
            IncidentType::SevereVisibilityDisruption => "severe_visibility_disruption",
        }
    }

    /// Human readable form, e.g. "Major Slowdown".
    pub fn title(self) -> &'static str {
        match self {
            IncidentType::BlockedOrClosedLane => "Blocked Or Closed Lane",
            IncidentType::MajorSlowdown => "Major Slowdown",
            IncidentType::SevereVisibilityDisruption => "Severe Visibility Disruption",
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommuteWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl CommuteWindow {
    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..self.end_hour).contains(&hour)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    pub timezone: Tz,
    /// Keyed by the highway label as written in the registry
    pub highway_weights: HashMap<String, f64>,
    pub default_weight: f64,
    pub commute_windows: Vec<CommuteWindow>,
    pub commute_multiplier: f64,
    pub night_start_hour: u32,
    pub night_end_hour: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Vancouver,
            highway_weights: HashMap::from([
                ("1".to_string(), 1.0),
                ("14".to_string(), 0.8),
                ("17".to_string(), 0.7),
            ]),
            default_weight: DEFAULT_WEIGHT,
            commute_windows: vec![
                CommuteWindow {
                    start_hour: 7,
                    end_hour: 9,
                },
                CommuteWindow {
                    start_hour: 16,
                    end_hour: 18,
                },
            ],
            commute_multiplier: COMMUTE_MULTIPLIER,
            night_start_hour: 20,
            night_end_hour: 6,
        }
    }
}

impl ScoringPolicy {
    pub fn highway_weight(&self, highway: Option<&str>) -> f64 {
        highway
            .and_then(|h| self.highway_weights.get(h))
            .copied()
            .unwrap_or(self.default_weight)
    }

    pub fn in_commute_window(&self, hour: u32) -> bool {
        self.commute_windows.iter().any(|w| w.contains(hour))
    }

    pub fn is_night(&self, hour: u32) -> bool {
        if self.night_start_hour > self.night_end_hour {
            hour >= self.night_start_hour || hour < self.night_end_hour
        } else {
            (self.night_start_hour..self.night_end_hour).contains(&hour)
        }
    }

    pub fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&self.timezone).hour()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAssessment {
    /// 0-100
    pub risk: f64,
    pub incident_type: Option<IncidentType>,
}

impl RiskAssessment {
    pub fn normal() -> Self {
        Self {
            risk: 0.0,
            incident_type: None,
        }
    }
}

/// First matching rule of the cascade, with its base risk.
pub fn cascade(metrics: &SmoothedMetrics) -> Option<(IncidentType, f64)> {
    let motion = metrics.motion_score;
    let occupancy = metrics.occupancy_score;

    if motion < 2.0 && occupancy > 0.45 {
        Some((IncidentType::BlockedOrClosedLane, 90.0))
    } else if motion < 5.0 && occupancy > 0.35 {
        Some((IncidentType::MajorSlowdown, 70.0))
    } else if motion < 5.0 && metrics.brightness < 60.0 && metrics.edge_density < 0.03 {
        Some((IncidentType::SevereVisibilityDisruption, VISIBILITY_BASE_RISK))
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct RiskClassifier {
    policy: ScoringPolicy,
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new(ScoringPolicy::default())
    }
}

impl RiskClassifier {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn assess(
        &self,
        metrics: &SmoothedMetrics,
        camera: &Camera,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        self.assess_at_hour(metrics, camera.highway.as_deref(), self.policy.local_hour(now))
    }

    /// Same as [`assess`](Self::assess) with the local hour already resolved.
    pub fn assess_at_hour(
        &self,
        metrics: &SmoothedMetrics,
        highway: Option<&str>,
        hour: u32,
    ) -> RiskAssessment {
        let Some((incident, base_risk)) = cascade(metrics) else {
            return RiskAssessment::normal();
        };

        // Dark, featureless frames are expected at night. Only the unscaled
        // visibility rule is suppressed.
        if incident == IncidentType::SevereVisibilityDisruption
            && base_risk == VISIBILITY_BASE_RISK
            && self.policy.is_night(hour)
        {
            return RiskAssessment::normal();
        }

        let commute_factor = if self.policy.in_commute_window(hour) {
            self.policy.commute_multiplier
        } else {
            1.0
        };
        let risk = (base_risk * self.policy.highway_weight(highway) * commute_factor).clamp(0.0, 100.0);

        RiskAssessment {
            risk,
            incident_type: Some(incident),
        }
    }
}
