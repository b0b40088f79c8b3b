//! Per-camera alert state machine.
//!
//! A camera is either `Quiet` or `Alerted` with the incident type, time and
//! risk of the last delivered alert. A qualifying assessment (risk at or
//! above the threshold with an incident type) may notify when the type
//! differs from the last one or the cooldown has elapsed. Assessments that
//! do not qualify leave the state untouched, so a recovered camera that
//! relapses into the same incident still honours the cooldown.

use crate::risk::{IncidentType, RiskAssessment};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub mod message;
pub mod notifier;

pub const DEFAULT_RISK_THRESHOLD: f64 = 60.0;
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertPolicy {
    pub risk_threshold: f64,
    pub cooldown: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            risk_threshold: DEFAULT_RISK_THRESHOLD,
            cooldown: Duration::minutes(DEFAULT_COOLDOWN_MINUTES),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AlertState {
    #[default]
    Quiet,
    Alerted {
        incident: IncidentType,
        since: DateTime<Utc>,
        risk: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertReason {
    NoIncident,
    BelowThreshold,
    FirstAlert,
    NewIncidentType,
    CooldownElapsed,
    CoolingDown { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertDecision {
    pub should_alert: bool,
    pub reason: AlertReason,
}

impl AlertDecision {
    fn notify(reason: AlertReason) -> Self {
        Self {
            should_alert: true,
            reason,
        }
    }

    fn hold(reason: AlertReason) -> Self {
        Self {
            should_alert: false,
            reason,
        }
    }
}

impl AlertState {
    /// Decide whether `assessment` warrants a new notification.
    pub fn decide(
        &self,
        assessment: &RiskAssessment,
        now: DateTime<Utc>,
        policy: &AlertPolicy,
    ) -> AlertDecision {
        let Some(incident) = assessment.incident_type else {
            return AlertDecision::hold(AlertReason::NoIncident);
        };
        if assessment.risk < policy.risk_threshold {
            return AlertDecision::hold(AlertReason::BelowThreshold);
        }

        match *self {
            AlertState::Quiet => AlertDecision::notify(AlertReason::FirstAlert),
            AlertState::Alerted {
                incident: last, since, ..
            } => {
                if incident != last {
                    return AlertDecision::notify(AlertReason::NewIncidentType);
                }
                let elapsed = now.signed_duration_since(since);
                if elapsed > policy.cooldown {
                    AlertDecision::notify(AlertReason::CooldownElapsed)
                } else {
                    AlertDecision::hold(AlertReason::CoolingDown {
                        remaining: policy.cooldown - elapsed,
                    })
                }
            }
        }
    }

    /// State after an alert for `assessment` has been delivered. Returns
    /// `self` unchanged when the assessment carries no incident.
    pub fn after_delivery(self, assessment: &RiskAssessment, now: DateTime<Utc>) -> AlertState {
        match assessment.incident_type {
            Some(incident) => AlertState::Alerted {
                incident,
                since: now,
                risk: assessment.risk,
            },
            None => self,
        }
    }
}
