//! Rolling-median smoothing over the per-camera metric history.

use crate::metrics::RawMetrics;
use crate::state::{CameraState, MetricSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW: usize = 5;

/// Per-field medians of the current history window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SmoothedMetrics {
    pub brightness: f64,
    pub edge_density: f64,
    pub motion_score: f64,
    pub occupancy_score: f64,
}

#[derive(Debug, Clone)]
pub struct Smoother {
    window: usize,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Smoother {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Record `raw` in the camera history and return the medians of the
    /// updated window.
    pub fn smooth(
        &self,
        state: &mut CameraState,
        raw: RawMetrics,
        timestamp: DateTime<Utc>,
    ) -> SmoothedMetrics {
        state.push_sample(
            MetricSample {
                timestamp,
                metrics: raw,
            },
            self.window,
        );
        medians(state.history().map(|s| &s.metrics))
    }
}

pub fn medians<'a>(samples: impl Iterator<Item = &'a RawMetrics>) -> SmoothedMetrics {
    let samples: Vec<&RawMetrics> = samples.collect();
    let field = |get: fn(&RawMetrics) -> f64| median(samples.iter().map(|m| get(m)).collect());
    SmoothedMetrics {
        brightness: field(|m| m.brightness),
        edge_density: field(|m| m.edge_density),
        motion_score: field(|m| m.motion_score),
        occupancy_score: field(|m| m.occupancy_score),
    }
}

/// Median with the midpoint average for even counts; 0.0 when empty.
pub fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn raw(motion: f64, occupancy: f64) -> RawMetrics {
        RawMetrics {
            brightness: 100.0,
            edge_density: 0.1,
            motion_score: motion,
            occupancy_score: occupancy,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()
    }

    #[test]
    fn median_of_empty_is_zero() {
        assert_eq!(median(Vec::new()), 0.0);
        assert_eq!(medians(std::iter::empty()), SmoothedMetrics::default());
    }

    #[test]
    fn median_handles_odd_and_even_counts() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn short_history_uses_every_sample() {
        let smoother = Smoother::default();
        let mut state = CameraState::new();

        let first = smoother.smooth(&mut state, raw(10.0, 0.25), start());
        assert_eq!(first.motion_score, 10.0);

        let second = smoother.smooth(&mut state, raw(2.0, 0.75), start() + Duration::minutes(3));
        assert_eq!(second.motion_score, 6.0);
        assert_eq!(second.occupancy_score, 0.5);

        let third = smoother.smooth(&mut state, raw(4.0, 0.5), start() + Duration::minutes(6));
        assert_eq!(third.motion_score, 4.0);
        assert_eq!(third.occupancy_score, 0.5);
    }

    #[test]
    fn single_spike_is_suppressed() {
        let smoother = Smoother::default();
        let mut state = CameraState::new();
        for i in 0..4 {
            smoother.smooth(&mut state, raw(20.0, 0.1), start() + Duration::minutes(i));
        }

        let smoothed = smoother.smooth(&mut state, raw(0.5, 0.9), start() + Duration::minutes(5));

        assert_eq!(smoothed.motion_score, 20.0);
        assert_eq!(smoothed.occupancy_score, 0.1);
    }

    #[test]
    fn window_evicts_oldest_samples() {
        let smoother = Smoother::new(3);
        let mut state = CameraState::new();
        for (i, motion) in [1.0, 2.0, 30.0, 40.0, 50.0].into_iter().enumerate() {
            smoother.smooth(&mut state, raw(motion, 0.0), start() + Duration::minutes(i as i64));
        }

        let smoothed = smoother.smooth(&mut state, raw(60.0, 0.0), start() + Duration::minutes(9));

        assert_eq!(state.metric_history.len(), 3);
        assert_eq!(smoothed.motion_score, 50.0);
    }
}
