//! Per-run camera orchestration.
//!
//! Each camera goes through fetch, extract, smooth, classify and decide in
//! turn. Failures before classification skip the camera for this run only.
//! State is saved and a log record appended for every camera that reaches
//! classification, whether or not an alert went out.

use crate::alert::message::AlertMessage;
use crate::alert::notifier::Notifier;
use crate::alert::AlertPolicy;
use crate::camera::Camera;
use crate::config::{Config, ConfigError};
use crate::error::AppError;
use crate::fetch::{ImageFetcher, ImageSource};
use crate::incident_log::{IncidentLog, LogRecord};
use crate::metrics::MetricExtractor;
use crate::pacer::Pacer;
use crate::risk::{RiskAssessment, RiskClassifier};
use crate::smoothing::Smoother;
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(2500);
pub const DEFAULT_CAMERA_PAUSE: Duration = Duration::from_secs(1);

/// Immutable tuning for a run, built once from the config.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub extractor: MetricExtractor,
    pub smoother: Smoother,
    pub classifier: RiskClassifier,
    pub alert_policy: AlertPolicy,
    /// Gap between the two frames of a camera
    pub frame_interval: Duration,
    /// Pause after every camera
    pub camera_pause: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            extractor: MetricExtractor::default(),
            smoother: Smoother::default(),
            classifier: RiskClassifier::default(),
            alert_policy: AlertPolicy::default(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            camera_pause: DEFAULT_CAMERA_PAUSE,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            extractor: MetricExtractor::new(config.target_width()),
            smoother: Smoother::new(config.history_window()),
            classifier: RiskClassifier::new(config.scoring_policy()?),
            alert_policy: config.alert_policy()?,
            frame_interval: config.frame_interval(),
            camera_pause: config.camera_pause(),
        })
    }
}

/// External collaborators a run reads from and writes to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub store: &'a dyn StateStore,
    pub notifier: &'a dyn Notifier,
    pub incident_log: &'a dyn IncidentLog,
    pub pacer: &'a dyn Pacer,
}

/// Outcome of one camera that made it through classification.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraReport {
    pub assessment: RiskAssessment,
    pub alerted: bool,
    pub notify_failed: bool,
    pub record: LogRecord,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub alerted: usize,
    pub notify_failures: usize,
}

pub struct CameraOrchestrator<'a, S> {
    fetcher: ImageFetcher<S>,
    settings: PipelineSettings,
    io: Collaborators<'a>,
}

impl<'a, S: ImageSource> CameraOrchestrator<'a, S> {
    pub fn new(fetcher: ImageFetcher<S>, settings: PipelineSettings, io: Collaborators<'a>) -> Self {
        Self {
            fetcher,
            settings,
            io,
        }
    }

    pub fn fetcher(&self) -> &ImageFetcher<S> {
        &self.fetcher
    }

    pub fn run_once(&mut self, cameras: &[Camera]) -> RunSummary {
        self.run_once_at(cameras, Utc::now())
    }

    /// One sequential pass over `cameras`, all stamped with `now`.
    pub fn run_once_at(&mut self, cameras: &[Camera], now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::default();
        for camera in cameras {
            match self.process_camera(camera, now) {
                Ok(report) => {
                    summary.processed += 1;
                    if report.alerted {
                        summary.alerted += 1;
                    }
                    if report.notify_failed {
                        summary.notify_failures += 1;
                    }
                }
                Err(err @ AppError::MissingImageUrl(_)) => {
                    warn!(camera_id = %camera.id, camera = %camera.name, error = %err, "Camera skipped");
                    summary.skipped += 1;
                }
                Err(err) => {
                    error!(camera_id = %camera.id, camera = %camera.name, error = %err, "Camera skipped");
                    summary.skipped += 1;
                }
            }
            self.io.pacer.pause(self.settings.camera_pause);
        }
        info!(
            cameras = cameras.len(),
            processed = summary.processed,
            skipped = summary.skipped,
            alerted = summary.alerted,
            notify_failures = summary.notify_failures,
            "Run complete"
        );
        summary
    }

    pub fn process_camera(
        &mut self,
        camera: &Camera,
        now: DateTime<Utc>,
    ) -> Result<CameraReport, AppError> {
        let url = camera
            .image_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AppError::MissingImageUrl(camera.id.clone()))?;
        info!(camera_id = %camera.id, camera = %camera.name, "Checking camera");

        let first = self.fetcher.fetch(url, self.io.pacer)?;
        self.io.pacer.pause(self.settings.frame_interval);
        let second = self.fetcher.fetch(url, self.io.pacer)?;

        let raw = self
            .settings
            .extractor
            .extract(&first.image, &second.image)?;

        let mut state = self.io.store.load(&camera.id);
        let smoothed = self.settings.smoother.smooth(&mut state, raw, now);
        let assessment = self.settings.classifier.assess(&smoothed, camera, now);
        let decision = state.alert.decide(&assessment, now, &self.settings.alert_policy);

        let local_now = now.with_timezone(&self.settings.classifier.policy().timezone);
        let mut alerted = false;
        let mut notify_failed = false;
        if decision.should_alert
            && let Some(incident) = assessment.incident_type
        {
            let message = AlertMessage {
                camera,
                incident,
                risk: assessment.risk,
                image: &second.bytes,
                smoothed,
                timestamp: local_now,
            };
            match self.io.notifier.send(&message) {
                Ok(()) => {
                    state.alert = state.alert.after_delivery(&assessment, now);
                    alerted = true;
                }
                Err(err) => {
                    error!(camera_id = %camera.id, incident_type = %incident, error = %err, "Alert delivery failed");
                    notify_failed = true;
                }
            }
        }

        let record = LogRecord::new(
            camera,
            local_now.fixed_offset(),
            &assessment,
            raw,
            smoothed,
            alerted,
        );
        let saved = self.io.store.save(&camera.id, &state);
        let logged = self.io.incident_log.append(&record);

        info!(
            camera_id = %camera.id,
            camera = %camera.name,
            highway = camera.highway_label(),
            risk = record.risk,
            incident_type = assessment.incident_type.map(|t| t.as_str()).unwrap_or("normal"),
            reason = ?decision.reason,
            alerted,
            "Camera processed"
        );

        saved?;
        logged?;
        Ok(CameraReport {
            assessment,
            alerted,
            notify_failed,
            record,
        })
    }

    /// Runs passes back to back, each starting `interval` after the previous
    /// one started, until `stop` is set. Returns the number of passes.
    pub fn watch(&mut self, cameras: &[Camera], interval: Duration, stop: &AtomicBool) -> usize {
        let mut runs = 0;
        info!(
            cameras = cameras.len(),
            interval_secs = interval.as_secs(),
            "Watching cameras"
        );
        while !stop.load(Ordering::Relaxed) {
            let start = Instant::now();
            self.run_once(cameras);
            runs += 1;
            sleep_with_stop(interval, stop, start);
        }
        runs
    }
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let step = Duration::from_millis(100);
    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let elapsed = start.elapsed();
        if elapsed >= duration {
            break;
        }
        std::thread::sleep((duration - elapsed).min(step));
    }
}
