use crate::alert::AlertPolicy;
use crate::alert::notifier::{LogNotifier, Notifier, WebhookNotifier};
use crate::fetch::FetchPolicy;
use crate::fetch::http::HttpImageSource;
use crate::metrics::DEFAULT_TARGET_WIDTH;
use crate::pipeline::{DEFAULT_CAMERA_PAUSE, DEFAULT_FRAME_INTERVAL};
use crate::risk::{CommuteWindow, ScoringPolicy};
use crate::smoothing::DEFAULT_WINDOW;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_CAMERAS_PATH: &str = "config/cameras.yaml";
pub const DEFAULT_STATE_DIR: &str = "state";
pub const DEFAULT_INCIDENT_LOG: &str = "incident_log.jsonl";
pub const DEFAULT_RUN_INTERVAL_SECS: u64 = 180;
pub const DEFAULT_DASHBOARD_PORT: u16 = 5000;
pub const DEFAULT_LIVE_WINDOW_MINUTES: i64 = 30;
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub paths: Option<PathsSection>,
    #[serde(default)]
    pub fetch: Option<FetchSection>,
    #[serde(default)]
    pub capture: Option<CaptureSection>,
    #[serde(default)]
    pub scoring: Option<ScoringSection>,
    #[serde(default)]
    pub alert: Option<AlertSection>,
    #[serde(default)]
    pub notify: Option<NotifySection>,
    #[serde(default)]
    pub dashboard: Option<DashboardSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PathsSection {
    /// Camera registry (YAML with a top-level `cameras` list)
    pub cameras: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub incident_log: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FetchSection {
    pub attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub min_bytes: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CaptureSection {
    /// Gap between the two frames the motion score compares
    pub frame_interval_ms: Option<u64>,
    /// Pause after each camera, whatever the outcome
    pub camera_pause_ms: Option<u64>,
    pub target_width: Option<u32>,
    /// Period of `watch` mode
    pub run_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScoringSection {
    pub timezone: Option<String>,
    pub highway_weights: Option<HashMap<String, f64>>,
    pub default_weight: Option<f64>,
    /// Local-hour ranges `[start, end)`
    pub commute_windows: Option<Vec<[u32; 2]>>,
    pub commute_multiplier: Option<f64>,
    pub night_start_hour: Option<u32>,
    pub night_end_hour: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AlertSection {
    pub risk_threshold: Option<f64>,
    pub cooldown_minutes: Option<i64>,
    pub history_window: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    #[default]
    Log,
    Webhook,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifySection {
    #[serde(default)]
    pub channel: NotifyChannel,
    pub webhook_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardSection {
    pub port: Option<u16>,
    pub live_window_minutes: Option<i64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Checks everything a run needs before any camera is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log_level()?;
        self.scoring_policy()?;
        let alert = self.alert_policy()?;
        self.live_window()?;
        if self.history_window() == 0 {
            return Err(ConfigError::Invalid(
                "alert.history_window must be at least 1".to_string(),
            ));
        }
        if alert.cooldown.num_seconds() < 0 {
            return Err(ConfigError::Invalid(
                "alert.cooldown_minutes must not be negative".to_string(),
            ));
        }
        if self.fetch_policy().attempts == 0 {
            return Err(ConfigError::Invalid(
                "fetch.attempts must be at least 1".to_string(),
            ));
        }
        if self.target_width() == 0 {
            return Err(ConfigError::Invalid(
                "capture.target_width must be positive".to_string(),
            ));
        }
        if self.notify_channel() == NotifyChannel::Webhook && self.webhook_url().is_none() {
            return Err(ConfigError::Invalid(
                "notify.webhook_url is required for the webhook channel".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cameras_path(&self) -> &Path {
        self.paths
            .as_ref()
            .and_then(|p| p.cameras.as_deref())
            .unwrap_or(Path::new(DEFAULT_CAMERAS_PATH))
    }

    pub fn state_dir(&self) -> &Path {
        self.paths
            .as_ref()
            .and_then(|p| p.state_dir.as_deref())
            .unwrap_or(Path::new(DEFAULT_STATE_DIR))
    }

    pub fn incident_log_path(&self) -> &Path {
        self.paths
            .as_ref()
            .and_then(|p| p.incident_log.as_deref())
            .unwrap_or(Path::new(DEFAULT_INCIDENT_LOG))
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        let defaults = FetchPolicy::default();
        let Some(section) = self.fetch.as_ref() else {
            return defaults;
        };
        FetchPolicy {
            attempts: section.attempts.unwrap_or(defaults.attempts),
            retry_delay: section
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            min_bytes: section.min_bytes.unwrap_or(defaults.min_bytes),
            timeout: section
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.capture
            .as_ref()
            .and_then(|c| c.frame_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_FRAME_INTERVAL)
    }

    pub fn camera_pause(&self) -> Duration {
        self.capture
            .as_ref()
            .and_then(|c| c.camera_pause_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CAMERA_PAUSE)
    }

    pub fn target_width(&self) -> u32 {
        self.capture
            .as_ref()
            .and_then(|c| c.target_width)
            .unwrap_or(DEFAULT_TARGET_WIDTH)
    }

    /// Returns the `watch` period (default: 3 minutes)
    pub fn run_interval(&self) -> Duration {
        let secs = self
            .capture
            .as_ref()
            .and_then(|c| c.run_interval_secs)
            .unwrap_or(DEFAULT_RUN_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    pub fn scoring_policy(&self) -> Result<ScoringPolicy, ConfigError> {
        let defaults = ScoringPolicy::default();
        let Some(section) = self.scoring.as_ref() else {
            return Ok(defaults);
        };

        let timezone = match section.timezone.as_deref() {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|err| ConfigError::Invalid(format!("unknown timezone {name}: {err}")))?,
            None => defaults.timezone,
        };

        let commute_windows = match section.commute_windows.as_ref() {
            Some(windows) => windows
                .iter()
                .map(|[start, end]| {
                    if start >= end || *end > 24 {
                        Err(ConfigError::Invalid(format!(
                            "commute window [{start}, {end}) is not a valid hour range"
                        )))
                    } else {
                        Ok(CommuteWindow {
                            start_hour: *start,
                            end_hour: *end,
                        })
                    }
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.commute_windows,
        };

        let night_start_hour = section.night_start_hour.unwrap_or(defaults.night_start_hour);
        let night_end_hour = section.night_end_hour.unwrap_or(defaults.night_end_hour);
        if night_start_hour > 24 || night_end_hour > 24 {
            return Err(ConfigError::Invalid(
                "night hours must be within 0-24".to_string(),
            ));
        }

        Ok(ScoringPolicy {
            timezone,
            highway_weights: section
                .highway_weights
                .clone()
                .unwrap_or(defaults.highway_weights),
            default_weight: section.default_weight.unwrap_or(defaults.default_weight),
            commute_windows,
            commute_multiplier: section
                .commute_multiplier
                .unwrap_or(defaults.commute_multiplier),
            night_start_hour,
            night_end_hour,
        })
    }

    pub fn alert_policy(&self) -> Result<AlertPolicy, ConfigError> {
        let defaults = AlertPolicy::default();
        let Some(section) = self.alert.as_ref() else {
            return Ok(defaults);
        };
        let cooldown = match section.cooldown_minutes {
            Some(value) => minutes("alert.cooldown_minutes", value)?,
            None => defaults.cooldown,
        };
        Ok(AlertPolicy {
            risk_threshold: section.risk_threshold.unwrap_or(defaults.risk_threshold),
            cooldown,
        })
    }

    /// Number of samples the rolling median covers (default: 5)
    pub fn history_window(&self) -> usize {
        self.alert
            .as_ref()
            .and_then(|a| a.history_window)
            .unwrap_or(DEFAULT_WINDOW)
    }

    pub fn notify_channel(&self) -> NotifyChannel {
        self.notify.as_ref().map(|n| n.channel).unwrap_or_default()
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.notify
            .as_ref()
            .and_then(|n| n.webhook_url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }

    pub fn notify_timeout(&self) -> Duration {
        let secs = self
            .notify
            .as_ref()
            .and_then(|n| n.timeout_secs)
            .unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Builds the notifier for the configured channel.
    pub fn build_notifier(&self) -> Result<Box<dyn Notifier>, ConfigError> {
        match self.notify_channel() {
            NotifyChannel::Log => Ok(Box::new(LogNotifier)),
            NotifyChannel::Webhook => {
                let url = self.webhook_url().ok_or_else(|| {
                    ConfigError::Invalid(
                        "notify.webhook_url is required for the webhook channel".to_string(),
                    )
                })?;
                let notifier = WebhookNotifier::new(url.to_string(), self.notify_timeout())
                    .map_err(|err| {
                        ConfigError::Invalid(format!("cannot build webhook client: {err}"))
                    })?;
                Ok(Box::new(notifier))
            }
        }
    }

    /// Builds the HTTP camera source with the configured fetch timeout.
    pub fn build_image_source(&self) -> Result<HttpImageSource, ConfigError> {
        HttpImageSource::new(self.fetch_policy().timeout)
            .map_err(|err| ConfigError::Invalid(format!("cannot build http client: {err}")))
    }

    /// Returns the dashboard port (default: 5000)
    pub fn dashboard_port(&self) -> u16 {
        self.dashboard
            .as_ref()
            .and_then(|d| d.port)
            .unwrap_or(DEFAULT_DASHBOARD_PORT)
    }

    pub fn live_window(&self) -> Result<chrono::Duration, ConfigError> {
        let value = self
            .dashboard
            .as_ref()
            .and_then(|d| d.live_window_minutes)
            .unwrap_or(DEFAULT_LIVE_WINDOW_MINUTES);
        minutes("dashboard.live_window_minutes", value)
    }

    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        let level = self.logging.level.trim();
        level.parse::<tracing::Level>().map_err(|_| {
            ConfigError::Invalid(format!(
                "logging.level {level:?} is not one of trace, debug, info, warn, error"
            ))
        })
    }
}

fn minutes(key: &str, value: i64) -> Result<chrono::Duration, ConfigError> {
    chrono::Duration::try_minutes(value)
        .ok_or_else(|| ConfigError::Invalid(format!("{key} = {value} is out of range")))
}
