use crate::alert::message::AlertMessage;
use crate::risk::IncidentType;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to serialize alert: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("delivery failed: {0}")]
    Transport(String),
    #[error("delivery rejected with http status {0}")]
    Status(u16),
}

/// Delivers an alert. A returned error means nothing was delivered and the
/// caller must not record the alert.
pub trait Notifier {
    fn send(&self, message: &AlertMessage<'_>) -> Result<(), NotifyError>;
}

/// Writes alerts to the structured log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &AlertMessage<'_>) -> Result<(), NotifyError> {
        info!(
            camera_id = %message.camera.id,
            camera = %message.camera.name,
            incident_type = %message.incident,
            risk = message.risk,
            attachment = %message.attachment_name(),
            attachment_bytes = message.image.len(),
            subject = %message.subject(),
            "ALERT"
        );
        Ok(())
    }
}

/// POSTs a multipart form with a `payload` JSON part and an `image` part.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { url, client })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, message: &AlertMessage<'_>) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&message.summary())?;
        let image = reqwest::blocking::multipart::Part::bytes(message.image.to_vec())
            .file_name(message.attachment_name())
            .mime_str("image/jpeg")
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .text("payload", payload)
            .part("image", image);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        info!(
            camera_id = %message.camera.id,
            incident_type = %message.incident,
            risk = message.risk,
            "Alert delivered to webhook"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentAlert {
    pub camera_id: String,
    pub incident: IncidentType,
    pub risk: f64,
    pub subject: String,
    pub image_len: usize,
}

/// Keeps delivered alerts in memory; can be switched to fail every delivery.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentAlert>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.set_failing(true);
        notifier
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut guard) = self.failing.lock() {
            *guard = failing;
        }
    }

    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, message: &AlertMessage<'_>) -> Result<(), NotifyError> {
        if self.failing.lock().map(|guard| *guard).unwrap_or(false) {
            return Err(NotifyError::Transport("recording notifier set to fail".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotifyError::Transport("recording notifier lock poisoned".to_string()))?;
        sent.push(SentAlert {
            camera_id: message.camera.id.clone(),
            incident: message.incident,
            risk: message.risk,
            subject: message.subject(),
            image_len: message.image.len(),
        });
        Ok(())
    }
}
