use crate::pacer::Pacer;
use image::DynamicImage;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub mod http;
pub mod mock;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);
/// Payloads below this size are treated as truncated transfers.
pub const DEFAULT_MIN_BYTES: usize = 5000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    pub attempts: u32,
    pub retry_delay: Duration,
    pub min_bytes: usize,
    /// Per-request timeout, applied by the transport
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            min_bytes: DEFAULT_MIN_BYTES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Why a single attempt was rejected. Every variant is retryable.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("response too small: {len} bytes (minimum {min})")]
    TooSmall { len: usize, min: usize },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("decoded frame is empty")]
    EmptyFrame,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to retrieve valid image from {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: AttemptError,
    },
}

impl FetchError {
    pub fn last_error(&self) -> &AttemptError {
        match self {
            FetchError::Exhausted { last, .. } => last,
        }
    }
}

/// Transport for raw image payloads.
pub trait ImageSource {
    fn fetch_bytes(&mut self, url: &str) -> Result<Vec<u8>, SourceError>;
}

/// A decoded frame together with the bytes it was decoded from, so the
/// payload can be attached to an alert without re-encoding.
#[derive(Debug, Clone)]
pub struct FetchedFrame {
    pub image: DynamicImage,
    pub bytes: Vec<u8>,
}

pub struct ImageFetcher<S> {
    source: S,
    policy: FetchPolicy,
}

impl<S: ImageSource> ImageFetcher<S> {
    pub fn new(source: S, policy: FetchPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch and decode a frame, retrying within the attempt budget.
    pub fn fetch(&mut self, url: &str, pacer: &dyn Pacer) -> Result<FetchedFrame, FetchError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_once(url) {
                Ok(frame) => {
                    debug!(
                        url,
                        attempt,
                        size = frame.bytes.len(),
                        width = frame.image.width(),
                        height = frame.image.height(),
                        "Frame fetched"
                    );
                    return Ok(frame);
                }
                Err(err) => {
                    warn!(url, attempt, attempts, error = %err, "Fetch attempt failed");
                    if attempt >= attempts {
                        return Err(FetchError::Exhausted {
                            url: url.to_string(),
                            attempts,
                            last: err,
                        });
                    }
                }
            }
            pacer.pause(self.policy.retry_delay);
            attempt += 1;
        }
    }

    fn try_once(&mut self, url: &str) -> Result<FetchedFrame, AttemptError> {
        let bytes = self.source.fetch_bytes(url)?;
        if bytes.len() < self.policy.min_bytes {
            return Err(AttemptError::TooSmall {
                len: bytes.len(),
                min: self.policy.min_bytes,
            });
        }
        let image = image::load_from_memory(&bytes)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(AttemptError::EmptyFrame);
        }
        Ok(FetchedFrame { image, bytes })
    }
}
