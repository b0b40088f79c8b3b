//! Camera registry loaded from the deployment's YAML file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

pub type CameraId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Camera {
    /// Filesystem-safe identity used as the state key
    pub id: CameraId,
    pub name: String,
    pub highway: Option<String>,
    pub image_url: Option<String>,
}

impl Camera {
    pub fn highway_label(&self) -> &str {
        self.highway.as_deref().unwrap_or("?")
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read camera registry {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse camera registry: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid camera registry: {0}")]
    Invalid(String),
}

/// YAML scalars show up as numbers or strings depending on who edited the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    cameras: Option<Vec<CameraEntry>>,
}

#[derive(Debug, Deserialize)]
struct CameraEntry {
    id: Option<Scalar>,
    drivebc_id: Option<Scalar>,
    name: Option<String>,
    highway: Option<Scalar>,
    image_url: Option<String>,
    url: Option<String>,
}

impl CameraEntry {
    fn into_camera(self) -> Camera {
        let identity = [self.id.as_ref(), self.drivebc_id.as_ref()]
            .into_iter()
            .flatten()
            .map(ToString::to_string)
            .chain(self.name.clone())
            .find(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let id = sanitize_id(&identity);
        let image_url = self
            .image_url
            .or(self.url)
            .filter(|url| !url.trim().is_empty());

        Camera {
            name: self.name.unwrap_or_else(|| identity.clone()),
            id,
            highway: self.highway.map(|h| h.to_string()),
            image_url,
        }
    }
}

/// Turn an arbitrary identity into a token usable as a file name.
pub fn sanitize_id(raw: &str) -> CameraId {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' => '-',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '_',
        })
        .collect()
}

pub fn parse_registry(contents: &str) -> Result<Vec<Camera>, RegistryError> {
    if contents.trim().is_empty() {
        return Err(RegistryError::Invalid("registry file is empty".to_string()));
    }
    let file: RegistryFile = serde_yaml::from_str(contents)?;
    let entries = file
        .cameras
        .ok_or_else(|| RegistryError::Invalid("missing top-level 'cameras' key".to_string()))?;
    Ok(entries.into_iter().map(CameraEntry::into_camera).collect())
}

pub fn load_registry(path: impl AsRef<Path>) -> Result<Vec<Camera>, RegistryError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_registry(&contents)
}
