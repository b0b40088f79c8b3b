//! Per-camera state persistence.
//!
//! Loading never fails: missing or unreadable state means "no prior state".

use crate::camera::CameraId;
use crate::state::CameraState;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write state for camera {camera_id}: {source}")]
    Write {
        camera_id: CameraId,
        source: std::io::Error,
    },
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("state store lock poisoned")]
    Lock,
}

pub trait StateStore {
    fn load(&self, camera_id: &str) -> CameraState;
    /// Replaces whatever was stored for the camera.
    fn save(&self, camera_id: &str, state: &CameraState) -> Result<(), StoreError>;
}

/// One pretty-printed JSON file per camera under a state directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, camera_id: &str) -> PathBuf {
        self.dir.join(format!("{camera_id}.json"))
    }

    fn write_atomically(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(contents)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)
    }
}

impl StateStore for FileStateStore {
    fn load(&self, camera_id: &str) -> CameraState {
        let path = self.path_for(camera_id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(camera_id, "No prior state");
                return CameraState::default();
            }
            Err(err) => {
                warn!(camera_id, path = %path.display(), error = %err, "Unreadable state, starting fresh");
                return CameraState::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(err) => {
                warn!(camera_id, path = %path.display(), error = %err, "Corrupt state, starting fresh");
                CameraState::default()
            }
        }
    }

    fn save(&self, camera_id: &str, state: &CameraState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(state)?;
        let path = self.path_for(camera_id);
        self.write_atomically(&path, &json)
            .map_err(|source| StoreError::Write {
                camera_id: camera_id.to_string(),
                source,
            })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<CameraId, CameraState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, camera_id: &str) -> Option<CameraState> {
        self.states
            .lock()
            .ok()
            .and_then(|guard| guard.get(camera_id).cloned())
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, camera_id: &str) -> CameraState {
        self.get(camera_id).unwrap_or_default()
    }

    fn save(&self, camera_id: &str, state: &CameraState) -> Result<(), StoreError> {
        let mut guard = self.states.lock().map_err(|_| StoreError::Lock)?;
        guard.insert(camera_id.to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertState;
    use crate::metrics::RawMetrics;
    use crate::risk::IncidentType;
    use crate::state::MetricSample;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_store(label: &str) -> Result<FileStateStore, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let dir = std::env::temp_dir().join(format!("roadwatch-state-{label}-{unique}"));
        Ok(FileStateStore::new(dir))
    }

    fn populated_state() -> CameraState {
        let mut state = CameraState::new();
        for minute in 0..3 {
            state.push_sample(
                MetricSample {
                    timestamp: Utc.with_ymd_and_hms(2026, 5, 4, 7, minute * 3, 0).unwrap(),
                    metrics: RawMetrics {
                        brightness: 80.0 + f64::from(minute),
                        edge_density: 0.05,
                        motion_score: 1.5,
                        occupancy_score: 0.5,
                    },
                },
                5,
            );
        }
        state.alert = AlertState::Alerted {
            incident: IncidentType::BlockedOrClosedLane,
            since: Utc.with_ymd_and_hms(2026, 5, 4, 7, 6, 0).unwrap(),
            risk: 100.0,
        };
        state
    }

    #[test]
    fn saved_state_loads_back_equivalent() -> Result<(), Box<dyn std::error::Error>> {
        let store = temp_store("roundtrip")?;
        let state = populated_state();

        store.save("218", &state)?;
        let loaded = store.load("218");
        let _ = fs::remove_dir_all(&store.dir);

        assert_eq!(loaded, state);
        assert_eq!(loaded.last_incident_type(), Some(IncidentType::BlockedOrClosedLane));
        assert_eq!(loaded.last_alert_time(), state.last_alert_time());
        Ok(())
    }

    #[test]
    fn save_overwrites_previous_state() -> Result<(), Box<dyn std::error::Error>> {
        let store = temp_store("overwrite")?;

        store.save("8", &populated_state())?;
        store.save("8", &CameraState::default())?;
        let loaded = store.load("8");
        let _ = fs::remove_dir_all(&store.dir);

        assert_eq!(loaded, CameraState::default());
        Ok(())
    }

    #[test]
    fn missing_state_is_default() -> Result<(), Box<dyn std::error::Error>> {
        let store = temp_store("missing")?;
        assert_eq!(store.load("nope"), CameraState::default());
        Ok(())
    }

    #[test]
    fn corrupt_state_is_default() -> Result<(), Box<dyn std::error::Error>> {
        let store = temp_store("corrupt")?;
        fs::create_dir_all(&store.dir)?;
        fs::write(store.path_for("17"), "{\"metric_history\": [oops")?;

        let loaded = store.load("17");
        let _ = fs::remove_dir_all(&store.dir);

        assert_eq!(loaded, CameraState::default());
        Ok(())
    }

    #[test]
    fn memory_store_round_trips() -> Result<(), StoreError> {
        let store = MemoryStateStore::new();
        let state = populated_state();

        store.save("a", &state)?;

        assert_eq!(store.load("a"), state);
        assert_eq!(store.load("b"), CameraState::default());
        Ok(())
    }
}
