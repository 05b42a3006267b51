//! Persistence of the session across a suspend/resume cycle.
//!
//! Only three integers are kept: the sensor mode, the max batch delay and the
//! step count. Delay history and counter baselines are rebuilt after resume.

use crate::core::accountant::{PersistedState, SensorMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A persisted session and when it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedState {
    pub state: PersistedState,
    pub saved_at: DateTime<Utc>,
}

/// On-disk layout of the state file.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    /// Mode code (0 none, 1 counter, 2 detector)
    state: i32,
    /// Max batch delay in microseconds
    latency: u32,
    steps: u64,
    saved_at: DateTime<Utc>,
}

/// Stores the session state in a JSON file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the state, creating the parent directory if needed.
    pub fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StateError::IoError(e.to_string()))?;
        }

        let file = StateFile {
            state: state.mode.code(),
            latency: state.max_batch_delay_us,
            steps: state.step_count,
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| StateError::SerializeError(e.to_string()))?;

        std::fs::write(&self.path, json).map_err(|e| StateError::IoError(e.to_string()))
    }

    /// Read the saved state, if any was written.
    pub fn load(&self) -> Result<Option<SavedState>, StateError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|e| StateError::IoError(e.to_string()))?;
        let file: StateFile =
            serde_json::from_str(&content).map_err(|e| StateError::ParseError(e.to_string()))?;
        let mode = SensorMode::from_code(file.state).ok_or(StateError::UnknownMode(file.state))?;

        Ok(Some(SavedState {
            state: PersistedState {
                mode,
                max_batch_delay_us: file.latency,
                step_count: file.steps,
            },
            saved_at: file.saved_at,
        }))
    }

    /// Remove the saved state.
    pub fn clear(&self) -> Result<(), StateError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::IoError(e.to_string())),
        }
    }
}

/// State persistence errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    UnknownMode(i32),
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::IoError(e) => write!(f, "IO error: {e}"),
            StateError::ParseError(e) => write!(f, "Parse error: {e}"),
            StateError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            StateError::UnknownMode(code) => write!(f, "Unknown sensor mode code: {code}"),
        }
    }
}

impl std::error::Error for StateError {}
