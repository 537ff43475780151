// src/eye_tracking/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GazeError {
    /// One or more of the anchors needed to solve the mapping was never recorded.
    #[error("Calibration incomplete, missing anchor(s): {}", .missing.join(", "))]
    CalibrationIncomplete { missing: Vec<String> },

    #[error("No calibration in progress")]
    CalibrationNotActive,

    #[error("Invalid gaze settings: {0}")]
    InvalidSettings(String),

    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type GazeResult<T> = Result<T, GazeError>;
