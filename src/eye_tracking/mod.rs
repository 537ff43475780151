// Gaze-to-screen mapping and dwell selection engine
pub mod types;
pub mod error;
pub mod settings;
pub mod calibration;
pub mod target_resolver;
pub mod dwell;
pub mod engine;
pub mod observer;
pub mod sampling_loop;

// Re-export the public surface so callers can use `eye_tracking::*`
pub use types::*;
pub use error::{GazeError, GazeResult};
pub use settings::{load_gaze_settings, save_gaze_settings, GazeSettings};
pub use calibration::{apply_mapping, normalize, AnchorPoint, CalibrationMapping, CalibrationRecord, ANCHOR_POINTS};
pub use target_resolver::{resolve, resolve_with_distances, TargetDistance};
pub use dwell::{DwellState, DwellStateMachine, DwellUpdate};
pub use engine::{CalibrationStatus, CalibrationStep, GazeEngine, GazeSnapshot, TickOutcome};
pub use observer::{ActionDispatcher, ChannelObserver, CompositeObserver, GazeEvent, GazeObserver, TargetAction};
pub use sampling_loop::{run_tick, GazeTracker, LandmarkDetector, RenderSurface, SharedEngine, TickResult};
