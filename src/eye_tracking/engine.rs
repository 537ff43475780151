// src/eye_tracking/engine.rs
// Owns the calibration mapping and dwell state; evaluated once per tick.
use crate::eye_tracking::calibration::{
    normalize, AnchorPoint, CalibrationMapping, CalibrationSession, ANCHOR_POINTS,
};
use crate::eye_tracking::dwell::{DwellStateMachine, DwellUpdate};
use crate::eye_tracking::error::{GazeError, GazeResult};
use crate::eye_tracking::settings::GazeSettings;
use crate::eye_tracking::target_resolver::{format_distances, resolve_with_distances};
use crate::eye_tracking::types::*;
use chrono::Utc;
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

/// Everything the pipeline produced for a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub face_detected: bool,
    /// `None` when no face was seen; the published gaze is left unchanged.
    pub screen_gaze: Option<ScreenGaze>,
    pub dwell: DwellUpdate,
    pub activation: Option<Activation>,
}

#[derive(Debug, Clone)]
pub enum CalibrationStep {
    Recorded { label: &'static str, step: usize, next: Option<AnchorPoint> },
    Completed(CalibrationMapping),
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationStatus {
    pub calibrating: bool,
    pub calibrated: bool,
    pub step: usize,
    pub total: usize,
    pub next_anchor: Option<AnchorPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GazeSnapshot {
    pub session_id: String,
    pub screen_gaze: ScreenGaze,
    pub face_detected: bool,
    pub dwell_target: Option<String>,
    pub dwell_progress: f64,
    pub calibrated: bool,
    pub mapping: CalibrationMapping,
}

pub struct GazeEngine {
    session_id: String,
    settings: GazeSettings,
    mapping: CalibrationMapping,
    calibrated: bool,
    calibration: Option<CalibrationSession>,
    last_sample: GazeSample,
    screen_gaze: ScreenGaze,
    face_detected: bool,
    dwell: DwellStateMachine,
}

impl GazeEngine {
    pub fn new(settings: GazeSettings) -> GazeResult<Self> {
        settings.validate()?;
        let session_id = Uuid::new_v4().to_string();
        log::info!("👁️ Creating gaze engine session: {}", session_id);

        Ok(Self {
            session_id,
            dwell: DwellStateMachine::new(settings.dwell_threshold()),
            settings,
            mapping: CalibrationMapping::IDENTITY,
            calibrated: false,
            calibration: None,
            last_sample: GazeSample::CENTER,
            screen_gaze: ScreenGaze::CENTER,
            face_detected: false,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn settings(&self) -> &GazeSettings {
        &self.settings
    }

    /// Swaps in new policy. The running dwell keeps its start time but is
    /// measured against the new threshold from the next tick on.
    pub fn update_settings(&mut self, settings: GazeSettings) -> GazeResult<()> {
        settings.validate()?;
        self.dwell.set_threshold(settings.dwell_threshold());
        self.settings = settings;
        log::info!("Gaze[{}]: settings updated {:?}", self.session_id, self.settings);
        Ok(())
    }

    /// Runs one pipeline evaluation: normalize, map, resolve, dwell.
    pub fn process_observation(
        &mut self,
        observation: Option<&EyeLandmarkSet>,
        frame: FrameSize,
        viewport: &Viewport,
        targets: &[UiTarget],
        now: Instant,
    ) -> TickOutcome {
        let sample = observation.and_then(|landmarks| normalize(landmarks, frame, self.settings.sensitivity_factor));

        let sample = match sample {
            Some(sample) => sample,
            None => return self.no_face(),
        };

        self.face_detected = true;
        self.last_sample = sample;
        self.screen_gaze = self.mapping.apply(sample);

        let (target, distances) = resolve_with_distances(
            self.screen_gaze,
            targets,
            viewport,
            self.settings.hit_tolerance_radius_px,
        );
        log::trace!("{}", format_distances(self.screen_gaze, &distances));

        let mut dwell = self.dwell.update(target.map(|t| t.id.as_str()), now);
        let activation = dwell.completed.take().map(|done| {
            log::info!("✅ Gaze[{}]: activated {} after {}ms", self.session_id, done.target_id, done.dwell.as_millis());
            Activation {
                target_id: done.target_id,
                activated_at: Utc::now().to_rfc3339(),
                dwell_ms: done.dwell.as_millis() as u64,
            }
        });

        TickOutcome {
            face_detected: true,
            screen_gaze: Some(self.screen_gaze),
            dwell,
            activation,
        }
    }

    fn no_face(&mut self) -> TickOutcome {
        if self.face_detected {
            log::debug!("Gaze[{}]: face lost", self.session_id);
        }
        self.face_detected = false;
        self.dwell.reset();

        TickOutcome {
            face_detected: false,
            screen_gaze: None,
            dwell: DwellUpdate {
                target_id: None,
                progress: 0.0,
                completed: None,
            },
            activation: None,
        }
    }

    pub fn reset_dwell(&mut self) {
        self.dwell.reset();
    }

    pub fn screen_gaze(&self) -> ScreenGaze {
        self.screen_gaze
    }

    pub fn last_sample(&self) -> GazeSample {
        self.last_sample
    }

    pub fn dwell(&self) -> &DwellStateMachine {
        &self.dwell
    }

    pub fn begin_calibration(&mut self) {
        self.mapping = CalibrationMapping::IDENTITY;
        self.calibrated = false;
        self.calibration = Some(CalibrationSession::new());
        self.last_sample = GazeSample::CENTER;
        self.screen_gaze = ScreenGaze::CENTER;
        log::info!("🎯 Gaze[{}]: calibration started ({} points)", self.session_id, ANCHOR_POINTS.len());
    }

    /// Records the latest unmapped sample against the current anchor. The
    /// last anchor triggers [`GazeEngine::finish_calibration`].
    pub fn record_calibration_step(&mut self) -> GazeResult<CalibrationStep> {
        let sample = self.last_sample;
        let session = self.calibration.as_mut().ok_or(GazeError::CalibrationNotActive)?;
        let record = session.record(sample).ok_or(GazeError::CalibrationNotActive)?;
        let step = session.step();
        let next = session.next_anchor();
        log::debug!(
            "Gaze[{}]: calibration point {} recorded at ({:.3}, {:.3})",
            self.session_id,
            record.anchor.label,
            sample.x,
            sample.y
        );

        if session.is_complete() {
            return self.finish_calibration().map(CalibrationStep::Completed);
        }

        Ok(CalibrationStep::Recorded {
            label: record.anchor.label,
            step,
            next,
        })
    }

    /// Ends the session. On success the new mapping replaces the old one in
    /// a single assignment; on failure the current mapping stays in place.
    pub fn finish_calibration(&mut self) -> GazeResult<CalibrationMapping> {
        let session = self.calibration.take().ok_or(GazeError::CalibrationNotActive)?;

        match session.solve() {
            Ok(mapping) => {
                self.mapping = mapping;
                self.screen_gaze = mapping.apply(self.last_sample);
                self.calibrated = true;
                log::info!("🎯 Gaze[{}]: calibration complete {:?}", self.session_id, mapping);
                Ok(mapping)
            }
            Err(e) => {
                log::warn!("❌ Gaze[{}]: {}", self.session_id, e);
                Err(e)
            }
        }
    }

    pub fn cancel_calibration(&mut self) {
        if self.calibration.take().is_some() {
            log::info!("Gaze[{}]: calibration cancelled", self.session_id);
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn current_mapping(&self) -> CalibrationMapping {
        self.mapping
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        CalibrationStatus {
            calibrating: self.calibration.is_some(),
            calibrated: self.calibrated,
            step: self.calibration.as_ref().map(|s| s.step()).unwrap_or(0),
            total: ANCHOR_POINTS.len(),
            next_anchor: self.calibration.as_ref().and_then(|s| s.next_anchor()),
        }
    }

    pub fn snapshot(&self) -> GazeSnapshot {
        GazeSnapshot {
            session_id: self.session_id.clone(),
            screen_gaze: self.screen_gaze,
            face_detected: self.face_detected,
            dwell_target: self.dwell.active_target().map(str::to_string),
            dwell_progress: self.dwell.progress(),
            calibrated: self.calibrated,
            mapping: self.mapping,
        }
    }
}
