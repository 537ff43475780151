// src/eye_tracking/sampling_loop.rs
// Fixed-period driver: detector -> engine -> observer, one tick at a time.
use crate::eye_tracking::calibration::CalibrationMapping;
use crate::eye_tracking::engine::{CalibrationStatus, CalibrationStep, GazeEngine, TickOutcome};
use crate::eye_tracking::error::GazeResult;
use crate::eye_tracking::observer::GazeObserver;
use crate::eye_tracking::types::*;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

/// Face/landmark detector. `Ok(None)` means no face in this frame.
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    async fn detect_once(&self) -> anyhow::Result<Option<EyeLandmarkSet>>;

    fn frame_size(&self) -> FrameSize {
        FrameSize::default()
    }
}

/// The UI being controlled: its size and the elements that can be gazed at.
pub trait RenderSurface: Send + Sync {
    fn viewport(&self) -> Viewport;
    /// Queried fresh on every tick; order decides ties.
    fn list_targets(&self) -> Vec<UiTarget>;
}

pub type SharedEngine = Arc<Mutex<GazeEngine>>;

#[derive(Debug, Clone, PartialEq)]
pub enum TickResult {
    Evaluated(TickOutcome),
    /// Detection overran the tick period; its result was discarded.
    Skipped,
}

/// Evaluates a single tick. Detection runs without holding the engine lock
/// and is bounded by `detection_timeout`.
pub async fn run_tick(
    engine: &SharedEngine,
    detector: &dyn LandmarkDetector,
    surface: &dyn RenderSurface,
    detection_timeout: Duration,
) -> TickResult {
    let observation = match tokio::time::timeout(detection_timeout, detector.detect_once()).await {
        Err(_) => {
            log::debug!("Detection exceeded {}ms, discarding tick", detection_timeout.as_millis());
            return TickResult::Skipped;
        }
        Ok(Err(e)) => {
            log::warn!("⚠️ Landmark detector unavailable: {}", e);
            None
        }
        Ok(Ok(observation)) => observation,
    };

    let (viewport, targets) = match observation {
        Some(_) => (surface.viewport(), surface.list_targets()),
        None => (Viewport::new(0.0, 0.0, 1.0), Vec::new()),
    };

    let mut engine = engine.lock().await;
    TickResult::Evaluated(engine.process_observation(
        observation.as_ref(),
        detector.frame_size(),
        &viewport,
        &targets,
        Instant::now().into_std(),
    ))
}

fn publish(observer: &dyn GazeObserver, outcome: &TickOutcome, face_present: &mut Option<bool>) {
    if *face_present != Some(outcome.face_detected) {
        *face_present = Some(outcome.face_detected);
        observer.on_face_presence(outcome.face_detected);
    }
    if let Some(gaze) = outcome.screen_gaze {
        observer.on_gaze_update(gaze);
    }
    observer.on_dwell_progress(outcome.dwell.target_id.as_deref(), outcome.dwell.progress);
    if let Some(activation) = &outcome.activation {
        observer.on_activate(activation);
    }
}

async fn run_sampling_loop(
    engine: SharedEngine,
    detector: Arc<dyn LandmarkDetector>,
    surface: Arc<dyn RenderSurface>,
    observer: Arc<dyn GazeObserver>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    let (period, session_id) = {
        let engine = engine.lock().await;
        (engine.settings().tick_period(), engine.session_id().to_string())
    };
    log::info!("👁️ Gaze[{}]: sampling loop started ({}ms period)", session_id, period.as_millis());

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut face_present = None;

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.recv() => break,
            _ = interval.tick() => {
                if let TickResult::Evaluated(outcome) =
                    run_tick(&engine, detector.as_ref(), surface.as_ref(), period).await
                {
                    publish(observer.as_ref(), &outcome, &mut face_present);
                }
            }
        }
    }

    engine.lock().await.reset_dwell();
    observer.on_dwell_progress(None, 0.0);
    log::info!("⏹️ Gaze[{}]: sampling loop stopped", session_id);
}

/// Owns the sampling task and exposes the calibration controls.
pub struct GazeTracker {
    engine: SharedEngine,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl GazeTracker {
    pub fn new(engine: GazeEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            stop_tx: None,
            handle: None,
        }
    }

    pub fn engine(&self) -> SharedEngine {
        Arc::clone(&self.engine)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    pub fn start(
        &mut self,
        detector: Arc<dyn LandmarkDetector>,
        surface: Arc<dyn RenderSurface>,
        observer: Arc<dyn GazeObserver>,
    ) -> anyhow::Result<()> {
        if self.is_running() {
            return Err(anyhow::anyhow!("Gaze tracking already in progress"));
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let handle = tokio::spawn(run_sampling_loop(
            Arc::clone(&self.engine),
            detector,
            surface,
            observer,
            stop_rx,
        ));

        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Stops the loop and waits for it to finish. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::error!("Sampling loop task failed: {}", e);
            }
        }
        self.engine.lock().await.reset_dwell();
    }

    pub async fn begin_calibration(&self) {
        self.engine.lock().await.begin_calibration();
    }

    pub async fn record_calibration_step(&self) -> GazeResult<CalibrationStep> {
        self.engine.lock().await.record_calibration_step()
    }

    pub async fn finish_calibration(&self) -> GazeResult<CalibrationMapping> {
        self.engine.lock().await.finish_calibration()
    }

    pub async fn cancel_calibration(&self) {
        self.engine.lock().await.cancel_calibration();
    }

    pub async fn is_calibrated(&self) -> bool {
        self.engine.lock().await.is_calibrated()
    }

    pub async fn current_mapping(&self) -> CalibrationMapping {
        self.engine.lock().await.current_mapping()
    }

    pub async fn calibration_status(&self) -> CalibrationStatus {
        self.engine.lock().await.calibration_status()
    }
}
