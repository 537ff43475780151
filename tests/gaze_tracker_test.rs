//! End-to-end tests for the sampling loop, driven with scripted collaborators
//! on a paused tokio clock so every 100ms tick is deterministic.

use async_trait::async_trait;
use caresight_lib::eye_tracking::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

const FRAME: FrameSize = FrameSize { width: 640.0, height: 480.0 };

/// Landmarks whose sensitivity-adjusted sample is (x, y) under default settings.
fn landmarks_for(x: f64, y: f64) -> EyeLandmarkSet {
    let eye_x = ((x - 0.5) / 2.5 + 0.5) * FRAME.width;
    let eye_y = ((y - 0.5) / 2.5 + 0.5) * FRAME.height;
    EyeLandmarkSet::new(vec![Point::new(eye_x, eye_y)], vec![Point::new(eye_x, eye_y)])
}

/// Detector whose reported gaze position can be moved between ticks.
struct MovableDetector {
    position: Mutex<Option<(f64, f64)>>,
    calls: AtomicUsize,
}

impl MovableDetector {
    fn at(x: f64, y: f64) -> Arc<Self> {
        Arc::new(Self {
            position: Mutex::new(Some((x, y))),
            calls: AtomicUsize::new(0),
        })
    }

    fn look_at(&self, position: Option<(f64, f64)>) {
        *self.position.lock().unwrap() = position;
    }
}

#[async_trait]
impl LandmarkDetector for MovableDetector {
    async fn detect_once(&self) -> anyhow::Result<Option<EyeLandmarkSet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let position = *self.position.lock().unwrap();
        Ok(position.map(|(x, y)| landmarks_for(x, y)))
    }

    fn frame_size(&self) -> FrameSize {
        FRAME
    }
}

struct SlowDetector;

#[async_trait]
impl LandmarkDetector for SlowDetector {
    async fn detect_once(&self) -> anyhow::Result<Option<EyeLandmarkSet>> {
        tokio::time::sleep(Duration::from_millis(250)).await;
        Ok(Some(landmarks_for(0.5, 0.5)))
    }
}

struct UnavailableDetector;

#[async_trait]
impl LandmarkDetector for UnavailableDetector {
    async fn detect_once(&self) -> anyhow::Result<Option<EyeLandmarkSet>> {
        Err(anyhow::anyhow!("camera not connected"))
    }
}

/// 1000x1000 viewport with a "nurse" button centered at (0.7, 0.2) and a
/// "water" button centered at (0.2, 0.7).
struct TwoButtons;

impl RenderSurface for TwoButtons {
    fn viewport(&self) -> Viewport {
        Viewport::new(1000.0, 1000.0, 1.0)
    }

    fn list_targets(&self) -> Vec<UiTarget> {
        vec![
            UiTarget::new("nurse", Rect::new(650.0, 150.0, 100.0, 100.0)),
            UiTarget::new("water", Rect::new(150.0, 650.0, 100.0, 100.0)),
        ]
    }
}

fn tracker() -> GazeTracker {
    GazeTracker::new(GazeEngine::new(GazeSettings::default()).unwrap())
}

fn observer() -> (Arc<ChannelObserver>, Receiver<GazeEvent>) {
    let (observer, receiver) = ChannelObserver::new();
    (Arc::new(observer), receiver)
}

fn drain(receiver: &mut Receiver<GazeEvent>) -> Vec<GazeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn activations(events: &[GazeEvent]) -> Vec<Activation> {
    events
        .iter()
        .filter_map(|e| match e {
            GazeEvent::Activate { activation } => Some(activation.clone()),
            _ => None,
        })
        .collect()
}

fn count_gaze_updates(events: &[GazeEvent]) -> usize {
    events.iter().filter(|e| matches!(e, GazeEvent::GazeUpdate { .. })).count()
}

#[tokio::test(start_paused = true)]
async fn test_sustained_dwell_activates_once() {
    let mut tracker = tracker();
    let (observer, mut events) = observer();
    tracker
        .start(MovableDetector::at(0.7, 0.2), Arc::new(TwoButtons), observer)
        .unwrap();

    // Ticks at 0, 100, ..., 2000ms
    tokio::time::sleep(Duration::from_millis(2050)).await;
    tracker.stop().await;

    let events = drain(&mut events);
    let fired = activations(&events);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].target_id, "nurse");
    assert_eq!(fired[0].dwell_ms, 2000);
    assert_eq!(count_gaze_updates(&events), 21);

    let highest_progress = events
        .iter()
        .filter_map(|e| match e {
            GazeEvent::DwellProgress { target_id: Some(id), progress } if id == "nurse" => Some(*progress),
            _ => None,
        })
        .fold(0.0, f64::max);
    assert!((highest_progress - 0.95).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_switching_targets_never_fires_first_target() {
    let mut tracker = tracker();
    let detector = MovableDetector::at(0.7, 0.2);
    let (observer, mut events) = observer();
    tracker.start(detector.clone(), Arc::new(TwoButtons), observer).unwrap();

    tokio::time::sleep(Duration::from_millis(1550)).await;
    detector.look_at(Some((0.2, 0.7)));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    tracker.stop().await;

    let events = drain(&mut events);
    assert!(activations(&events).is_empty());
    assert!(events.contains(&GazeEvent::DwellProgress {
        target_id: Some("water".to_string()),
        progress: 0.0,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_lost_face_resets_dwell_and_keeps_cursor() {
    let mut tracker = tracker();
    let detector = MovableDetector::at(0.7, 0.2);
    let (observer, mut events) = observer();
    tracker.start(detector.clone(), Arc::new(TwoButtons), observer).unwrap();

    tokio::time::sleep(Duration::from_millis(1550)).await;
    detector.look_at(None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let gaze_while_lost = tracker.engine().lock().await.screen_gaze();
    detector.look_at(Some((0.7, 0.2)));
    // Back on target well short of a fresh 2000ms dwell
    tokio::time::sleep(Duration::from_millis(1500)).await;
    tracker.stop().await;

    assert!((gaze_while_lost.x - 0.7).abs() < 1e-6);
    assert!((gaze_while_lost.y - 0.2).abs() < 1e-6);

    let events = drain(&mut events);
    assert!(activations(&events).is_empty());
    let presence: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            GazeEvent::FacePresence { detected } => Some(*detected),
            _ => None,
        })
        .collect();
    assert_eq!(presence, vec![true, false, true]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_resets_dwell() {
    let mut tracker = tracker();
    let detector = MovableDetector::at(0.7, 0.2);
    let (observer, mut events) = observer();
    tracker.start(detector.clone(), Arc::new(TwoButtons), observer).unwrap();
    assert!(tracker.is_running());

    tokio::time::sleep(Duration::from_millis(550)).await;
    tracker.stop().await;
    tracker.stop().await;
    assert!(!tracker.is_running());

    let engine = tracker.engine();
    assert!(engine.lock().await.dwell().active_target().is_none());
    assert_eq!(engine.lock().await.dwell().progress(), 0.0);

    let drained = drain(&mut events);
    assert_eq!(
        drained.last(),
        Some(&GazeEvent::DwellProgress { target_id: None, progress: 0.0 })
    );

    // No further ticks after stop
    let calls = detector.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(detector.calls.load(Ordering::SeqCst), calls);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let mut tracker = tracker();
    let detector = MovableDetector::at(0.7, 0.2);
    let (observer, _events) = observer();
    tracker.start(detector.clone(), Arc::new(TwoButtons), observer.clone()).unwrap();
    assert!(tracker.start(detector.clone(), Arc::new(TwoButtons), observer.clone()).is_err());

    tokio::time::sleep(Duration::from_millis(1550)).await;
    tracker.stop().await;

    let (observer, mut events) = self::observer();
    tracker.start(detector, Arc::new(TwoButtons), observer).unwrap();
    // Earlier 1500ms of dwell must not carry over
    tokio::time::sleep(Duration::from_millis(1000)).await;
    tracker.stop().await;
    assert!(activations(&drain(&mut events)).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_detection_is_discarded() {
    let mut tracker = tracker();
    let (observer, mut events) = observer();
    tracker.start(Arc::new(SlowDetector), Arc::new(TwoButtons), observer).unwrap();

    tokio::time::sleep(Duration::from_millis(1000)).await;
    tracker.stop().await;

    let events = drain(&mut events);
    assert_eq!(count_gaze_updates(&events), 0);
    assert_eq!(events, vec![GazeEvent::DwellProgress { target_id: None, progress: 0.0 }]);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_detector_is_not_fatal() {
    let mut tracker = tracker();
    let (observer, mut events) = observer();
    tracker.start(Arc::new(UnavailableDetector), Arc::new(TwoButtons), observer).unwrap();

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(tracker.is_running());
    tracker.stop().await;

    let events = drain(&mut events);
    assert_eq!(events.first(), Some(&GazeEvent::FacePresence { detected: false }));
    assert_eq!(count_gaze_updates(&events), 0);
    assert!(activations(&events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_calibration_while_tracking() {
    let mut tracker = tracker();
    let detector = MovableDetector::at(0.5, 0.5);
    let (observer, _events) = observer();
    tracker.start(detector.clone(), Arc::new(TwoButtons), observer).unwrap();

    tracker.begin_calibration().await;
    assert!(!tracker.is_calibrated().await);
    assert!(tracker.current_mapping().await.is_identity());

    let observed = [(0.2, 0.2), (0.8, 0.2), (0.5, 0.5), (0.2, 0.8), (0.8, 0.8)];
    let mut last = None;
    for (x, y) in observed {
        detector.look_at(Some((x, y)));
        tokio::time::sleep(Duration::from_millis(150)).await;
        last = Some(tracker.record_calibration_step().await.unwrap());
    }

    let mapping = match last {
        Some(CalibrationStep::Completed(mapping)) => mapping,
        other => panic!("expected completed calibration, got {:?}", other),
    };
    assert!((mapping.a_x - 4.0 / 3.0).abs() < 1e-6);
    assert!((mapping.b_x + 1.0 / 6.0).abs() < 1e-6);
    assert!((mapping.a_y - 4.0 / 3.0).abs() < 1e-6);
    assert!((mapping.b_y + 1.0 / 6.0).abs() < 1e-6);
    assert!(tracker.is_calibrated().await);
    assert!(!tracker.calibration_status().await.calibrating);

    // Calibrated gaze now drives the cursor
    detector.look_at(Some((0.8, 0.2)));
    tokio::time::sleep(Duration::from_millis(150)).await;
    let gaze = tracker.engine().lock().await.screen_gaze();
    assert!((gaze.x - 0.9).abs() < 1e-6);
    assert!((gaze.y - 0.1).abs() < 1e-6);

    tracker.stop().await;
}

#[tokio::test]
async fn test_incomplete_calibration_keeps_mapping() {
    let tracker = tracker();
    tracker.begin_calibration().await;
    tracker.record_calibration_step().await.unwrap();
    tracker.record_calibration_step().await.unwrap();

    let before = tracker.current_mapping().await;
    let result = tracker.finish_calibration().await;
    assert!(matches!(result, Err(GazeError::CalibrationIncomplete { .. })));
    assert_eq!(tracker.current_mapping().await, before);
    assert!(!tracker.calibration_status().await.calibrating);

    tracker.begin_calibration().await;
    tracker.cancel_calibration().await;
    assert!(matches!(
        tracker.record_calibration_step().await,
        Err(GazeError::CalibrationNotActive)
    ));
}
