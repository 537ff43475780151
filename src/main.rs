// Scripted gaze session: drives the tracker with synthetic landmarks over a
// fixed patient-room control layout and logs what gets activated.
use async_trait::async_trait;
use caresight_lib::eye_tracking::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const VIEWPORT: Viewport = Viewport { width: 1280.0, height: 800.0, pixel_ratio: 1.0 };

fn control_layout() -> Vec<UiTarget> {
    vec![
        UiTarget::new("call-nurse", Rect::new(680.0, 120.0, 240.0, 120.0)),
        UiTarget::new("water", Rect::new(960.0, 120.0, 240.0, 120.0)),
        UiTarget::new("food", Rect::new(680.0, 280.0, 240.0, 120.0)),
        UiTarget::new("pain", Rect::new(960.0, 280.0, 240.0, 120.0)),
        UiTarget::new("bathroom", Rect::new(680.0, 440.0, 240.0, 120.0)),
        UiTarget::new("tv", Rect::new(960.0, 440.0, 240.0, 120.0)),
        UiTarget::new("scroll-up", Rect::new(16.0, 320.0, 80.0, 70.0)),
        UiTarget::new("scroll-down", Rect::new(16.0, 410.0, 80.0, 70.0)),
        UiTarget::new("section1-action", Rect::new(120.0, 620.0, 240.0, 120.0)),
        UiTarget::new("section2-action", Rect::new(420.0, 620.0, 240.0, 120.0)),
    ]
}

struct FixedLayout;

impl RenderSurface for FixedLayout {
    fn viewport(&self) -> Viewport {
        VIEWPORT
    }

    fn list_targets(&self) -> Vec<UiTarget> {
        control_layout()
    }
}

/// Replays a list of gaze positions, one per detection, then reports no face.
struct ScriptedDetector {
    frames: Mutex<VecDeque<Option<EyeLandmarkSet>>>,
}

impl ScriptedDetector {
    fn new(script: &[(Option<(f64, f64)>, usize)], sensitivity: f64) -> Self {
        let frame = FrameSize::default();
        let mut frames = VecDeque::new();
        for (position, ticks) in script {
            let landmarks = position.map(|(x, y)| {
                // Invert the sensitivity expansion so the sample lands on (x, y)
                let eye_x = ((x - 0.5) / sensitivity + 0.5) * frame.width;
                let eye_y = ((y - 0.5) / sensitivity + 0.5) * frame.height;
                EyeLandmarkSet::new(
                    vec![Point::new(eye_x - 20.0, eye_y), Point::new(eye_x - 10.0, eye_y)],
                    vec![Point::new(eye_x + 10.0, eye_y), Point::new(eye_x + 20.0, eye_y)],
                )
            });
            frames.extend(std::iter::repeat(landmarks).take(*ticks));
        }
        Self { frames: Mutex::new(frames) }
    }

    fn remaining(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LandmarkDetector for ScriptedDetector {
    async fn detect_once(&self) -> anyhow::Result<Option<EyeLandmarkSet>> {
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| anyhow::anyhow!("detector script poisoned"))?;
        Ok(frames.pop_front().flatten())
    }
}

struct NotifyStaff {
    message: &'static str,
}

#[async_trait]
impl TargetAction for NotifyStaff {
    fn description(&self) -> String {
        self.message.to_string()
    }

    async fn execute(&self, activation: Activation) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(format!("{} ({} at {})", self.message, activation.target_id, activation.activated_at))
    }
}

fn build_dispatcher() -> ActionDispatcher {
    let mut dispatcher = ActionDispatcher::new();
    dispatcher.register("call-nurse", Arc::new(NotifyStaff { message: "Nurse has been notified!" }));
    dispatcher.register("water", Arc::new(NotifyStaff { message: "Water request sent to staff!" }));
    dispatcher.register("food", Arc::new(NotifyStaff { message: "Food request sent to kitchen!" }));
    dispatcher.register("pain", Arc::new(NotifyStaff { message: "Pain reported to medical staff!" }));
    dispatcher.register("bathroom", Arc::new(NotifyStaff { message: "Bathroom assistance requested!" }));
    dispatcher.register("tv", Arc::new(NotifyStaff { message: "TV controls activated!" }));
    dispatcher.register("scroll-up", Arc::new(NotifyStaff { message: "Scrolled Up!" }));
    dispatcher.register("scroll-down", Arc::new(NotifyStaff { message: "Scrolled Down!" }));
    dispatcher.register("section1-action", Arc::new(NotifyStaff { message: "Section 1 action triggered!" }));
    dispatcher.register("section2-action", Arc::new(NotifyStaff { message: "Section 2 action triggered!" }));
    dispatcher
}

fn center_of(id: &str) -> Option<(f64, f64)> {
    control_layout()
        .into_iter()
        .find(|t| t.id == id)
        .map(|t| {
            let c = t.bounds.center();
            (c.x / VIEWPORT.width, c.y / VIEWPORT.height)
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match load_gaze_settings() {
        Ok(Some(settings)) => settings,
        Ok(None) => GazeSettings::default(),
        Err(e) => {
            log::warn!("⚠️ Could not load gaze settings, using defaults: {}", e);
            GazeSettings::default()
        }
    };
    let tick = settings.tick_period();
    let ticks_for = |ms: u64| (ms / settings.tick_period_ms.max(1)) as usize + 1;

    let script = [
        (center_of("water"), ticks_for(settings.dwell_threshold_ms + 300)),
        (None, ticks_for(500)),
        (Some((0.3, 0.2)), ticks_for(800)),
        (center_of("call-nurse"), ticks_for(settings.dwell_threshold_ms + 200)),
        (center_of("pain"), ticks_for(settings.dwell_threshold_ms / 2)),
        (center_of("tv"), ticks_for(settings.dwell_threshold_ms + 100)),
    ];
    let detector = Arc::new(ScriptedDetector::new(&script, settings.sensitivity_factor));

    let dispatcher = build_dispatcher();

    let (channel, mut events) = ChannelObserver::new();
    let observer = CompositeObserver::new()
        .with(Arc::new(channel))
        .with(Arc::new(dispatcher));

    let events_task = tokio::spawn(async move {
        let mut activations = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                GazeEvent::Activate { activation } => activations.push(activation.target_id),
                GazeEvent::FacePresence { detected } => log::info!("Face detected: {}", detected),
                other => log::debug!("{:?}", other),
            }
        }
        activations
    });

    let engine = GazeEngine::new(settings)?;
    let mut tracker = GazeTracker::new(engine);
    tracker.start(detector.clone(), Arc::new(FixedLayout), Arc::new(observer))?;

    while detector.remaining() > 0 {
        tokio::time::sleep(tick).await;
    }
    tokio::time::sleep(tick * 2).await;
    tracker.stop().await;

    let snapshot = tracker.engine().lock().await.snapshot();
    log::info!("Final state: {}", serde_json::to_string(&snapshot)?);

    // The stopped loop has dropped its observer, which closes the channel
    let activations = events_task.await?;
    log::info!("Activated targets: {:?}", activations);

    // Let in-flight actions finish logging
    tokio::time::sleep(Duration::from_millis(400)).await;
    Ok(())
}
