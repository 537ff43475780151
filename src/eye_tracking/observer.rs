// src/eye_tracking/observer.rs
// Outbound side of the tracker: cursor, progress and activation notifications.
use crate::eye_tracking::types::{Activation, ScreenGaze};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Receives the per-tick outputs of the sampling loop. Calls are made from
/// the loop task and must not block.
pub trait GazeObserver: Send + Sync {
    /// Every tick with a face present.
    fn on_gaze_update(&self, gaze: ScreenGaze);
    /// Every tick, including ticks without a face.
    fn on_dwell_progress(&self, target_id: Option<&str>, progress: f64);
    /// Exactly once per completed dwell.
    fn on_activate(&self, activation: &Activation);
    fn on_face_presence(&self, _detected: bool) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GazeEvent {
    GazeUpdate { x: f64, y: f64 },
    DwellProgress { target_id: Option<String>, progress: f64 },
    Activate { activation: Activation },
    FacePresence { detected: bool },
}

/// Events buffered before a slow consumer starts losing cursor updates.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Forwards notifications as [`GazeEvent`]s over a bounded channel. When the
/// consumer falls behind, cursor and progress updates are dropped (the next
/// tick supersedes them); activations and presence changes are queued on a
/// task instead.
pub struct ChannelObserver {
    sender: mpsc::Sender<GazeEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::Receiver<GazeEvent>) {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<GazeEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    fn emit(&self, event: GazeEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            // Nobody is rendering anymore
            Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => match event {
                GazeEvent::GazeUpdate { .. } | GazeEvent::DwellProgress { .. } => {
                    log::trace!("Event consumer behind, dropping {:?}", event);
                }
                event => self.emit_later(event),
            },
        }
    }

    fn emit_later(&self, event: GazeEvent) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let sender = self.sender.clone();
                runtime.spawn(async move {
                    let _ = sender.send(event).await;
                });
            }
            Err(_) => log::warn!("⚠️ Event channel full, dropping {:?}", event),
        }
    }
}

impl GazeObserver for ChannelObserver {
    fn on_gaze_update(&self, gaze: ScreenGaze) {
        self.emit(GazeEvent::GazeUpdate { x: gaze.x, y: gaze.y });
    }

    fn on_dwell_progress(&self, target_id: Option<&str>, progress: f64) {
        self.emit(GazeEvent::DwellProgress {
            target_id: target_id.map(str::to_string),
            progress,
        });
    }

    fn on_activate(&self, activation: &Activation) {
        self.emit(GazeEvent::Activate { activation: activation.clone() });
    }

    fn on_face_presence(&self, detected: bool) {
        self.emit(GazeEvent::FacePresence { detected });
    }
}

/// Fans notifications out to several observers in registration order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn GazeObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn GazeObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl GazeObserver for CompositeObserver {
    fn on_gaze_update(&self, gaze: ScreenGaze) {
        for observer in &self.observers {
            observer.on_gaze_update(gaze);
        }
    }

    fn on_dwell_progress(&self, target_id: Option<&str>, progress: f64) {
        for observer in &self.observers {
            observer.on_dwell_progress(target_id, progress);
        }
    }

    fn on_activate(&self, activation: &Activation) {
        for observer in &self.observers {
            observer.on_activate(activation);
        }
    }

    fn on_face_presence(&self, detected: bool) {
        for observer in &self.observers {
            observer.on_face_presence(detected);
        }
    }
}

/// Something that happens when a target is activated (notify a nurse,
/// scroll the page, ...). Implemented outside this crate.
#[async_trait]
pub trait TargetAction: Send + Sync {
    fn description(&self) -> String;
    async fn execute(&self, activation: Activation) -> anyhow::Result<String>;
}

/// Routes activations to registered actions, each on its own tokio task so
/// the sampling loop never waits on them.
#[derive(Default)]
pub struct ActionDispatcher {
    actions: HashMap<String, Arc<dyn TargetAction>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target_id: impl Into<String>, action: Arc<dyn TargetAction>) {
        self.actions.insert(target_id.into(), action);
    }

    pub fn has_action(&self, target_id: &str) -> bool {
        self.actions.contains_key(target_id)
    }

    pub fn dispatch(&self, activation: &Activation) -> Option<tokio::task::JoinHandle<()>> {
        let action = match self.actions.get(&activation.target_id) {
            Some(action) => Arc::clone(action),
            None => {
                log::warn!("No action registered for target: {}", activation.target_id);
                return None;
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Cannot dispatch {} outside a tokio runtime: {}", activation.target_id, e);
                return None;
            }
        };

        let activation = activation.clone();
        Some(runtime.spawn(async move {
            let target_id = activation.target_id.clone();
            log::info!("🚀 Running action '{}' for {}", action.description(), target_id);
            match action.execute(activation).await {
                Ok(message) => log::info!("✅ {}", message),
                Err(e) => log::error!("❌ Action for {} failed: {}", target_id, e),
            }
        }))
    }
}

impl GazeObserver for ActionDispatcher {
    fn on_gaze_update(&self, _gaze: ScreenGaze) {}

    fn on_dwell_progress(&self, _target_id: Option<&str>, _progress: f64) {}

    fn on_activate(&self, activation: &Activation) {
        self.dispatch(activation);
    }
}
