// src/eye_tracking/dwell.rs
// Dwell ("look and hold") selection state machine
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum DwellState {
    Idle,
    Dwelling { target_id: String, started_at: Instant },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DwellCompletion {
    pub target_id: String,
    pub dwell: Duration,
}

/// Result of evaluating one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DwellUpdate {
    pub target_id: Option<String>,
    pub progress: f64,
    pub completed: Option<DwellCompletion>,
}

#[derive(Debug, Clone)]
pub struct DwellStateMachine {
    state: DwellState,
    progress: f64,
    threshold: Duration,
}

impl DwellStateMachine {
    pub fn new(threshold: Duration) -> Self {
        Self {
            state: DwellState::Idle,
            progress: 0.0,
            threshold,
        }
    }

    pub fn state(&self) -> &DwellState {
        &self.state
    }

    pub fn active_target(&self) -> Option<&str> {
        match &self.state {
            DwellState::Idle => None,
            DwellState::Dwelling { target_id, .. } => Some(target_id.as_str()),
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: Duration) {
        self.threshold = threshold;
    }

    pub fn reset(&mut self) {
        self.state = DwellState::Idle;
        self.progress = 0.0;
    }

    /// Advances the machine with this tick's resolved target.
    ///
    /// A completed dwell is reported exactly once; the machine is back in
    /// `Idle` afterwards, so continued gaze starts a fresh dwell next tick.
    pub fn update(&mut self, target: Option<&str>, now: Instant) -> DwellUpdate {
        let next = match (&self.state, target) {
            (DwellState::Idle, None) => None,
            (DwellState::Dwelling { .. }, None) => {
                log::debug!("Dwell lost target");
                self.reset();
                None
            }
            (DwellState::Dwelling { target_id, started_at }, Some(current)) if target_id == current => {
                let elapsed = now.saturating_duration_since(*started_at);
                if elapsed >= self.threshold {
                    let completion = DwellCompletion {
                        target_id: target_id.clone(),
                        dwell: elapsed,
                    };
                    self.reset();
                    Some(completion)
                } else {
                    self.progress = (elapsed.as_secs_f64() / self.threshold.as_secs_f64()).clamp(0.0, 1.0);
                    None
                }
            }
            (_, Some(current)) => {
                log::debug!("Dwell started on {}", current);
                self.state = DwellState::Dwelling {
                    target_id: current.to_string(),
                    started_at: now,
                };
                self.progress = 0.0;
                None
            }
        };

        DwellUpdate {
            target_id: self.active_target().map(str::to_string),
            progress: self.progress,
            completed: next,
        }
    }
}
