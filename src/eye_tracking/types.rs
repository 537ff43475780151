// src/eye_tracking/types.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Eye landmark points for one video frame, in source-frame pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EyeLandmarkSet {
    pub left_eye: Vec<Point>,
    pub right_eye: Vec<Point>,
}

impl EyeLandmarkSet {
    pub fn new(left_eye: Vec<Point>, right_eye: Vec<Point>) -> Self {
        Self { left_eye, right_eye }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: f64,
    pub height: f64,
}

impl FrameSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        // Capture resolution requested from the camera
        Self { width: 640.0, height: 480.0 }
    }
}

/// Normalized, sensitivity-adjusted eye position in `[0,1]x[0,1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
}

impl GazeSample {
    pub const CENTER: GazeSample = GazeSample { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Calibrated gaze position in `[0,1]x[0,1]` of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenGaze {
    pub x: f64,
    pub y: f64,
}

impl ScreenGaze {
    pub const CENTER: ScreenGaze = ScreenGaze { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendering surface dimensions in CSS/logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, pixel_ratio: f64) -> Self {
        Self { width, height, pixel_ratio }
    }

    /// Pixel ratio, falling back to 1.0 when the surface reports nothing usable.
    pub fn effective_pixel_ratio(&self) -> f64 {
        if self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0 {
            self.pixel_ratio
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiTarget {
    pub id: String,
    pub bounds: Rect,
}

impl UiTarget {
    pub fn new(id: impl Into<String>, bounds: Rect) -> Self {
        Self { id: id.into(), bounds }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub target_id: String,
    pub activated_at: String,
    pub dwell_ms: u64,
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
