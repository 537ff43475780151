// src/eye_tracking/calibration.rs
// Raw landmark normalization and the per-axis affine gaze-to-screen mapping.
use crate::eye_tracking::error::{GazeError, GazeResult};
use crate::eye_tracking::types::*;
use serde::{Deserialize, Serialize};

/// Denominator used when two anchors observed the same value on an axis.
pub const DEGENERATE_AXIS_EPSILON: f64 = 1e-4;

pub const TOP_LEFT: &str = "Top Left";
pub const TOP_RIGHT: &str = "Top Right";
pub const CENTER: &str = "Center";
pub const BOTTOM_LEFT: &str = "Bottom Left";
pub const BOTTOM_RIGHT: &str = "Bottom Right";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnchorPoint {
    pub x: f64,
    pub y: f64,
    pub label: &'static str,
}

/// Calibration anchors in the order the user is walked through them.
pub const ANCHOR_POINTS: [AnchorPoint; 5] = [
    AnchorPoint { x: 0.1, y: 0.1, label: TOP_LEFT },
    AnchorPoint { x: 0.9, y: 0.1, label: TOP_RIGHT },
    AnchorPoint { x: 0.5, y: 0.5, label: CENTER },
    AnchorPoint { x: 0.1, y: 0.9, label: BOTTOM_LEFT },
    AnchorPoint { x: 0.9, y: 0.9, label: BOTTOM_RIGHT },
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMapping {
    pub a_x: f64,
    pub b_x: f64,
    pub a_y: f64,
    pub b_y: f64,
}

impl CalibrationMapping {
    pub const IDENTITY: CalibrationMapping = CalibrationMapping { a_x: 1.0, b_x: 0.0, a_y: 1.0, b_y: 0.0 };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn apply(&self, sample: GazeSample) -> ScreenGaze {
        ScreenGaze::new(
            clamp_unit(self.a_x * sample.x + self.b_x),
            clamp_unit(self.a_y * sample.y + self.b_y),
        )
    }
}

impl Default for CalibrationMapping {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationRecord {
    pub anchor: AnchorPoint,
    pub observed: GazeSample,
}

fn eye_center(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let count = points.len() as f64;
    let (sum_x, sum_y) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sum_x / count, sum_y / count))
}

/// Turns one frame's eye landmarks into a sensitivity-adjusted gaze sample.
///
/// Returns `None` when either eye has no points or the frame has no area,
/// which callers treat the same as "no face this tick".
pub fn normalize(landmarks: &EyeLandmarkSet, frame: FrameSize, sensitivity: f64) -> Option<GazeSample> {
    if !(frame.width > 0.0 && frame.height > 0.0) {
        return None;
    }
    let left = eye_center(&landmarks.left_eye)?;
    let right = eye_center(&landmarks.right_eye)?;

    let gaze_x = (left.x + right.x) / 2.0;
    let gaze_y = (left.y + right.y) / 2.0;

    let normalized_x = clamp_unit(gaze_x / frame.width);
    let normalized_y = clamp_unit(gaze_y / frame.height);

    Some(GazeSample::new(
        clamp_unit((normalized_x - 0.5) * sensitivity + 0.5),
        clamp_unit((normalized_y - 0.5) * sensitivity + 0.5),
    ))
}

pub fn apply_mapping(sample: GazeSample, mapping: &CalibrationMapping) -> ScreenGaze {
    mapping.apply(sample)
}

/// Solves `screen = a * observed + b` from two anchors on one axis.
fn solve_axis(screen_1: f64, observed_1: f64, screen_2: f64, observed_2: f64, axis: &str) -> (f64, f64) {
    let mut denominator = observed_2 - observed_1;
    if denominator == 0.0 {
        log::warn!("⚠️ Degenerate calibration on {} axis, both anchors observed {:.4}", axis, observed_1);
        denominator = DEGENERATE_AXIS_EPSILON;
    }
    let a = (screen_2 - screen_1) / denominator;
    let b = screen_1 - a * observed_1;
    (a, b)
}

/// In-progress walk through the anchor points.
#[derive(Debug, Clone, Default)]
pub struct CalibrationSession {
    records: Vec<CalibrationRecord>,
    cursor: usize,
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> usize {
        self.cursor
    }

    pub fn records(&self) -> &[CalibrationRecord] {
        &self.records
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= ANCHOR_POINTS.len()
    }

    pub fn next_anchor(&self) -> Option<AnchorPoint> {
        ANCHOR_POINTS.get(self.cursor).copied()
    }

    /// Pairs the current anchor with `observed` and advances. Returns the
    /// recorded entry, or `None` once every anchor has been recorded.
    pub fn record(&mut self, observed: GazeSample) -> Option<CalibrationRecord> {
        let anchor = self.next_anchor()?;
        let record = CalibrationRecord { anchor, observed };
        self.records.push(record);
        self.cursor += 1;
        Some(record)
    }

    fn find(&self, label: &str) -> Option<&CalibrationRecord> {
        self.records.iter().find(|r| r.anchor.label == label)
    }

    /// Derives the mapping from Top Left / Top Right (x) and Top Left / Bottom Left (y).
    /// Center and Bottom Right are collected but not used by the solve.
    pub fn solve(&self) -> GazeResult<CalibrationMapping> {
        let top_left = self.find(TOP_LEFT);
        let top_right = self.find(TOP_RIGHT);
        let bottom_left = self.find(BOTTOM_LEFT);

        let (top_left, top_right, bottom_left) = match (top_left, top_right, bottom_left) {
            (Some(tl), Some(tr), Some(bl)) => (tl, tr, bl),
            _ => {
                let missing = [(TOP_LEFT, top_left), (TOP_RIGHT, top_right), (BOTTOM_LEFT, bottom_left)]
                    .iter()
                    .filter(|(_, record)| record.is_none())
                    .map(|(label, _)| label.to_string())
                    .collect();
                return Err(GazeError::CalibrationIncomplete { missing });
            }
        };

        let (a_x, b_x) = solve_axis(
            top_left.anchor.x,
            top_left.observed.x,
            top_right.anchor.x,
            top_right.observed.x,
            "x",
        );
        let (a_y, b_y) = solve_axis(
            top_left.anchor.y,
            top_left.observed.y,
            bottom_left.anchor.y,
            bottom_left.observed.y,
            "y",
        );

        Ok(CalibrationMapping { a_x, b_x, a_y, b_y })
    }
}
