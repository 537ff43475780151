// src/eye_tracking/target_resolver.rs
use crate::eye_tracking::types::*;

#[derive(Debug, Clone, PartialEq)]
pub struct TargetDistance {
    pub target_id: String,
    pub distance_px: f64,
}

/// Gaze point in viewport pixels.
pub fn gaze_to_viewport(gaze: ScreenGaze, viewport: &Viewport) -> Point {
    Point::new(gaze.x * viewport.width, gaze.y * viewport.height)
}

/// Radius actually used for hit testing, scaled so the on-screen size stays
/// constant across zoom levels.
pub fn effective_tolerance(tolerance_radius_px: f64, viewport: &Viewport) -> f64 {
    tolerance_radius_px / viewport.effective_pixel_ratio()
}

/// Nearest target whose center is strictly within the tolerance radius.
/// Equal distances resolve to the earlier target in `targets`.
pub fn resolve<'a>(
    gaze: ScreenGaze,
    targets: &'a [UiTarget],
    viewport: &Viewport,
    tolerance_radius_px: f64,
) -> Option<&'a UiTarget> {
    resolve_with_distances(gaze, targets, viewport, tolerance_radius_px).0
}

/// Same as [`resolve`], also returning the distance to every candidate for debug output.
pub fn resolve_with_distances<'a>(
    gaze: ScreenGaze,
    targets: &'a [UiTarget],
    viewport: &Viewport,
    tolerance_radius_px: f64,
) -> (Option<&'a UiTarget>, Vec<TargetDistance>) {
    let point = gaze_to_viewport(gaze, viewport);
    let tolerance = effective_tolerance(tolerance_radius_px, viewport);

    let mut found: Option<&UiTarget> = None;
    let mut min_distance = f64::INFINITY;
    let mut distances = Vec::with_capacity(targets.len());

    for target in targets {
        let center = target.bounds.center();
        let distance = ((point.x - center.x).powi(2) + (point.y - center.y).powi(2)).sqrt();

        if distance < tolerance && distance < min_distance {
            min_distance = distance;
            found = Some(target);
        }

        distances.push(TargetDistance {
            target_id: target.id.clone(),
            distance_px: distance,
        });
    }

    (found, distances)
}

pub fn format_distances(gaze: ScreenGaze, distances: &[TargetDistance]) -> String {
    let mut text = format!("Gaze: ({:.2}, {:.2}) -", gaze.x, gaze.y);
    for entry in distances {
        text.push_str(&format!(" {}: {:.0}px", entry.target_id, entry.distance_px));
    }
    text
}
