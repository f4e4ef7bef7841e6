use bga_xray_core::GrayImageView;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::params::PresenceParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Present,
    Absent,
}

/// Percentage of dark pixels in the central patch around `center`.
///
/// A pixel is dark when it is at or below `dark_level + dark_margin`. `None`
/// when the patch does not fit entirely inside the image.
pub fn dark_density(
    image: &GrayImageView<'_>,
    center: Point2<f32>,
    ball_radius: f32,
    dark_level: u8,
    params: &PresenceParams,
) -> Option<f32> {
    if image.is_empty() || !center.x.is_finite() || !center.y.is_finite() {
        return None;
    }
    let half = ((ball_radius * params.patch_factor) as i64).max(params.min_half_width);
    let side = half.checked_mul(2)?;
    let x0 = (center.x as i64).checked_sub(half)?;
    let y0 = (center.y as i64).checked_sub(half)?;
    let x1 = x0.checked_add(side)?;
    let y1 = y0.checked_add(side)?;
    if x0 < 0 || y0 < 0 || x1 > image.width as i64 || y1 > image.height as i64 {
        return None;
    }

    let level = dark_level.saturating_add(params.dark_margin);
    let mut dark = 0usize;
    for y in y0..y1 {
        for x in x0..x1 {
            if image.get(x, y).is_some_and(|p| p <= level) {
                dark += 1;
            }
        }
    }
    let total = (side * side) as f32;
    Some(dark as f32 * 100.0 / total)
}

/// Present iff the dark density strictly exceeds `void_threshold` percent.
///
/// Patches reaching outside the image are absent.
pub fn classify_presence(
    image: &GrayImageView<'_>,
    center: Point2<f32>,
    ball_radius: f32,
    dark_level: u8,
    void_threshold: f32,
    params: &PresenceParams,
) -> Presence {
    match dark_density(image, center, ball_radius, dark_level, params) {
        Some(density) if density > void_threshold => Presence::Present,
        _ => Presence::Absent,
    }
}
