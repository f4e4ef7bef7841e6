//! Lattice growth for ad-hoc inspection.
//!
//! The blob pass misses balls that are faint or merged with background
//! structure. Given a roughly regular layout, every found ball predicts four
//! axis-aligned neighbours one pitch away; each prediction is confirmed by a
//! small local re-detection before it is accepted.

use bga_xray_core::{BoundingBox, GrayImageView, Roi};
use log::debug;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::blob::{measure_contour, outer_contours, threshold_inverted, to_luma, ShapeLimits};
use crate::params::GridSearchParams;
use crate::recipe::Recipe;
use crate::result::{DetectedBlob, Provenance};

const PITCH_FLOOR_FACTOR: f32 = 2.5;
const FALLBACK_PITCH_PX: f32 = 20.0;

/// Median nearest-neighbour distance, clamped to a floor derived from the radius.
///
/// `None` with fewer than two points.
pub fn estimate_pitch(centers: &[Point2<f32>], ball_radius: f32) -> Option<f32> {
    if centers.len() < 2 {
        return None;
    }
    let mut nearest: Vec<f32> = centers
        .iter()
        .enumerate()
        .map(|(i, a)| {
            centers
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, b)| (a - b).norm())
                .fold(f32::INFINITY, f32::min)
        })
        .collect();
    nearest.sort_by(|a, b| a.total_cmp(b));
    let mut pitch = nearest[nearest.len() / 2];

    if pitch < ball_radius {
        pitch = ball_radius * PITCH_FLOOR_FACTOR;
    }
    if pitch <= 0.0 || !pitch.is_finite() {
        pitch = FALLBACK_PITCH_PX;
    }
    Some(pitch)
}

fn occupied(
    p: Point2<f32>,
    known: &[DetectedBlob],
    pending: &[DetectedBlob],
    radius: f32,
) -> bool {
    known
        .iter()
        .chain(pending)
        .any(|b| (b.center - p).norm() < radius)
}

/// Local re-detection: a closed ball-shaped contour inside a window around `p`.
fn confirm_ball(
    image: &GrayImageView<'_>,
    p: Point2<f32>,
    recipe: &Recipe,
    limits: &ShapeLimits,
    params: &GridSearchParams,
) -> bool {
    if p.x < 0.0 || p.y < 0.0 || p.x >= image.width as f32 || p.y >= image.height as f32 {
        return false;
    }

    let mut half = (recipe.ball_radius_px * params.probe_half_width_factor) as i64;
    if half < params.min_probe_half_width {
        half = params.fallback_half_width;
    }
    let rect = Roi::square(p.x as i64, p.y as i64, half).clamp_to(image.width, image.height);
    if rect.is_empty() {
        return false;
    }
    let Some(patch) = to_luma(image.crop(rect)) else {
        return false;
    };

    let binary = threshold_inverted(&patch, recipe.fixed_threshold);
    outer_contours(&binary).iter().any(|points| {
        measure_contour(points, limits).is_some()
            && BoundingBox::of(points)
                .is_some_and(|bb| !bb.touches_border(rect.width, rect.height, params.border_margin))
    })
}

/// Grow the ball set along the lattice implied by the initial blobs.
///
/// Returns the initial blobs followed by every accepted probe. Fewer than two
/// initial blobs are passed through unchanged.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(image, initial, recipe, params),
        fields(n = initial.len())
    )
)]
pub fn expand_grid(
    image: &GrayImageView<'_>,
    initial: Vec<DetectedBlob>,
    recipe: &Recipe,
    params: &GridSearchParams,
) -> Vec<DetectedBlob> {
    if image.is_empty() {
        return initial;
    }
    let centers: Vec<Point2<f32>> = initial.iter().map(|b| b.center).collect();
    let Some(pitch) = estimate_pitch(&centers, recipe.ball_radius_px) else {
        return initial;
    };

    let limits = ShapeLimits::from_recipe(recipe);
    let diameter = recipe.ball_diameter_px();
    let area = std::f32::consts::PI * recipe.ball_radius_px * recipe.ball_radius_px;
    let mut balls = initial;
    let mut passes = 0;

    while passes < params.max_iterations {
        let mut accepted: Vec<DetectedBlob> = Vec::new();
        for ball in &balls {
            let c = ball.center;
            let probes = [
                Point2::new(c.x - pitch, c.y),
                Point2::new(c.x + pitch, c.y),
                Point2::new(c.x, c.y - pitch),
                Point2::new(c.x, c.y + pitch),
            ];
            for p in probes {
                if occupied(p, &balls, &accepted, pitch / 2.0) {
                    continue;
                }
                if confirm_ball(image, p, recipe, &limits, params) {
                    accepted.push(DetectedBlob {
                        center: p,
                        diameter,
                        area,
                        circularity: 1.0,
                        contour: Vec::new(),
                        provenance: Provenance::GridSearch,
                    });
                }
            }
        }
        passes += 1;
        if accepted.is_empty() {
            break;
        }
        debug!("grid pass {passes}: {} balls added", accepted.len());
        balls.extend(accepted);
    }

    debug!(
        "grid search: pitch {:.2}px, {} passes, {} balls",
        pitch,
        passes,
        balls.len()
    );
    balls
}
