//! Short-circuit detection between neighbouring balls.

use std::collections::BTreeSet;

use bga_xray_core::GrayImageView;
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::params::BridgeParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeKind {
    /// Centres so close the footprints touch.
    Overlap,
    /// Every pixel of the gap between the two footprints is dark.
    DarkPath,
}

/// Two balls joined by solder. `a < b` index into the scanned ball list.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bridge {
    pub a: usize,
    pub b: usize,
    pub kind: BridgeKind,
    pub distance: f32,
}

/// Bridges found plus the balls they involve.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BridgeScan {
    pub bridges: Vec<Bridge>,
    /// Ball indices that take part in at least one bridge.
    pub downgraded: BTreeSet<usize>,
}

/// True when the straight gap between the footprints of `a` and `b` is dark throughout.
///
/// The gap starts `inset` pixels from each centre. Samples are taken at most one
/// pixel apart and rounded to the nearest pixel; the first bright or
/// out-of-image sample ends the walk.
pub fn gap_is_dark(
    image: &GrayImageView<'_>,
    a: Point2<f32>,
    b: Point2<f32>,
    inset: f32,
    dark_level: u8,
) -> bool {
    let d = (b - a).norm();
    if d <= 0.0 || !d.is_finite() {
        return false;
    }
    let dir = (b - a) / d;
    let start = a + dir * inset;
    let end = b - dir * inset;
    let len = (end - start).norm();
    let steps = len.ceil().max(1.0) as usize;

    (0..=steps).all(|k| {
        let p = start + (end - start) * (k as f32 / steps as f32);
        image
            .get(p.x.round() as i64, p.y.round() as i64)
            .is_some_and(|v| v <= dark_level)
    })
}

/// Scan every pair of balls within reach for bridges.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(image, balls, params), fields(balls = balls.len()))
)]
pub fn detect_bridges(
    image: &GrayImageView<'_>,
    balls: &[Point2<f32>],
    ball_radius: f32,
    dark_level: u8,
    params: &BridgeParams,
) -> BridgeScan {
    let reach = params.reach_factor * ball_radius;
    let overlap = params.overlap_factor * ball_radius;
    let inset = params.edge_inset_factor * ball_radius;

    let mut scan = BridgeScan::default();
    for i in 0..balls.len() {
        for j in i + 1..balls.len() {
            let distance = (balls[j] - balls[i]).norm();
            if distance > reach {
                continue;
            }
            let kind = if distance <= overlap {
                BridgeKind::Overlap
            } else if gap_is_dark(image, balls[i], balls[j], inset, dark_level) {
                BridgeKind::DarkPath
            } else {
                continue;
            };
            scan.bridges.push(Bridge {
                a: i,
                b: j,
                kind,
                distance,
            });
            scan.downgraded.insert(i);
            scan.downgraded.insert(j);
        }
    }

    if !scan.bridges.is_empty() {
        debug!(
            "bridge scan: {} bridges over {} balls",
            scan.bridges.len(),
            scan.downgraded.len()
        );
    }
    scan
}
