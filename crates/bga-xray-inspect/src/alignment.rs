//! Map a taught reference layout onto the blobs found in the current image.
//!
//! The search is coarse-to-fine: centroid translation, then the best of the
//! four quarter turns by nearest-blob correspondence count, then a robust
//! similarity fit on the accepted correspondences.

use bga_xray_core::{
    fit_similarity_ransac, QuarterTurn, RansacSimilarityConfig, Similarity2, SimilarityError,
    QUARTER_TURNS,
};
use log::debug;
use nalgebra::Point2;
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::params::AlignmentParams;

/// A reference point paired with the blob nearest to it under some rotation hypothesis.
///
/// Coordinates are untransformed: `reference` is the taught position, `observed`
/// the blob centre in the image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Correspondence {
    pub reference_index: usize,
    pub blob_index: usize,
    pub reference: Point2<f32>,
    pub observed: Point2<f32>,
    /// Match distance under the winning hypothesis.
    pub distance: f32,
}

/// Successful alignment.
#[derive(Clone, Debug, Serialize)]
pub struct Alignment {
    /// Reference coordinates to image coordinates.
    pub transform: Similarity2,
    /// Winning quarter-turn hypothesis.
    pub rotation_deg: u16,
    pub correspondences: Vec<Correspondence>,
    /// Correspondences consistent with `transform`.
    pub inliers: usize,
    pub rms_error: f64,
    /// Every reference point mapped through `transform`, in reference order.
    pub aligned_points: Vec<Point2<f32>>,
}

/// Why the layout could not be aligned.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AlignmentFailure {
    #[error("no reference points")]
    NoReference,
    #[error("too few blobs: need {needed}, found {found}")]
    TooFewBlobs { needed: usize, found: usize },
    #[error("too few correspondences: need {needed}, matched {matched}")]
    TooFewCorrespondences { needed: usize, matched: usize },
    #[error("transform fit failed: {0}")]
    Fit(#[from] SimilarityError),
    #[error("transform is not finite")]
    NonFinite,
}

#[derive(Clone, Debug)]
pub enum AlignmentOutcome {
    Aligned(Alignment),
    Failed(AlignmentFailure),
}

impl AlignmentOutcome {
    pub fn is_aligned(&self) -> bool {
        matches!(self, AlignmentOutcome::Aligned(_))
    }

    pub fn aligned(&self) -> Option<&Alignment> {
        match self {
            AlignmentOutcome::Aligned(a) => Some(a),
            AlignmentOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&AlignmentFailure> {
        match self {
            AlignmentOutcome::Aligned(_) => None,
            AlignmentOutcome::Failed(f) => Some(f),
        }
    }
}

fn centroid(points: &[Point2<f32>]) -> Point2<f32> {
    let n = points.len().max(1) as f32;
    let sum = points
        .iter()
        .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / n)
}

/// Hypotheses whose mean match distance differs by less than this are tied.
const RESIDUAL_TIE_PX: f32 = 1e-3;

fn mean_distance(matches: &[Correspondence]) -> f32 {
    if matches.is_empty() {
        return f32::INFINITY;
    }
    matches.iter().map(|c| c.distance).sum::<f32>() / matches.len() as f32
}

/// More correspondences wins; equal counts fall back to the tighter fit.
fn better(candidate: &[Correspondence], incumbent: &[Correspondence]) -> bool {
    match candidate.len().cmp(&incumbent.len()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => {
            mean_distance(candidate) < mean_distance(incumbent) - RESIDUAL_TIE_PX
        }
    }
}

fn nearest(p: Point2<f32>, blobs: &[Point2<f32>]) -> Option<(usize, f32)> {
    blobs
        .iter()
        .enumerate()
        .map(|(i, b)| (i, (b - p).norm()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Correspondences for one quarter-turn hypothesis.
fn match_under_turn(
    turn: &QuarterTurn,
    reference: &[Point2<f32>],
    blobs: &[Point2<f32>],
    shift: nalgebra::Vector2<f32>,
    pivot: Point2<f32>,
    max_dist: f32,
) -> Vec<Correspondence> {
    reference
        .iter()
        .enumerate()
        .filter_map(|(ri, &r)| {
            let moved = turn.rotate_about(r + shift, pivot);
            let (bi, d) = nearest(moved, blobs)?;
            (d < max_dist).then_some(Correspondence {
                reference_index: ri,
                blob_index: bi,
                reference: r,
                observed: blobs[bi],
                distance: d,
            })
        })
        .collect()
}

/// Align `reference` onto `blobs`.
///
/// `ball_radius` scales both the correspondence gate and the inlier tolerance.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(blobs, reference, params),
        fields(blobs = blobs.len(), reference = reference.len())
    )
)]
pub fn align(
    blobs: &[Point2<f32>],
    reference: &[Point2<f32>],
    ball_radius: f32,
    params: &AlignmentParams,
) -> AlignmentOutcome {
    if reference.is_empty() {
        return AlignmentOutcome::Failed(AlignmentFailure::NoReference);
    }
    if blobs.len() < params.min_blobs {
        debug!("alignment: {} blobs < {}", blobs.len(), params.min_blobs);
        return AlignmentOutcome::Failed(AlignmentFailure::TooFewBlobs {
            needed: params.min_blobs,
            found: blobs.len(),
        });
    }

    let blob_center = centroid(blobs);
    let shift = blob_center - centroid(reference);
    let max_dist = params.match_radius_factor * ball_radius;

    let mut best: Option<(u16, Vec<Correspondence>)> = None;
    for turn in QUARTER_TURNS.iter() {
        let matches = match_under_turn(turn, reference, blobs, shift, blob_center, max_dist);
        debug!(
            "alignment: {:>3} deg -> {} correspondences",
            turn.degrees(),
            matches.len()
        );
        // Exact ties keep the earlier angle.
        if best.as_ref().is_none_or(|(_, prev)| better(&matches, prev)) {
            best = Some((turn.degrees(), matches));
        }
    }
    let Some((rotation_deg, correspondences)) = best else {
        return AlignmentOutcome::Failed(AlignmentFailure::TooFewCorrespondences {
            needed: 1,
            matched: 0,
        });
    };

    let needed = ((params.min_match_fraction * reference.len() as f32).ceil() as usize).max(2);
    if correspondences.len() < needed {
        return AlignmentOutcome::Failed(AlignmentFailure::TooFewCorrespondences {
            needed,
            matched: correspondences.len(),
        });
    }

    let src: Vec<Point2<f32>> = correspondences.iter().map(|c| c.reference).collect();
    let dst: Vec<Point2<f32>> = correspondences.iter().map(|c| c.observed).collect();
    let config = RansacSimilarityConfig {
        max_iters: params.ransac_iters,
        inlier_threshold: (params.inlier_radius_factor * ball_radius) as f64,
        min_inliers: 2,
        seed: params.ransac_seed,
    };
    let fit = match fit_similarity_ransac(&src, &dst, &config) {
        Ok(fit) => fit,
        Err(e) => return AlignmentOutcome::Failed(e.into()),
    };
    if fit.transform.m.iter().any(|v| !v.is_finite()) {
        return AlignmentOutcome::Failed(AlignmentFailure::NonFinite);
    }

    debug!(
        "alignment: {} deg, {}/{} inliers, scale {:.4}, rms {:.3}px",
        rotation_deg,
        fit.n_inliers,
        correspondences.len(),
        fit.transform.scale(),
        fit.rms_error
    );

    let aligned_points = reference.iter().map(|&p| fit.transform.apply(p)).collect();
    AlignmentOutcome::Aligned(Alignment {
        transform: fit.transform,
        rotation_deg,
        correspondences,
        inliers: fit.n_inliers,
        rms_error: fit.rms_error,
        aligned_points,
    })
}
