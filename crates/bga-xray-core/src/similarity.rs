//! 2D similarity transforms (rotation + uniform scale + translation, no reflection).

use nalgebra::{Matrix2, Matrix2x3, Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors returned by the similarity estimators.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SimilarityError {
    #[error("mismatched correspondence lengths (src={src}, dst={dst})")]
    LengthMismatch { src: usize, dst: usize },
    #[error("too few correspondences: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("degenerate point configuration")]
    Degenerate,
    #[error("insufficient inliers: need {needed}, found {found}")]
    InsufficientInliers { needed: usize, found: usize },
}

/// `dst = s·R·src + t` stored as a 2×3 matrix `[s·R | t]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Similarity2 {
    pub m: Matrix2x3<f64>,
}

impl Similarity2 {
    pub fn identity() -> Self {
        Self::from_parts(1.0, 0.0, Vector2::zeros())
    }

    /// Build from scale, rotation angle (radians, image axes) and translation.
    pub fn from_parts(scale: f64, angle: f64, translation: Vector2<f64>) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            m: Matrix2x3::new(
                scale * c,
                -scale * s,
                translation.x,
                scale * s,
                scale * c,
                translation.y,
            ),
        }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let x = p.x as f64;
        let y = p.y as f64;
        Point2::new(
            (self.m[(0, 0)] * x + self.m[(0, 1)] * y + self.m[(0, 2)]) as f32,
            (self.m[(1, 0)] * x + self.m[(1, 1)] * y + self.m[(1, 2)]) as f32,
        )
    }

    pub fn scale(&self) -> f64 {
        self.m[(0, 0)].hypot(self.m[(1, 0)])
    }

    /// Rotation angle in radians, `(-π, π]`.
    pub fn angle(&self) -> f64 {
        self.m[(1, 0)].atan2(self.m[(0, 0)])
    }

    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.m[(0, 2)], self.m[(1, 2)])
    }
}

fn centroid(points: &[Point2<f32>]) -> Vector2<f64> {
    let n = points.len().max(1) as f64;
    let mut acc = Vector2::zeros();
    for p in points {
        acc += Vector2::new(p.x as f64, p.y as f64);
    }
    acc / n
}

/// Least-squares similarity between two point sets (closed form, reflection excluded).
pub fn fit_similarity(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
) -> Result<Similarity2, SimilarityError> {
    if src.len() != dst.len() {
        return Err(SimilarityError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    if src.len() < 2 {
        return Err(SimilarityError::TooFewPoints {
            needed: 2,
            got: src.len(),
        });
    }

    let cs = centroid(src);
    let cd = centroid(dst);

    let mut dot = 0.0f64;
    let mut cross = 0.0f64;
    let mut var = 0.0f64;
    for (s, d) in src.iter().zip(dst) {
        let a = Vector2::new(s.x as f64, s.y as f64) - cs;
        let b = Vector2::new(d.x as f64, d.y as f64) - cd;
        dot += a.dot(&b);
        cross += a.x * b.y - a.y * b.x;
        var += a.norm_squared();
    }
    if var < 1e-9 {
        return Err(SimilarityError::Degenerate);
    }

    let angle = cross.atan2(dot);
    let scale = dot.hypot(cross) / var;
    if !scale.is_finite() || scale < 1e-9 {
        return Err(SimilarityError::Degenerate);
    }

    let (s, c) = angle.sin_cos();
    let sr = Matrix2::new(c, -s, s, c) * scale;
    let t = cd - sr * cs;
    Ok(Similarity2::from_parts(scale, angle, t))
}

/// Euclidean residual of one correspondence under `t`.
#[inline]
pub fn transfer_error(t: &Similarity2, src: Point2<f32>, dst: Point2<f32>) -> f64 {
    let p = t.apply(src);
    let dx = (p.x - dst.x) as f64;
    let dy = (p.y - dst.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// RANSAC configuration for similarity fitting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RansacSimilarityConfig {
    /// Maximum number of 2-point hypotheses.
    pub max_iters: usize,
    /// Inlier threshold (transfer error in pixels).
    pub inlier_threshold: f64,
    /// Minimum number of inliers for a valid model.
    pub min_inliers: usize,
    /// Random seed; fixed so repeated runs on the same input agree.
    pub seed: u64,
}

impl Default for RansacSimilarityConfig {
    fn default() -> Self {
        Self {
            max_iters: 200,
            inlier_threshold: 5.0,
            min_inliers: 2,
            seed: 0,
        }
    }
}

/// Result of RANSAC similarity fitting.
#[derive(Clone, Debug)]
pub struct RansacSimilarityResult {
    pub transform: Similarity2,
    /// True for correspondences within the inlier threshold of the final model.
    pub inlier_mask: Vec<bool>,
    pub n_inliers: usize,
    /// RMS transfer error over the final inliers.
    pub rms_error: f64,
}

/// Fit a similarity with RANSAC over 2-point samples, then refit on the consensus set.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, dst, config), fields(n = src.len()))
)]
pub fn fit_similarity_ransac(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    config: &RansacSimilarityConfig,
) -> Result<RansacSimilarityResult, SimilarityError> {
    use rand::prelude::*;

    if src.len() != dst.len() {
        return Err(SimilarityError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < 2 {
        return Err(SimilarityError::TooFewPoints { needed: 2, got: n });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best_inliers = 0usize;
    let mut best_mask = vec![false; n];
    let mut best: Option<Similarity2> = None;

    for _ in 0..config.max_iters.max(1) {
        let i = rng.gen_range(0..n);
        let mut j = rng.gen_range(0..n - 1);
        if j >= i {
            j += 1;
        }

        let Ok(model) = fit_similarity(&[src[i], src[j]], &[dst[i], dst[j]]) else {
            continue;
        };

        let mut count = 0usize;
        let mut mask = vec![false; n];
        for k in 0..n {
            if transfer_error(&model, src[k], dst[k]) < config.inlier_threshold {
                mask[k] = true;
                count += 1;
            }
        }

        if count > best_inliers {
            best_inliers = count;
            best_mask = mask;
            best = Some(model);

            // Early exit if >90% inliers
            if count * 10 > n * 9 {
                break;
            }
        }
    }

    let Some(best) = best else {
        return Err(SimilarityError::Degenerate);
    };
    if best_inliers < config.min_inliers.max(2) {
        return Err(SimilarityError::InsufficientInliers {
            needed: config.min_inliers.max(2),
            found: best_inliers,
        });
    }

    let inlier_src: Vec<Point2<f32>> = (0..n).filter(|&k| best_mask[k]).map(|k| src[k]).collect();
    let inlier_dst: Vec<Point2<f32>> = (0..n).filter(|&k| best_mask[k]).map(|k| dst[k]).collect();
    let refit = fit_similarity(&inlier_src, &inlier_dst).unwrap_or(best);

    let mut inlier_mask = vec![false; n];
    let mut n_inliers = 0usize;
    let mut sq_sum = 0.0f64;
    for k in 0..n {
        let err = transfer_error(&refit, src[k], dst[k]);
        if err < config.inlier_threshold {
            inlier_mask[k] = true;
            n_inliers += 1;
            sq_sum += err * err;
        }
    }
    let rms_error = if n_inliers > 0 {
        (sq_sum / n_inliers as f64).sqrt()
    } else {
        f64::INFINITY
    };

    Ok(RansacSimilarityResult {
        transform: refit,
        inlier_mask,
        n_inliers,
        rms_error,
    })
}
