use std::collections::HashMap;

use bga_xray_core::GrayImageView;
use log::{debug, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::alignment::{align, AlignmentOutcome};
use crate::blob::detect_blobs;
use crate::bridge::{detect_bridges, BridgeKind, BridgeScan};
use crate::grid_search::expand_grid;
use crate::params::InspectorParams;
use crate::presence::{classify_presence, Presence};
use crate::recipe::Recipe;
use crate::result::{
    DetectedBlob, InspectionSummary, Provenance, ResultShape, ShapeState, DIAG_ALIGNMENT_FAILED,
    DIAG_BRIDGED, DIAG_EXTRA, DIAG_MISSING, DIAG_PASS,
};
use crate::source::CandidateSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionMode {
    /// Reference layout aligned onto the image and checked position by position.
    Taught,
    /// No layout: detected balls are reported directly.
    AdHoc,
}

/// Everything one inspection call produces.
#[derive(Clone, Debug)]
pub struct InspectionOutcome {
    pub mode: InspectionMode,
    /// Ball results first (reference order in taught mode), then SHORT lines,
    /// then EXTRA balls, then shapes from an external source.
    pub shapes: Vec<ResultShape>,
    /// Present in taught mode only.
    pub alignment: Option<AlignmentOutcome>,
    pub summary: InspectionSummary,
}

/// Inspection engine for one recipe.
///
/// Holds no per-image state; a single instance can serve concurrent calls.
#[derive(Clone, Debug)]
pub struct Inspector {
    recipe: Recipe,
    params: InspectorParams,
}

impl Inspector {
    pub fn new(recipe: Recipe, params: InspectorParams) -> Self {
        Self { recipe, params }
    }

    pub fn with_recipe(recipe: Recipe) -> Self {
        Self::new(recipe, InspectorParams::default())
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn params(&self) -> &InspectorParams {
        &self.params
    }

    /// Blob pass followed by lattice growth when enabled.
    pub fn detect(&self, image: &GrayImageView<'_>) -> Vec<DetectedBlob> {
        let blobs = detect_blobs(image, &self.recipe);
        if self.params.grid_search_enabled {
            expand_grid(image, blobs, &self.recipe, &self.params.grid_search)
        } else {
            blobs
        }
    }

    /// Inspect one image.
    pub fn inspect(&self, image: &GrayImageView<'_>) -> InspectionOutcome {
        self.run(image, None)
    }

    /// Inspect one image and append shapes proposed by `source`.
    pub fn inspect_with_source(
        &self,
        image: &GrayImageView<'_>,
        source: &dyn CandidateSource,
    ) -> InspectionOutcome {
        self.run(image, Some(source))
    }

    /// Detect balls and record them as the reference layout of a new recipe.
    ///
    /// Centres are ordered row by row, top to bottom and left to right; balls
    /// whose `y` differ by less than one radius share a row.
    pub fn teach(&self, image: &GrayImageView<'_>) -> Recipe {
        let centers: Vec<Point2<f32>> = self.detect(image).iter().map(|b| b.center).collect();
        let ordered = row_major(centers, self.recipe.ball_radius_px);
        debug!("teach: {} reference points", ordered.len());
        Recipe {
            image_width: image.width as u32,
            image_height: image.height as u32,
            ..self.recipe.clone()
        }
        .with_reference_points(ordered)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image, source),
            fields(width = image.width, height = image.height, taught = self.recipe.is_taught())
        )
    )]
    fn run(
        &self,
        image: &GrayImageView<'_>,
        source: Option<&dyn CandidateSource>,
    ) -> InspectionOutcome {
        let mut outcome = if self.recipe.is_taught() {
            self.inspect_taught(image)
        } else {
            self.inspect_ad_hoc(image)
        };

        if let Some(source) = source {
            let external = source.detect(image);
            debug!("external source: {} shapes", external.len());
            outcome
                .shapes
                .extend(external.into_iter().map(|mut s| {
                    s.provenance = Provenance::External;
                    s
                }));
            let aligned = outcome
                .alignment
                .as_ref()
                .is_none_or(AlignmentOutcome::is_aligned);
            let found = outcome.summary.clone();
            outcome.summary = InspectionSummary::from_shapes(&outcome.shapes, aligned);
            if outcome.mode == InspectionMode::AdHoc {
                let balls = count_balls(&outcome.shapes);
                outcome
                    .summary
                    .apply_count_verdict(balls, self.recipe.target_ball_count);
            }
            debug!(
                "summary with external shapes: {} -> {}",
                found.summary_line(),
                outcome.summary.summary_line()
            );
        }
        outcome
    }

    fn inspect_taught(&self, image: &GrayImageView<'_>) -> InspectionOutcome {
        let recipe = &self.recipe;
        let radius = recipe.ball_radius_px;
        let diameter = recipe.ball_diameter_px();

        let blobs = detect_blobs(image, recipe);
        let centers: Vec<Point2<f32>> = blobs.iter().map(|b| b.center).collect();
        let alignment = align(
            &centers,
            &recipe.reference_points,
            radius,
            &self.params.alignment,
        );

        let aligned = match &alignment {
            AlignmentOutcome::Aligned(a) => a.clone(),
            AlignmentOutcome::Failed(reason) => {
                warn!("alignment failed: {reason}");
                return self.unaligned(alignment);
            }
        };

        let presence: Vec<Presence> = aligned
            .aligned_points
            .iter()
            .map(|&p| {
                classify_presence(
                    image,
                    p,
                    radius,
                    recipe.fixed_threshold,
                    recipe.void_threshold,
                    &self.params.presence,
                )
            })
            .collect();

        // Bridge scan runs over present positions only; map back to reference indices.
        let present: Vec<usize> = (0..presence.len())
            .filter(|&i| presence[i] == Presence::Present)
            .collect();
        let present_points: Vec<Point2<f32>> =
            present.iter().map(|&i| aligned.aligned_points[i]).collect();
        let scan = detect_bridges(
            image,
            &present_points,
            radius,
            recipe.bridge_threshold,
            &self.params.bridge,
        );

        let matched_contour: HashMap<usize, usize> = aligned
            .correspondences
            .iter()
            .map(|c| (c.reference_index, c.blob_index))
            .collect();

        let mut shapes = Vec::with_capacity(presence.len() + scan.bridges.len());
        for (i, (&p, state)) in aligned.aligned_points.iter().zip(&presence).enumerate() {
            let bridged = present
                .iter()
                .position(|&r| r == i)
                .is_some_and(|k| scan.downgraded.contains(&k));
            let (state, diagnostic) = match state {
                Presence::Absent => (ShapeState::Ng, DIAG_MISSING),
                Presence::Present if bridged => (ShapeState::Ng, DIAG_BRIDGED),
                Presence::Present => (ShapeState::Ok, DIAG_PASS),
            };
            let mut shape = ResultShape::ball(p, diameter, state, diagnostic, Provenance::Reference)
                .with_reference(i);
            if state != ShapeState::Ng || diagnostic == DIAG_BRIDGED {
                if let Some(&bi) = matched_contour.get(&i) {
                    shape.contour = blobs[bi].contour.clone();
                }
            }
            shapes.push(shape);
        }
        shapes.extend(short_shapes(
            &scan,
            &present_points,
            &present,
            diameter,
            Provenance::Reference,
        ));

        if self.params.report_extra {
            let gate = self.params.alignment.match_radius_factor * radius;
            shapes.extend(
                blobs
                    .iter()
                    .filter(|b| {
                        aligned
                            .aligned_points
                            .iter()
                            .all(|p| (p - b.center).norm() > gate)
                    })
                    .map(|b| ResultShape::from_blob(b, ShapeState::Extra, DIAG_EXTRA)),
            );
        }

        let summary = InspectionSummary::from_shapes(&shapes, true);
        debug!("taught inspection: {}", summary.summary_line());
        InspectionOutcome {
            mode: InspectionMode::Taught,
            shapes,
            alignment: Some(alignment),
            summary,
        }
    }

    /// Every reference position NG at its taught coordinates.
    fn unaligned(&self, alignment: AlignmentOutcome) -> InspectionOutcome {
        let diameter = self.recipe.ball_diameter_px();
        let shapes: Vec<ResultShape> = self
            .recipe
            .reference_points
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                ResultShape::ball(
                    p,
                    diameter,
                    ShapeState::Ng,
                    DIAG_ALIGNMENT_FAILED,
                    Provenance::Reference,
                )
                .with_reference(i)
            })
            .collect();
        let summary = InspectionSummary::from_shapes(&shapes, false);
        InspectionOutcome {
            mode: InspectionMode::Taught,
            shapes,
            alignment: Some(alignment),
            summary,
        }
    }

    fn inspect_ad_hoc(&self, image: &GrayImageView<'_>) -> InspectionOutcome {
        let recipe = &self.recipe;
        let blobs = self.detect(image);
        let centers: Vec<Point2<f32>> = blobs.iter().map(|b| b.center).collect();
        let scan = detect_bridges(
            image,
            &centers,
            recipe.ball_radius_px,
            recipe.bridge_threshold,
            &self.params.bridge,
        );

        let mut shapes: Vec<ResultShape> = blobs
            .iter()
            .enumerate()
            .map(|(i, b)| {
                if scan.downgraded.contains(&i) {
                    ResultShape::from_blob(b, ShapeState::Ng, DIAG_BRIDGED)
                } else {
                    ResultShape::from_blob(b, ShapeState::Ok, DIAG_PASS)
                }
            })
            .collect();
        let identity: Vec<usize> = (0..centers.len()).collect();
        shapes.extend(short_shapes(
            &scan,
            &centers,
            &identity,
            recipe.ball_diameter_px(),
            Provenance::Segmented,
        ));

        let mut summary = InspectionSummary::from_shapes(&shapes, true);
        summary.apply_count_verdict(blobs.len(), recipe.target_ball_count);
        debug!(
            "ad-hoc inspection: {} balls, {}",
            blobs.len(),
            summary.summary_line()
        );
        InspectionOutcome {
            mode: InspectionMode::AdHoc,
            shapes,
            alignment: None,
            summary,
        }
    }
}

/// SHORT line shapes; `ids[k]` is the reported index of scanned ball `k`.
fn short_shapes(
    scan: &BridgeScan,
    points: &[Point2<f32>],
    ids: &[usize],
    diameter: f32,
    provenance: Provenance,
) -> Vec<ResultShape> {
    scan.bridges
        .iter()
        .map(|bridge| {
            let diagnostic = match bridge.kind {
                BridgeKind::Overlap => "Short (overlap)",
                BridgeKind::DarkPath => "Short",
            };
            let mut shape = ResultShape::ball(
                points[bridge.a],
                diameter,
                ShapeState::Short,
                diagnostic,
                provenance,
            );
            shape.end = Some(points[bridge.b]);
            shape.pair = Some([ids[bridge.a], ids[bridge.b]]);
            shape
        })
        .collect()
}

fn count_balls(shapes: &[ResultShape]) -> usize {
    shapes
        .iter()
        .filter(|s| !s.is_line() && s.state != ShapeState::Extra)
        .count()
}

fn row_major(mut points: Vec<Point2<f32>>, row_tolerance: f32) -> Vec<Point2<f32>> {
    points.sort_by(|a, b| a.y.total_cmp(&b.y));
    let mut rows: Vec<Vec<Point2<f32>>> = Vec::new();
    let mut row_start = f32::NEG_INFINITY;
    for p in points {
        match rows.last_mut() {
            Some(row) if p.y - row_start < row_tolerance => row.push(p),
            _ => {
                row_start = p.y;
                rows.push(vec![p]);
            }
        }
    }
    rows.into_iter()
        .flat_map(|mut row| {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
            row
        })
        .collect()
}
