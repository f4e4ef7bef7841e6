use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Where a ball position came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Found by the blob pass.
    Segmented,
    /// Synthesised by lattice growth.
    GridSearch,
    /// A taught reference position after alignment.
    Reference,
    /// Proposed by an external candidate source.
    External,
}

/// A ball candidate from segmentation or lattice growth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedBlob {
    pub center: Point2<f32>,
    /// Equivalent diameter `2·sqrt(area/π)`.
    pub diameter: f32,
    pub area: f32,
    pub circularity: f32,
    /// Simplified outline in full-image coordinates; empty for synthesised balls.
    pub contour: Vec<Point2<f32>>,
    pub provenance: Provenance,
}

impl DetectedBlob {
    pub fn from_area(
        center: Point2<f32>,
        area: f32,
        circularity: f32,
        contour: Vec<Point2<f32>>,
        provenance: Provenance,
    ) -> Self {
        Self {
            center,
            diameter: 2.0 * (area / std::f32::consts::PI).sqrt(),
            area,
            circularity,
            contour,
            provenance,
        }
    }
}

/// Inspection verdict for one result shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShapeState {
    Ok,
    Ng,
    Short,
    Extra,
}

impl ShapeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeState::Ok => "OK",
            ShapeState::Ng => "NG",
            ShapeState::Short => "SHORT",
            ShapeState::Extra => "EXTRA",
        }
    }
}

pub const DIAG_PASS: &str = "Pass";
pub const DIAG_MISSING: &str = "Missing/Void";
pub const DIAG_BRIDGED: &str = "Bridged";
pub const DIAG_ALIGNMENT_FAILED: &str = "Alignment failed";
pub const DIAG_EXTRA: &str = "Unexpected ball";

/// One output record of an inspection call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultShape {
    pub center: Point2<f32>,
    /// Second endpoint of a line-type (bridge) result.
    pub end: Option<Point2<f32>>,
    pub diameter: f32,
    pub contour: Vec<Point2<f32>>,
    pub state: ShapeState,
    pub diagnostic: String,
    pub provenance: Provenance,
    /// Taught reference index, when the shape stands for a reference position.
    pub reference_index: Option<usize>,
    /// Ball indices joined by a SHORT result.
    pub pair: Option<[usize; 2]>,
}

impl ResultShape {
    pub fn ball(
        center: Point2<f32>,
        diameter: f32,
        state: ShapeState,
        diagnostic: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            center,
            end: None,
            diameter,
            contour: Vec::new(),
            state,
            diagnostic: diagnostic.into(),
            provenance,
            reference_index: None,
            pair: None,
        }
    }

    pub fn from_blob(
        blob: &DetectedBlob,
        state: ShapeState,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            contour: blob.contour.clone(),
            ..Self::ball(blob.center, blob.diameter, state, diagnostic, blob.provenance)
        }
    }

    pub fn with_reference(mut self, index: usize) -> Self {
        self.reference_index = Some(index);
        self
    }

    pub fn is_line(&self) -> bool {
        self.end.is_some()
    }
}

fn counts_as_missing(shape: &ResultShape) -> bool {
    let excluded = [DIAG_BRIDGED, DIAG_ALIGNMENT_FAILED];
    !shape.is_line() && !excluded.contains(&shape.diagnostic.as_str())
}

/// Overall verdict of an inspection call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Ok,
    Ng,
}

/// Dominant defect class behind an NG decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefectType {
    #[serde(rename = "NA")]
    Na,
    Missing,
    Short,
    Both,
    Extra,
    Unaligned,
}

impl DefectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefectType::Na => "NA",
            DefectType::Missing => "Missing",
            DefectType::Short => "Short",
            DefectType::Both => "Both",
            DefectType::Extra => "Extra",
            DefectType::Unaligned => "Unaligned",
        }
    }
}

/// Counts and verdict derived from a shape list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InspectionSummary {
    pub decision: Decision,
    pub defect: DefectType,
    pub missing_count: usize,
    pub short_count: usize,
    pub extra_count: usize,
    /// Reference indices reported missing.
    pub missing_indices: Vec<usize>,
    pub short_pairs: Vec<[usize; 2]>,
}

impl InspectionSummary {
    /// Summarise a shape list.
    ///
    /// Every NG ball counts as missing unless it is one end of a bridge or stands
    /// for a reference position that could not be aligned; that includes NG
    /// shapes from an external source with their own diagnostics.
    /// `aligned == false` forces an `Unaligned` NG regardless of counts.
    pub fn from_shapes(shapes: &[ResultShape], aligned: bool) -> Self {
        let mut missing_indices = Vec::new();
        let mut missing_count = 0;
        let mut short_pairs = Vec::new();
        let mut extra_count = 0;

        for shape in shapes {
            match shape.state {
                ShapeState::Short => {
                    if let Some(pair) = shape.pair {
                        short_pairs.push(pair);
                    }
                }
                ShapeState::Extra => extra_count += 1,
                ShapeState::Ng if counts_as_missing(shape) => {
                    missing_count += 1;
                    if let Some(idx) = shape.reference_index {
                        missing_indices.push(idx);
                    }
                }
                _ => {}
            }
        }
        let short_count = shapes
            .iter()
            .filter(|s| s.state == ShapeState::Short)
            .count();

        let defect = if !aligned {
            DefectType::Unaligned
        } else {
            match (missing_count > 0, short_count > 0) {
                (true, true) => DefectType::Both,
                (true, false) => DefectType::Missing,
                (false, true) => DefectType::Short,
                (false, false) if extra_count > 0 => DefectType::Extra,
                (false, false) => DefectType::Na,
            }
        };
        let decision = if defect == DefectType::Na {
            Decision::Ok
        } else {
            Decision::Ng
        };

        Self {
            decision,
            defect,
            missing_count,
            short_count,
            extra_count,
            missing_indices,
            short_pairs,
        }
    }

    /// Compare a found count against the expected one.
    ///
    /// Only applies when no defect was found otherwise and `target > 0`.
    pub fn apply_count_verdict(&mut self, found: usize, target: usize) {
        if target == 0 || self.defect != DefectType::Na || found == target {
            return;
        }
        self.decision = Decision::Ng;
        if found < target {
            self.defect = DefectType::Missing;
            self.missing_count = target - found;
        } else {
            self.defect = DefectType::Extra;
            self.extra_count = found - target;
        }
    }

    /// One-line summary such as `NG Both (M:1, S:1)`.
    pub fn summary_line(&self) -> String {
        let decision = match self.decision {
            Decision::Ok => "OK",
            Decision::Ng => "NG",
        };
        format!(
            "{} {} (M:{}, S:{})",
            decision,
            self.defect.as_str(),
            self.missing_count,
            self.short_count
        )
    }
}
