//! Solder-ball inspection for BGA X-ray images.
//!
//! Pipeline:
//! - segment dark ball footprints into blobs,
//! - grow the ball set along the layout lattice (ad-hoc mode), or align the
//!   taught reference layout onto the blobs (taught mode),
//! - check every aligned position for a ball,
//! - look for solder bridges between neighbouring balls.
//!
//! The engine is synchronous and never touches the filesystem except through
//! the JSON helpers in `io`.

mod alignment;
mod blob;
mod bridge;
mod grid_search;
mod io;
mod params;
mod pipeline;
mod presence;
mod recipe;
mod result;
mod source;

pub use alignment::{align, Alignment, AlignmentFailure, AlignmentOutcome, Correspondence};
pub use blob::detect_blobs;
pub use bridge::{detect_bridges, gap_is_dark, Bridge, BridgeKind, BridgeScan};
pub use grid_search::{estimate_pitch, expand_grid};
pub use io::{AlignmentReport, InspectConfig, InspectIoError, InspectReport};
pub use params::{AlignmentParams, BridgeParams, GridSearchParams, InspectorParams, PresenceParams};
pub use pipeline::{InspectionMode, InspectionOutcome, Inspector};
pub use presence::{classify_presence, dark_density, Presence};
pub use recipe::{Recipe, ThresholdMode};
pub use result::{
    Decision, DefectType, DetectedBlob, InspectionSummary, Provenance, ResultShape, ShapeState,
    DIAG_ALIGNMENT_FAILED, DIAG_BRIDGED, DIAG_EXTRA, DIAG_MISSING, DIAG_PASS,
};
pub use source::CandidateSource;

pub use bga_xray_core::{GrayImage, GrayImageView, Roi, Similarity2, SimilarityError};
