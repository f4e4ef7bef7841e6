//! High-level facade crate for the `bga-xray-*` workspace.
//!
//! This crate provides:
//! - re-exports of the geometry core and the inspection engine
//! - (feature-gated) helpers that run an inspection directly on an
//!   `image::GrayImage`, an image file on disk, or a raw 8-bit buffer
//! - the `bga-xray` command-line tool (feature `cli`)
//!
//! ## Quickstart
//!
//! ```no_run
//! use bga_xray::detect;
//! use bga_xray::inspect::Recipe;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let recipe = Recipe::load_json("recipe.json")?;
//! let img = detect::load_gray("board.png")?;
//! let outcome = detect::inspect_image(&img, &recipe);
//! println!("{}", outcome.summary.summary_line());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `bga_xray::core`: image views, ROI clipping, polygon measures, similarity fitting, logging.
//! - `bga_xray::inspect`: recipe, blob detection, grid search, alignment, presence and bridge checks.
//! - `bga_xray::detect` (feature `image`): end-to-end helpers from `image::GrayImage`.

pub use bga_xray_core as core;
pub use bga_xray_inspect as inspect;

pub use bga_xray_inspect::{
    Decision, DefectType, InspectionOutcome, InspectionSummary, Inspector, Recipe, ResultShape,
    ShapeState,
};

#[cfg(feature = "image")]
pub mod detect;
