//! Core types and utilities for BGA X-ray inspection.
//!
//! This crate is intentionally small and purely geometric: a borrowed
//! grayscale image view, ROI clipping, closed-polygon measurements, the four
//! lattice quarter turns and similarity-transform estimation. It does *not*
//! depend on any image decoding or image-processing crate.

mod image;
mod logger;
mod polygon;
mod quarter_turn;
mod similarity;

pub use image::{GrayImage, GrayImageView, PixelRect, Roi};
pub use polygon::{
    circularity, polygon_area, polygon_centroid, polygon_perimeter, simplify_closed, BoundingBox,
};
pub use quarter_turn::{QuarterTurn, QUARTER_TURNS};
pub use similarity::{
    fit_similarity, fit_similarity_ransac, transfer_error, RansacSimilarityConfig,
    RansacSimilarityResult, Similarity2, SimilarityError,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
