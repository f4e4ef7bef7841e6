//! Engine tuning constants, grouped per stage.
//!
//! These are not part of the taught recipe; every factor is relative to the
//! recipe's nominal ball radius.

use serde::{Deserialize, Serialize};

/// Lattice growth settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchParams {
    /// Upper bound on growth passes.
    pub max_iterations: usize,
    /// Probe window half-width as a multiple of the ball radius.
    pub probe_half_width_factor: f32,
    /// Probe windows narrower than this fall back to `fallback_half_width`.
    pub min_probe_half_width: i64,
    pub fallback_half_width: i64,
    /// Contours whose bounding box comes this close to the probe window edge are rejected.
    pub border_margin: i64,
}

impl Default for GridSearchParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            probe_half_width_factor: 1.3,
            min_probe_half_width: 5,
            fallback_half_width: 10,
            border_margin: 1,
        }
    }
}

/// Reference-to-image alignment settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    /// Fewer detected blobs than this and alignment is not attempted.
    pub min_blobs: usize,
    /// Nearest-blob acceptance radius as a multiple of the ball radius.
    pub match_radius_factor: f32,
    /// Fraction of reference points that must find a correspondence.
    pub min_match_fraction: f32,
    /// RANSAC inlier tolerance as a multiple of the ball radius.
    pub inlier_radius_factor: f32,
    pub ransac_iters: usize,
    pub ransac_seed: u64,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            min_blobs: 4,
            match_radius_factor: 2.5,
            min_match_fraction: 0.1,
            inlier_radius_factor: 1.0,
            ransac_iters: 200,
            ransac_seed: 0,
        }
    }
}

/// Presence (void) check settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceParams {
    /// Patch half-width as a multiple of the ball radius.
    pub patch_factor: f32,
    pub min_half_width: i64,
    /// Added to the dark level before counting dark pixels.
    pub dark_margin: u8,
}

impl Default for PresenceParams {
    fn default() -> Self {
        Self {
            patch_factor: 0.6,
            min_half_width: 2,
            dark_margin: 20,
        }
    }
}

/// Bridge (short) scan settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeParams {
    /// Pairs farther apart than this multiple of the radius are never scanned.
    pub reach_factor: f32,
    /// Pairs closer than this multiple of the radius are bridged unconditionally.
    pub overlap_factor: f32,
    /// The scanned gap starts this multiple of the radius away from each centre.
    pub edge_inset_factor: f32,
}

impl Default for BridgeParams {
    fn default() -> Self {
        Self {
            reach_factor: 6.0,
            overlap_factor: 1.8,
            edge_inset_factor: 0.9,
        }
    }
}

/// Full engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorParams {
    /// Run lattice growth after the blob pass in ad-hoc mode.
    pub grid_search_enabled: bool,
    /// Report unmatched blobs as EXTRA in taught mode.
    pub report_extra: bool,
    pub grid_search: GridSearchParams,
    pub alignment: AlignmentParams,
    pub presence: PresenceParams,
    pub bridge: BridgeParams,
}

impl Default for InspectorParams {
    fn default() -> Self {
        Self {
            grid_search_enabled: true,
            report_extra: true,
            grid_search: GridSearchParams::default(),
            alignment: AlignmentParams::default(),
            presence: PresenceParams::default(),
            bridge: BridgeParams::default(),
        }
    }
}
