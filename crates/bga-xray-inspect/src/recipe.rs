use bga_xray_core::{PixelRect, Roi};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Binarisation strategy for the blob pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    /// Local-mean threshold, window derived from `max_ball_area_px`.
    #[default]
    Adaptive,
    /// Global threshold at `fixed_threshold`.
    Fixed,
}

/// Per-model inspection recipe.
///
/// Produced by teaching and stored by the caller; the engine only borrows it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    /// Model identifier the recipe was taught for.
    pub model: String,
    pub image_width: u32,
    pub image_height: u32,
    /// Region to process. `None` means the whole image.
    pub roi: Option<Roi>,
    /// Nominal ball radius in pixels.
    pub ball_radius_px: f32,
    pub min_ball_area_px: f32,
    pub max_ball_area_px: f32,
    /// Minimum `4π·area/perimeter²`, in `[0, 1]`.
    pub min_circularity: f32,
    pub threshold_mode: ThresholdMode,
    /// Offset subtracted from the local mean in adaptive mode.
    pub adaptive_offset: f32,
    /// Global dark level: blob threshold in fixed mode, grid probes and presence checks.
    pub fixed_threshold: u8,
    /// Pixels at or below this level count as solder along a bridge path.
    pub bridge_threshold: u8,
    /// Odd opening kernel size; `<= 1` disables the opening.
    pub morph_kernel_size: u32,
    /// Dark-pixel percentage a position must exceed to count as a ball.
    pub void_threshold: f32,
    /// Taught ball centres; the index is the reference index.
    pub reference_points: Vec<Point2<f32>>,
    pub target_ball_count: usize,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            model: String::new(),
            image_width: 0,
            image_height: 0,
            roi: None,
            ball_radius_px: 15.0,
            min_ball_area_px: 50.0,
            max_ball_area_px: 3000.0,
            min_circularity: 0.1,
            threshold_mode: ThresholdMode::Adaptive,
            adaptive_offset: 10.0,
            fixed_threshold: 100,
            bridge_threshold: 60,
            morph_kernel_size: 3,
            void_threshold: 30.0,
            reference_points: Vec::new(),
            target_ball_count: 0,
        }
    }
}

impl Recipe {
    /// True when a reference layout has been taught.
    pub fn is_taught(&self) -> bool {
        !self.reference_points.is_empty()
    }

    /// Processing rectangle: the ROI clipped to the image, or the whole image.
    pub fn processing_rect(&self, width: usize, height: usize) -> PixelRect {
        match self.roi {
            Some(roi) if roi.width > 0 && roi.height > 0 => roi.clamp_to(width, height),
            _ => PixelRect {
                x: 0,
                y: 0,
                width,
                height,
            },
        }
    }

    pub fn ball_diameter_px(&self) -> f32 {
        2.0 * self.ball_radius_px
    }

    /// Replace the taught layout, keeping the target count in sync.
    pub fn with_reference_points(mut self, points: Vec<Point2<f32>>) -> Self {
        self.target_ball_count = points.len();
        self.reference_points = points;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recipe_store() {
        let r = Recipe::default();
        assert_eq!(r.min_ball_area_px, 50.0);
        assert_eq!(r.max_ball_area_px, 3000.0);
        assert_eq!(r.min_circularity, 0.1);
        assert_eq!(r.void_threshold, 30.0);
        assert_eq!(r.morph_kernel_size, 3);
        assert!(!r.is_taught());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let r: Recipe = serde_json::from_str(r#"{"model":"BGA-256","ball_radius_px":9}"#)
            .expect("parse");
        assert_eq!(r.model, "BGA-256");
        assert_eq!(r.ball_radius_px, 9.0);
        assert_eq!(r.max_ball_area_px, 3000.0);
        assert_eq!(r.threshold_mode, ThresholdMode::Adaptive);
    }

    #[test]
    fn zero_sized_roi_means_whole_image() {
        let r = Recipe {
            roi: Some(Roi::new(5, 5, 0, 10)),
            ..Recipe::default()
        };
        assert_eq!(
            r.processing_rect(40, 30),
            PixelRect {
                x: 0,
                y: 0,
                width: 40,
                height: 30
            }
        );
    }

    #[test]
    fn teaching_updates_target_count() {
        let r = Recipe::default()
            .with_reference_points(vec![Point2::new(1.0, 2.0), Point2::new(3.0, 4.0)]);
        assert_eq!(r.target_ball_count, 2);
        assert!(r.is_taught());
    }
}
