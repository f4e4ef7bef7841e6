//! Blob pass: threshold, open, trace outer contours and keep ball-shaped ones.

use bga_xray_core::{
    circularity, polygon_area, polygon_centroid, polygon_perimeter, simplify_closed, GrayImage,
    GrayImageView,
};
use image::Luma;
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::morphology;
use log::debug;
use nalgebra::{Point2, Vector2};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::recipe::{Recipe, ThresholdMode};
use crate::result::{DetectedBlob, Provenance};

pub(crate) type LumaImage = image::GrayImage;

/// Matches a 5x5 kernel with automatic sigma.
const SMOOTHING_SIGMA: f32 = 1.1;
const SIMPLIFY_EPSILON_PX: f32 = 2.0;
const DEFAULT_ADAPTIVE_WINDOW: u32 = 15;
const DEFAULT_ADAPTIVE_OFFSET: f32 = 10.0;

/// Area and circularity acceptance window shared by the blob pass and grid probes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ShapeLimits {
    pub min_area: f64,
    pub max_area: f64,
    pub min_circularity: f64,
}

impl ShapeLimits {
    pub fn from_recipe(recipe: &Recipe) -> Self {
        Self {
            min_area: recipe.min_ball_area_px as f64,
            max_area: recipe.max_ball_area_px as f64,
            min_circularity: recipe.min_circularity as f64,
        }
    }
}

/// Measurements of a contour that passed [`ShapeLimits`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct ContourShape {
    pub area: f64,
    pub circularity: f64,
    pub centroid: Point2<f32>,
}

pub(crate) fn measure_contour(
    points: &[Point2<f32>],
    limits: &ShapeLimits,
) -> Option<ContourShape> {
    let area = polygon_area(points);
    if area < limits.min_area || area > limits.max_area {
        return None;
    }
    let circ = circularity(area, polygon_perimeter(points))?;
    if circ < limits.min_circularity {
        return None;
    }
    let centroid = polygon_centroid(points)?;
    Some(ContourShape {
        area,
        circularity: circ,
        centroid,
    })
}

pub(crate) fn to_luma(img: GrayImage) -> Option<LumaImage> {
    LumaImage::from_raw(img.width as u32, img.height as u32, img.data)
}

/// Inverted global threshold: pixels `<= level` become foreground (255).
pub(crate) fn threshold_inverted(img: &LumaImage, level: u8) -> LumaImage {
    threshold(img, level, ThresholdType::BinaryInverted)
}

/// Outermost contours of the foreground, as float point lists in image-local coordinates.
pub(crate) fn outer_contours(binary: &LumaImage) -> Vec<Vec<Point2<f32>>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| c.points.len() >= 3)
        .map(|c| {
            c.points
                .iter()
                .map(|p| Point2::new(p.x as f32, p.y as f32))
                .collect()
        })
        .collect()
}

/// Adaptive window derived from the largest expected blob: odd, at least 3.
pub(crate) fn adaptive_window(max_area: f32) -> u32 {
    if max_area <= 0.0 {
        return DEFAULT_ADAPTIVE_WINDOW;
    }
    let mut window = (2.0 * (max_area / std::f32::consts::PI).sqrt()) as u32 + 1;
    if window % 2 == 0 {
        window += 1;
    }
    window.max(3)
}

/// Inverted local-mean threshold: foreground iff `p <= mean(window) - offset`.
///
/// The window is clipped at the image border.
fn threshold_adaptive(img: &LumaImage, window: u32, offset: f32) -> LumaImage {
    let (w, h) = img.dimensions();
    let integral = integral_image::<_, u64>(img);
    let half = window / 2;
    LumaImage::from_fn(w, h, |x, y| {
        let (x0, y0) = (x.saturating_sub(half), y.saturating_sub(half));
        let (x1, y1) = ((x + half).min(w - 1), (y + half).min(h - 1));
        let sum = sum_image_pixels(&integral, x0, y0, x1, y1)[0];
        let mean = sum as f32 / ((x1 - x0 + 1) * (y1 - y0 + 1)) as f32;
        let p = img.get_pixel(x, y)[0] as f32;
        Luma([if p <= mean - offset { 255 } else { 0 }])
    })
}

fn binarize(smoothed: &LumaImage, recipe: &Recipe) -> LumaImage {
    match recipe.threshold_mode {
        ThresholdMode::Adaptive => {
            let offset = if recipe.adaptive_offset > 0.0 {
                recipe.adaptive_offset
            } else {
                DEFAULT_ADAPTIVE_OFFSET
            };
            threshold_adaptive(
                smoothed,
                adaptive_window(recipe.max_ball_area_px),
                offset,
            )
        }
        ThresholdMode::Fixed => threshold_inverted(smoothed, recipe.fixed_threshold),
    }
}

/// Segment ball candidates inside the recipe ROI.
///
/// Returns blobs in contour-discovery order, with contours and centres in
/// full-image coordinates. Empty images or an ROI that misses the image yield
/// an empty list.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(image, recipe),
        fields(width = image.width, height = image.height)
    )
)]
pub fn detect_blobs(image: &GrayImageView<'_>, recipe: &Recipe) -> Vec<DetectedBlob> {
    if image.is_empty() {
        return Vec::new();
    }
    let rect = recipe.processing_rect(image.width, image.height);
    if rect.is_empty() {
        debug!("roi {:?} does not overlap the image", recipe.roi);
        return Vec::new();
    }
    let Some(crop) = to_luma(image.crop(rect)) else {
        return Vec::new();
    };

    let smoothed = gaussian_blur_f32(&crop, SMOOTHING_SIGMA);
    let mut binary = binarize(&smoothed, recipe);
    if recipe.morph_kernel_size > 1 {
        let radius = (recipe.morph_kernel_size / 2).min(u8::MAX as u32) as u8;
        binary = morphology::open(&binary, Norm::L2, radius);
    }

    let limits = ShapeLimits::from_recipe(recipe);
    let offset = Vector2::new(rect.x as f32, rect.y as f32);
    let contours = outer_contours(&binary);
    let n_contours = contours.len();

    let blobs: Vec<DetectedBlob> = contours
        .into_iter()
        .filter_map(|points| {
            let shape = measure_contour(&points, &limits)?;
            let outline = simplify_closed(&points, SIMPLIFY_EPSILON_PX)
                .into_iter()
                .map(|p| p + offset)
                .collect();
            Some(DetectedBlob::from_area(
                shape.centroid + offset,
                shape.area as f32,
                shape.circularity as f32,
                outline,
                Provenance::Segmented,
            ))
        })
        .collect();

    debug!(
        "blob pass: {} contours, {} accepted in {}x{} region",
        n_contours,
        blobs.len(),
        rect.width,
        rect.height
    );
    blobs
}
