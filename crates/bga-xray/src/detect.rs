use std::path::Path;

use crate::{core, inspect};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced while turning user input into a grayscale image.
#[derive(thiserror::Error, Debug)]
pub enum ImageInputError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Decode(#[from] ::image::ImageError),
}

/// Borrow an `image::GrayImage` as the engine's lightweight view type.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode an image file and convert it to 8-bit luma.
pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, ImageInputError> {
    Ok(::image::open(path)?.to_luma8())
}

/// Inspect an image with default engine parameters.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(img, recipe),
        fields(width = img.width(), height = img.height(), model = %recipe.model)
    )
)]
pub fn inspect_image(
    img: &::image::GrayImage,
    recipe: &inspect::Recipe,
) -> inspect::InspectionOutcome {
    inspect::Inspector::with_recipe(recipe.clone()).inspect(&gray_view(img))
}

/// Teach a layout from a golden image: returns `recipe` with reference points filled in.
pub fn teach_image(img: &::image::GrayImage, recipe: &inspect::Recipe) -> inspect::Recipe {
    inspect::Inspector::with_recipe(recipe.clone()).teach(&gray_view(img))
}

/// Build an `image::GrayImage` from a raw grayscale buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, ImageInputError> {
    let w = usize::try_from(width).ok();
    let h = usize::try_from(height).ok();
    let Some((w, h)) = w.zip(h) else {
        return Err(ImageInputError::InvalidGrayDimensions { width, height });
    };
    let Some(expected) = w.checked_mul(h) else {
        return Err(ImageInputError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(ImageInputError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(ImageInputError::InvalidGrayDimensions { width, height })
}

/// Inspect a raw row-major 8-bit buffer.
pub fn inspect_gray_u8(
    width: u32,
    height: u32,
    pixels: &[u8],
    recipe: &inspect::Recipe,
) -> Result<inspect::InspectionOutcome, ImageInputError> {
    let img = gray_image_from_slice(width, height, pixels)?;
    Ok(inspect_image(&img, recipe))
}
