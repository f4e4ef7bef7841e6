use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize, fill: u8) -> Self {
        Self {
            width,
            height,
            data: vec![fill; width * height],
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = v;
        }
    }
}

impl<'a> GrayImageView<'a> {
    /// True when the view has no pixels or its buffer is shorter than `width * height`.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.len() < self.width * self.height
    }

    /// Pixel value at integer coordinates, `None` outside the image.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        self.data.get(y as usize * self.width + x as usize).copied()
    }

    /// Copy a sub-rectangle. The rectangle must already lie inside the image.
    pub fn crop(&self, rect: PixelRect) -> GrayImage {
        let mut data = Vec::with_capacity(rect.width * rect.height);
        for row in rect.y..rect.y + rect.height {
            let start = row * self.width + rect.x;
            data.extend_from_slice(&self.data[start..start + rect.width]);
        }
        GrayImage {
            width: rect.width,
            height: rect.height,
            data,
        }
    }
}

/// Axis-aligned rectangle in pixel units, always inside some image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// User-drawn region of interest. May extend past (or lie entirely outside) the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersect with a `width x height` image. Returns an empty rectangle when they do not overlap.
    pub fn clamp_to(&self, width: usize, height: usize) -> PixelRect {
        let x0 = self.x.clamp(0, width as i64);
        let y0 = self.y.clamp(0, height as i64);
        let x_end = self.x.saturating_add(i64::from(self.width));
        let y_end = self.y.saturating_add(i64::from(self.height));
        let x1 = x_end.clamp(0, width as i64);
        let y1 = y_end.clamp(0, height as i64);
        PixelRect {
            x: x0 as usize,
            y: y0 as usize,
            width: (x1 - x0).max(0) as usize,
            height: (y1 - y0).max(0) as usize,
        }
    }

    /// Square window of half-width `half` centred on integer pixel `(cx, cy)`, clipped to the image.
    pub fn square(cx: i64, cy: i64, half: i64) -> Self {
        let side = half.saturating_mul(2).clamp(0, u32::MAX as i64) as u32;
        Self::new(cx.saturating_sub(half), cy.saturating_sub(half), side, side)
    }
}
