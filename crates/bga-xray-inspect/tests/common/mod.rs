#![allow(dead_code)]

use bga_xray_inspect::GrayImage;
use nalgebra::Point2;

pub const BACKGROUND: u8 = 200;
pub const SOLDER: u8 = 40;

pub fn paint_disc(img: &mut GrayImage, cx: f32, cy: f32, r: f32, v: u8) {
    for y in 0..img.height {
        for x in 0..img.width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if dx * dx + dy * dy <= r * r {
                img.set(x, y, v);
            }
        }
    }
}

/// Fill the inclusive rectangle `[x0, x1] x [y0, y1]`.
pub fn paint_rect(img: &mut GrayImage, x0: usize, y0: usize, x1: usize, y1: usize, v: u8) {
    for y in y0..=y1.min(img.height - 1) {
        for x in x0..=x1.min(img.width - 1) {
            img.set(x, y, v);
        }
    }
}

pub fn balls_image(width: usize, height: usize, centers: &[Point2<f32>], r: f32) -> GrayImage {
    let mut img = GrayImage::new(width, height, BACKGROUND);
    for c in centers {
        paint_disc(&mut img, c.x, c.y, r, SOLDER);
    }
    img
}

/// `cols x rows` lattice starting at `origin`, row-major.
pub fn lattice(cols: usize, rows: usize, origin: f32, pitch: f32) -> Vec<Point2<f32>> {
    let mut out = Vec::with_capacity(cols * rows);
    for j in 0..rows {
        for i in 0..cols {
            out.push(Point2::new(origin + i as f32 * pitch, origin + j as f32 * pitch));
        }
    }
    out
}

pub fn nearest_distance(p: Point2<f32>, others: &[Point2<f32>]) -> f32 {
    others
        .iter()
        .map(|o| (o - p).norm())
        .fold(f32::INFINITY, f32::min)
}
