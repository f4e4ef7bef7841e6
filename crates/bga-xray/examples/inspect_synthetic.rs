//! Teach a 4x4 layout from a synthetic golden board, then inspect a copy with
//! one ball missing and two balls bridged.
//!
//! cargo run -p bga-xray --example inspect_synthetic

use bga_xray::detect::{inspect_image, teach_image};
use bga_xray::inspect::Recipe;
use image::{GrayImage, Luma};

const RADIUS: f32 = 9.0;
const PITCH: f32 = 36.0;

fn board(skip: Option<usize>, bridge: bool) -> GrayImage {
    let centers: Vec<(f32, f32)> = (0..16)
        .filter(|&k| Some(k) != skip)
        .map(|k| (50.0 + PITCH * (k % 4) as f32, 50.0 + PITCH * (k / 4) as f32))
        .collect();
    GrayImage::from_fn(220, 220, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        let ball = centers
            .iter()
            .any(|&(cx, cy)| (fx - cx).powi(2) + (fy - cy).powi(2) <= RADIUS * RADIUS);
        let smear = bridge && (86..=122).contains(&x) && (118..=126).contains(&y);
        Luma([if ball || smear { 45 } else { 190 }])
    })
}

fn main() {
    let base = Recipe {
        model: "BGA-4x4".to_string(),
        ball_radius_px: RADIUS,
        ..Recipe::default()
    };
    let taught = teach_image(&board(None, false), &base);
    println!("taught {} reference points", taught.reference_points.len());

    let outcome = inspect_image(&board(Some(15), true), &taught);
    for shape in &outcome.shapes {
        println!(
            "{:>5} ({:6.1}, {:6.1}) {}",
            shape.state.as_str(),
            shape.center.x,
            shape.center.y,
            shape.diagnostic
        );
    }
    println!("{}", outcome.summary.summary_line());
}
