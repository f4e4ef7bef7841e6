mod common;

use std::f64::consts::FRAC_PI_2;

use approx::assert_abs_diff_eq;
use bga_xray_inspect::{
    align, classify_presence, detect_blobs, detect_bridges, expand_grid, AlignmentFailure,
    AlignmentParams, BridgeKind, BridgeParams, DetectedBlob, GrayImage, GridSearchParams,
    Presence, PresenceParams, Provenance, Recipe, Roi, Similarity2,
};
use bga_xray_core::PixelRect;
use common::{balls_image, lattice, nearest_distance, paint_disc, paint_rect, BACKGROUND, SOLDER};
use nalgebra::{Point2, Vector2};

fn seed_blob(x: f32, y: f32) -> DetectedBlob {
    DetectedBlob::from_area(
        Point2::new(x, y),
        314.0,
        0.9,
        Vec::new(),
        Provenance::Segmented,
    )
}

#[test]
fn every_disc_becomes_one_blob() {
    let truth = vec![
        Point2::new(40.0, 40.0),
        Point2::new(95.5, 42.3),
        Point2::new(150.2, 38.7),
        Point2::new(200.0, 45.0),
        Point2::new(45.0, 120.0),
        Point2::new(100.7, 118.1),
        Point2::new(160.0, 130.5),
    ];
    let img = balls_image(240, 180, &truth, 9.0);
    let recipe = Recipe {
        ball_radius_px: 9.0,
        ..Recipe::default()
    };
    let blobs = detect_blobs(&img.view(), &recipe);
    assert_eq!(blobs.len(), truth.len());

    let centers: Vec<Point2<f32>> = blobs.iter().map(|b| b.center).collect();
    for t in &truth {
        assert!(nearest_distance(*t, &centers) < 1.0, "no blob near {t:?}");
    }
    for b in &blobs {
        assert_abs_diff_eq!(b.diameter, 18.0, epsilon = 2.5);
        assert!(b.circularity >= recipe.min_circularity);
    }
}

#[test]
fn specks_and_slivers_are_filtered() {
    let mut img = GrayImage::new(200, 100, BACKGROUND);
    paint_disc(&mut img, 40.0, 50.0, 9.0, SOLDER);
    // below min area
    paint_disc(&mut img, 100.0, 50.0, 2.0, SOLDER);
    // long thin trace: large enough but far from round
    paint_rect(&mut img, 130, 48, 195, 51, SOLDER);
    let recipe = Recipe {
        ball_radius_px: 9.0,
        min_circularity: 0.5,
        ..Recipe::default()
    };
    let blobs = detect_blobs(&img.view(), &recipe);
    assert_eq!(blobs.len(), 1);
    assert!((blobs[0].center - Point2::new(40.0, 50.0)).norm() < 1.0);
}

#[test]
fn roi_is_intersected_with_image() {
    let centers = [
        Point2::new(40.0, 40.0),
        Point2::new(150.0, 150.0),
        Point2::new(40.0, 150.0),
    ];
    let img = balls_image(200, 200, &centers, 9.0);
    let recipe = Recipe {
        ball_radius_px: 9.0,
        roi: Some(Roi::new(-50, -50, 150, 150)),
        ..Recipe::default()
    };
    assert_eq!(
        recipe.processing_rect(200, 200),
        PixelRect {
            x: 0,
            y: 0,
            width: 100,
            height: 100
        }
    );
    let blobs = detect_blobs(&img.view(), &recipe);
    assert_eq!(blobs.len(), 1);
    assert!((blobs[0].center - centers[0]).norm() < 1.0);

    for roi in [
        Roi::new(500, 500, 50, 50),
        Roi::new(-300, 20, 100, 100),
        Roi::new(190, 190, 10_000, 10_000),
    ] {
        let recipe = Recipe {
            roi: Some(roi),
            ..recipe.clone()
        };
        let blobs = detect_blobs(&img.view(), &recipe);
        assert!(blobs.is_empty(), "roi {roi:?} should see nothing");
    }
}

#[test]
fn grid_growth_recovers_lattice_without_duplicates() {
    let truth = lattice(5, 5, 40.0, 40.0);
    let img = balls_image(240, 240, &truth, 10.0);
    let recipe = Recipe {
        ball_radius_px: 10.0,
        ..Recipe::default()
    };
    let seeds = vec![seed_blob(40.0, 40.0), seed_blob(80.0, 40.0)];
    let balls = expand_grid(&img.view(), seeds, &recipe, &GridSearchParams::default());

    assert_eq!(balls.len(), 25);
    assert_eq!(balls[0].provenance, Provenance::Segmented);
    assert!(balls[2..]
        .iter()
        .all(|b| b.provenance == Provenance::GridSearch));
    let centers: Vec<Point2<f32>> = balls.iter().map(|b| b.center).collect();
    for t in &truth {
        assert!(nearest_distance(*t, &centers) < 0.5);
    }
    for (i, a) in centers.iter().enumerate() {
        for b in &centers[i + 1..] {
            assert!((a - b).norm() >= 20.0);
        }
    }
}

#[test]
fn grid_growth_respects_iteration_cap() {
    let row: Vec<Point2<f32>> = (0..6)
        .map(|i| Point2::new(40.0 + 40.0 * i as f32, 50.0))
        .collect();
    let img = balls_image(300, 100, &row, 10.0);
    let recipe = Recipe {
        ball_radius_px: 10.0,
        ..Recipe::default()
    };
    let seeds = vec![seed_blob(40.0, 50.0), seed_blob(80.0, 50.0)];

    let capped = GridSearchParams {
        max_iterations: 1,
        ..GridSearchParams::default()
    };
    let one_pass = expand_grid(&img.view(), seeds.clone(), &recipe, &capped);
    assert_eq!(one_pass.len(), 3);

    let full = expand_grid(&img.view(), seeds, &recipe, &GridSearchParams::default());
    assert_eq!(full.len(), 6);
}

#[test]
fn grid_growth_ignores_large_dark_regions() {
    let img = GrayImage::new(100, 100, 0);
    let recipe = Recipe {
        ball_radius_px: 10.0,
        ..Recipe::default()
    };
    let seeds = vec![seed_blob(30.0, 50.0), seed_blob(60.0, 50.0)];
    let out = expand_grid(&img.view(), seeds, &recipe, &GridSearchParams::default());
    assert_eq!(out.len(), 2);
}

#[test]
fn alignment_recovers_quarter_turn_scale_and_shift() {
    let reference: Vec<Point2<f32>> = lattice(5, 5, 100.0, 30.0)
        .into_iter()
        .enumerate()
        .filter(|(k, _)| ![0, 1, 5].contains(k))
        .map(|(_, p)| p)
        .collect();
    let truth = Similarity2::from_parts(1.05, FRAC_PI_2, Vector2::new(400.0, 50.0));
    let blobs: Vec<Point2<f32>> = reference
        .iter()
        .enumerate()
        .map(|(k, &p)| {
            let jitter = ((k * 37) % 17) as f32 / 17.0 - 0.5;
            truth.apply(p) + Vector2::new(1.6 * jitter, -1.2 * jitter)
        })
        .collect();

    let outcome = align(&blobs, &reference, 8.0, &AlignmentParams::default());
    let a = outcome.aligned().expect("aligned");
    assert_eq!(a.rotation_deg, 90);
    assert_eq!(a.inliers, reference.len());
    assert_abs_diff_eq!(a.transform.scale(), 1.05, epsilon = 0.01);
    assert_abs_diff_eq!(a.transform.angle(), FRAC_PI_2, epsilon = 0.01);
    for (p, b) in a.aligned_points.iter().zip(&blobs) {
        assert!((p - b).norm() < 2.0);
    }
}

#[test]
fn alignment_requires_ten_percent_of_reference() {
    // 6x6 lattice about (175, 175); 36 points need 4 correspondences.
    let reference = lattice(6, 6, 100.0, 30.0);
    let center = Point2::new(175.0f32, 175.0);
    let with_hits = |hits: &[usize]| {
        let mut blobs: Vec<Point2<f32>> = hits.iter().map(|&k| reference[k]).collect();
        // Two far decoys keep the blob centroid on the lattice centre.
        let n = (hits.len() + 2) as f32;
        let rest = blobs
            .iter()
            .fold(center.coords * n, |acc, p| acc - p.coords)
            / 2.0;
        blobs.push(Point2::from(rest + Vector2::new(1000.0, 0.0)));
        blobs.push(Point2::from(rest - Vector2::new(1000.0, 0.0)));
        blobs
    };

    let outcome = align(
        &with_hits(&[0, 7, 14]),
        &reference,
        8.0,
        &AlignmentParams::default(),
    );
    assert_eq!(
        outcome.failure(),
        Some(&AlignmentFailure::TooFewCorrespondences {
            needed: 4,
            matched: 3
        })
    );

    let outcome = align(
        &with_hits(&[0, 7, 14, 21]),
        &reference,
        8.0,
        &AlignmentParams::default(),
    );
    let a = outcome.aligned().expect("four hits suffice");
    assert_eq!(a.rotation_deg, 0);
    for (p, r) in a.aligned_points.iter().zip(&reference) {
        assert!((p - r).norm() < 0.1);
    }
}

#[test]
fn presence_boundary_is_strict() {
    // radius 10 -> half-width 6 -> 12x12 patch at [14, 26)
    let mut img = GrayImage::new(40, 40, BACKGROUND);
    let params = PresenceParams::default();
    let center = Point2::new(20.0, 20.0);
    paint_rect(&mut img, 14, 14, 25, 16, SOLDER);
    assert_eq!(
        classify_presence(&img.view(), center, 10.0, 100, 25.0, &params),
        Presence::Absent
    );
    img.set(14, 17, SOLDER);
    assert_eq!(
        classify_presence(&img.view(), center, 10.0, 100, 25.0, &params),
        Presence::Present
    );
}

#[test]
fn bridge_continuity() {
    let balls = [Point2::new(30.0, 30.0), Point2::new(70.0, 30.0)];
    let mut img = balls_image(100, 60, &balls, 8.0);
    paint_rect(&mut img, 30, 28, 70, 32, SOLDER);
    let params = BridgeParams::default();

    let scan = detect_bridges(&img.view(), &balls, 8.0, 60, &params);
    assert_eq!(scan.bridges.len(), 1);
    assert_eq!(scan.bridges[0].kind, BridgeKind::DarkPath);
    assert!(scan.downgraded.contains(&0) && scan.downgraded.contains(&1));

    // Knock one pixel out of the middle of the bar.
    paint_rect(&mut img, 50, 28, 50, 32, BACKGROUND);
    let scan = detect_bridges(&img.view(), &balls, 8.0, 60, &params);
    assert!(scan.bridges.is_empty());

    let blank = GrayImage::new(100, 60, 255);
    let touching = [Point2::new(30.0, 30.0), Point2::new(44.0, 30.0)];
    let scan = detect_bridges(&blank.view(), &touching, 8.0, 60, &params);
    assert_eq!(scan.bridges.len(), 1);
    assert_eq!(scan.bridges[0].kind, BridgeKind::Overlap);
}
