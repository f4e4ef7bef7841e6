use std::path::Path;

use assert_cmd::Command;
use image::{GrayImage, Luma};
use predicates::prelude::*;

const RADIUS: f32 = 10.0;

fn lattice() -> Vec<(f32, f32)> {
    let mut out = Vec::new();
    for j in 0..3 {
        for i in 0..3 {
            out.push((60.0 + 40.0 * i as f32, 60.0 + 40.0 * j as f32));
        }
    }
    out
}

fn board(centers: &[(f32, f32)], smear: bool) -> GrayImage {
    GrayImage::from_fn(200, 200, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        let on_ball = centers
            .iter()
            .any(|&(cx, cy)| (fx - cx).powi(2) + (fy - cy).powi(2) <= RADIUS * RADIUS);
        let on_smear = smear && (60..=100).contains(&x) && (56..=64).contains(&y);
        if on_ball || on_smear {
            Luma([40])
        } else {
            Luma([200])
        }
    })
}

fn write_recipe(path: &Path) {
    std::fs::write(path, r#"{ "model": "BGA-3x3", "ball_radius_px": 10.0 }"#).expect("recipe");
}

fn bga_xray() -> Command {
    Command::cargo_bin("bga-xray").expect("binary built")
}

#[test]
fn teach_then_inspect_reports_defects() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().join("base.json");
    let taught = dir.path().join("taught.json");
    let golden = dir.path().join("golden.png");
    let defect = dir.path().join("defect.png");
    let report = dir.path().join("report.json");

    write_recipe(&base);
    board(&lattice(), false).save(&golden).expect("golden");
    let mut damaged = lattice();
    damaged.remove(8);
    board(&damaged, true).save(&defect).expect("defect");

    bga_xray()
        .args(["teach", "--recipe"])
        .arg(&base)
        .arg("--image")
        .arg(&golden)
        .arg("--out")
        .arg(&taught)
        .assert()
        .success()
        .stdout(predicate::str::contains("taught 9 balls"));

    let recipe: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&taught).expect("taught recipe"))
            .expect("json");
    assert_eq!(recipe["target_ball_count"], 9);
    assert_eq!(recipe["reference_points"].as_array().map(Vec::len), Some(9));

    bga_xray()
        .args(["inspect", "--recipe"])
        .arg(&taught)
        .arg("--image")
        .arg(&defect)
        .arg("--out")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("NG Both (M:1, S:1)"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).expect("report")).expect("json");
    assert_eq!(written["model"], "BGA-3x3");
    assert_eq!(written["mode"], "taught");
    assert_eq!(written["alignment"]["aligned"], true);
    assert_eq!(written["summary"]["missing_indices"][0], 8);
}

#[test]
fn config_job_uses_its_output_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = dir.path().join("board.png");
    let config = dir.path().join("job.json");
    let report = dir.path().join("out.json");
    board(&lattice(), false).save(&image).expect("image");

    let job = serde_json::json!({
        "image_path": image,
        "recipe": { "model": "BGA-3x3", "ball_radius_px": 10.0, "target_ball_count": 9 },
        "output_path": report,
    });
    std::fs::write(&config, job.to_string()).expect("config");

    bga_xray()
        .args(["run", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("OK NA (M:0, S:0)"));
    assert!(report.exists());
}

#[test]
fn missing_recipe_fails_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    bga_xray()
        .args(["inspect", "--recipe"])
        .arg(dir.path().join("nope.json"))
        .arg("--image")
        .arg(dir.path().join("nope.png"))
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"));
}

#[test]
fn unknown_log_level_is_rejected() {
    bga_xray()
        .args(["--log-level", "loud", "run", "--config", "job.json"])
        .assert()
        .failure();
}
