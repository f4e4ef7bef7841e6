//! JSON configuration and report helpers.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::alignment::AlignmentOutcome;
use crate::params::InspectorParams;
use crate::pipeline::{InspectionMode, InspectionOutcome, Inspector};
use crate::recipe::Recipe;
use crate::result::{InspectionSummary, ResultShape};

#[derive(thiserror::Error, Debug)]
pub enum InspectIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, InspectIoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_pretty<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), InspectIoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

impl Recipe {
    /// Load a recipe from JSON on disk. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, InspectIoError> {
        read_json(path)
    }

    /// Write this recipe to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), InspectIoError> {
        write_pretty(self, path)
    }
}

impl InspectorParams {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, InspectIoError> {
        read_json(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), InspectIoError> {
        write_pretty(self, path)
    }
}

/// One inspection job: which image, which recipe, where the report goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectConfig {
    pub image_path: String,
    pub recipe: Recipe,
    #[serde(default)]
    pub params: Option<InspectorParams>,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl InspectConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, InspectIoError> {
        read_json(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), InspectIoError> {
        write_pretty(self, path)
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("bga_inspect_report.json"))
    }

    pub fn build_inspector(&self) -> Inspector {
        Inspector::new(self.recipe.clone(), self.params.clone().unwrap_or_default())
    }
}

/// Flattened alignment result for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub aligned: bool,
    #[serde(default)]
    pub rotation_deg: Option<u16>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub angle_deg: Option<f64>,
    #[serde(default)]
    pub translation: Option<[f64; 2]>,
    #[serde(default)]
    pub correspondences: usize,
    #[serde(default)]
    pub inliers: usize,
    #[serde(default)]
    pub rms_error: Option<f64>,
    #[serde(default)]
    pub failure: Option<String>,
}

impl From<&AlignmentOutcome> for AlignmentReport {
    fn from(outcome: &AlignmentOutcome) -> Self {
        match outcome {
            AlignmentOutcome::Aligned(a) => {
                let t = a.transform.translation();
                Self {
                    aligned: true,
                    rotation_deg: Some(a.rotation_deg),
                    scale: Some(a.transform.scale()),
                    angle_deg: Some(a.transform.angle().to_degrees()),
                    translation: Some([t.x, t.y]),
                    correspondences: a.correspondences.len(),
                    inliers: a.inliers,
                    rms_error: Some(a.rms_error),
                    failure: None,
                }
            }
            AlignmentOutcome::Failed(reason) => Self {
                aligned: false,
                rotation_deg: None,
                scale: None,
                angle_deg: None,
                translation: None,
                correspondences: 0,
                inliers: 0,
                rms_error: None,
                failure: Some(reason.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    pub image_path: String,
    #[serde(default)]
    pub model: String,
    pub mode: InspectionMode,
    pub summary_line: String,
    pub summary: InspectionSummary,
    pub shapes: Vec<ResultShape>,
    #[serde(default)]
    pub alignment: Option<AlignmentReport>,
}

impl InspectReport {
    pub fn new(
        image_path: impl Into<String>,
        model: impl Into<String>,
        outcome: InspectionOutcome,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            model: model.into(),
            mode: outcome.mode,
            summary_line: outcome.summary.summary_line(),
            alignment: outcome.alignment.as_ref().map(AlignmentReport::from),
            summary: outcome.summary,
            shapes: outcome.shapes,
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, InspectIoError> {
        read_json(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), InspectIoError> {
        write_pretty(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bga_xray_core::GrayImage;
    use nalgebra::Point2;

    #[test]
    fn recipe_survives_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("recipe.json");
        let recipe = Recipe {
            model: "BGA-9".to_string(),
            ball_radius_px: 10.0,
            ..Recipe::default()
        }
        .with_reference_points(vec![Point2::new(60.0, 60.0), Point2::new(100.0, 60.0)]);
        recipe.write_json(&path).expect("write");
        let loaded = Recipe::load_json(&path).expect("load");
        assert_eq!(loaded, recipe);
    }

    #[test]
    fn config_defaults_output_path() {
        let cfg: InspectConfig =
            serde_json::from_str(r#"{"image_path":"board.png","recipe":{}}"#).expect("parse");
        assert_eq!(cfg.output_path(), PathBuf::from("bga_inspect_report.json"));
        assert!(cfg.params.is_none());
        assert_eq!(cfg.build_inspector().params().grid_search.max_iterations, 50);
    }

    #[test]
    fn report_keeps_summary_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.json");
        let img = GrayImage::new(32, 32, 200);
        let outcome = Inspector::with_recipe(Recipe {
            target_ball_count: 4,
            ..Recipe::default()
        })
        .inspect(&img.view());
        let report = InspectReport::new("blank.png", "BGA-4", outcome);
        assert_eq!(report.mode, InspectionMode::AdHoc);
        assert_eq!(report.summary_line, "NG Missing (M:4, S:0)");
        assert!(report.alignment.is_none());

        report.write_json(&path).expect("write");
        let loaded = InspectReport::load_json(&path).expect("load");
        assert_eq!(loaded.summary, report.summary);
        assert_eq!(loaded.model, "BGA-4");
    }

    #[test]
    fn failed_alignment_is_flattened() {
        let outcome = AlignmentOutcome::Failed(crate::alignment::AlignmentFailure::NoReference);
        let report = AlignmentReport::from(&outcome);
        assert!(!report.aligned);
        assert_eq!(report.failure.as_deref(), Some("no reference points"));
        assert!(report.rotation_deg.is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Recipe::load_json(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, InspectIoError::Io(_)));
    }
}
