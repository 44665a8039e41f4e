//! Core types, error definitions, and data structures for seg_dataset.

use data_contracts::{LabelMap, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, SegDatasetError>;

#[derive(Debug, Error)]
pub enum SegDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("label file missing for image {image}: expected {label}")]
    MissingLabel { image: PathBuf, label: PathBuf },
    #[error("invalid sample {path}: {source}")]
    Sample {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
    #[error(transparent)]
    Contract(#[from] ValidationError),
    #[error("cannot assemble an empty batch")]
    EmptyBatch,
    #[error("{0}")]
    Other(String),
}

/// How label maps are resampled when the pipeline resizes a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelResample {
    /// Pick the source pixel under each target pixel center; class ids are preserved.
    #[default]
    Nearest,
    /// Interpolate class ids as continuous values, then truncate. Invents intermediate
    /// classes along boundaries; only useful to reproduce legacy preprocessing.
    Bilinear,
}

/// What to do with label values outside `[0, classes)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Fail the sample with `OutOfRangeClass`.
    #[default]
    Reject,
    /// Map offending pixels to the last class (`classes - 1`) and log a warning.
    Clamp,
}

/// Parallel image/label directories under a common root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub images_subdir: String,
    pub labels_subdir: String,
}

impl DatasetLayout {
    pub fn train(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            images_subdir: "images_prepped_train".to_string(),
            labels_subdir: "annotations_prepped_train".to_string(),
        }
    }

    pub fn test(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            images_subdir: "images_prepped_test".to_string(),
            labels_subdir: "annotations_prepped_test".to_string(),
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(&self.images_subdir)
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join(&self.labels_subdir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairIndex {
    /// File stem shared by the image and its label.
    pub id: String,
    pub image_path: PathBuf,
    pub label_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SegSample {
    pub id: String,
    /// Image in CHW layout, normalized to [-1, 1].
    pub image_chw: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub label: LabelMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total: usize,
    pub ok: usize,
    pub missing_label: usize,
    pub undecodable: usize,
    pub shape_mismatch: usize,
    pub out_of_range: usize,
    /// Pixel count per class across all readable labels (index = class id).
    pub class_pixels: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Pass,
    Warn,
    Fail,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Pass => "pass",
            ValidationOutcome::Warn => "warn",
            ValidationOutcome::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationThresholds {
    pub max_missing: Option<usize>,
    pub max_invalid: Option<usize>,
    pub max_missing_ratio: Option<f32>,
    pub max_invalid_ratio: Option<f32>,
}

impl ValidationThresholds {
    pub fn from_env() -> Self {
        fn parse_usize(key: &str) -> Option<usize> {
            std::env::var(key).ok()?.parse().ok()
        }
        fn parse_ratio(key: &str) -> Option<f32> {
            std::env::var(key).ok()?.parse().ok()
        }
        ValidationThresholds {
            max_missing: parse_usize("SEG_DATASET_MAX_MISSING"),
            max_invalid: parse_usize("SEG_DATASET_MAX_INVALID"),
            max_missing_ratio: parse_ratio("SEG_DATASET_MAX_MISSING_RATIO"),
            max_invalid_ratio: parse_ratio("SEG_DATASET_MAX_INVALID_RATIO"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    pub reasons: Vec<String>,
    pub summary: DatasetSummary,
}
