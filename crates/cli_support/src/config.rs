use std::path::{Path, PathBuf};

use data_contracts::{CatalogError, ClassCatalog};
use seg_dataset::{
    DatasetLayout, LabelResample, OutOfRangePolicy, TransformPipelineBuilder, DEFAULT_TARGET_SIZE,
};
use seg_metrics::{check_smoothing, MetricsError};
use serde::Deserialize;

pub const DEFAULT_CONFIG_NAME: &str = "segkit.toml";
pub const CONFIG_ENV: &str = "SEGKIT_CONFIG";
const DEFAULT_DATASET_ROOT: &str = "dataset1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("invalid [metrics] section: {0}")]
    Metrics(#[from] MetricsError),
}

/// Settings shared by the training and evaluation tools, after defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Class catalog file; the built-in 12-class catalog when unset.
    pub catalog_path: Option<PathBuf>,
    pub dataset_root: PathBuf,
    pub train_images: String,
    pub train_labels: String,
    pub test_images: String,
    pub test_labels: String,
    pub input_width: u32,
    pub input_height: u32,
    pub label_resample: LabelResample,
    pub out_of_range: OutOfRangePolicy,
    pub flip_horizontal_prob: f32,
    pub smoothing: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let train = DatasetLayout::train(DEFAULT_DATASET_ROOT);
        let test = DatasetLayout::test(DEFAULT_DATASET_ROOT);
        Self {
            catalog_path: None,
            dataset_root: train.root,
            train_images: train.images_subdir,
            train_labels: train.labels_subdir,
            test_images: test.images_subdir,
            test_labels: test.labels_subdir,
            input_width: DEFAULT_TARGET_SIZE.0,
            input_height: DEFAULT_TARGET_SIZE.1,
            label_resample: LabelResample::default(),
            out_of_range: OutOfRangePolicy::default(),
            flip_horizontal_prob: 0.0,
            smoothing: seg_metrics::DEFAULT_SMOOTHING,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    catalog: Option<CatalogSection>,
    dataset: Option<DatasetSection>,
    input: Option<InputSection>,
    metrics: Option<MetricsSection>,
}

#[derive(Debug, Deserialize, Default)]
struct CatalogSection {
    path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DatasetSection {
    root: Option<String>,
    train_images: Option<String>,
    train_labels: Option<String>,
    test_images: Option<String>,
    test_labels: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct InputSection {
    width: Option<u32>,
    height: Option<u32>,
    label_resample: Option<LabelResample>,
    out_of_range: Option<OutOfRangePolicy>,
    flip_horizontal_prob: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct MetricsSection {
    smoothing: Option<f64>,
}

impl PipelineConfig {
    /// Resolve the config source: an explicit path, then `SEGKIT_CONFIG`, then
    /// `segkit.toml` in the working directory, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let cfg = if let Some(path) = explicit {
            Self::from_path(path)?
        } else if let Ok(path) = std::env::var(CONFIG_ENV) {
            Self::from_path(Path::new(&path))?
        } else if Path::new(DEFAULT_CONFIG_NAME).exists() {
            Self::from_path(Path::new(DEFAULT_CONFIG_NAME))?
        } else {
            Self::default()
        };
        cfg.validate()?;
        cfg.warn_if_invalid();
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        tracing::debug!(path = %path.display(), "loaded pipeline config");
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        let file: PipelineConfigFile = toml::from_str(raw)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let defaults = Self::default();
        let dataset = file.dataset.unwrap_or_default();
        let input = file.input.unwrap_or_default();
        Self {
            catalog_path: file
                .catalog
                .and_then(|c| c.path)
                .filter(|p| !p.trim().is_empty())
                .map(|p| expand_path(&p)),
            dataset_root: dataset
                .root
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.dataset_root),
            train_images: dataset.train_images.unwrap_or(defaults.train_images),
            train_labels: dataset.train_labels.unwrap_or(defaults.train_labels),
            test_images: dataset.test_images.unwrap_or(defaults.test_images),
            test_labels: dataset.test_labels.unwrap_or(defaults.test_labels),
            input_width: input.width.unwrap_or(defaults.input_width),
            input_height: input.height.unwrap_or(defaults.input_height),
            label_resample: input.label_resample.unwrap_or(defaults.label_resample),
            out_of_range: input.out_of_range.unwrap_or(defaults.out_of_range),
            flip_horizontal_prob: input
                .flip_horizontal_prob
                .unwrap_or(defaults.flip_horizontal_prob),
            smoothing: file
                .metrics
                .and_then(|m| m.smoothing)
                .unwrap_or(defaults.smoothing),
        }
    }

    fn warn_if_invalid(&self) {
        if self.input_width == 0 || self.input_height == 0 {
            tracing::warn!(
                "pipeline config: input size {}x{} is empty; pairs will be rejected",
                self.input_width,
                self.input_height
            );
        } else if self.input_width % 32 != 0 || self.input_height % 32 != 0 {
            tracing::warn!(
                "pipeline config: input size {}x{} is not a multiple of 32; FCN-8 will refuse it",
                self.input_width,
                self.input_height
            );
        }
        if !(0.0..=1.0).contains(&self.flip_horizontal_prob) {
            tracing::warn!(
                "pipeline config: input.flip_horizontal_prob = {} is outside [0, 1]",
                self.flip_horizontal_prob
            );
        }
    }

    /// Checks that fail the load; `warn_if_invalid` only logs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_smoothing(self.smoothing)?;
        Ok(())
    }

    pub fn catalog(&self) -> Result<ClassCatalog, ConfigError> {
        match &self.catalog_path {
            Some(path) => Ok(ClassCatalog::from_path(path)?),
            None => Ok(ClassCatalog::reference()),
        }
    }

    pub fn train_layout(&self) -> DatasetLayout {
        DatasetLayout {
            root: self.dataset_root.clone(),
            images_subdir: self.train_images.clone(),
            labels_subdir: self.train_labels.clone(),
        }
    }

    pub fn test_layout(&self) -> DatasetLayout {
        DatasetLayout {
            root: self.dataset_root.clone(),
            images_subdir: self.test_images.clone(),
            labels_subdir: self.test_labels.clone(),
        }
    }

    /// Transform pipeline for `classes` classes at the configured input size.
    pub fn pipeline_builder(&self, classes: usize) -> TransformPipelineBuilder {
        TransformPipelineBuilder::new(classes)
            .target_size(Some((self.input_width, self.input_height)))
            .label_resample(self.label_resample)
            .out_of_range(self.out_of_range)
            .flip_horizontal_prob(self.flip_horizontal_prob)
    }
}

fn expand_path(raw: &str) -> PathBuf {
    if let Some(stripped) = raw.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(format!("{home}{stripped}"));
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!((cfg.input_width, cfg.input_height), (224, 224));
        assert_eq!(cfg.label_resample, LabelResample::Nearest);
        assert_eq!(cfg.out_of_range, OutOfRangePolicy::Reject);
        assert_eq!(cfg.train_layout().images_subdir, "images_prepped_train");
        assert_eq!(cfg.test_layout().labels_subdir, "annotations_prepped_test");
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [dataset]
            root = "/data/camvid"
            test_images = "imgs_val"

            [input]
            width = 320
            height = 160
            label_resample = "bilinear"
            out_of_range = "clamp"

            [metrics]
            smoothing = 1e-3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.dataset_root, PathBuf::from("/data/camvid"));
        assert_eq!(cfg.test_images, "imgs_val");
        assert_eq!(cfg.test_labels, "annotations_prepped_test");
        assert_eq!((cfg.input_width, cfg.input_height), (320, 160));
        assert_eq!(cfg.label_resample, LabelResample::Bilinear);
        assert_eq!(cfg.out_of_range, OutOfRangePolicy::Clamp);
        assert_eq!(cfg.smoothing, 1e-3);

        let pipeline = cfg.pipeline_builder(12).build().unwrap();
        assert_eq!(pipeline.target_size, Some((320, 160)));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        assert!(PipelineConfig::from_toml_str("[input]\nout_of_range = \"wrap\"").is_err());
    }

    #[test]
    fn non_positive_smoothing_fails_validation() {
        for raw in ["[metrics]\nsmoothing = 0.0", "[metrics]\nsmoothing = -0.5"] {
            let cfg = PipelineConfig::from_toml_str(raw).unwrap();
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::Metrics(MetricsError::InvalidSmoothing(_)))
            ));
        }
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn default_catalog_is_reference() {
        let catalog = PipelineConfig::default().catalog().unwrap();
        assert_eq!(catalog.len(), 12);
        assert_eq!(catalog.name(11), Some("void"));
    }
}
