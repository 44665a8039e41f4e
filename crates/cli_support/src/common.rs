use clap::{Args, ValueEnum};
use seg_dataset::{LabelResample, OutOfRangePolicy};
use std::path::PathBuf;

use crate::config::{ConfigError, PipelineConfig};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleArg {
    Nearest,
    Bilinear,
}

impl From<ResampleArg> for LabelResample {
    fn from(arg: ResampleArg) -> Self {
        match arg {
            ResampleArg::Nearest => LabelResample::Nearest,
            ResampleArg::Bilinear => LabelResample::Bilinear,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeArg {
    Reject,
    Clamp,
}

impl From<RangeArg> for OutOfRangePolicy {
    fn from(arg: RangeArg) -> Self {
        match arg {
            RangeArg::Reject => OutOfRangePolicy::Reject,
            RangeArg::Clamp => OutOfRangePolicy::Clamp,
        }
    }
}

/// Config file, catalog, dataset, and input options shared by train/eval.
///
/// Every flag is optional; unset flags keep the value from the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct PipelineArgs {
    /// Pipeline config TOML (falls back to $SEGKIT_CONFIG, then ./segkit.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Class catalog file (.toml or .json); built-in 12-class catalog by default.
    #[arg(long)]
    pub classes: Option<PathBuf>,
    /// Dataset root holding images_prepped_*/annotations_prepped_* directories.
    #[arg(long)]
    pub dataset_root: Option<PathBuf>,
    /// Network input width (multiple of 32).
    #[arg(long)]
    pub width: Option<u32>,
    /// Network input height (multiple of 32).
    #[arg(long)]
    pub height: Option<u32>,
    /// How label maps are resized to the input size.
    #[arg(long, value_enum)]
    pub label_resample: Option<ResampleArg>,
    /// Handling of label values outside the catalog.
    #[arg(long, value_enum)]
    pub out_of_range: Option<RangeArg>,
}

impl PipelineArgs {
    /// Load the config file and apply the command-line overrides.
    pub fn resolve(&self) -> Result<PipelineConfig, ConfigError> {
        let mut cfg = PipelineConfig::load(self.config.as_deref())?;
        self.apply(&mut cfg);
        Ok(cfg)
    }

    pub fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(path) = &self.classes {
            cfg.catalog_path = Some(path.clone());
        }
        if let Some(root) = &self.dataset_root {
            cfg.dataset_root = root.clone();
        }
        if let Some(width) = self.width {
            cfg.input_width = width;
        }
        if let Some(height) = self.height {
            cfg.input_height = height;
        }
        if let Some(mode) = self.label_resample {
            cfg.label_resample = mode.into();
        }
        if let Some(policy) = self.out_of_range {
            cfg.out_of_range = policy.into();
        }
    }
}

/// Optional metrics report output.
#[derive(Debug, Clone, Default, Args)]
pub struct ReportArgs {
    /// Write the per-class metrics report as JSON to this path.
    #[arg(long)]
    pub json_out: Option<PathBuf>,
}
