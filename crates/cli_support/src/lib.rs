//! Shared plumbing for the segmentation command-line tools: clap argument groups,
//! the `segkit.toml` pipeline config, and tracing setup.

pub mod common;
pub mod config;
pub mod logging;

pub use common::{PipelineArgs, RangeArg, ReportArgs, ResampleArg};
pub use config::{ConfigError, PipelineConfig, CONFIG_ENV, DEFAULT_CONFIG_NAME};
pub use logging::{init_logging, LoggingError};
