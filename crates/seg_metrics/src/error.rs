use data_contracts::ValidationError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error(transparent)]
    Contract(#[from] ValidationError),
    #[error("smoothing must be a finite positive number, got {0}")]
    InvalidSmoothing(f64),
    #[error("counts have mismatched lengths: intersection {intersection}, pred {pred}, true {truth}")]
    RaggedCounts {
        intersection: usize,
        pred: usize,
        truth: usize,
    },
    #[error("class {class}: intersection {intersection} exceeds pred {pred} or true {truth} area")]
    InconsistentCounts {
        class: usize,
        intersection: u64,
        pred: u64,
        truth: u64,
    },
}

/// Only finite positive smoothing keeps every score inside (0, 1].
pub fn check_smoothing(smoothing: f64) -> Result<f64, MetricsError> {
    if smoothing > 0.0 && smoothing.is_finite() {
        Ok(smoothing)
    } else {
        Err(MetricsError::InvalidSmoothing(smoothing))
    }
}
