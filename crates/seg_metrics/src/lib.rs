//! Overlap metrics for semantic segmentation.
//!
//! For every class `c` the engine counts, over all pixels of all evaluated images:
//!
//! - `intersection(c)`: predicted `c` and truth `c`
//! - `pred_area(c)`, `true_area(c)`: pixels predicted / labeled `c`
//!
//! and derives
//!
//! ```text
//! IoU(c)  = (intersection + eps) / (pred_area + true_area - intersection + eps)
//! Dice(c) = (2 * intersection + eps) / (pred_area + true_area + eps)
//! ```
//!
//! Batches are scored over the pooled population: counts are summed across images
//! before any ratio is taken. A class absent from both maps scores exactly 1.0.
//! `eps` must be finite and positive; anything else is a [`MetricsError`].

pub mod counts;
pub mod error;
pub mod report;

pub use counts::{CountsFile, OverlapCounts, PerClassMetrics};
pub use error::{check_smoothing, MetricsError};
pub use report::{ClassScore, MetricsReport};

use data_contracts::{LabelMap, ValidationError};

/// Smoothing added to both numerator and denominator of each ratio.
pub const DEFAULT_SMOOTHING: f64 = 1e-5;

/// Per-class IoU and Dice for one predicted/truth pair.
pub fn per_class_metrics(
    pred: &LabelMap,
    truth: &LabelMap,
    classes: usize,
    smoothing: f64,
) -> Result<PerClassMetrics, MetricsError> {
    check_smoothing(smoothing)?;
    let mut counts = OverlapCounts::new(classes);
    counts.accumulate(pred, truth)?;
    counts.scores(smoothing)
}

/// Per-class IoU and Dice over a stack of images, pooled before taking ratios.
pub fn per_class_metrics_batch(
    preds: &[LabelMap],
    truths: &[LabelMap],
    classes: usize,
    smoothing: f64,
) -> Result<PerClassMetrics, MetricsError> {
    check_smoothing(smoothing)?;
    if preds.len() != truths.len() {
        return Err(ValidationError::BufferLength {
            expected: truths.len(),
            actual: preds.len(),
        }
        .into());
    }
    let mut counts = OverlapCounts::new(classes);
    for (pred, truth) in preds.iter().zip(truths) {
        counts.accumulate(pred, truth)?;
    }
    counts.scores(smoothing)
}
