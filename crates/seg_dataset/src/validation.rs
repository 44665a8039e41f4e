//! Dataset validation and quality checks.

use crate::pairs::summarize_layout;
use crate::types::{
    DatasetLayout, DatasetResult, DatasetSummary, ValidationOutcome, ValidationReport,
    ValidationThresholds,
};

/// Outcome and reasons gathered while checking one summary.
struct Findings {
    outcome: ValidationOutcome,
    reasons: Vec<String>,
    total: usize,
}

impl Findings {
    fn new(total: usize) -> Self {
        Self {
            outcome: ValidationOutcome::Pass,
            reasons: Vec::new(),
            total,
        }
    }

    fn warn(&mut self, reason: String) {
        if self.outcome == ValidationOutcome::Pass {
            self.outcome = ValidationOutcome::Warn;
        }
        self.reasons.push(reason);
    }

    fn fail(&mut self, reason: String) {
        self.outcome = ValidationOutcome::Fail;
        self.reasons.push(reason);
    }

    /// One line per non-empty pair category, e.g. "2/10 pairs: label shape differs from image".
    fn pairs(&mut self, count: usize, what: &str) {
        if count > 0 {
            self.warn(format!("{count}/{} pairs: {what}", self.total));
        }
    }

    fn limit(&mut self, group: &str, count: usize, max: Option<usize>, max_ratio: Option<f32>) {
        if let Some(max) = max.filter(|&max| count > max) {
            self.fail(format!("{group}: {count} pairs exceeds max {max}"));
        }
        let ratio = count as f32 / self.total.max(1) as f32;
        if let Some(max_ratio) = max_ratio.filter(|&r| ratio > r) {
            self.fail(format!(
                "{group}: ratio {ratio:.3} exceeds max {max_ratio:.3}"
            ));
        }
    }
}

/// Grade a dataset summary. Each problem category gets its own reason; the
/// thresholds apply to missing labels and to the pooled unusable pairs
/// (undecodable, wrong shape, or class ids outside the catalog).
pub fn validate_summary(
    summary: DatasetSummary,
    thresholds: &ValidationThresholds,
) -> ValidationReport {
    let mut findings = Findings::new(summary.total);
    if summary.total == 0 {
        findings.fail("no image files found".to_string());
    }

    findings.pairs(summary.missing_label, "no label map");
    findings.pairs(summary.undecodable, "image or label could not be decoded");
    findings.pairs(summary.shape_mismatch, "label shape differs from image");
    findings.pairs(summary.out_of_range, "label holds a class id outside the catalog");

    let unusable = summary.undecodable + summary.shape_mismatch + summary.out_of_range;
    findings.limit(
        "missing labels",
        summary.missing_label,
        thresholds.max_missing,
        thresholds.max_missing_ratio,
    );
    findings.limit(
        "unusable pairs",
        unusable,
        thresholds.max_invalid,
        thresholds.max_invalid_ratio,
    );

    if summary.ok > 0 {
        let absent: Vec<String> = summary
            .class_pixels
            .iter()
            .enumerate()
            .filter(|&(_, &pixels)| pixels == 0)
            .map(|(class, _)| class.to_string())
            .collect();
        if !absent.is_empty() {
            findings.warn(format!("classes with no labeled pixels: {}", absent.join(", ")));
        }
    }

    ValidationReport {
        outcome: findings.outcome,
        reasons: findings.reasons,
        summary,
    }
}

pub fn summarize_with_thresholds(
    layout: &DatasetLayout,
    classes: usize,
    thresholds: &ValidationThresholds,
) -> DatasetResult<ValidationReport> {
    let summary = summarize_layout(layout, classes)?;
    Ok(validate_summary(summary, thresholds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total: usize, ok: usize, missing: usize, out_of_range: usize) -> DatasetSummary {
        DatasetSummary {
            total,
            ok,
            missing_label: missing,
            out_of_range,
            ..Default::default()
        }
    }

    #[test]
    fn clean_summary_passes() {
        let report = validate_summary(summary(4, 4, 0, 0), &ValidationThresholds::default());
        assert_eq!(report.outcome, ValidationOutcome::Pass);
        assert!(report.reasons.is_empty());
    }

    #[test]
    fn issues_without_thresholds_warn() {
        let report = validate_summary(summary(4, 3, 1, 0), &ValidationThresholds::default());
        assert_eq!(report.outcome, ValidationOutcome::Warn);
        assert_eq!(report.reasons, vec!["1/4 pairs: no label map".to_string()]);
    }

    #[test]
    fn each_category_is_reported_separately() {
        let s = DatasetSummary {
            total: 10,
            ok: 6,
            undecodable: 1,
            shape_mismatch: 2,
            out_of_range: 1,
            class_pixels: vec![40, 0, 12],
            ..Default::default()
        };
        let report = validate_summary(s, &ValidationThresholds::default());
        assert_eq!(report.outcome, ValidationOutcome::Warn);
        assert_eq!(
            report.reasons,
            vec![
                "1/10 pairs: image or label could not be decoded".to_string(),
                "2/10 pairs: label shape differs from image".to_string(),
                "1/10 pairs: label holds a class id outside the catalog".to_string(),
                "classes with no labeled pixels: 1".to_string(),
            ]
        );
    }

    #[test]
    fn unusable_pairs_pool_against_count_limit() {
        let s = DatasetSummary {
            total: 10,
            ok: 8,
            shape_mismatch: 1,
            out_of_range: 1,
            ..Default::default()
        };
        let thresholds = ValidationThresholds {
            max_invalid: Some(1),
            ..Default::default()
        };
        let report = validate_summary(s, &thresholds);
        assert_eq!(report.outcome, ValidationOutcome::Fail);
        assert!(report
            .reasons
            .contains(&"unusable pairs: 2 pairs exceeds max 1".to_string()));
    }

    #[test]
    fn ratio_threshold_fails() {
        let thresholds = ValidationThresholds {
            max_invalid_ratio: Some(0.1),
            ..Default::default()
        };
        let report = validate_summary(summary(4, 3, 0, 1), &thresholds);
        assert_eq!(report.outcome, ValidationOutcome::Fail);
        assert!(report.reasons.iter().any(|r| r.contains("exceeds max")));
    }

    #[test]
    fn empty_dataset_fails() {
        let report = validate_summary(summary(0, 0, 0, 0), &ValidationThresholds::default());
        assert_eq!(report.outcome, ValidationOutcome::Fail);
    }
}
