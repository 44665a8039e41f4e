use crate::error::{check_smoothing, MetricsError};
use data_contracts::{LabelMap, ValidationError};
use serde::{Deserialize, Serialize};

/// Serialized form of [`OverlapCounts`]; checked on the way back in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountsFile {
    pub intersection: Vec<u64>,
    pub pred_area: Vec<u64>,
    pub true_area: Vec<u64>,
}

/// Per-class pixel counts accumulated across any number of images.
///
/// All three vectors share one length and `intersection <= min(pred_area, true_area)`
/// per class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CountsFile", into = "CountsFile")]
pub struct OverlapCounts {
    intersection: Vec<u64>,
    pred_area: Vec<u64>,
    true_area: Vec<u64>,
}

impl OverlapCounts {
    pub fn new(classes: usize) -> Self {
        Self {
            intersection: vec![0; classes],
            pred_area: vec![0; classes],
            true_area: vec![0; classes],
        }
    }

    pub fn classes(&self) -> usize {
        self.intersection.len()
    }

    /// Add one predicted/truth pair. Both maps are validated before any count changes.
    pub fn accumulate(&mut self, pred: &LabelMap, truth: &LabelMap) -> Result<(), ValidationError> {
        truth.ensure_same_shape(pred)?;
        let classes = self.classes();
        truth.validate_classes(classes)?;
        pred.validate_classes(classes)?;
        for (&p, &t) in pred.as_slice().iter().zip(truth.as_slice()) {
            let (p, t) = (p as usize, t as usize);
            self.pred_area[p] += 1;
            self.true_area[t] += 1;
            if p == t {
                self.intersection[p] += 1;
            }
        }
        Ok(())
    }

    /// Fold counts gathered elsewhere (another batch or worker) into these.
    pub fn merge(&mut self, other: &OverlapCounts) -> Result<(), ValidationError> {
        if other.classes() != self.classes() {
            return Err(ValidationError::ClassCountMismatch {
                expected: self.classes(),
                actual: other.classes(),
            });
        }
        for c in 0..self.classes() {
            self.intersection[c] += other.intersection[c];
            self.pred_area[c] += other.pred_area[c];
            self.true_area[c] += other.true_area[c];
        }
        Ok(())
    }

    pub fn intersection(&self, class: usize) -> u64 {
        self.intersection.get(class).copied().unwrap_or(0)
    }

    pub fn pred_area(&self, class: usize) -> u64 {
        self.pred_area.get(class).copied().unwrap_or(0)
    }

    pub fn true_area(&self, class: usize) -> u64 {
        self.true_area.get(class).copied().unwrap_or(0)
    }

    pub fn union(&self, class: usize) -> u64 {
        (self.pred_area(class) + self.true_area(class)).saturating_sub(self.intersection(class))
    }

    fn iou(&self, class: usize, smoothing: f64) -> f64 {
        (self.intersection(class) as f64 + smoothing) / (self.union(class) as f64 + smoothing)
    }

    fn dice(&self, class: usize, smoothing: f64) -> f64 {
        let combined = (self.pred_area(class) + self.true_area(class)) as f64;
        (2.0 * self.intersection(class) as f64 + smoothing) / (combined + smoothing)
    }

    pub fn scores(&self, smoothing: f64) -> Result<PerClassMetrics, MetricsError> {
        let smoothing = check_smoothing(smoothing)?;
        let classes = 0..self.classes();
        Ok(PerClassMetrics {
            iou: classes.clone().map(|c| self.iou(c, smoothing)).collect(),
            dice: classes.map(|c| self.dice(c, smoothing)).collect(),
        })
    }
}

impl TryFrom<CountsFile> for OverlapCounts {
    type Error = MetricsError;

    fn try_from(file: CountsFile) -> Result<Self, Self::Error> {
        let classes = file.intersection.len();
        if file.pred_area.len() != classes || file.true_area.len() != classes {
            return Err(MetricsError::RaggedCounts {
                intersection: classes,
                pred: file.pred_area.len(),
                truth: file.true_area.len(),
            });
        }
        for class in 0..classes {
            let (i, p, t) = (
                file.intersection[class],
                file.pred_area[class],
                file.true_area[class],
            );
            if i > p.min(t) {
                return Err(MetricsError::InconsistentCounts {
                    class,
                    intersection: i,
                    pred: p,
                    truth: t,
                });
            }
        }
        Ok(Self {
            intersection: file.intersection,
            pred_area: file.pred_area,
            true_area: file.true_area,
        })
    }
}

impl From<OverlapCounts> for CountsFile {
    fn from(counts: OverlapCounts) -> Self {
        CountsFile {
            intersection: counts.intersection,
            pred_area: counts.pred_area,
            true_area: counts.true_area,
        }
    }
}

/// IoU and Dice per class, indexed like the class catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClassMetrics {
    pub iou: Vec<f64>,
    pub dice: Vec<f64>,
}

impl PerClassMetrics {
    pub fn classes(&self) -> usize {
        self.iou.len()
    }

    pub fn mean_iou(&self) -> f64 {
        mean(&self.iou)
    }

    pub fn mean_dice(&self) -> f64 {
        mean(&self.dice)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_accumulate_leaves_counts_untouched() {
        let mut counts = OverlapCounts::new(2);
        let truth = LabelMap::from_rows(&[[0u32, 1]]).unwrap();
        let bad = LabelMap::from_rows(&[[0u32, 3]]).unwrap();
        assert!(counts.accumulate(&bad, &truth).is_err());
        assert_eq!(counts, OverlapCounts::new(2));
    }

    #[test]
    fn merge_matches_single_pass() {
        let a_truth = LabelMap::from_rows(&[[0u32, 1, 1]]).unwrap();
        let a_pred = LabelMap::from_rows(&[[0u32, 0, 1]]).unwrap();
        let b_truth = LabelMap::from_rows(&[[1u32, 1, 0]]).unwrap();
        let b_pred = LabelMap::from_rows(&[[1u32, 0, 0]]).unwrap();

        let mut left = OverlapCounts::new(2);
        left.accumulate(&a_pred, &a_truth).unwrap();
        let mut right = OverlapCounts::new(2);
        right.accumulate(&b_pred, &b_truth).unwrap();
        left.merge(&right).unwrap();

        let mut single = OverlapCounts::new(2);
        single.accumulate(&a_pred, &a_truth).unwrap();
        single.accumulate(&b_pred, &b_truth).unwrap();
        assert_eq!(left, single);
        assert_eq!(single.intersection(1), 2);
        assert_eq!(single.union(1), 4);

        assert!(left.merge(&OverlapCounts::new(3)).is_err());
    }

    #[test]
    fn scores_reject_non_positive_smoothing() {
        let counts = OverlapCounts::new(2);
        for bad in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                counts.scores(bad),
                Err(MetricsError::InvalidSmoothing(_))
            ));
        }
        assert_eq!(counts.scores(1e-5).unwrap().iou, vec![1.0, 1.0]);
    }

    #[test]
    fn inconsistent_file_counts_are_rejected() {
        let file = CountsFile {
            intersection: vec![5],
            pred_area: vec![1],
            true_area: vec![1],
        };
        assert!(matches!(
            OverlapCounts::try_from(file),
            Err(MetricsError::InconsistentCounts { class: 0, .. })
        ));

        let ragged = CountsFile {
            intersection: vec![0, 0],
            pred_area: vec![1],
            true_area: vec![1, 1],
        };
        assert!(matches!(
            OverlapCounts::try_from(ragged),
            Err(MetricsError::RaggedCounts { pred: 1, .. })
        ));
    }

    #[test]
    fn means_average_over_classes() {
        let m = PerClassMetrics {
            iou: vec![1.0, 0.5],
            dice: vec![1.0, 0.0],
        };
        assert_eq!(m.mean_iou(), 0.75);
        assert_eq!(m.mean_dice(), 0.5);
    }
}
