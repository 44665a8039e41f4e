use crate::counts::OverlapCounts;
use crate::error::MetricsError;
use data_contracts::{ClassCatalog, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub class: usize,
    pub name: String,
    pub iou: f64,
    pub dice: f64,
    pub true_pixels: u64,
    pub pred_pixels: u64,
}

/// Scores paired with class names, ready for stdout or a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub images: usize,
    pub smoothing: f64,
    pub classes: Vec<ClassScore>,
    pub mean_iou: f64,
    pub mean_dice: f64,
}

impl MetricsReport {
    pub fn new(
        catalog: &ClassCatalog,
        counts: &OverlapCounts,
        images: usize,
        smoothing: f64,
    ) -> Result<Self, MetricsError> {
        if catalog.len() != counts.classes() {
            return Err(ValidationError::ClassCountMismatch {
                expected: catalog.len(),
                actual: counts.classes(),
            }
            .into());
        }
        let scores = counts.scores(smoothing)?;
        let classes = catalog
            .iter()
            .map(|(class, name)| ClassScore {
                class,
                name: name.to_string(),
                iou: scores.iou[class],
                dice: scores.dice[class],
                true_pixels: counts.true_area(class),
                pred_pixels: counts.pred_area(class),
            })
            .collect();
        Ok(Self {
            images,
            smoothing,
            classes,
            mean_iou: scores.mean_iou(),
            mean_dice: scores.mean_dice(),
        })
    }

    pub fn format_table(&self) -> String {
        let name_width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max("class".len());
        let mut out = String::new();
        out.push_str(&format!(
            "{:>3}  {:<name_width$}  {:>7}  {:>7}  {:>10}\n",
            "id", "class", "IoU", "Dice", "pixels"
        ));
        for c in &self.classes {
            out.push_str(&format!(
                "{:>3}  {:<name_width$}  {:>7.4}  {:>7.4}  {:>10}\n",
                c.class, c.name, c.iou, c.dice, c.true_pixels
            ));
        }
        out.push_str(&format!(
            "mean IoU {:.4}  mean Dice {:.4}  ({} images)\n",
            self.mean_iou, self.mean_dice, self.images
        ));
        out
    }
}
