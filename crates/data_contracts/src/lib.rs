//! Shared data contracts for the segmentation pipeline: class catalog, label maps,
//! per-class tensors, and image preprocessing constants.

pub mod catalog;
pub mod label_map;
pub mod preprocess;

pub use catalog::{CatalogError, ClassCatalog, REFERENCE_CLASSES};
pub use label_map::{ClassTensor, LabelMap, ValidationError};
pub use preprocess::{
    denormalize_chw_to_rgb, denormalize_pixel, normalize_pixel, normalize_rgb_to_chw, PIXEL_SCALE,
};
