//! Dataset loading, label encoding, and Burn-compatible batching for semantic segmentation.
//!
//! This crate provides utilities for:
//! - Pairing images with single-channel label maps from parallel directories
//! - One-hot encoding and arg-max decoding of class maps
//! - Explicit label resize and out-of-range policies
//! - Dataset summaries and threshold validation
//! - Burn-compatible batch iteration

pub mod codec;
pub mod pairs;
pub mod resize;
pub mod types;
pub mod validation;

#[cfg(feature = "burn-runtime")]
pub mod batch;

pub use codec::{apply_range_policy, argmax, decode_argmax, encode_one_hot};
pub use pairs::{
    index_pairs, index_pairs_lenient, load_pair, load_split, read_label_map, summarize_layout,
    summarize_pairs,
};
pub use resize::{
    resize_image, resize_label, TransformPipeline, TransformPipelineBuilder, DEFAULT_TARGET_SIZE,
};
pub use types::*;
pub use validation::{summarize_with_thresholds, validate_summary};

#[cfg(feature = "burn-runtime")]
pub use batch::{collate, BatchIter, LoaderConfig, SegBatch};
