//! Indexing and loading image/label pairs from parallel directories.

use crate::resize::TransformPipeline;
use crate::types::{
    DatasetLayout, DatasetResult, DatasetSummary, PairIndex, SegDatasetError, SegSample,
};
use data_contracts::{normalize_rgb_to_chw, LabelMap, ValidationError};
use image::DynamicImage;
use std::fs;
use std::path::Path;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Scan the image directory and pair every image with `<labels_dir>/<stem>.png`.
/// Pairs are sorted by image path; a missing label fails the whole index.
pub fn index_pairs(layout: &DatasetLayout) -> DatasetResult<Vec<PairIndex>> {
    let pairs = index_pairs_lenient(layout)?;
    for pair in &pairs {
        if !pair.label_path.exists() {
            return Err(SegDatasetError::MissingLabel {
                image: pair.image_path.clone(),
                label: pair.label_path.clone(),
            });
        }
    }
    Ok(pairs)
}

/// Like [`index_pairs`] but keeps pairs whose label file is absent (for summaries).
pub fn index_pairs_lenient(layout: &DatasetLayout) -> DatasetResult<Vec<PairIndex>> {
    let images_dir = layout.images_dir();
    let labels_dir = layout.labels_dir();
    let entries = fs::read_dir(&images_dir).map_err(|e| SegDatasetError::Io {
        path: images_dir.clone(),
        source: e,
    })?;
    let mut pairs = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let image_path = entry.path();
        if !image_path.is_file() || !is_image_file(&image_path) {
            continue;
        }
        let Some(stem) = image_path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        pairs.push(PairIndex {
            id: stem.to_string(),
            label_path: labels_dir.join(format!("{stem}.png")),
            image_path,
        });
    }
    pairs.sort_by(|a, b| a.image_path.cmp(&b.image_path));
    Ok(pairs)
}

/// Decode a single-channel label image into raw class values.
///
/// 8- and 16-bit grayscale files are read verbatim; anything else is converted to
/// 8-bit luma first.
pub fn read_label_map(path: &Path) -> DatasetResult<LabelMap> {
    let img = image::open(path).map_err(|e| SegDatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    let data: Vec<u32> = match img {
        DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(u32::from).collect(),
        DynamicImage::ImageLuma16(buf) => buf.into_raw().into_iter().map(u32::from).collect(),
        other => {
            tracing::debug!(
                path = %path.display(),
                color = ?other.color(),
                "label image is not grayscale; converting to luma"
            );
            other
                .to_luma8()
                .into_raw()
                .into_iter()
                .map(u32::from)
                .collect()
        }
    };
    Ok(LabelMap::new(height, width, data)?)
}

fn sample_key(id: &str) -> u64 {
    // FNV-1a; stable across runs so seeded augmentation is reproducible.
    id.bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Load, validate, and transform one pair into a normalized sample.
pub fn load_pair(pair: &PairIndex, pipeline: &TransformPipeline) -> DatasetResult<SegSample> {
    if !pair.label_path.exists() {
        return Err(SegDatasetError::MissingLabel {
            image: pair.image_path.clone(),
            label: pair.label_path.clone(),
        });
    }
    let img = image::open(&pair.image_path)
        .map_err(|e| SegDatasetError::Image {
            path: pair.image_path.clone(),
            source: e,
        })?
        .to_rgb8();
    let label = read_label_map(&pair.label_path)?;
    let (img, label) = pipeline
        .apply(img, label, sample_key(&pair.id))
        .map_err(|e| match e {
            SegDatasetError::Contract(source) => SegDatasetError::Sample {
                path: pair.image_path.clone(),
                source,
            },
            other => other,
        })?;
    let (width, height) = img.dimensions();
    let image_chw = normalize_rgb_to_chw(width, height, img.as_raw())?;
    Ok(SegSample {
        id: pair.id.clone(),
        image_chw,
        width,
        height,
        label,
    })
}

/// Load a whole split eagerly. Prefer `BatchIter` for large sets.
pub fn load_split(
    layout: &DatasetLayout,
    pipeline: &TransformPipeline,
) -> DatasetResult<Vec<SegSample>> {
    let pairs = index_pairs(layout)?;
    pairs.iter().map(|p| load_pair(p, pipeline)).collect()
}

/// Count readable, missing, and invalid pairs without transforming images.
pub fn summarize_pairs(pairs: &[PairIndex], classes: usize) -> DatasetSummary {
    let mut summary = DatasetSummary {
        class_pixels: vec![0; classes],
        ..Default::default()
    };
    for pair in pairs {
        summary.total += 1;
        if !pair.label_path.exists() {
            summary.missing_label += 1;
            continue;
        }
        let dims = match image::image_dimensions(&pair.image_path) {
            Ok((w, h)) => (h as usize, w as usize),
            Err(e) => {
                tracing::debug!(path = %pair.image_path.display(), "undecodable image: {e}");
                summary.undecodable += 1;
                continue;
            }
        };
        let label = match read_label_map(&pair.label_path) {
            Ok(label) => label,
            Err(e) => {
                tracing::debug!(path = %pair.label_path.display(), "undecodable label: {e}");
                summary.undecodable += 1;
                continue;
            }
        };
        if label.dims() != dims {
            summary.shape_mismatch += 1;
            continue;
        }
        for (slot, count) in summary
            .class_pixels
            .iter_mut()
            .zip(label.class_histogram(classes))
        {
            *slot += count;
        }
        match label.validate_classes(classes) {
            Ok(()) => summary.ok += 1,
            Err(ValidationError::OutOfRangeClass { .. }) => summary.out_of_range += 1,
            Err(_) => summary.undecodable += 1,
        }
    }
    summary
}

pub fn summarize_layout(layout: &DatasetLayout, classes: usize) -> DatasetResult<DatasetSummary> {
    let pairs = index_pairs_lenient(layout)?;
    Ok(summarize_pairs(&pairs, classes))
}
