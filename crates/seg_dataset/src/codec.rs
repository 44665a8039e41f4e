//! One-hot label encoding and arg-max decoding.

use crate::types::OutOfRangePolicy;
use data_contracts::{ClassTensor, LabelMap, ValidationError};
use std::borrow::Cow;

/// Enforce `[0, classes)` on a label map according to `policy`.
///
/// `Clamp` rewrites offending pixels to `classes - 1`; the result is borrowed when no
/// pixel needed rewriting.
pub fn apply_range_policy(
    label: &LabelMap,
    classes: usize,
    policy: OutOfRangePolicy,
) -> Result<Cow<'_, LabelMap>, ValidationError> {
    if classes == 0 {
        return Err(ValidationError::ZeroClasses);
    }
    match policy {
        OutOfRangePolicy::Reject => {
            label.validate_classes(classes)?;
            Ok(Cow::Borrowed(label))
        }
        OutOfRangePolicy::Clamp => {
            let last = (classes - 1) as u32;
            let offending = label.as_slice().iter().filter(|&&v| v > last).count();
            if offending == 0 {
                return Ok(Cow::Borrowed(label));
            }
            tracing::warn!(
                offending,
                classes,
                "clamping out-of-range label values to class {last}"
            );
            let mut clamped = label.clone();
            for v in clamped.as_mut_slice() {
                if *v > last {
                    *v = last;
                }
            }
            Ok(Cow::Owned(clamped))
        }
    }
}

/// Expand a label map into a `height x width x classes` one-hot tensor, channels in
/// class-index order.
pub fn encode_one_hot(
    label: &LabelMap,
    classes: usize,
    policy: OutOfRangePolicy,
) -> Result<ClassTensor, ValidationError> {
    let label = apply_range_policy(label, classes, policy)?;
    let mut out = ClassTensor::zeros(label.height(), label.width(), classes)?;
    let data = out.as_mut_slice();
    for (p, &class) in label.as_slice().iter().enumerate() {
        data[p * classes + class as usize] = 1.0;
    }
    Ok(out)
}

/// Index of the largest value; the lowest index wins ties and NaN never wins.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best = i;
            best_val = v;
        }
    }
    best
}

/// Collapse a one-hot or probability tensor back to class indices.
pub fn decode_argmax(tensor: &ClassTensor) -> LabelMap {
    let classes = tensor.classes();
    let data = tensor.as_slice();
    LabelMap::from_fn(tensor.height(), tensor.width(), |p| {
        argmax(&data[p * classes..(p + 1) * classes]) as u32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn label_strategy() -> impl Strategy<Value = (LabelMap, usize)> {
        (1usize..6, 1usize..6, 1usize..13).prop_flat_map(|(h, w, n)| {
            proptest::collection::vec(0u32..n as u32, h * w).prop_map(move |data| {
                (
                    LabelMap::new(h, w, data).expect("length matches"),
                    n,
                )
            })
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode((label, n) in label_strategy()) {
            let one_hot = encode_one_hot(&label, n, OutOfRangePolicy::Reject).unwrap();
            prop_assert_eq!(decode_argmax(&one_hot), label);
        }

        #[test]
        fn every_pixel_has_one_active_channel((label, n) in label_strategy()) {
            let one_hot = encode_one_hot(&label, n, OutOfRangePolicy::Reject).unwrap();
            prop_assert_eq!(one_hot.dims(), (label.height(), label.width(), n));
            for px in one_hot.pixels() {
                prop_assert_eq!(px.iter().sum::<f32>(), 1.0);
                prop_assert_eq!(px.iter().filter(|v| **v == 1.0).count(), 1);
            }
        }
    }

    #[test]
    fn channels_follow_class_order() {
        let label = LabelMap::from_rows(&[[2u32, 0]]).unwrap();
        let t = encode_one_hot(&label, 3, OutOfRangePolicy::Reject).unwrap();
        assert_eq!(t.pixel(0, 0).unwrap(), &[0.0, 0.0, 1.0]);
        assert_eq!(t.pixel(0, 1).unwrap(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn out_of_range_rejected_by_default() {
        let label = LabelMap::from_rows(&[[0u32, 3]]).unwrap();
        let err = encode_one_hot(&label, 3, OutOfRangePolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRangeClass {
                value: 3,
                classes: 3,
                row: 0,
                col: 1
            }
        );
    }

    #[test]
    fn clamp_maps_to_last_class_not_zero() {
        let label = LabelMap::from_rows(&[[0u32, 200], [1, 2]]).unwrap();
        let t = encode_one_hot(&label, 3, OutOfRangePolicy::Clamp).unwrap();
        let decoded = decode_argmax(&t);
        assert_eq!(decoded.as_slice(), &[0, 2, 1, 2]);
    }

    #[test]
    fn clamp_borrows_clean_labels() {
        let label = LabelMap::from_rows(&[[0u32, 1]]).unwrap();
        let out = apply_range_policy(&label, 2, OutOfRangePolicy::Clamp).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[0.5, 0.5, 0.5]), 0);
        assert_eq!(argmax(&[f32::NAN, 0.1, 0.1]), 1);
        let probs = ClassTensor::new(1, 2, 3, vec![0.3, 0.3, 0.3, 0.1, 0.45, 0.45]).unwrap();
        assert_eq!(decode_argmax(&probs).as_slice(), &[0, 1]);
    }

    #[test]
    fn zero_classes_rejected() {
        let label = LabelMap::filled(2, 2, 0);
        assert_eq!(
            encode_one_hot(&label, 0, OutOfRangePolicy::Clamp).unwrap_err(),
            ValidationError::ZeroClasses
        );
    }
}
