use burn::backend::{ndarray::NdArray, Autodiff};
use burn::tensor::{Distribution, Tensor};
use models::prelude::*;

type B = NdArray<f32>;
type ADBackend = Autodiff<NdArray<f32>>;

#[test]
fn fcn8_logits_match_input_resolution() {
    let device = Default::default();
    let model = Fcn8::<B>::new(Fcn8Config::tiny(5), &device).unwrap();
    let input = Tensor::<B, 4>::random([2, 3, 64, 32], Distribution::Uniform(-1.0, 1.0), &device);
    let logits = model.forward(input).unwrap();
    assert_eq!(logits.dims(), [2, 5, 64, 32]);
}

#[test]
fn encoder_features_have_fcn_strides() {
    let device = Default::default();
    let encoder = Vgg16Encoder::<B>::new([4, 4, 8, 8, 8], 16, &device);
    let input = Tensor::<B, 4>::zeros([1, 3, 64, 64], &device);
    let features = encoder.forward(input);
    assert_eq!(features.pool3.dims(), [1, 8, 8, 8]);
    assert_eq!(features.pool4.dims(), [1, 8, 4, 4]);
    assert_eq!(features.head.dims(), [1, 16, 2, 2]);
}

#[test]
fn probabilities_sum_to_one_per_pixel() {
    let device = Default::default();
    let model = Fcn8::<B>::new(Fcn8Config::tiny(3), &device).unwrap();
    let input = Tensor::<B, 4>::random([1, 3, 32, 32], Distribution::Uniform(-1.0, 1.0), &device);
    let probs = model.forward_probs(input).unwrap();
    let sums = probs.sum_dim(1).into_data().to_vec::<f32>().unwrap();
    assert_eq!(sums.len(), 32 * 32);
    assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-4));
}

#[test]
fn rejects_sizes_off_the_stride() {
    let device = Default::default();
    let model = Fcn8::<B>::new(Fcn8Config::tiny(2), &device).unwrap();
    let input = Tensor::<B, 4>::zeros([1, 3, 48, 32], &device);
    assert!(matches!(
        model.forward(input),
        Err(ModelError::InputSize {
            height: 48,
            width: 32
        })
    ));
    let gray = Tensor::<B, 4>::zeros([1, 1, 32, 32], &device);
    assert!(matches!(model.forward(gray), Err(ModelError::Channels(1))));
    assert!(check_input_size(224, 224).is_ok());
    assert!(check_input_size(0, 32).is_err());
    assert!(Fcn8::<B>::new(Fcn8Config::tiny(0), &device).is_err());
}

#[test]
fn backward_pass_runs_on_autodiff() {
    let device = Default::default();
    let model = Fcn8::<ADBackend>::new(Fcn8Config::tiny(2), &device).unwrap();
    let input =
        Tensor::<ADBackend, 4>::random([1, 3, 32, 32], Distribution::Uniform(-1.0, 1.0), &device);
    let loss = model.forward(input).unwrap().powf_scalar(2.0).mean();
    let value = loss.clone().into_data().to_vec::<f32>().unwrap()[0];
    assert!(value.is_finite());
    let _grads = loss.backward();
}

#[test]
fn checkpoint_and_encoder_records_round_trip() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let device = Default::default();
    let model = Fcn8::<B>::new(Fcn8Config::tiny(3), &device)?;
    let input = Tensor::<B, 4>::random([1, 3, 32, 32], Distribution::Uniform(-1.0, 1.0), &device);
    let expected = model.forward(input.clone())?.into_data().to_vec::<f32>().unwrap();

    let ckpt = tmp.path().join("fcn8.bin");
    model.save_checkpoint(&ckpt)?;
    let restored = Fcn8::<B>::load_checkpoint(Fcn8Config::tiny(3), &ckpt, &device)?;
    let got = restored.forward(input.clone())?.into_data().to_vec::<f32>().unwrap();
    assert_eq!(expected, got);

    // Encoder weights transfer into a model with a different class count.
    let enc = tmp.path().join("vgg.bin");
    model.save_encoder(&enc)?;
    let other = Fcn8::<B>::new(Fcn8Config::tiny(7), &device)?.load_encoder(&enc, &device)?;
    let a = model.encoder().forward(input.clone()).head.into_data().to_vec::<f32>().unwrap();
    let b = other.encoder().forward(input).head.into_data().to_vec::<f32>().unwrap();
    assert_eq!(a, b);

    let missing = Fcn8::<B>::load_checkpoint(Fcn8Config::tiny(3), &tmp.path().join("nope.bin"), &device);
    assert!(matches!(missing, Err(ModelError::Record { .. })));
    Ok(())
}
