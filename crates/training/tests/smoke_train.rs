use clap::Parser;
use image::{GrayImage, Luma, Rgb, RgbImage};
use seg_dataset::DatasetLayout;
use seg_metrics::MetricsReport;
use std::fs;
use std::path::Path;
use training::util::{run_eval, run_train, EvalArgs, OptimizerKind, TrainArgs};

/// Red left half labeled 0, blue right half labeled 1.
fn write_split(layout: &DatasetLayout, count: usize) -> anyhow::Result<()> {
    fs::create_dir_all(layout.images_dir())?;
    fs::create_dir_all(layout.labels_dir())?;
    for i in 0..count {
        let name = format!("{i:04}.png");
        let img = RgbImage::from_fn(32, 32, |x, _| {
            if x < 16 {
                Rgb([220, 10, 10])
            } else {
                Rgb([10, 10, 220])
            }
        });
        img.save(layout.images_dir().join(&name))?;
        let label = GrayImage::from_fn(32, 32, |x, _| Luma([u8::from(x >= 16)]));
        label.save(layout.labels_dir().join(&name))?;
    }
    Ok(())
}

fn synthetic_dataset(root: &Path) -> anyhow::Result<()> {
    write_split(&DatasetLayout::train(root), 4)?;
    write_split(&DatasetLayout::test(root), 2)?;
    fs::write(root.join("classes.toml"), "classes = [\"left\", \"right\"]\n")?;
    Ok(())
}

#[test]
fn train_then_eval_round_trip() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    synthetic_dataset(root)?;
    let ckpt = root.join("ckpt/fcn8.bin");
    let report_path = root.join("reports/metrics.json");
    let root_arg = root.display().to_string();
    let classes_arg = root.join("classes.toml").display().to_string();

    let train = TrainArgs::parse_from([
        "train",
        "--dataset-root",
        &root_arg,
        "--classes",
        &classes_arg,
        "--width",
        "32",
        "--height",
        "32",
        "--model",
        "tiny",
        "--epochs",
        "2",
        "--batch-size",
        "2",
        "--seed",
        "7",
        "--validate",
        "--checkpoint-out",
        &ckpt.display().to_string(),
    ]);
    assert_eq!(train.optimizer, OptimizerKind::Sgd);
    run_train(train)?;
    assert!(ckpt.exists());

    let eval = EvalArgs::parse_from([
        "eval",
        "--dataset-root",
        &root_arg,
        "--classes",
        &classes_arg,
        "--width",
        "32",
        "--height",
        "32",
        "--model",
        "tiny",
        "--checkpoint",
        &ckpt.display().to_string(),
        "--json-out",
        &report_path.display().to_string(),
    ]);
    let report = run_eval(eval)?;
    assert_eq!(report.images, 2);
    assert_eq!(report.classes.len(), 2);
    assert_eq!(report.classes[1].name, "right");
    assert_eq!(report.classes[0].true_pixels, 2 * 32 * 16);
    for score in &report.classes {
        assert!(score.iou > 0.0 && score.iou <= 1.0);
        assert!(score.dice >= score.iou);
    }

    let saved: MetricsReport = serde_json::from_slice(&fs::read(&report_path)?)?;
    assert_eq!(saved, report);
    Ok(())
}

#[test]
fn adam_training_writes_checkpoint() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    synthetic_dataset(root)?;
    let ckpt = root.join("adam.bin");
    let train = TrainArgs::parse_from([
        "train",
        "--dataset-root",
        &root.display().to_string(),
        "--width",
        "32",
        "--height",
        "32",
        "--model",
        "tiny",
        "--optimizer",
        "adam",
        "--lr",
        "1e-3",
        "--batch-size",
        "4",
        "--checkpoint-out",
        &ckpt.display().to_string(),
    ]);
    // Built-in 12-class catalog; labels 0/1 are in range.
    run_train(train)?;
    assert!(ckpt.exists());
    Ok(())
}

#[test]
fn input_size_off_the_stride_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_dataset(tmp.path())?;
    let train = TrainArgs::parse_from([
        "train",
        "--dataset-root",
        &tmp.path().display().to_string(),
        "--width",
        "48",
        "--height",
        "32",
        "--model",
        "tiny",
    ]);
    let err = run_train(train).unwrap_err();
    assert!(err.to_string().contains("multiple of 32"));
    Ok(())
}

#[test]
fn missing_checkpoint_fails_eval() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_dataset(tmp.path())?;
    let eval = EvalArgs::parse_from([
        "eval",
        "--dataset-root",
        &tmp.path().display().to_string(),
        "--width",
        "32",
        "--height",
        "32",
        "--model",
        "tiny",
        "--checkpoint",
        &tmp.path().join("absent.bin").display().to_string(),
    ]);
    assert!(run_eval(eval).is_err());
    Ok(())
}
