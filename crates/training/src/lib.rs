#![recursion_limit = "256"]

pub mod util;

pub use models::{Fcn8, Fcn8Config};
pub use util::{
    cross_entropy, evaluate, predict_label_maps, run_eval, run_train, EvalArgs, TrainArgs,
};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
