#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winoflow_core::{
    compare_with_policy, conv2d_direct, Element, ExecutionContext, Padding, Tensor,
    TolerancePolicy, WinogradConfig,
};

/// Uniform values in `[0, 1)` from a fixed seed
pub fn random_tensor(seed: u64, shape: &[usize]) -> Tensor<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = shape.iter().product::<usize>();
    Tensor::from_vec((0..n).map(|_| rng.gen::<f32>()).collect(), shape).unwrap()
}

/// Convolution operands: NHWC input, OIHW 3x3 filter and bias
pub struct Problem {
    pub input: Tensor<f32>,
    pub filter: Tensor<f32>,
    pub bias: Tensor<f32>,
}

impl Problem {
    pub fn new(
        seed: u64,
        batch: usize,
        height: usize,
        width: usize,
        in_channels: usize,
        out_channels: usize,
    ) -> Self {
        Self {
            input: random_tensor(seed, &[batch, height, width, in_channels]),
            filter: random_tensor(seed + 1, &[out_channels, in_channels, 3, 3]),
            bias: random_tensor(seed + 2, &[out_channels]),
        }
    }

    /// Run both paths at storage precision `T` and return the Winograd output
    /// after checking it against the direct oracle.
    pub fn check<T: Element>(&self, ctx: &ExecutionContext, padding: &Padding) -> Tensor<T> {
        let input: Tensor<T> = self.input.cast();
        let filter: Tensor<T> = self.filter.cast();
        let bias: Tensor<T> = self.bias.cast();

        let expected = conv2d_direct(&input, &filter, Some(&bias), padding).unwrap();
        let actual =
            winoflow_core::winograd_conv2d(ctx, &input, &filter, &bias, padding).unwrap();
        assert_eq!(actual.dims(), expected.dims(), "output shape for {padding}");

        let report = compare_with_policy(&expected, &actual, &TolerancePolicy::default()).unwrap();
        assert!(
            report.passed(),
            "{} of {} elements out of tolerance for {padding} ({:?}), max abs diff {:e}, first {:?}",
            report.mismatches.len(),
            report.total,
            T::DTYPE,
            report.max_abs_diff,
            report.mismatches.first()
        );
        actual
    }
}

pub fn context_with(config: WinogradConfig) -> ExecutionContext {
    ExecutionContext::stream().unwrap().with_config(config)
}
