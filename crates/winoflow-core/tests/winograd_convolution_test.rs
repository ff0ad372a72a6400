mod common;

use common::{context_with, Problem};
use winoflow_core::{
    f16, to_tiled, BufferKind, ExecutionContext, Padding, Tensor, TensorError, TileGeometry,
    WinogradConfig, WinogradConv2d,
};

#[test]
fn test_valid_32x32_aligned() {
    let ctx = ExecutionContext::inline();
    let output = Problem::new(10, 1, 32, 32, 32, 16).check::<f32>(&ctx, &Padding::valid());
    assert_eq!(output.dims(), &[1, 30, 30, 16]);
}

#[test]
fn test_same_32x32_aligned() {
    let ctx = ExecutionContext::inline();
    let output = Problem::new(20, 1, 32, 32, 32, 16).check::<f32>(&ctx, &Padding::same());
    assert_eq!(output.dims(), &[1, 32, 32, 16]);
}

#[test]
fn test_valid_61x67_unaligned() {
    let ctx = ExecutionContext::inline();
    let output = Problem::new(30, 1, 61, 67, 31, 37).check::<f32>(&ctx, &Padding::valid());
    assert_eq!(output.dims(), &[1, 59, 65, 37]);
}

#[test]
fn test_batched_valid_64x64() {
    let ctx = ExecutionContext::stream().unwrap();
    let output = Problem::new(40, 3, 64, 64, 32, 32).check::<f32>(&ctx, &Padding::valid());
    assert_eq!(output.dims(), &[3, 62, 62, 32]);
}

#[test]
fn test_batched_same_61x67() {
    let ctx = ExecutionContext::stream().unwrap();
    let output = Problem::new(50, 5, 61, 67, 37, 31).check::<f32>(&ctx, &Padding::same());
    assert_eq!(output.dims(), &[5, 61, 67, 31]);
}

#[test]
fn test_explicit_padding_single_precision() {
    let ctx = ExecutionContext::inline();
    let padding = Padding::symmetric(1);
    for (seed, (h, w, ic, oc)) in [(32, 32, 32, 16), (61, 67, 31, 37)].into_iter().enumerate() {
        let output = Problem::new(60 + seed as u64 * 3, 1, h, w, ic, oc).check::<f32>(&ctx, &padding);
        assert_eq!(output.dims(), &[1, h, w, oc]);
    }
}

#[test]
fn test_explicit_padding_half_precision() {
    let ctx = ExecutionContext::inline();
    let padding = Padding::symmetric(2);
    for (seed, (h, w, ic, oc)) in [(32, 32, 32, 16), (61, 67, 31, 37)].into_iter().enumerate() {
        let output = Problem::new(70 + seed as u64 * 3, 1, h, w, ic, oc).check::<f16>(&ctx, &padding);
        assert_eq!(output.dims(), &[1, h + 2, w + 2, oc]);
    }
}

#[test]
fn test_named_padding_half_precision() {
    let ctx = ExecutionContext::inline();
    Problem::new(80, 1, 32, 32, 32, 16).check::<f16>(&ctx, &Padding::valid());
    Problem::new(81, 2, 29, 35, 12, 20).check::<f16>(&ctx, &Padding::same());
}

#[test]
fn test_alignment_independence() {
    // Output extents that are and are not multiples of the output tile
    let ctx = ExecutionContext::inline();
    for (h, w) in [(34, 34), (35, 33), (18, 23), (6, 6), (7, 9)] {
        let output = Problem::new(90, 2, h, w, 5, 7).check::<f32>(&ctx, &Padding::valid());
        assert_eq!(output.dims(), &[2, h - 2, w - 2, 7]);
    }
}

#[test]
fn test_odd_total_padding() {
    // Odd totals put the extra pixel after, on both axes
    let ctx = ExecutionContext::inline();
    for total in [1, 3] {
        let padding = Padding::from_total(total);
        let output = Problem::new(100, 1, 17, 22, 6, 4).check::<f32>(&ctx, &padding);
        assert_eq!(output.dims(), &[1, 15 + total, 20 + total, 4]);
    }
}

#[test]
fn test_small_geometry() {
    let ctx = context_with(WinogradConfig::new().with_geometry(TileGeometry::F2x2));
    let problem = Problem::new(110, 2, 19, 26, 9, 11);
    problem.check::<f32>(&ctx, &Padding::valid());
    problem.check::<f32>(&ctx, &Padding::same());
    problem.check::<f16>(&ctx, &Padding::symmetric(2));
}

#[test]
fn test_batch_permutation_permutes_results() {
    let ctx = ExecutionContext::inline();
    let problem = Problem::new(120, 3, 21, 18, 8, 6);
    let output = problem.check::<f32>(&ctx, &Padding::same());

    // Reverse the batch order of the input
    let image = 21 * 18 * 8;
    let data = problem.input.as_slice().unwrap();
    let reversed: Vec<f32> = (0..3).rev().flat_map(|n| data[n * image..(n + 1) * image].to_vec()).collect();
    let permuted = Problem {
        input: Tensor::from_vec(reversed, &[3, 21, 18, 8]).unwrap(),
        filter: problem.filter.clone(),
        bias: problem.bias.clone(),
    };
    let permuted_output = permuted.check::<f32>(&ctx, &Padding::same());

    let plane = 21 * 18 * 6;
    let a = output.as_slice().unwrap();
    let b = permuted_output.as_slice().unwrap();
    for n in 0..3 {
        let original = &a[n * plane..(n + 1) * plane];
        let moved = &b[(2 - n) * plane..(3 - n) * plane];
        for (x, y) in original.iter().zip(moved) {
            assert!((x - y).abs() <= 1e-6 * x.abs().max(1.0), "batch {n}: {x} vs {y}");
        }
    }
}

#[test]
fn test_named_and_explicit_padding_agree() {
    let ctx = ExecutionContext::inline();
    let problem = Problem::new(130, 2, 23, 30, 10, 12);
    assert_eq!(
        problem.check::<f32>(&ctx, &Padding::same()),
        problem.check::<f32>(&ctx, &Padding::symmetric(1))
    );
    assert_eq!(
        problem.check::<f32>(&ctx, &Padding::valid()),
        problem.check::<f32>(&ctx, &Padding::symmetric(0))
    );
}

#[test]
fn test_queues_agree() {
    let problem = Problem::new(140, 2, 16, 20, 8, 8);
    let inline = problem.check::<f32>(&ExecutionContext::inline(), &Padding::same());
    let stream = problem.check::<f32>(&ExecutionContext::stream().unwrap(), &Padding::same());
    assert_eq!(inline, stream);
}

#[test]
fn test_tiled_operands() {
    let ctx = ExecutionContext::inline();
    let problem = Problem::new(150, 1, 14, 15, 6, 5);
    let conv = WinogradConv2d::default();
    let flat = conv
        .run(&ctx, &problem.input, &problem.filter, &problem.bias, &Padding::same())
        .unwrap();
    let tiled = conv
        .run(
            &ctx,
            &to_tiled(&problem.input, BufferKind::InOutChannel).unwrap(),
            &to_tiled(&problem.filter, BufferKind::Conv2dFilter).unwrap(),
            &to_tiled(&problem.bias, BufferKind::Argument).unwrap(),
            &Padding::same(),
        )
        .unwrap();
    assert_eq!(flat, tiled);
}

#[test]
fn test_padding_underflow() {
    let ctx = ExecutionContext::inline();
    let problem = Problem::new(160, 1, 5, 12, 3, 3);
    let err = WinogradConv2d::default()
        .run(&ctx, &problem.input, &problem.filter, &problem.bias, &Padding::valid())
        .unwrap_err();
    assert!(matches!(
        err,
        TensorError::PaddingUnderflow { padded_height: 5, padded_width: 12, minimum: 6, .. }
    ));
    assert!(err.is_fatal());
}

#[test]
fn test_rejects_wrong_kernel_size() {
    let ctx = ExecutionContext::inline();
    let input = Tensor::<f32>::zeros(&[1, 8, 8, 2]);
    let filter = Tensor::<f32>::zeros(&[4, 2, 5, 5]);
    let bias = Tensor::<f32>::zeros(&[4]);
    assert!(matches!(
        WinogradConv2d::default().run(&ctx, &input, &filter, &bias, &Padding::valid()),
        Err(TensorError::ShapeMismatch { .. })
    ));
}
