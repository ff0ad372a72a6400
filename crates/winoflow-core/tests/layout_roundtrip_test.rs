mod common;

use common::random_tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winoflow_core::layout::PIXEL_LANES;
use winoflow_core::{
    f16, to_flat, to_tiled, transform_filter, BufferKind, StorageLayout, Tensor, TensorError,
    TileGeometry,
};

fn shapes(kind: BufferKind) -> Vec<Vec<usize>> {
    match kind {
        BufferKind::InOutChannel => vec![vec![1, 1, 1, 1], vec![3, 7, 5, 13], vec![2, 4, 4, 32]],
        BufferKind::Conv2dFilter => vec![vec![1, 1, 3, 3], vec![37, 31, 3, 3], vec![4, 5, 1, 1]],
        BufferKind::Argument => vec![vec![1], vec![37], vec![64]],
        BufferKind::WinogradFilter => vec![vec![16, 5, 3], vec![36, 2, 9]],
    }
}

#[test]
fn test_every_kind_round_trips() {
    for kind in BufferKind::ALL {
        for (seed, shape) in shapes(kind).into_iter().enumerate() {
            let x = random_tensor(400 + seed as u64, &shape);
            let image = to_tiled(&x, kind).unwrap();
            assert!(!image.is_flat());
            assert_eq!(image.logical_shape().dims(), shape.as_slice());
            assert_eq!(image.dims()[2], PIXEL_LANES);
            assert_eq!(to_flat(&image, kind).unwrap(), x, "{kind} {shape:?}");
        }
    }
}

/// Axis packed four to a pixel
fn packed_axis(kind: BufferKind) -> usize {
    match kind {
        BufferKind::InOutChannel => 3,
        BufferKind::Conv2dFilter => 1,
        BufferKind::Argument => 0,
        BufferKind::WinogradFilter => 2,
    }
}

fn extent(rng: &mut StdRng) -> usize {
    match rng.gen_range(0..5) {
        0 => 0,
        1 => PIXEL_LANES * rng.gen_range(1..=3),
        _ => rng.gen_range(1..=9),
    }
}

#[test]
fn test_random_shapes_round_trip() {
    let mut rng = StdRng::seed_from_u64(450);
    for kind in BufferKind::ALL {
        let axis = packed_axis(kind);
        for case in 0..48 {
            let mut shape: Vec<usize> =
                (0..kind.logical_rank()).map(|_| extent(&mut rng)).collect();
            // Pin the packed axis to empty, one block and two blocks before drawing freely
            match case {
                0 => shape[axis] = 0,
                1 => shape[axis] = PIXEL_LANES,
                2 => shape[axis] = 2 * PIXEL_LANES,
                _ => {}
            }
            let x = random_tensor(rng.gen(), &shape);
            let image = to_tiled(&x, kind).unwrap();
            assert_eq!(image.dims(), &kind.image_dims(&shape), "{kind} {shape:?}");
            assert_eq!(image.logical_shape().dims(), shape.as_slice());
            assert_eq!(to_flat(&image, kind).unwrap(), x, "{kind} case {case} {shape:?}");
        }
    }
}

#[test]
fn test_half_precision_round_trip_is_bit_exact() {
    let x: Tensor<f16> = random_tensor(410, &[2, 9, 6, 11]).cast();
    let image = to_tiled(&x, BufferKind::InOutChannel).unwrap();
    let back = to_flat(&image, BufferKind::InOutChannel).unwrap();
    let bits = |t: &Tensor<f16>| t.to_vec().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&back), bits(&x));
}

#[test]
fn test_padding_lanes_are_zero() {
    // 5 channels occupy two channel blocks; lanes 1..4 of the second are filler
    let x = Tensor::from_vec(vec![1.0f32; 2 * 3 * 5], &[1, 2, 3, 5]).unwrap();
    let image = to_tiled(&x, BufferKind::InOutChannel).unwrap();
    assert_eq!(image.dims(), &[2, 6, 4]);
    let data = image.as_slice().unwrap();
    assert_eq!(data.iter().filter(|v| **v == 1.0).count(), 30);
    assert_eq!(data.iter().filter(|v| **v == 0.0).count(), 2 * 6 * 4 - 30);
}

#[test]
fn test_flat_accessor_matches_explicit_unpack() {
    let x = random_tensor(420, &[5, 7, 3, 3]);
    let image = to_tiled(&x, BufferKind::Conv2dFilter).unwrap();
    assert_eq!(image.flat().unwrap().into_owned(), x);
    match image.layout() {
        StorageLayout::Tiled { kind, logical } => {
            assert_eq!(*kind, BufferKind::Conv2dFilter);
            assert_eq!(logical.dims(), &[5, 7, 3, 3]);
        }
        StorageLayout::Flat => panic!("expected a tiled tensor"),
    }
}

#[test]
fn test_transformed_filter_packs_as_winograd_filter() {
    let filter = random_tensor(430, &[6, 5, 3, 3]);
    for geometry in TileGeometry::ALL {
        let u = transform_filter(&filter, geometry).unwrap();
        let image = to_tiled(&u, BufferKind::WinogradFilter).unwrap();
        let p = geometry.coefficients();
        assert_eq!(image.dims(), &[p * 6, 2, PIXEL_LANES]);
        assert_eq!(to_flat(&image, BufferKind::WinogradFilter).unwrap(), u);
    }
}

#[test]
fn test_misuse_is_rejected() {
    let x = random_tensor(440, &[1, 4, 4, 3]);
    let image = to_tiled(&x, BufferKind::InOutChannel).unwrap();
    for result in [
        to_tiled(&image, BufferKind::InOutChannel),
        to_flat(&image, BufferKind::Argument),
        to_flat(&x, BufferKind::InOutChannel),
        to_tiled(&x, BufferKind::WinogradFilter),
    ] {
        assert!(matches!(result, Err(TensorError::ShapeMismatch { .. })));
    }
}
