use flowrt::math::IndexSpace;
use flowrt::{
    CopyDescriptor, Range, ReductionType, Runtime, RuntimeConfig, RuntimeError, StorageLocation,
    TransferMode, TransferPolicy, View,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn runtime(policy: TransferPolicy) -> Runtime {
    Runtime::new(RuntimeConfig {
        enable_vulkan: false,
        virtual_devices: 2,
        transfer_workers: 4,
        transfer_policy: policy,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn sliced_rows_land_in_a_dense_destination() {
    let rt = runtime(TransferPolicy::default());
    let mut src: Vec<i32> = (0..12).collect();
    let mut dst = vec![0i32; 4];
    {
        let s = View::from_slice_mut(&mut src, &[4, 3]).unwrap();
        let s = s.slice(&[Range::from(1..3), Range::from(0..2)]).unwrap();
        let d = View::from_slice_mut(&mut dst, &[2, 2]).unwrap();
        rt.copy(&s, &d).unwrap();
    }
    // src[1][0], src[1][1], src[2][0], src[2][1]
    assert_eq!(dst, vec![3, 4, 6, 7]);
}

#[test]
fn mismatched_extents_are_rejected() {
    let mut a = vec![0u8; 6];
    let mut b = vec![0u8; 6];
    let a = View::from_slice_mut(&mut a, &[2, 3]).unwrap();
    let b = View::from_slice_mut(&mut b, &[3, 2]).unwrap();
    assert!(matches!(
        CopyDescriptor::new(&a, &b),
        Err(RuntimeError::ShapeMismatch { .. })
    ));
}

// A -> device B -> C through a random permutation and back must reproduce A.
#[test]
fn permuted_round_trips_through_every_location() {
    let rt = runtime(TransferPolicy::default());
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for location in [
        StorageLocation::Host,
        StorageLocation::Pinned,
        StorageLocation::Virtual(0),
        StorageLocation::Virtual(1),
    ] {
        for _ in 0..8 {
            let rank = rng.random_range(1..=4);
            let extent: Vec<usize> = (0..rank).map(|_| rng.random_range(1..=5)).collect();
            let mut order: Vec<usize> = (0..rank).collect();
            order.shuffle(&mut rng);

            let count: usize = extent.iter().product();
            let mut a: Vec<u32> = (0..count).map(|_| rng.random()).collect();
            let reference = a.clone();
            let mut c = vec![0u32; count];

            let b = rt.allocate(location, count * 4).unwrap();
            let permuted: Vec<usize> = order.iter().map(|&d| extent[d]).collect();
            {
                let av = View::from_slice_mut(&mut a, &extent).unwrap().permute(&order).unwrap();
                let bv = b.contiguous_view(&permuted, 4).unwrap();
                rt.copy(&av, &bv).unwrap();

                // B holds A in permuted row-major order
                let expected: Vec<u32> = IndexSpace::new(&permuted)
                    .map(|idx| reference[av.offset_of(&idx).unwrap()])
                    .collect();
                assert_eq!(b.to_vec::<u32>().unwrap(), expected);

                let cv = View::from_slice_mut(&mut c, &extent).unwrap().permute(&order).unwrap();
                rt.copy(&bv, &cv).unwrap();
            }
            assert_eq!(c, reference, "location {} extent {:?} order {:?}", location, extent, order);
        }
    }
}

#[test]
fn reversed_strides_copy_backwards() {
    let rt = runtime(TransferPolicy::default());
    let mut src: Vec<u16> = (0..10).collect();
    let mut dst = vec![0u16; 5];
    {
        let s = View::from_slice_mut(&mut src, &[10]).unwrap();
        let s = s.slice(&[Range::new(9, -1, -2)]).unwrap();
        let d = View::from_slice_mut(&mut dst, &[5]).unwrap();
        rt.copy(&s, &d).unwrap();
    }
    assert_eq!(dst, vec![9, 7, 5, 3, 1]);
}

#[test]
fn device_to_device_across_virtual_devices() {
    let rt = runtime(TransferPolicy::default());
    let a = rt.allocate(StorageLocation::Virtual(0), 8 * 8).unwrap();
    let b = rt.allocate(StorageLocation::Virtual(1), 8 * 8).unwrap();
    a.write_slice(&(0..8).map(|v| v as f64).collect::<Vec<_>>()).unwrap();

    let av = a.contiguous_view(&[2, 4], 8).unwrap();
    let bv = b.contiguous_view(&[4, 2], 8).unwrap();
    rt.copy(&av.transpose(), &bv).unwrap();

    assert_eq!(
        b.to_vec::<f64>().unwrap(),
        vec![0.0, 4.0, 1.0, 5.0, 2.0, 6.0, 3.0, 7.0]
    );
}

#[test]
fn async_scope_waits_for_every_deferred_copy() {
    let rt = runtime(TransferPolicy::default());
    let device = rt.allocate(StorageLocation::Virtual(0), 4 * 16 * 16).unwrap();
    let mut src: Vec<f32> = (0..256).map(|v| v as f32 * 0.5).collect();
    let reference = src.clone();
    {
        let host = View::from_slice_mut(&mut src, &[16, 16]).unwrap();
        let dev = device.contiguous_view(&[16, 16], 4).unwrap();
        let top = CopyDescriptor::new(
            &host.slice(&[Range::from(0..8), Range::full(16)]).unwrap(),
            &dev.slice(&[Range::from(0..8), Range::full(16)]).unwrap(),
        )
        .unwrap();
        let bottom = CopyDescriptor::new(
            &host.slice(&[Range::from(8..16), Range::full(16)]).unwrap(),
            &dev.slice(&[Range::from(8..16), Range::full(16)]).unwrap(),
        )
        .unwrap();

        let tokens = rt
            .engine()
            .scope(|scope| {
                vec![
                    scope.copy_async(&top).unwrap(),
                    scope.copy_async(&bottom).unwrap(),
                ]
            })
            .unwrap();
        assert!(tokens.iter().all(|t| t.is_complete()));
        flowrt::interop::wait_all(&tokens).unwrap();
    }

    let back = device.to_vec::<f32>().unwrap();
    for (got, want) in back.iter().zip(reference.iter()) {
        approx::assert_relative_eq!(*got, *want);
    }
}

#[test]
fn panicking_scope_still_lands_deferred_copies() {
    let rt = runtime(TransferPolicy::default());
    let device = rt.allocate(StorageLocation::Virtual(0), 4 * 64).unwrap();
    let mut src: Vec<u32> = (0..64).collect();
    {
        let host = View::from_slice_mut(&mut src, &[8, 8]).unwrap();
        let dev = device.contiguous_view(&[8, 8], 4).unwrap();
        let desc = CopyDescriptor::new(&host, &dev).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rt.engine().scope(|scope| {
                scope.copy_async(&desc).unwrap();
                panic!("stage failed");
            })
        }));
        assert!(outcome.is_err());
    }
    assert_eq!(device.to_vec::<u32>().unwrap(), (0..64).collect::<Vec<u32>>());
}

#[test]
fn blocking_policy_returns_completed_tokens() {
    let rt = runtime(TransferPolicy::uniform(TransferMode::Blocking));
    let device = rt.allocate(StorageLocation::Virtual(1), 12).unwrap();
    let mut src = vec![1u32, 2, 3];
    let host = View::from_slice_mut(&mut src, &[3]).unwrap();
    let dev = device.contiguous_view(&[3], 4).unwrap();
    let desc = CopyDescriptor::new(&host, &dev).unwrap();

    rt.engine()
        .scope(|scope| {
            let token = scope.copy_async(&desc).unwrap();
            assert!(token.is_complete());
            assert_eq!(scope.pending(), 0);
        })
        .unwrap();
    assert_eq!(device.to_vec::<u32>().unwrap(), vec![1, 2, 3]);
}

#[test]
fn accumulate_reduces_instead_of_overwriting() {
    let rt = runtime(TransferPolicy::default());
    let mut src = vec![3u8, 5, 6];
    let mut dst = vec![1u8, 1, 2];
    {
        let s = View::from_slice_mut(&mut src, &[3]).unwrap();
        let d = View::from_slice_mut(&mut dst, &[3]).unwrap();
        let desc = CopyDescriptor::new(&s, &d).unwrap();
        rt.engine()
            .copy_accumulate::<u8>(&desc, ReductionType::BitwiseXor)
            .unwrap();
    }
    assert_eq!(dst, vec![2, 4, 4]);

    let device = rt.allocate(StorageLocation::Virtual(0), 3).unwrap();
    let dev = device.contiguous_view(&[3], 1).unwrap();
    let s = View::from_slice_mut(&mut src, &[3]).unwrap();
    let desc = CopyDescriptor::new(&s, &dev).unwrap();
    assert!(matches!(
        rt.engine().copy_accumulate::<u8>(&desc, ReductionType::Sum),
        Err(RuntimeError::UnsupportedLocation { .. })
    ));
}

#[test]
fn materialized_source_fills_a_strided_destination() {
    let rt = runtime(TransferPolicy::default());
    let mut data = vec![0i64; 12];
    {
        let v = View::from_slice_mut(&mut data, &[3, 4]).unwrap();
        let odd_columns = v.slice(&[Range::full(3), Range::new(1, 4, 2)]).unwrap();
        rt.engine()
            .materialize(&odd_columns, |idx| (idx[0] * 100 + idx[1]) as i64)
            .unwrap();
    }
    assert_eq!(data, vec![0, 0, 0, 1, 0, 100, 0, 101, 0, 200, 0, 201]);
}

#[test]
fn reshaped_copy_between_ranks() {
    let rt = runtime(TransferPolicy::default());
    let device = rt.allocate(StorageLocation::Virtual(0), 24).unwrap();
    let mut src: Vec<u8> = (0..24).collect();
    {
        let s = View::from_slice_mut(&mut src, &[2, 3, 4]).unwrap();
        let d = device.contiguous_view(&[6, 4], 1).unwrap();
        rt.engine().copy_reshaped(&s, &d).unwrap();
    }
    assert_eq!(device.to_vec::<u8>().unwrap(), (0..24).collect::<Vec<u8>>());
}
