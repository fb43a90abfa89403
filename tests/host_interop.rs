use flowrt::interop::host_array::typestr;
use flowrt::math::Complex32;
use flowrt::storage::Address;
use flowrt::{
    HostArray, Range, Runtime, RuntimeConfig, RuntimeError, StorageLocation, TransferMode, View,
};

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig {
        enable_vulkan: false,
        virtual_devices: 1,
        transfer_workers: 1,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn buffer_published_and_viewed_back() {
    let rt = runtime();
    let buffer = rt.allocate(StorageLocation::Pinned, 6 * 4).unwrap();
    buffer.write_slice(&[1i32, 2, 3, 4, 5, 6]).unwrap();

    let view = buffer.contiguous_view(&[2, 3], 4).unwrap();
    let array = HostArray::publish::<i32>(&view).unwrap();
    assert_eq!(array.shape, vec![2, 3]);
    assert_eq!(array.strides, vec![12, 4]);
    assert_eq!(array.typestr, typestr::<i32>());
    assert!(array.is_c_contiguous());
    assert!(!array.readonly);

    // SAFETY: `buffer` outlives the returned view
    let back = unsafe { array.view() }.unwrap();
    let mut out = vec![0i32; 6];
    {
        let dst = View::from_slice_mut(&mut out, &[3, 2]).unwrap();
        rt.copy(&back.transpose(), &dst).unwrap();
    }
    assert_eq!(out, vec![1, 4, 2, 5, 3, 6]);
}

#[test]
fn reversed_view_publishes_negative_strides() {
    let mut data: Vec<Complex32> = (0..4).map(|i| Complex32::new(i as f32, -(i as f32))).collect();
    let view = View::from_slice_mut(&mut data, &[4]).unwrap();
    let reversed = view.slice(&[Range::new(3, -1, -1)]).unwrap();

    let array = HostArray::publish_readonly::<Complex32>(&reversed).unwrap();
    assert!(array.readonly);
    assert_eq!(array.strides, vec![-8]);
    assert_eq!(array.itemsize, 8);

    let back = unsafe { array.view() }.unwrap();
    assert_eq!(back.offset_of(&[0]).unwrap(), 3);
    assert_eq!(back.stride(), &[-1]);
}

#[test]
fn device_buffers_cannot_be_published() {
    let rt = runtime();
    let buffer = rt.allocate(StorageLocation::Virtual(0), 16).unwrap();
    let view = buffer.contiguous_view(&[4], 4).unwrap();
    assert!(matches!(
        HostArray::publish::<f32>(&view),
        Err(RuntimeError::UnsupportedLocation { .. })
    ));
}

#[test]
fn environment_facts() {
    assert!(flowrt::os::page_size().is_power_of_two());
    assert!(flowrt::os::cpu_count() >= 1);

    let rt = runtime();
    assert_eq!(rt.device_count(flowrt::LocationKind::Gpu), 0);
    assert_eq!(rt.device_count(flowrt::LocationKind::Virtual), 1);
    assert_eq!(rt.device_count(flowrt::LocationKind::Host), 1);
}

#[test]
fn raw_transfer_into_device_buffer() {
    let rt = runtime();
    let buffer = rt.allocate(StorageLocation::Virtual(0), 8).unwrap();
    let src = [9u8, 8, 7, 6, 5, 4, 3, 2];

    // SAFETY: `src` is live for the blocking call and the buffer holds 8 bytes
    let token = unsafe {
        rt.interop().transfer(
            Address::host(src.as_ptr() as *mut u8),
            buffer.region().at(0),
            StorageLocation::Host,
            StorageLocation::Virtual(0),
            8,
            TransferMode::Blocking,
        )
    }
    .unwrap();
    assert!(token.is_none());

    let mut out = [0u8; 8];
    buffer.read_bytes(0, &mut out).unwrap();
    assert_eq!(out, src);
}
