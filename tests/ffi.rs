//! The C entry point, driven through callback tables like JNI glue would.
#[path = "util.rs"]
mod util;

use pixel_bridge::ffi::{self, RawBitmap};
use pixel_bridge::{Bridge, HostBitmap};

use self::util::{get_rgb565_info, init_logging, raw};

#[test]
fn mono_example() {
    init_logging();
    let input = HostBitmap::from_pixels(2, 1, &[[255, 0, 0, 255], [0, 255, 0, 255]]);
    let mut output = HostBitmap::new(2, 1);

    let (raw_in, raw_out) = (raw(&input), raw(&output));
    let status = unsafe { ffi::transform_raw(&Bridge::host(), 2, 1, &raw_in, &raw_out) };

    assert_eq!(status, ffi::PIXEL_BRIDGE_SUCCESS);
    assert_eq!(output.pixels(), vec![[85, 85, 85, 255]; 2]);
    assert_eq!((input.lock_count(), input.unlock_count()), (1, 1));
    assert_eq!((output.lock_count(), output.unlock_count()), (1, 1));
}

#[test]
fn null_handles() {
    let bitmap = HostBitmap::new(1, 1);
    let raw_bitmap = raw(&bitmap);
    let bridge = Bridge::host();

    let status = unsafe { ffi::transform_raw(&bridge, 1, 1, core::ptr::null(), &raw_bitmap) };
    assert_eq!(status, ffi::PIXEL_BRIDGE_NULL_HANDLE);

    let status = unsafe { ffi::transform_raw(&bridge, 1, 1, &raw_bitmap, core::ptr::null()) };
    assert_eq!(status, ffi::PIXEL_BRIDGE_NULL_HANDLE);
    assert_eq!(bitmap.lock_count(), 0);
}

#[test]
fn status_codes() {
    let bridge = Bridge::host();
    let input = HostBitmap::new(2, 2);
    let output = HostBitmap::new(2, 2);
    let (raw_in, raw_out) = (raw(&input), raw(&output));

    let status = unsafe { ffi::transform_raw(&bridge, 0, 2, &raw_in, &raw_out) };
    assert_eq!(status, ffi::PIXEL_BRIDGE_INVALID_DIMENSIONS);

    let status = unsafe { ffi::transform_raw(&bridge, 2, 3, &raw_in, &raw_out) };
    assert_eq!(status, ffi::PIXEL_BRIDGE_LAYOUT_MISMATCH);

    output.refuse_locks(Some(-9));
    let status = unsafe { ffi::transform_raw(&bridge, 2, 2, &raw_in, &raw_out) };
    assert_eq!(status, ffi::PIXEL_BRIDGE_LOCK_FAILED);
    output.refuse_locks(None);

    let rgb565 = RawBitmap {
        get_info: get_rgb565_info,
        ..raw(&output)
    };
    let status = unsafe { ffi::transform_raw(&bridge, 2, 2, &raw_in, &rgb565) };
    assert_eq!(status, ffi::PIXEL_BRIDGE_LAYOUT_MISMATCH);

    assert!(!input.is_locked());
    assert!(!output.is_locked());
    assert_eq!(input.lock_count(), input.unlock_count());
    assert_eq!(output.lock_count(), output.unlock_count());
}
