// This is almost certainly not all used in all tests.
#![allow(dead_code)]
use core::ffi::{c_int, c_void};
use std::hash::Hasher;

use pixel_bridge::ffi::{RawBitmap, RawBitmapInfo};
use pixel_bridge::{Bitmap, Bridge, HostBitmap, Options, TransformError};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A reproducible, irregular pattern of pixels.
pub fn pattern(width: u32, height: u32, seed: u32) -> Vec<[u8; 4]> {
    let mut state = seed.wrapping_mul(0x9e37_79b9) | 1;
    (0..width * height)
        .map(|_| {
            // xorshift32
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state.to_le_bytes()
        })
        .collect()
}

pub fn checksum(bitmap: &mut HostBitmap) -> u64 {
    let image = bitmap.to_image();
    let mut crc = crc32fast::Hasher::new();
    crc.write_u32(image.width());
    crc.write_u32(image.height());
    crc.write(image.as_raw());
    crc.finish()
}

/// A bridge on a compute device, or `None` when this machine has no usable adapter.
pub fn device_bridge() -> Option<Bridge> {
    match Bridge::device(&Options::default()) {
        Ok(bridge) => Some(bridge),
        Err(TransformError::ComputeContextFailure(err)) => {
            eprintln!("Skipping device test: {}", err);
            None
        }
        Err(err) => panic!("Unexpected error setting up the device: {}", err),
    }
}

pub unsafe extern "C" fn get_info(context: *mut c_void, info: *mut RawBitmapInfo) -> c_int {
    let bitmap = &*(context as *const HostBitmap);
    match bitmap.info() {
        Ok(found) => {
            *info = RawBitmapInfo {
                width: found.width,
                height: found.height,
                stride: found.stride,
                format: 1,
                flags: 0,
            };
            0
        }
        Err(_) => -1,
    }
}

pub unsafe extern "C" fn get_rgb565_info(context: *mut c_void, info: *mut RawBitmapInfo) -> c_int {
    let status = get_info(context, info);
    (*info).format = 4;
    status
}

pub unsafe extern "C" fn lock_pixels(context: *mut c_void, address: *mut *mut c_void) -> c_int {
    let bitmap = &*(context as *const HostBitmap);
    match bitmap.lock_pixels() {
        Ok(pixels) => {
            *address = pixels.ptr.as_ptr().cast();
            0
        }
        Err(err) => err.status().unwrap_or(-1),
    }
}

pub unsafe extern "C" fn unlock_pixels(context: *mut c_void) -> c_int {
    let bitmap = &*(context as *const HostBitmap);
    bitmap.unlock_pixels();
    0
}

/// A callback table over a host bitmap, as glue code would hand it over.
pub fn raw(bitmap: &HostBitmap) -> RawBitmap {
    RawBitmap {
        context: bitmap as *const HostBitmap as *mut c_void,
        get_info,
        lock_pixels,
        unlock_pixels,
    }
}
