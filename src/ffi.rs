//! The C entry point, for glue code of managed runtimes.
//!
//! Bitmaps are passed as tables of callbacks shaped after `AndroidBitmap_getInfo`,
//! `AndroidBitmap_lockPixels` and `AndroidBitmap_unlockPixels`, so JNI glue can forward the
//! NDK functions directly with the `JNIEnv` and `jobject` stashed in `context`.
use core::cell::Cell;
use core::ffi::{c_int, c_void};
use core::ptr::NonNull;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use crate::bitmap::{Bitmap, RawPixels};
use crate::bridge::Bridge;
use crate::buffer::{BitmapInfo, PixelFormat};
use crate::config::Options;
use crate::error::{LockError, TransformError};

pub const PIXEL_BRIDGE_SUCCESS: c_int = 0;
pub const PIXEL_BRIDGE_INVALID_DIMENSIONS: c_int = -1;
pub const PIXEL_BRIDGE_LOCK_FAILED: c_int = -2;
pub const PIXEL_BRIDGE_LAYOUT_MISMATCH: c_int = -3;
pub const PIXEL_BRIDGE_CONTEXT_FAILED: c_int = -4;
pub const PIXEL_BRIDGE_DISPATCH_FAILED: c_int = -5;
pub const PIXEL_BRIDGE_NULL_HANDLE: c_int = -6;
pub const PIXEL_BRIDGE_PANIC: c_int = -7;

/// Same layout as `AndroidBitmapInfo`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct RawBitmapInfo {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    /// An `AndroidBitmapFormat`, `1` being RGBA8888.
    pub format: i32,
    pub flags: u32,
}

/// A bitmap owned by the caller.
///
/// Every callback receives `context` and returns `0` on success. `lock_pixels` stores the
/// address of the first pixel, which must stay valid until `unlock_pixels`.
#[repr(C)]
pub struct RawBitmap {
    pub context: *mut c_void,
    pub get_info: unsafe extern "C" fn(*mut c_void, *mut RawBitmapInfo) -> c_int,
    pub lock_pixels: unsafe extern "C" fn(*mut c_void, *mut *mut c_void) -> c_int,
    pub unlock_pixels: unsafe extern "C" fn(*mut c_void) -> c_int,
}

/// Adapts a callback table to `Bitmap`.
struct Foreign<'a> {
    raw: &'a RawBitmap,
    info: Cell<Option<BitmapInfo>>,
}

static BRIDGE: Mutex<Option<Arc<Bridge>>> = Mutex::new(None);

/// Replace `output`'s pixels with the mono transform of `input`'s pixels.
///
/// Returns one of the `PIXEL_BRIDGE_*` status codes. The bridge is set up on first use from
/// the environment, see [`Options::from_env`]; a failed setup is retried on the next call.
///
/// # Safety
///
/// Both pointers must be null or point to valid `RawBitmap`s whose callbacks uphold the
/// contract of [`Bitmap`] for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn pixel_bridge_transform_mono(
    width: c_int,
    height: c_int,
    input: *const RawBitmap,
    output: *const RawBitmap,
) -> c_int {
    let call = AssertUnwindSafe(|| {
        let bridge = match shared_bridge() {
            Ok(bridge) => bridge,
            Err(err) => return status(&Err(err)),
        };

        // SAFETY: forwarded from our caller.
        unsafe { transform_raw(&bridge, width, height, input, output) }
    });

    catch_unwind(call).unwrap_or_else(|_| {
        log::error!("Panic during transform, reporting failure");
        PIXEL_BRIDGE_PANIC
    })
}

/// Run the mono transform of a bridge on two callback tables.
///
/// # Safety
///
/// See [`pixel_bridge_transform_mono`].
pub unsafe fn transform_raw(
    bridge: &Bridge,
    width: c_int,
    height: c_int,
    input: *const RawBitmap,
    output: *const RawBitmap,
) -> c_int {
    let (input, output) = match (input.as_ref(), output.as_ref()) {
        (Some(input), Some(output)) => (Foreign::new(input), Foreign::new(output)),
        _ => return PIXEL_BRIDGE_NULL_HANDLE,
    };

    status(&bridge.transform_mono(width, height, &input, &output))
}

/// The status code reported for a result.
pub fn status(result: &Result<(), TransformError>) -> c_int {
    match result {
        Ok(()) => PIXEL_BRIDGE_SUCCESS,
        Err(err) => {
            log::debug!("Transform failed: {}", err);
            match err {
                TransformError::InvalidDimensions { .. } => PIXEL_BRIDGE_INVALID_DIMENSIONS,
                TransformError::BufferLockFailure(_) => PIXEL_BRIDGE_LOCK_FAILED,
                TransformError::LayoutMismatch { .. } => PIXEL_BRIDGE_LAYOUT_MISMATCH,
                TransformError::ComputeContextFailure(_) => PIXEL_BRIDGE_CONTEXT_FAILED,
                TransformError::DispatchFailure(_) => PIXEL_BRIDGE_DISPATCH_FAILED,
            }
        }
    }
}

fn shared_bridge() -> Result<Arc<Bridge>, TransformError> {
    let mut shared = BRIDGE.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(bridge) = shared.as_ref() {
        return Ok(Arc::clone(bridge));
    }

    let options = Options::from_env();
    log::debug!("Setting up the shared bridge with {:?}", options);
    let bridge = Arc::new(Bridge::with_options(&options)?);
    *shared = Some(Arc::clone(&bridge));
    Ok(bridge)
}

impl<'a> Foreign<'a> {
    fn new(raw: &'a RawBitmap) -> Self {
        Foreign {
            raw,
            info: Cell::new(None),
        }
    }
}

// SAFETY: forwarded to the caller of `transform_raw`.
unsafe impl Bitmap for Foreign<'_> {
    fn info(&self) -> Result<BitmapInfo, LockError> {
        let mut raw = RawBitmapInfo::default();
        // SAFETY: the callback table is valid per the caller.
        let code = unsafe { (self.raw.get_info)(self.raw.context, &mut raw) };

        if code != 0 {
            return Err(LockError::refused(code));
        }

        let info = BitmapInfo {
            width: raw.width,
            height: raw.height,
            stride: raw.stride,
            format: PixelFormat::from_android(raw.format),
        };

        self.info.set(Some(info));
        Ok(info)
    }

    fn lock_pixels(&self) -> Result<RawPixels, LockError> {
        let info = match self.info.get() {
            Some(info) => info,
            None => self.info()?,
        };

        let len = info.required_len().ok_or_else(LockError::invalid_handle)?;
        let mut address: *mut c_void = core::ptr::null_mut();
        // SAFETY: the callback table is valid per the caller.
        let code = unsafe { (self.raw.lock_pixels)(self.raw.context, &mut address) };

        if code != 0 {
            return Err(LockError::refused(code));
        }

        match NonNull::new(address.cast::<u8>()) {
            Some(ptr) => Ok(RawPixels { ptr, len }),
            None => {
                // Locked but unusable, give it back.
                // SAFETY: paired with the successful lock above.
                unsafe { self.unlock_pixels() };
                Err(LockError::null_pixels())
            }
        }
    }

    unsafe fn unlock_pixels(&self) {
        let code = (self.raw.unlock_pixels)(self.raw.context);
        if code != 0 {
            log::warn!("Unlocking bitmap pixels failed with {}", code);
        }
    }
}
