//! Pixel buffers owned by someone else, and scoped access to them.
use core::cell::{Cell, UnsafeCell};
use core::ptr::NonNull;

use crate::buffer::{BitmapInfo, PixelFormat};
use crate::error::LockError;

/// A pixel buffer that is lent to us by its owner.
///
/// # Safety
///
/// After `lock_pixels` succeeded, the returned region must stay valid for reads and writes of
/// `len` bytes and must not be accessed by anyone else until the matching `unlock_pixels`. The
/// region must also not move in the meantime. `info` must describe the locked region.
pub unsafe trait Bitmap {
    /// Describe the bitmap. Called before locking.
    fn info(&self) -> Result<BitmapInfo, LockError>;

    /// Pin the pixels in memory and grant exclusive access to them.
    fn lock_pixels(&self) -> Result<RawPixels, LockError>;

    /// Release a previous successful lock.
    ///
    /// # Safety
    ///
    /// Must be paired with exactly one successful `lock_pixels` and no reference to the locked
    /// region may be used afterwards.
    unsafe fn unlock_pixels(&self);
}

/// A locked region: pointer and length.
#[derive(Clone, Copy, Debug)]
pub struct RawPixels {
    pub ptr: NonNull<u8>,
    pub len: usize,
}

/// Holds a bitmap locked while alive.
///
/// Dropping the guard unlocks the bitmap, on the success path as well as on any early return.
pub struct PixelLock<'a> {
    bitmap: &'a dyn Bitmap,
    info: BitmapInfo,
    pixels: RawPixels,
}

/// A bitmap in host memory.
///
/// Rows may carry padding. This stands in for bitmaps of a managed runtime and counts how it is
/// locked, which is mostly interesting for tests.
pub struct HostBitmap {
    width: u32,
    height: u32,
    stride: u32,
    data: UnsafeCell<Vec<u8>>,
    locked: Cell<bool>,
    lock_count: Cell<usize>,
    unlock_count: Cell<usize>,
    refuse: Cell<Option<i32>>,
}

impl<'a> PixelLock<'a> {
    /// Describe and lock the bitmap.
    ///
    /// Fails if the bitmap refuses, or if the locked region is shorter than the bitmap's info
    /// promises. In the latter case the bitmap is unlocked again before returning.
    pub fn acquire(bitmap: &'a dyn Bitmap) -> Result<Self, LockError> {
        let info = bitmap.info()?;
        let pixels = bitmap.lock_pixels()?;

        let guard = PixelLock {
            bitmap,
            info,
            pixels,
        };

        let required = info.required_len();
        match required {
            Some(len) if len <= guard.pixels.len => Ok(guard),
            _ => {
                log::warn!(
                    "Locked {} bytes for a {}x{} bitmap with stride {}",
                    guard.pixels.len,
                    info.width,
                    info.height,
                    info.stride,
                );
                Err(LockError::truncated(guard.pixels.len, required))
            }
        }
    }

    pub fn info(&self) -> &BitmapInfo {
        &self.info
    }

    pub fn len(&self) -> usize {
        self.pixels.len
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the `Bitmap` contract grants us the region until we unlock in `drop`.
        unsafe { core::slice::from_raw_parts(self.pixels.ptr.as_ptr(), self.pixels.len) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and the `&mut self` receiver makes this the only view into it.
        unsafe { core::slice::from_raw_parts_mut(self.pixels.ptr.as_ptr(), self.pixels.len) }
    }
}

impl Drop for PixelLock<'_> {
    fn drop(&mut self) {
        // SAFETY: paired with the successful lock in `acquire`; all slices borrow `self`.
        unsafe { self.bitmap.unlock_pixels() }
    }
}

impl HostBitmap {
    /// A transparent black bitmap with packed rows.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_stride(width, height, width * 4)
    }

    /// A transparent black bitmap whose rows are `stride` bytes apart.
    ///
    /// Panics if `stride` is smaller than a packed row.
    pub fn with_stride(width: u32, height: u32, stride: u32) -> Self {
        assert!(stride >= width * 4, "stride {} too small for width {}", stride, width);
        let len = stride as usize * height as usize;

        HostBitmap {
            width,
            height,
            stride,
            data: UnsafeCell::new(vec![0; len]),
            locked: Cell::new(false),
            lock_count: Cell::new(0),
            unlock_count: Cell::new(0),
            refuse: Cell::new(None),
        }
    }

    /// A bitmap from a list of pixels in row-major order.
    ///
    /// Panics if the number of pixels does not match the dimensions.
    pub fn from_pixels(width: u32, height: u32, pixels: &[[u8; 4]]) -> Self {
        assert_eq!(pixels.len(), width as usize * height as usize);
        let bitmap = Self::new(width, height);

        // SAFETY: not locked, we hold the only reference.
        let data = unsafe { &mut *bitmap.data.get() };
        data.copy_from_slice(bytemuck::cast_slice(pixels));

        bitmap
    }

    /// Copy an `image` buffer into a new bitmap.
    pub fn from_image(image: &image::RgbaImage) -> Self {
        let bitmap = Self::new(image.width(), image.height());

        // SAFETY: not locked, we hold the only reference.
        let data = unsafe { &mut *bitmap.data.get() };
        data.copy_from_slice(image.as_raw());

        bitmap
    }

    /// Convert the visible pixels to an `image` buffer, dropping row padding.
    pub fn to_image(&mut self) -> image::RgbaImage {
        let mut raw = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            raw.extend_from_slice(self.row(y));
        }

        image::RgbaImage::from_raw(self.width, self.height, raw)
            .expect("raw length matches dimensions")
    }

    /// The visible pixels in row-major order.
    pub fn pixels(&mut self) -> Vec<[u8; 4]> {
        (0..self.height)
            .flat_map(|y| bytemuck::cast_slice::<u8, [u8; 4]>(self.row(y)).to_vec())
            .collect()
    }

    /// All bytes, including padding between rows.
    pub fn as_bytes(&mut self) -> &[u8] {
        self.data.get_mut()
    }

    /// All bytes, including padding between rows.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data.get_mut()
    }

    /// Make every following lock attempt fail with the given status, or succeed again.
    pub fn refuse_locks(&self, status: Option<i32>) {
        self.refuse.set(status);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// How often the bitmap was successfully locked.
    pub fn lock_count(&self) -> usize {
        self.lock_count.get()
    }

    pub fn unlock_count(&self) -> usize {
        self.unlock_count.get()
    }

    fn row(&mut self, y: u32) -> &[u8] {
        let (stride, pitch) = (self.stride as usize, self.width as usize * 4);
        &self.data.get_mut()[y as usize * stride..][..pitch]
    }
}

// SAFETY: the region is the vector's heap allocation, which is neither moved nor resized while
// `&self` is borrowed, and `locked` keeps a second locker out.
unsafe impl Bitmap for HostBitmap {
    fn info(&self) -> Result<BitmapInfo, LockError> {
        Ok(BitmapInfo {
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: PixelFormat::Rgba8888,
        })
    }

    fn lock_pixels(&self) -> Result<RawPixels, LockError> {
        if let Some(status) = self.refuse.get() {
            return Err(LockError::refused(status));
        }

        if self.locked.replace(true) {
            return Err(LockError::already_locked());
        }

        self.lock_count.set(self.lock_count.get() + 1);
        // SAFETY: the flag was clear, so no lock hands out this memory. The borrow ends with
        // this call and only the pointer outlives it.
        let data = unsafe { &mut *self.data.get() };

        Ok(RawPixels {
            ptr: NonNull::new(data.as_mut_ptr()).unwrap_or(NonNull::dangling()),
            len: data.len(),
        })
    }

    unsafe fn unlock_pixels(&self) {
        if !self.locked.replace(false) {
            log::warn!("Unlocking a bitmap that was not locked");
            return;
        }

        self.unlock_count.set(self.unlock_count.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_unlocks_on_drop() {
        let bitmap = HostBitmap::new(2, 2);

        {
            let mut lock = PixelLock::acquire(&bitmap).expect("lockable");
            assert!(bitmap.is_locked());
            assert_eq!(lock.len(), 16);
            lock.as_bytes_mut()[0] = 7;
        }

        assert!(!bitmap.is_locked());
        assert_eq!((bitmap.lock_count(), bitmap.unlock_count()), (1, 1));

        let mut bitmap = bitmap;
        assert_eq!(bitmap.as_bytes()[0], 7);
    }

    #[test]
    fn no_double_lock() {
        let bitmap = HostBitmap::new(1, 1);
        let _first = PixelLock::acquire(&bitmap).expect("lockable");
        assert!(PixelLock::acquire(&bitmap).is_err());
        assert_eq!(bitmap.lock_count(), 1);
    }

    #[test]
    fn refused_lock_reports_status() {
        let bitmap = HostBitmap::new(1, 1);
        bitmap.refuse_locks(Some(-3));

        let err = PixelLock::acquire(&bitmap).err().expect("lock refused");
        assert_eq!(err.status(), Some(-3));
        assert!(!bitmap.is_locked());

        bitmap.refuse_locks(None);
        assert!(PixelLock::acquire(&bitmap).is_ok());
    }

    #[test]
    fn short_region_is_unlocked() {
        struct Liar(HostBitmap);

        unsafe impl Bitmap for Liar {
            fn info(&self) -> Result<BitmapInfo, LockError> {
                Ok(BitmapInfo::rgba8(4, 4))
            }

            fn lock_pixels(&self) -> Result<RawPixels, LockError> {
                self.0.lock_pixels()
            }

            unsafe fn unlock_pixels(&self) {
                self.0.unlock_pixels()
            }
        }

        let liar = Liar(HostBitmap::new(1, 1));
        assert!(PixelLock::acquire(&liar).is_err());
        assert!(!liar.0.is_locked());
        assert_eq!(liar.0.unlock_count(), 1);
    }

    #[test]
    fn padded_rows() {
        let mut bitmap = HostBitmap::with_stride(1, 2, 8);
        bitmap.as_bytes_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);
        bitmap.as_bytes_mut()[8..12].copy_from_slice(&[5, 6, 7, 8]);
        assert_eq!(bitmap.pixels(), vec![[1, 2, 3, 4], [5, 6, 7, 8]]);

        let image = bitmap.to_image();
        assert_eq!(image.as_raw(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
