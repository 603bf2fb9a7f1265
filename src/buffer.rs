//! Defines layout and buffer of our images.
use crate::error::{Mismatch, TransformError};

/// The byte layout of the packed grid that kernels operate on.
///
/// An inner invariant is that the layout fits in memory and in particular into a `usize`, and
/// that neither dimension is zero.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferLayout {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) bytes_per_row: u32,
}

/// The pixel formats a bitmap may report.
///
/// These mirror the formats of Android bitmaps, only `Rgba8888` is accepted for transforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    Rgba8888,
    Rgb565,
    Rgba4444,
    A8,
    Unknown(i32),
}

/// What a bitmap reports about itself before being locked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitmapInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes between the start of two consecutive rows.
    pub stride: u32,
    pub format: PixelFormat,
}

impl BufferLayout {
    /// The tightly packed RGBA8 layout of a `width` by `height` grid.
    ///
    /// Fails for non-positive dimensions and grids whose byte length does not fit into memory.
    pub fn with_rgba8(width: i32, height: i32) -> Result<Self, TransformError> {
        let invalid = || TransformError::InvalidDimensions { width, height };

        let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(invalid()),
        };

        let bytes_per_row = w.checked_mul(4).ok_or_else(invalid)?;
        let total = u64::from(bytes_per_row) * u64::from(h);
        usize::try_from(total).map_err(|_| invalid())?;

        Ok(BufferLayout {
            width: w,
            height: h,
            bytes_per_row,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_count(&self) -> usize {
        // No overflow due to inner invariant.
        (self.width as usize) * (self.height as usize)
    }

    pub fn u64_len(&self) -> u64 {
        // No overflow due to inner invariant.
        u64::from(self.bytes_per_row) * u64::from(self.height)
    }

    pub fn byte_len(&self) -> usize {
        // No overflow due to inner invariant.
        (self.bytes_per_row as usize) * (self.height as usize)
    }

    /// Check that a bitmap can hold this grid.
    pub fn check(&self, info: &BitmapInfo) -> Result<(), TransformError> {
        let expected = (self.width, self.height);
        let mismatch = |reason| TransformError::mismatch(expected, *info, reason);

        if info.format != PixelFormat::Rgba8888 {
            return Err(mismatch(Mismatch::Format(info.format)));
        }

        if (info.width, info.height) != expected {
            return Err(mismatch(Mismatch::Size));
        }

        if info.stride < self.bytes_per_row {
            return Err(mismatch(Mismatch::Stride));
        }

        Ok(())
    }

    /// Copy the rows of a strided bitmap into a packed buffer.
    pub(crate) fn pack_rows(&self, source: &[u8], source_pitch: usize, target: &mut [u8]) {
        let pitch = self.bytes_per_row as usize;

        for y in 0..self.height as usize {
            let source_row = &source[y * source_pitch..][..pitch];
            let target_row = &mut target[y * pitch..][..pitch];
            target_row.copy_from_slice(source_row);
        }
    }

    /// Copy a packed buffer into the rows of a strided bitmap.
    ///
    /// Padding bytes at the end of each target row are left alone.
    pub(crate) fn unpack_rows(&self, source: &[u8], target: &mut [u8], target_pitch: usize) {
        let pitch = self.bytes_per_row as usize;

        for y in 0..self.height as usize {
            let source_row = &source[y * pitch..][..pitch];
            let target_row = &mut target[y * target_pitch..][..pitch];
            target_row.copy_from_slice(source_row);
        }
    }
}

impl BitmapInfo {
    /// Info of a bitmap with packed RGBA8888 rows.
    pub fn rgba8(width: u32, height: u32) -> Self {
        BitmapInfo {
            width,
            height,
            stride: width.saturating_mul(4),
            format: PixelFormat::Rgba8888,
        }
    }

    /// The number of bytes a locked bitmap must at least provide.
    pub fn required_len(&self) -> Option<usize> {
        let len = u64::from(self.stride).checked_mul(u64::from(self.height))?;
        usize::try_from(len).ok()
    }
}

impl PixelFormat {
    /// Decode the format code of `AndroidBitmapFormat`.
    pub fn from_android(code: i32) -> Self {
        match code {
            1 => PixelFormat::Rgba8888,
            4 => PixelFormat::Rgb565,
            7 => PixelFormat::Rgba4444,
            8 => PixelFormat::A8,
            other => PixelFormat::Unknown(other),
        }
    }
}
