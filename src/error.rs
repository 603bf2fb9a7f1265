//! Failures of a transform call.
use core::fmt;

use crate::buffer::{BitmapInfo, PixelFormat};

/// The reason a transform did not produce output.
///
/// When this is returned the output bitmap has not been written and both bitmaps have been
/// unlocked again, whichever step failed.
#[derive(Debug)]
pub enum TransformError {
    /// Width or height was not positive, or the grid does not fit into memory.
    InvalidDimensions { width: i32, height: i32 },
    /// One of the bitmaps could not be locked for the call's duration.
    BufferLockFailure(LockError),
    /// A bitmap does not describe the requested grid of RGBA8888 pixels.
    LayoutMismatch {
        expected: (u32, u32),
        found: BitmapInfo,
        reason: Mismatch,
    },
    /// The compute backend could not be initialized or the kernel not be loaded.
    ComputeContextFailure(ContextError),
    /// The backend reported an error while running the kernel.
    DispatchFailure(DispatchError),
}

/// What exactly is wrong with a bitmap's layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mismatch {
    Size,
    Format(PixelFormat),
    /// The stride is smaller than a packed row.
    Stride,
}

#[derive(Debug)]
pub struct LockError {
    kind: LockErrorKind,
}

#[derive(Debug)]
enum LockErrorKind {
    /// The bitmap was already locked by someone.
    AlreadyLocked,
    /// The bitmap refused, with a status code from its owner.
    Refused(i32),
    /// The owner handed out a null pointer.
    NullPixels,
    /// The bitmap handle itself is invalid.
    InvalidHandle,
    /// The locked region can not hold `stride * height` bytes.
    Truncated { len: usize, required: Option<usize> },
}

#[derive(Debug)]
pub struct ContextError {
    kind: ContextErrorKind,
}

#[derive(Debug)]
enum ContextErrorKind {
    NoAdapter,
    NoComputeShaders(String),
    RequestDevice(wgpu::RequestDeviceError),
    /// The kernel has no program for the device.
    KernelUnavailable(&'static str),
    /// The device rejected the kernel's program or pipeline.
    KernelRejected(wgpu::Error),
}

#[derive(Debug)]
pub struct DispatchError {
    kind: DispatchErrorKind,
}

#[derive(Debug)]
enum DispatchErrorKind {
    /// The image is larger than a single binding the device supports.
    ExceedsLimit { bytes: u64, limit: u64 },
    /// Too many workgroups in one dimension.
    GridTooLarge { groups: u32, limit: u32 },
    Device(wgpu::Error),
    Map(wgpu::BufferAsyncError),
    /// The staging buffers did not match the layout.
    BadStaging { expected: usize, found: usize },
}

impl LockError {
    pub(crate) fn already_locked() -> Self {
        LockError { kind: LockErrorKind::AlreadyLocked }
    }

    pub(crate) fn refused(status: i32) -> Self {
        LockError { kind: LockErrorKind::Refused(status) }
    }

    pub(crate) fn null_pixels() -> Self {
        LockError { kind: LockErrorKind::NullPixels }
    }

    pub(crate) fn invalid_handle() -> Self {
        LockError { kind: LockErrorKind::InvalidHandle }
    }

    pub(crate) fn truncated(len: usize, required: Option<usize>) -> Self {
        LockError { kind: LockErrorKind::Truncated { len, required } }
    }

    /// The status code reported by the bitmap's owner, if any.
    pub fn status(&self) -> Option<i32> {
        match self.kind {
            LockErrorKind::Refused(status) => Some(status),
            _ => None,
        }
    }
}

impl ContextError {
    pub(crate) fn no_adapter() -> Self {
        ContextError { kind: ContextErrorKind::NoAdapter }
    }

    pub(crate) fn no_compute_shaders(adapter: String) -> Self {
        ContextError { kind: ContextErrorKind::NoComputeShaders(adapter) }
    }

    pub(crate) fn kernel_unavailable(name: &'static str) -> Self {
        ContextError { kind: ContextErrorKind::KernelUnavailable(name) }
    }

    pub(crate) fn kernel_rejected(err: wgpu::Error) -> Self {
        ContextError { kind: ContextErrorKind::KernelRejected(err) }
    }
}

impl DispatchError {
    pub(crate) fn exceeds_limit(bytes: u64, limit: u64) -> Self {
        DispatchError { kind: DispatchErrorKind::ExceedsLimit { bytes, limit } }
    }

    pub(crate) fn grid_too_large(groups: u32, limit: u32) -> Self {
        DispatchError { kind: DispatchErrorKind::GridTooLarge { groups, limit } }
    }

    pub(crate) fn device(err: wgpu::Error) -> Self {
        DispatchError { kind: DispatchErrorKind::Device(err) }
    }

    pub(crate) fn bad_staging(expected: usize, found: usize) -> Self {
        DispatchError { kind: DispatchErrorKind::BadStaging { expected, found } }
    }
}

impl TransformError {
    pub(crate) fn mismatch(expected: (u32, u32), found: BitmapInfo, reason: Mismatch) -> Self {
        TransformError::LayoutMismatch { expected, found, reason }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::InvalidDimensions { width, height } => {
                write!(f, "invalid image dimensions {}x{}", width, height)
            }
            TransformError::BufferLockFailure(_) => f.write_str("failed to lock a pixel buffer"),
            TransformError::LayoutMismatch { expected: (w, h), found, reason } => write!(
                f,
                "bitmap {}x{} (stride {}, {:?}) does not fit a {}x{} RGBA8888 grid: {:?}",
                found.width, found.height, found.stride, found.format, w, h, reason,
            ),
            TransformError::ComputeContextFailure(_) => {
                f.write_str("failed to set up the compute context")
            }
            TransformError::DispatchFailure(_) => f.write_str("failed to run the kernel"),
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransformError::BufferLockFailure(err) => Some(err),
            TransformError::ComputeContextFailure(err) => Some(err),
            TransformError::DispatchFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LockErrorKind::AlreadyLocked => f.write_str("bitmap is already locked"),
            LockErrorKind::Refused(status) => write!(f, "bitmap refused to lock ({})", status),
            LockErrorKind::NullPixels => f.write_str("bitmap locked to a null pointer"),
            LockErrorKind::InvalidHandle => f.write_str("invalid bitmap handle"),
            LockErrorKind::Truncated { len, required: Some(required) } => {
                write!(f, "locked {} bytes where {} are required", len, required)
            }
            LockErrorKind::Truncated { len, required: None } => {
                write!(f, "locked {} bytes for a bitmap too large for memory", len)
            }
        }
    }
}

impl std::error::Error for LockError {}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ContextErrorKind::NoAdapter => f.write_str("no suitable adapter found"),
            ContextErrorKind::NoComputeShaders(name) => {
                write!(f, "adapter {} does not support compute shaders", name)
            }
            ContextErrorKind::RequestDevice(err) => write!(f, "device request failed: {}", err),
            ContextErrorKind::KernelUnavailable(name) => {
                write!(f, "kernel {} has no device program", name)
            }
            ContextErrorKind::KernelRejected(err) => write!(f, "kernel was rejected: {}", err),
        }
    }
}

impl std::error::Error for ContextError {}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DispatchErrorKind::ExceedsLimit { bytes, limit } => write!(
                f,
                "image of {} bytes exceeds the device binding limit of {} bytes",
                bytes, limit
            ),
            DispatchErrorKind::GridTooLarge { groups, limit } => write!(
                f,
                "{} workgroups exceed the device limit of {} per dimension",
                groups, limit
            ),
            DispatchErrorKind::Device(err) => write!(f, "device error: {}", err),
            DispatchErrorKind::Map(err) => write!(f, "mapping the result failed: {}", err),
            DispatchErrorKind::BadStaging { expected, found } => write!(
                f,
                "staging area of {} bytes where {} were expected",
                found, expected
            ),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<LockError> for TransformError {
    fn from(err: LockError) -> Self {
        TransformError::BufferLockFailure(err)
    }
}

impl From<ContextError> for TransformError {
    fn from(err: ContextError) -> Self {
        TransformError::ComputeContextFailure(err)
    }
}

impl From<DispatchError> for TransformError {
    fn from(err: DispatchError) -> Self {
        TransformError::DispatchFailure(err)
    }
}

impl From<wgpu::RequestDeviceError> for ContextError {
    fn from(err: wgpu::RequestDeviceError) -> Self {
        ContextError { kind: ContextErrorKind::RequestDevice(err) }
    }
}

impl From<wgpu::BufferAsyncError> for DispatchError {
    fn from(err: wgpu::BufferAsyncError) -> Self {
        DispatchError { kind: DispatchErrorKind::Map(err) }
    }
}
