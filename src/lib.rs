//! ## Quick guide
//!
//! 1. Pick a backend through [`Options`] and create a [`Bridge`] from it
//! 2. Wrap the caller's pixel buffers as [`Bitmap`]s
//! 3. Call [`Bridge::transform_mono`], or [`Bridge::transform`] with any other [`Kernel`]
//! 4. Read the result from the output bitmap
//!
//! Both bitmaps are locked for exactly the duration of the call and unlocked on every exit path.
//! The output bitmap is only written once the kernel ran successfully.
//!
//! For tests and host-side tooling, [`HostBitmap`] is an in-memory stand-in that converts from
//! and to `image` buffers.
pub mod backend;
pub mod bitmap;
pub mod bridge;
pub mod buffer;
pub mod compute;
pub mod config;
pub mod error;
pub mod ffi;
pub mod kernel;
mod shaders;
mod util;

pub use crate::backend::{Backend, HostBackend};
pub use crate::bitmap::{Bitmap, HostBitmap, PixelLock, RawPixels};
pub use crate::bridge::Bridge;
pub use crate::buffer::{BitmapInfo, BufferLayout, PixelFormat};
pub use crate::compute::ComputeContext;
pub use crate::config::{BackendKind, Options};
pub use crate::error::{ContextError, DispatchError, LockError, TransformError};
pub use crate::kernel::{kernel_fn, Identity, Kernel, KernelKey, Luma, Mono};
