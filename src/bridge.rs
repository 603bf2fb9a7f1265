//! The transform call: lock, run, copy back, unlock.
use crate::backend::{Backend, HostBackend};
use crate::bitmap::{Bitmap, PixelLock};
use crate::buffer::BufferLayout;
use crate::compute::ComputeContext;
use crate::config::{BackendKind, Options};
use crate::error::TransformError;
use crate::kernel::{Kernel, Mono};

/// Transforms one bitmap into another with a per-pixel kernel.
///
/// The bridge keeps its backend, and with it an expensive compute context, alive across calls.
/// Calls share nothing else and may run concurrently on independent pairs of bitmaps.
pub struct Bridge {
    backend: Box<dyn Backend>,
}

impl Bridge {
    /// A bridge running kernels on the calling thread.
    pub fn host() -> Self {
        Bridge::with_backend(HostBackend)
    }

    /// A bridge running kernels on a compute device.
    pub fn device(options: &Options) -> Result<Self, TransformError> {
        let context = ComputeContext::new(options)?;
        log::debug!("Using adapter {}", context.adapter_info().name);
        Ok(Bridge::with_backend(context))
    }

    /// A bridge with the backend chosen by the options.
    pub fn with_options(options: &Options) -> Result<Self, TransformError> {
        match options.backend {
            BackendKind::Host => Ok(Bridge::host()),
            BackendKind::Device => Bridge::device(options),
        }
    }

    pub fn with_backend(backend: impl Backend + 'static) -> Self {
        Bridge {
            backend: Box::new(backend),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    /// Replace the output's pixels with the mono transform of the input's pixels.
    pub fn transform_mono(
        &self,
        width: i32,
        height: i32,
        input: &dyn Bitmap,
        output: &dyn Bitmap,
    ) -> Result<(), TransformError> {
        self.transform(width, height, input, output, &Mono)
    }

    /// Replace the output's pixels with the kernel applied to each of the input's pixels.
    ///
    /// Both bitmaps must be `width` by `height` RGBA8888 bitmaps. The input is never written.
    /// The output is only written when the kernel succeeded, and both bitmaps are unlocked
    /// before this returns, whatever the outcome.
    pub fn transform(
        &self,
        width: i32,
        height: i32,
        input: &dyn Bitmap,
        output: &dyn Bitmap,
        kernel: &dyn Kernel,
    ) -> Result<(), TransformError> {
        let layout = BufferLayout::with_rgba8(width, height)?;
        log::debug!(
            "Transform {}x{} with {} on {}",
            width,
            height,
            kernel.name(),
            self.backend.name(),
        );

        let source = PixelLock::acquire(input)?;
        let mut target = PixelLock::acquire(output)?;

        layout.check(source.info())?;
        layout.check(target.info())?;

        // The pixels may be shared with the owner in any way, take our own copy.
        let mut packed_in = vec![0; layout.byte_len()];
        layout.pack_rows(source.as_bytes(), source.info().stride as usize, &mut packed_in);

        let mut packed_out = vec![0; layout.byte_len()];
        self.backend
            .run(kernel, &layout, &packed_in, &mut packed_out)?;

        let pitch = target.info().stride as usize;
        layout.unpack_rows(&packed_out, target.as_bytes_mut(), pitch);
        log::debug!("Transform with {} done", kernel.name());

        Ok(())
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Bridge::host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::HostBitmap;
    use crate::buffer::BufferLayout;
    use crate::error::DispatchError;

    /// Writes garbage into its output, then reports failure.
    struct Failing;

    impl Backend for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run(
            &self,
            _: &dyn Kernel,
            layout: &BufferLayout,
            _: &[u8],
            output: &mut [u8],
        ) -> Result<(), TransformError> {
            output.fill(0x5a);
            Err(DispatchError::bad_staging(layout.byte_len(), 0).into())
        }
    }

    #[test]
    fn mono_example() {
        let input = HostBitmap::from_pixels(2, 1, &[[255, 0, 0, 255], [0, 255, 0, 255]]);
        let mut output = HostBitmap::new(2, 1);

        Bridge::host()
            .transform_mono(2, 1, &input, &output)
            .expect("valid transform");

        assert_eq!(output.pixels(), vec![[85, 85, 85, 255]; 2]);
        assert!(!input.is_locked());
        assert!(!output.is_locked());
    }

    #[test]
    fn output_lock_failure_releases_input() {
        let input = HostBitmap::new(1, 1);
        let output = HostBitmap::new(1, 1);
        output.refuse_locks(Some(-1));

        let result = Bridge::host().transform_mono(1, 1, &input, &output);
        assert!(matches!(result, Err(TransformError::BufferLockFailure(_))));
        assert_eq!((input.lock_count(), input.unlock_count()), (1, 1));
        assert_eq!(output.lock_count(), 0);
    }

    #[test]
    fn same_bitmap_twice() {
        let bitmap = HostBitmap::new(1, 1);
        let result = Bridge::host().transform_mono(1, 1, &bitmap, &bitmap);
        assert!(matches!(result, Err(TransformError::BufferLockFailure(_))));
        assert!(!bitmap.is_locked());
    }

    #[test]
    fn failed_kernel_leaves_output() {
        let mut input = HostBitmap::from_pixels(2, 2, &[[10, 20, 30, 40]; 4]);
        let mut output = HostBitmap::from_pixels(2, 2, &[[1, 2, 3, 4]; 4]);
        let bridge = Bridge::with_backend(Failing);
        assert_eq!(bridge.backend().name(), "failing");

        let result = bridge.transform_mono(2, 2, &input, &output);
        assert!(matches!(result, Err(TransformError::DispatchFailure(_))));

        assert_eq!(output.pixels(), vec![[1, 2, 3, 4]; 4]);
        assert_eq!(input.pixels(), vec![[10, 20, 30, 40]; 4]);
        assert_eq!((input.lock_count(), input.unlock_count()), (1, 1));
        assert_eq!((output.lock_count(), output.unlock_count()), (1, 1));
    }

    #[test]
    fn default_runs_on_host() {
        assert_eq!(Bridge::default().backend().name(), "host");
    }
}
