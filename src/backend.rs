//! Executors of a kernel over a packed grid.
use crate::buffer::BufferLayout;
use crate::error::{DispatchError, TransformError};
use crate::kernel::Kernel;

/// Runs a kernel over every texel of a packed RGBA8 grid.
///
/// `input` and `output` both hold exactly `layout.byte_len()` bytes. The output is only
/// meaningful when `Ok` is returned.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        kernel: &dyn Kernel,
        layout: &BufferLayout,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), TransformError>;
}

/// Runs kernels on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostBackend;

impl Backend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn run(
        &self,
        kernel: &dyn Kernel,
        layout: &BufferLayout,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), TransformError> {
        let len = layout.byte_len();
        check_staging(len, input.len())?;
        check_staging(len, output.len())?;

        let input: &[[u8; 4]] = bytemuck::cast_slice(input);
        let output: &mut [[u8; 4]] = bytemuck::cast_slice_mut(output);

        for (target, &texel) in output.iter_mut().zip(input) {
            *target = kernel.map(texel);
        }

        Ok(())
    }
}

pub(crate) fn check_staging(expected: usize, found: usize) -> Result<(), DispatchError> {
    if expected != found {
        return Err(DispatchError::bad_staging(expected, found));
    }

    Ok(())
}
