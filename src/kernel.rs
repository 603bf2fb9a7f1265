//! Per-pixel transforms.
use core::fmt;
use std::borrow::Cow;

use crate::shaders;

/// A stateless transform of a single RGBA8 texel.
///
/// The same function is applied to every pixel of the grid, with no dependency between pixels.
/// A kernel that wants to run on a device also provides a compute program whose results are
/// identical with `map`.
pub trait Kernel: fmt::Debug + Send + Sync {
    /// A name for logs and errors.
    fn name(&self) -> &'static str;
    /// The unique key identifying the device program, used to cache its pipeline.
    fn key(&self) -> Option<KernelKey>;
    /// Transform one texel.
    fn map(&self, texel: [u8; 4]) -> [u8; 4];
    /// The SPIR-V program for devices, if there is one.
    fn spirv_source(&self) -> Option<Cow<'static, [u8]>> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum KernelKey {
    Copy,
    Mono,
    Luma,
}

/// The mono operator: the integer mean of red, green and blue, replicated, alpha preserved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mono;

/// Rec.601 luma, as the classic greyscale sample weights its channels.
///
/// Computed in fixed point and rounded to nearest, alpha preserved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Luma;

/// Copies texels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Identity;

/// A kernel from a closure. Runs on the host only.
#[derive(Clone, Copy)]
pub struct FnKernel<F> {
    name: &'static str,
    map: F,
}

/// Wrap a pure function as a kernel.
pub fn kernel_fn<F>(name: &'static str, map: F) -> FnKernel<F>
where
    F: Fn([u8; 4]) -> [u8; 4] + Send + Sync,
{
    FnKernel { name, map }
}

impl Kernel for Mono {
    fn name(&self) -> &'static str {
        "mono"
    }

    fn key(&self) -> Option<KernelKey> {
        Some(KernelKey::Mono)
    }

    fn map(&self, [r, g, b, a]: [u8; 4]) -> [u8; 4] {
        let sum = u16::from(r) + u16::from(g) + u16::from(b);
        // At most 255, the mean of three bytes.
        let m = (sum / 3) as u8;
        [m, m, m, a]
    }

    fn spirv_source(&self) -> Option<Cow<'static, [u8]>> {
        Some(Cow::Borrowed(shaders::COMP_MONO))
    }
}

impl Kernel for Luma {
    fn name(&self) -> &'static str {
        "luma"
    }

    fn key(&self) -> Option<KernelKey> {
        Some(KernelKey::Luma)
    }

    fn map(&self, [r, g, b, a]: [u8; 4]) -> [u8; 4] {
        let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
        // The weights sum to 1000.
        let m = ((weighted + 500) / 1000) as u8;
        [m, m, m, a]
    }

    fn spirv_source(&self) -> Option<Cow<'static, [u8]>> {
        Some(Cow::Borrowed(shaders::COMP_LUMA))
    }
}

impl Kernel for Identity {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn key(&self) -> Option<KernelKey> {
        Some(KernelKey::Copy)
    }

    fn map(&self, texel: [u8; 4]) -> [u8; 4] {
        texel
    }

    fn spirv_source(&self) -> Option<Cow<'static, [u8]>> {
        Some(Cow::Borrowed(shaders::COMP_COPY))
    }
}

impl<F> Kernel for FnKernel<F>
where
    F: Fn([u8; 4]) -> [u8; 4] + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn key(&self) -> Option<KernelKey> {
        None
    }

    fn map(&self, texel: [u8; 4]) -> [u8; 4] {
        (self.map)(texel)
    }
}

impl<F> fmt::Debug for FnKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnKernel").field("name", &self.name).finish()
    }
}
