//! Compiled device programs of the built-in kernels.
//!
//! All of them share one interface: the packed input texels at binding 0, the packed output
//! texels at binding 1 and a `uvec4` uniform at binding 2 whose first two components are the
//! grid's width and height. Each invocation handles one texel of an 8x8 workgroup.
use std::borrow::Cow;

/// The side length of the square workgroup.
pub(crate) const WORKGROUP_SIZE: u32 = 8;

/// Copies texels unchanged.
pub(crate) const COMP_COPY: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/spirv/copy.comp.v"));

/// The mean of the color channels.
pub(crate) const COMP_MONO: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/spirv/mono.comp.v"));

/// Rec.601 luma.
pub(crate) const COMP_LUMA: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/spirv/luma.comp.v"));

/// Reinterpret an included SPIR-V binary as words.
///
/// Included bytes carry no alignment guarantee, hence the copy.
pub(crate) fn shader_include_to_spirv(src: &[u8]) -> Cow<'static, [u32]> {
    assert!(src.len() % 4 == 0);
    let mut target = vec![0u32; src.len() / 4];
    bytemuck::cast_slice_mut(&mut target).copy_from_slice(src);
    Cow::Owned(target)
}
