//! Data shared between the CPU-side temporal anti-aliasing core and the GPU kernels:
//! `#[repr(C)]` uniform blocks, kernel identifiers, binding slots and WGSL sources.

pub mod kernels;
pub mod uniforms;
