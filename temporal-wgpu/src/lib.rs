//! WebGPU backend for the temporal anti-aliasing core.
//!
//! [`WgpuTaaBackend`] owns the device and every TAA image, compiles the kernels of a
//! [`KernelLibrary`](temporal_gpu_shared::kernels::KernelLibrary) on first use and
//! replays recorded command lists. [`WgpuHost`] pairs it with a [`SceneRenderer`] so
//! the pair can drive `TemporalAntiAliasing::render_frame` directly.

mod backend;
mod handle;
mod passes;
mod pipeline;
mod render_targets;

pub use backend::{GpuMesh, SceneRenderer, WgpuHost, WgpuTaaBackend};
pub use pipeline::PipelineKey;
pub use render_targets::{ImageEntry, DEPTH_STENCIL_FORMAT};
