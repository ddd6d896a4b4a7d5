//! Kernel identifiers, binding slots and the bundled WGSL sources.
//! The sources are shared by the wgpu backend and any host that wants to ship its own
//! variants; a host may drop or replace entries of a [`KernelLibrary`].

use std::borrow::Cow;
use std::collections::HashMap;

pub const FULLSCREEN_TRIANGLE_VERT: &str = include_str!("../shaders/fullscreen_triangle.wgsl");
pub const BLIT_FRAG: &str = include_str!("../shaders/blit.wgsl");
pub const DYNAMIC_MOTION_SHADER: &str = include_str!("../shaders/dynamic_motion.wgsl");
pub const STATIC_MOTION_FRAG: &str = include_str!("../shaders/static_motion.wgsl");
pub const MOTION_MASK_FRAG: &str = include_str!("../shaders/motion_mask.wgsl");
pub const TEMPORAL_BLEND_FRAG: &str = include_str!("../shaders/temporal_blend.wgsl");
pub const SHARPEN_FRAG: &str = include_str!("../shaders/sharpen.wgsl");
pub const DEBUG_OVERLAY_FRAG: &str = include_str!("../shaders/debug_overlay.wgsl");

/// Binding slots of the shared temporal bind group (group 0).
pub mod bindings {
    pub const UNIFORMS: u32 = 0;
    /// Current frame color, or the source image for sharpen/debug.
    pub const SOURCE_COLOR: u32 = 1;
    pub const HISTORY: u32 = 2;
    pub const MOTION_VECTORS: u32 = 3;
    pub const MASK: u32 = 4;
    pub const DEPTH: u32 = 5;
    pub const LINEAR_SAMPLER: u32 = 6;
    pub const POINT_SAMPLER: u32 = 7;
}

/// Every kernel the orchestrators can record a pass for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KernelId {
    /// Per-object velocity, drawn with mesh geometry.
    DynamicMotion,
    /// Camera-only velocity reconstructed from depth.
    StaticMotion,
    MotionMask,
    TemporalBlend,
    MaskedBlend,
    Sharpen,
    DebugOverlay,
}

impl KernelId {
    pub const ALL: [KernelId; 7] = [
        KernelId::DynamicMotion,
        KernelId::StaticMotion,
        KernelId::MotionMask,
        KernelId::TemporalBlend,
        KernelId::MaskedBlend,
        KernelId::Sharpen,
        KernelId::DebugOverlay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KernelId::DynamicMotion => "dynamic_motion",
            KernelId::StaticMotion => "static_motion",
            KernelId::MotionMask => "motion_mask",
            KernelId::TemporalBlend => "temporal_blend",
            KernelId::MaskedBlend => "masked_blend",
            KernelId::Sharpen => "sharpen",
            KernelId::DebugOverlay => "debug_overlay",
        }
    }

    /// Fragment entry point inside the kernel's module.
    pub fn fragment_entry(self) -> &'static str {
        match self {
            KernelId::TemporalBlend => "fs_blend",
            KernelId::MaskedBlend => "fs_masked",
            _ => "fs_main",
        }
    }

    /// True for kernels drawn as a fullscreen triangle.
    pub fn is_fullscreen(self) -> bool {
        !matches!(self, KernelId::DynamicMotion)
    }
}

impl std::fmt::Display for KernelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// WGSL sources keyed by kernel.
#[derive(Debug, Clone, Default)]
pub struct KernelLibrary {
    sources: HashMap<KernelId, Cow<'static, str>>,
}

impl KernelLibrary {
    /// Library with no kernels; hosts fill it with [`KernelLibrary::insert`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Library holding the bundled reference kernels.
    pub fn builtin() -> Self {
        let mut library = Self::empty();
        library.insert(KernelId::DynamicMotion, DYNAMIC_MOTION_SHADER);
        library.insert(KernelId::StaticMotion, STATIC_MOTION_FRAG);
        library.insert(KernelId::MotionMask, MOTION_MASK_FRAG);
        library.insert(KernelId::TemporalBlend, TEMPORAL_BLEND_FRAG);
        library.insert(KernelId::MaskedBlend, TEMPORAL_BLEND_FRAG);
        library.insert(KernelId::Sharpen, SHARPEN_FRAG);
        library.insert(KernelId::DebugOverlay, DEBUG_OVERLAY_FRAG);
        library
    }

    pub fn insert(&mut self, kernel: KernelId, source: impl Into<Cow<'static, str>>) {
        self.sources.insert(kernel, source.into());
    }

    pub fn remove(&mut self, kernel: KernelId) -> Option<Cow<'static, str>> {
        self.sources.remove(&kernel)
    }

    pub fn get(&self, kernel: KernelId) -> Option<&str> {
        self.sources.get(&kernel).map(|s| s.as_ref())
    }

    pub fn contains(&self, kernel: KernelId) -> bool {
        self.sources.contains_key(&kernel)
    }

    /// First kernel of `required` this library cannot provide.
    pub fn first_missing(&self, required: &[KernelId]) -> Option<KernelId> {
        required.iter().copied().find(|k| !self.contains(*k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_covers_every_kernel() {
        let library = KernelLibrary::builtin();
        assert_eq!(library.first_missing(&KernelId::ALL), None);
    }

    #[test]
    fn removed_kernel_is_reported_missing() {
        let mut library = KernelLibrary::builtin();
        library.remove(KernelId::Sharpen);
        assert_eq!(library.first_missing(&KernelId::ALL), Some(KernelId::Sharpen));
    }

    #[test]
    fn blend_kernels_share_a_module_with_distinct_entries() {
        let library = KernelLibrary::builtin();
        assert_eq!(
            library.get(KernelId::TemporalBlend),
            library.get(KernelId::MaskedBlend)
        );
        assert_ne!(
            KernelId::TemporalBlend.fragment_entry(),
            KernelId::MaskedBlend.fragment_entry()
        );
    }
}
