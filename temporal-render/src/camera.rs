//! Per-frame camera description supplied by the host.

use std::fmt;

use glam::{Mat4, UVec2};

use crate::images::{ImageFormat, ImageHandle};

/// Stable identity of a render camera across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u64);

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraKind {
    Game,
    SceneView,
    Reflection,
    /// Thumbnail/inspector previews; never jittered or accumulated.
    Preview,
}

impl CameraKind {
    pub fn is_temporal(self) -> bool {
        !matches!(self, CameraKind::Preview)
    }
}

/// How the target API maps clip space onto the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipConvention {
    /// Negate clip-space Y before rasterization.
    pub flip_y: bool,
    /// Remap clip depth from [-w, w] to [0, w].
    pub remap_depth_to_unit: bool,
}

impl ClipConvention {
    /// Projection already matches the device (glam `perspective_rh` on wgpu/Vulkan/Metal).
    pub const NATIVE: ClipConvention = ClipConvention {
        flip_y: false,
        remap_depth_to_unit: false,
    };

    /// OpenGL-style projection feeding a zero-to-one depth device.
    pub const GL_TO_UNIT_DEPTH: ClipConvention = ClipConvention {
        flip_y: false,
        remap_depth_to_unit: true,
    };

    /// Matrix applied on the left of `projection * view`.
    pub fn matrix(&self) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        if self.flip_y {
            m = Mat4::from_scale(glam::Vec3::new(1.0, -1.0, 1.0)) * m;
        }
        if self.remap_depth_to_unit {
            // z' = 0.5 z + 0.5 w
            let remap = Mat4::from_cols(
                glam::Vec4::X,
                glam::Vec4::Y,
                glam::Vec4::new(0.0, 0.0, 0.5, 0.0),
                glam::Vec4::new(0.0, 0.0, 0.5, 1.0),
            );
            m = remap * m;
        }
        m
    }
}

impl Default for ClipConvention {
    fn default() -> Self {
        Self::NATIVE
    }
}

/// Host-owned targets a camera renders into this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraTargets {
    /// Scene color the host renders with the jittered projection.
    pub color: ImageHandle,
    /// Depth-stencil target shared by the scene and the motion-vector passes.
    pub depth_stencil: ImageHandle,
    /// Final destination; may alias `color`.
    pub output: ImageHandle,
}

/// Everything the host hands over for one camera and one frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraFrame {
    pub id: CameraId,
    pub kind: CameraKind,
    pub viewport: UVec2,
    pub view: Mat4,
    /// Projection without jitter.
    pub projection: Mat4,
    pub clip: ClipConvention,
    /// Format of `targets.color`; history and resolve images use it too.
    pub color_format: ImageFormat,
    pub targets: CameraTargets,
}

impl CameraFrame {
    pub fn new(
        id: CameraId,
        kind: CameraKind,
        viewport: UVec2,
        view: Mat4,
        projection: Mat4,
        targets: CameraTargets,
    ) -> Self {
        Self {
            id,
            kind,
            viewport,
            view,
            projection,
            clip: ClipConvention::NATIVE,
            color_format: ImageFormat::Rgba16Float,
            targets,
        }
    }

    pub fn with_clip(mut self, clip: ClipConvention) -> Self {
        self.clip = clip;
        self
    }

    pub fn with_color_format(mut self, format: ImageFormat) -> Self {
        self.color_format = format;
        self
    }

    pub fn has_area(&self) -> bool {
        self.viewport.x > 0 && self.viewport.y > 0
    }
}
