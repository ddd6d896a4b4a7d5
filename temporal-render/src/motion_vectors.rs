//! Per-pixel velocity: dynamic object motion layered over camera-only reprojection,
//! plus the auxiliary mask image.
//!
//! Velocity is stored in UV units as `current - previous`, so a kernel finds a pixel's
//! history at `uv - velocity`.

use glam::{Mat4, Vec2, Vec3, Vec4};
use temporal_gpu_shared::kernels::KernelId;

use crate::camera::CameraTargets;
use crate::commands::{
    CompareOp, DepthStencilBinding, FullscreenPass, LoadOp, ObjectDraw, ObjectDrawPass,
    PassInputs, RenderCommand, StencilTest,
};
use crate::images::{FilterMode, ImageFormat, ImageHandle};
use crate::settings::{LayerMask, TaaSettings};

pub const VELOCITY_FORMAT: ImageFormat = ImageFormat::Rg16Float;
pub const MASK_FORMAT: ImageFormat = ImageFormat::R8Unorm;
pub const SCRATCH_FILTER: FilterMode = FilterMode::Point;

/// Clear value meaning "no motion".
pub const ZERO_MOTION: [f32; 4] = [0.0; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);

/// A visibility-culled object as the host submits it for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderObject {
    pub id: u64,
    pub mesh: MeshHandle,
    pub layers: LayerMask,
    /// Object opts into per-object motion vectors.
    pub motion_vectors: bool,
    pub prev_model: Mat4,
    pub curr_model: Mat4,
}

impl RenderObject {
    pub fn new(id: u64, mesh: MeshHandle, model: Mat4) -> Self {
        Self {
            id,
            mesh,
            layers: LayerMask::layer(0),
            motion_vectors: true,
            prev_model: model,
            curr_model: model,
        }
    }

    pub fn moved_to(mut self, model: Mat4) -> Self {
        self.prev_model = self.curr_model;
        self.curr_model = model;
        self
    }
}

/// Per-camera scratch images written by this stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionTargets {
    pub velocity: ImageHandle,
    pub mask: ImageHandle,
}

/// Decides which passes fill the velocity and mask images.
#[derive(Debug, Clone, Copy)]
pub struct MotionVectorOrchestrator<'a> {
    settings: &'a TaaSettings,
}

impl<'a> MotionVectorOrchestrator<'a> {
    pub fn new(settings: &'a TaaSettings) -> Self {
        Self { settings }
    }

    /// Objects that get an override draw this frame.
    pub fn dynamic_draws(&self, objects: &[RenderObject]) -> Vec<ObjectDraw> {
        if !self.settings.dynamic_motion_vectors {
            return Vec::new();
        }
        let layers = self.settings.motion_vector_layers;
        objects
            .iter()
            .filter(|o| o.motion_vectors && o.layers.intersects(layers))
            .map(|o| ObjectDraw {
                object_id: o.id,
                mesh: o.mesh,
                prev_model: o.prev_model,
                curr_model: o.curr_model,
            })
            .collect()
    }

    /// Mask pass, velocity clear, dynamic draws, then the stencil-gated static pass.
    pub fn record(
        &self,
        scene: &CameraTargets,
        targets: MotionTargets,
        objects: &[RenderObject],
    ) -> Vec<RenderCommand> {
        let quality = &self.settings.quality;
        let mut commands = Vec::with_capacity(4);

        commands.push(RenderCommand::Fullscreen(FullscreenPass {
            label: "taa motion mask",
            kernel: KernelId::MotionMask,
            target: targets.mask,
            load: LoadOp::Clear,
            inputs: PassInputs {
                source_color: Some(scene.color),
                depth: Some(scene.depth_stencil),
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilBinding {
                image: scene.depth_stencil,
                depth_compare: CompareOp::Always,
                stencil: StencilTest::equal(quality.mask_reference),
            }),
        }));

        commands.push(RenderCommand::Clear {
            target: targets.velocity,
            value: ZERO_MOTION,
        });

        let draws = self.dynamic_draws(objects);
        if !draws.is_empty() {
            log::debug!("dynamic motion vectors for {} objects", draws.len());
            commands.push(RenderCommand::DrawObjects(ObjectDrawPass {
                label: "taa dynamic motion",
                kernel: KernelId::DynamicMotion,
                target: targets.velocity,
                depth_stencil: DepthStencilBinding {
                    image: scene.depth_stencil,
                    depth_compare: CompareOp::LessEqual,
                    stencil: StencilTest::write(quality.motion_vector_reference),
                },
                draws,
            }));
        }

        commands.push(RenderCommand::Fullscreen(FullscreenPass {
            label: "taa static motion",
            kernel: KernelId::StaticMotion,
            target: targets.velocity,
            load: LoadOp::Load,
            inputs: PassInputs {
                depth: Some(scene.depth_stencil),
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilBinding {
                image: scene.depth_stencil,
                depth_compare: CompareOp::Always,
                stencil: StencilTest::not_equal(quality.motion_vector_reference),
            }),
        }));

        commands
    }
}

#[inline]
fn uv_to_ndc(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0)
}

#[inline]
fn ndc_delta_to_uv(delta: Vec2) -> Vec2 {
    Vec2::new(delta.x * 0.5, -delta.y * 0.5)
}

#[inline]
fn project(view_proj: &Mat4, p: Vec4) -> Vec2 {
    let clip = *view_proj * p;
    Vec2::new(clip.x, clip.y) / clip.w
}

/// Camera-only velocity of the pixel at `uv` with device depth `depth`, as the static
/// motion kernel computes it.
pub fn static_velocity(uv: Vec2, depth: f32, inv_view_proj_curr: &Mat4, view_proj_prev: &Mat4) -> Vec2 {
    let ndc = uv_to_ndc(uv);
    let world = *inv_view_proj_curr * Vec4::new(ndc.x, ndc.y, depth, 1.0);
    let world = world / world.w;
    ndc_delta_to_uv(ndc - project(view_proj_prev, world))
}

/// Velocity of a local-space point on a moving object, as the dynamic motion kernel
/// computes it.
pub fn object_velocity(
    local: Vec3,
    prev_model: &Mat4,
    curr_model: &Mat4,
    view_proj_prev: &Mat4,
    view_proj_curr: &Mat4,
) -> Vec2 {
    let p = local.extend(1.0);
    let curr = project(view_proj_curr, *curr_model * p);
    let prev = project(view_proj_prev, *prev_model * p);
    ndc_delta_to_uv(curr - prev)
}
