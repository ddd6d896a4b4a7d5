//! Host-facing entry point that runs the stages for one camera per call.

use bytemuck::Zeroable;
use glam::Mat4;
use temporal_gpu_shared::kernels::{KernelId, KernelLibrary};
use temporal_gpu_shared::uniforms::TemporalUniforms;

use crate::camera::{CameraFrame, CameraId};
use crate::commands::{CommandList, RenderCommand};
use crate::context::{CameraContext, CameraRegistry};
use crate::error::{TaaError, TaaResult};
use crate::images::ImageAllocator;
use crate::motion_vectors::RenderObject;
use crate::settings::TaaSettings;
use crate::stages::{self, TaaStage};

/// What the host provides: image allocation, scene rendering and command execution.
pub trait RenderHost: ImageAllocator {
    /// Render the scene for `frame` into its color and depth-stencil targets using
    /// `projection` in place of `frame.projection`.
    ///
    /// The host clears depth and stencil before drawing. The core writes its motion
    /// tags into stencil but never clears them, so tags left from the previous frame
    /// would survive into this one.
    fn render_scene(&mut self, frame: &CameraFrame, projection: &Mat4) -> TaaResult<()>;

    /// Execute a recorded command list in order. On error the core treats the camera's
    /// history as lost and does not end the frame.
    fn submit(&mut self, commands: CommandList) -> TaaResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Full temporal sequence ran.
    Resolved,
    /// Camera kind excluded from TAA; rendered without jitter.
    Skipped,
    /// TAA disabled for the session; scene rendered and copied through.
    Bypassed,
    /// An image could not be allocated; color copied through, history invalidated.
    Degraded { reason: String },
}

/// Kernels a settings block needs.
pub fn required_kernels(settings: &TaaSettings) -> Vec<KernelId> {
    let mut kernels = vec![
        KernelId::StaticMotion,
        KernelId::MotionMask,
        KernelId::TemporalBlend,
        KernelId::MaskedBlend,
        KernelId::Sharpen,
    ];
    if settings.dynamic_motion_vectors {
        kernels.insert(0, KernelId::DynamicMotion);
    }
    if settings.debug.is_some() {
        kernels.push(KernelId::DebugOverlay);
    }
    kernels
}

pub struct TemporalAntiAliasing {
    settings: TaaSettings,
    available: Vec<KernelId>,
    disabled: Option<TaaError>,
    registry: CameraRegistry,
}

impl TemporalAntiAliasing {
    /// Validate `kernels` against `settings`. A missing kernel disables TAA for the
    /// session instead of failing.
    pub fn new(settings: TaaSettings, kernels: &KernelLibrary) -> Self {
        let available = KernelId::ALL
            .iter()
            .copied()
            .filter(|k| kernels.contains(*k))
            .collect();
        let mut taa = Self {
            settings: settings.sanitized(),
            available,
            disabled: None,
            registry: CameraRegistry::new(),
        };
        taa.validate_kernels();
        taa
    }

    fn validate_kernels(&mut self) {
        let missing = required_kernels(&self.settings)
            .into_iter()
            .find(|k| !self.available.contains(k));
        self.disabled = missing.map(|kernel| {
            log::error!("TAA disabled: missing kernel {kernel}");
            TaaError::MissingKernel(kernel)
        });
        if self.disabled.is_none() {
            log::info!("TAA enabled ({:?} tier)", self.settings.quality.tier);
        }
    }

    pub fn settings(&self) -> &TaaSettings {
        &self.settings
    }

    /// Replace the settings. Takes effect from the next frame.
    pub fn set_settings(&mut self, settings: TaaSettings) {
        self.settings = settings.sanitized();
        self.validate_kernels();
    }

    pub fn is_enabled(&self) -> bool {
        self.disabled.is_none()
    }

    /// Why TAA is disabled, if it is.
    pub fn disabled_reason(&self) -> Option<&TaaError> {
        self.disabled.as_ref()
    }

    pub fn camera(&self, id: CameraId) -> Option<&CameraContext> {
        self.registry.get(id)
    }

    pub fn cameras(&self) -> &CameraRegistry {
        &self.registry
    }

    /// Forget a camera and release its history and scratch images.
    pub fn remove_camera<A: ImageAllocator + ?Sized>(
        &mut self,
        id: CameraId,
        allocator: &mut A,
    ) -> TaaResult<()> {
        if self.registry.remove(id, allocator) {
            Ok(())
        } else {
            Err(TaaError::UnknownCamera(id))
        }
    }

    pub fn release_all<A: ImageAllocator + ?Sized>(&mut self, allocator: &mut A) {
        self.registry.clear(allocator);
    }

    /// Run one camera's frame: inject jitter, render the scene, compute motion vectors,
    /// temporal blend. Settings are read once here and fixed for the whole frame.
    pub fn render_frame<H: RenderHost + ?Sized>(
        &mut self,
        frame: &CameraFrame,
        objects: &[RenderObject],
        host: &mut H,
    ) -> TaaResult<FrameOutcome> {
        if !frame.kind.is_temporal() || !frame.has_area() {
            host.render_scene(frame, &frame.projection)?;
            return Ok(FrameOutcome::Skipped);
        }

        if !self.is_enabled() {
            host.render_scene(frame, &frame.projection)?;
            if frame.targets.color != frame.targets.output {
                let mut list =
                    CommandList::new(frame.id, TaaStage::TemporalBlend, TemporalUniforms::zeroed());
                list.push(RenderCommand::Copy {
                    source: frame.targets.color,
                    destination: frame.targets.output,
                });
                host.submit(list)?;
            }
            return Ok(FrameOutcome::Bypassed);
        }

        let settings = self.settings;
        let ctx = self.registry.get_or_create(frame.id);
        let result = run_stages(ctx, &settings, frame, objects, host);
        if result.is_err() {
            ctx.abandon_pending();
        }
        result
    }
}

fn run_stages<H: RenderHost + ?Sized>(
    ctx: &mut CameraContext,
    settings: &TaaSettings,
    frame: &CameraFrame,
    objects: &[RenderObject],
    host: &mut H,
) -> TaaResult<FrameOutcome> {
    let projection = stages::inject_jitter(ctx, settings, frame)?;
    host.render_scene(frame, &projection)?;
    stages::scene_rendered(ctx)?;

    let motion = stages::compute_motion_vectors(ctx, settings, &mut *host, objects)?;
    if !motion.is_empty() {
        submit_or_abandon(ctx, host, motion)?;
    }

    let blend = stages::temporal_blend(ctx, settings, &mut *host)?;
    if !blend.commands.is_empty() {
        submit_or_abandon(ctx, host, blend.commands)?;
    }
    stages::end_frame(ctx)?;
    Ok(match blend.degraded {
        Some(reason) => FrameOutcome::Degraded { reason },
        None => FrameOutcome::Resolved,
    })
}

/// A failed submit may have run part of the list, so neither history slot can be
/// trusted afterwards.
fn submit_or_abandon<H: RenderHost + ?Sized>(
    ctx: &mut CameraContext,
    host: &mut H,
    commands: CommandList,
) -> TaaResult<()> {
    let stage = commands.stage;
    host.submit(commands).inspect_err(|err| {
        log::warn!("{}: {stage:?} submit failed: {err}", ctx.id());
        ctx.abandon_submitted();
    })
}
