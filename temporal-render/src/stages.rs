//! The four per-frame stages, as plain functions over a [`CameraContext`].
//!
//! A frame runs `inject_jitter`, the host's scene render (acknowledged with
//! [`scene_rendered`]), `compute_motion_vectors` and `temporal_blend`, in that order,
//! exactly once. Each function checks that its predecessor completed for the frame in
//! flight. `temporal_blend` only records; [`end_frame`] closes the frame once the host
//! has executed the blend list: it flips the history slots and rolls the camera
//! matrices forward.

use bytemuck::Zeroable;
use glam::Mat4;
use temporal_gpu_shared::uniforms::TemporalUniforms;

use crate::camera::CameraFrame;
use crate::commands::{CommandList, RenderCommand};
use crate::context::{CameraContext, CameraPhase, PendingFrame};
use crate::error::{TaaError, TaaResult};
use crate::images::{FilterMode, ImageAllocator, ImageDesc};
use crate::jitter::JitterSequencer;
use crate::motion_vectors::{
    MotionTargets, MotionVectorOrchestrator, RenderObject, MASK_FORMAT, SCRATCH_FILTER,
    VELOCITY_FORMAT,
};
use crate::reprojection::{build_uniforms, history_filter, BlendTargets, ReprojectionOrchestrator};
use crate::settings::TaaSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaaStage {
    InjectJitter,
    RenderScene,
    ComputeMotionVectors,
    TemporalBlend,
}

impl TaaStage {
    pub const ORDER: [TaaStage; 4] = [
        TaaStage::InjectJitter,
        TaaStage::RenderScene,
        TaaStage::ComputeMotionVectors,
        TaaStage::TemporalBlend,
    ];

    pub fn previous(self) -> Option<TaaStage> {
        match self {
            TaaStage::InjectJitter => None,
            TaaStage::RenderScene => Some(TaaStage::InjectJitter),
            TaaStage::ComputeMotionVectors => Some(TaaStage::RenderScene),
            TaaStage::TemporalBlend => Some(TaaStage::ComputeMotionVectors),
        }
    }
}

/// Result of the blend stage.
#[derive(Debug, Clone)]
pub struct BlendOutput {
    pub commands: CommandList,
    /// Set when an image could not be allocated and the frame fell back to a plain copy.
    pub degraded: Option<String>,
}

fn pending_after<'a>(ctx: &'a mut CameraContext, stage: TaaStage) -> TaaResult<&'a mut PendingFrame> {
    let camera = ctx.id();
    let expected = stage.previous().unwrap_or(TaaStage::InjectJitter);
    match ctx.pending.as_mut() {
        Some(pending) if pending.completed == expected => Ok(pending),
        other => Err(TaaError::StageOrder {
            camera,
            stage,
            expected,
            found: other.map(|p| p.completed),
        }),
    }
}

/// Start a frame: sample jitter, update the camera's Curr matrices and return the
/// jittered projection to render the scene with.
///
/// Preview cameras get their projection back unchanged and leave `ctx` untouched.
pub fn inject_jitter(
    ctx: &mut CameraContext,
    settings: &TaaSettings,
    frame: &CameraFrame,
) -> TaaResult<Mat4> {
    if frame.id != ctx.id() {
        return Err(TaaError::UnknownCamera(frame.id));
    }
    if !frame.kind.is_temporal() {
        return Ok(frame.projection);
    }
    if ctx.pending.is_some() {
        ctx.abandon_pending();
    }

    let quality = &settings.quality;
    let sample = JitterSequencer::new(quality.jitter_sequence).sample(ctx.frame_index);
    let offset = sample.scaled(quality.jitter_intensity);

    let jitter_before = ctx.jitter;
    ctx.jitter.push(offset);
    if !ctx.matrices.is_primed() {
        ctx.jitter.previous = ctx.jitter.current;
    }

    let projection = ctx.matrices.update(
        frame.view,
        frame.projection,
        offset,
        frame.viewport,
        frame.clip,
    );

    if ctx.phase == CameraPhase::Uninitialized {
        log::info!(
            "{}: TAA configured at {}x{}",
            ctx.id(),
            frame.viewport.x,
            frame.viewport.y
        );
        ctx.phase = CameraPhase::Steady;
    }
    log::debug!(
        "{}: frame {} jitter ({:.4}, {:.4})",
        ctx.id(),
        ctx.frame_index,
        offset.x,
        offset.y
    );

    ctx.pending = Some(PendingFrame {
        frame: *frame,
        completed: TaaStage::InjectJitter,
        jitter_before,
        degraded: None,
        accumulated: false,
    });
    Ok(projection)
}

/// Acknowledge that the host rendered the scene with the jittered projection.
pub fn scene_rendered(ctx: &mut CameraContext) -> TaaResult<()> {
    pending_after(ctx, TaaStage::RenderScene)?.completed = TaaStage::RenderScene;
    Ok(())
}

/// Record the mask, velocity clear, dynamic object draws and static reprojection.
///
/// A failed scratch allocation does not error: the frame is marked degraded and an
/// empty list is returned.
pub fn compute_motion_vectors<A: ImageAllocator + ?Sized>(
    ctx: &mut CameraContext,
    settings: &TaaSettings,
    allocator: &mut A,
    objects: &[RenderObject],
) -> TaaResult<CommandList> {
    let frame = pending_after(ctx, TaaStage::ComputeMotionVectors)?.frame;
    let size = frame.viewport;

    let velocity = ctx.velocity.ensure(
        allocator,
        "taa velocity",
        ImageDesc::new(size, VELOCITY_FORMAT, SCRATCH_FILTER),
    );
    let mask = ctx.mask.ensure(
        allocator,
        "taa mask",
        ImageDesc::new(size, MASK_FORMAT, SCRATCH_FILTER),
    );

    let uniforms = build_uniforms(
        settings,
        ctx.matrices.matrices(),
        ctx.jitter,
        size,
        ctx.history.is_history_valid(),
    );
    let mut list = CommandList::new(ctx.id(), TaaStage::ComputeMotionVectors, uniforms);

    match (velocity, mask) {
        (Ok(velocity), Ok(mask)) => {
            list.commands = MotionVectorOrchestrator::new(settings).record(
                &frame.targets,
                MotionTargets { velocity, mask },
                objects,
            );
        }
        (Err(err), _) | (_, Err(err)) => {
            log::warn!("{}: motion vector targets unavailable: {err}", ctx.id());
            if let Some(pending) = ctx.pending.as_mut() {
                pending.degraded = Some(err.to_string());
            }
        }
    }

    pending_after(ctx, TaaStage::ComputeMotionVectors)?.completed = TaaStage::ComputeMotionVectors;
    Ok(list)
}

/// Record blend, sharpen and present. The frame stays open until [`end_frame`].
pub fn temporal_blend<A: ImageAllocator + ?Sized>(
    ctx: &mut CameraContext,
    settings: &TaaSettings,
    allocator: &mut A,
) -> TaaResult<BlendOutput> {
    let pending = pending_after(ctx, TaaStage::TemporalBlend)?;
    let frame = pending.frame;
    let mut degraded = pending.degraded.clone();
    let size = frame.viewport;

    let mut targets = None;
    if degraded.is_none() {
        match ensure_blend_targets(ctx, settings, allocator, &frame) {
            Ok(t) => targets = Some(t),
            Err(err) => {
                log::warn!("{}: history unavailable, frame not accumulated: {err}", ctx.id());
                degraded = Some(err.to_string());
            }
        }
    }

    let output = match targets {
        Some(targets) => {
            let uniforms = build_uniforms(
                settings,
                ctx.matrices.matrices(),
                ctx.jitter,
                size,
                ctx.history.is_history_valid(),
            );
            let mut list = CommandList::new(ctx.id(), TaaStage::TemporalBlend, uniforms);
            list.commands = ReprojectionOrchestrator::new(settings).record(&targets);
            mark_blended(ctx, true)?;
            BlendOutput {
                commands: list,
                degraded: None,
            }
        }
        None => {
            ctx.history.invalidate();
            let mut list =
                CommandList::new(ctx.id(), TaaStage::TemporalBlend, TemporalUniforms::zeroed());
            if frame.targets.color != frame.targets.output {
                list.push(RenderCommand::Copy {
                    source: frame.targets.color,
                    destination: frame.targets.output,
                });
            }
            mark_blended(ctx, false)?;
            BlendOutput {
                commands: list,
                degraded,
            }
        }
    };
    Ok(output)
}

fn ensure_blend_targets<A: ImageAllocator + ?Sized>(
    ctx: &mut CameraContext,
    settings: &TaaSettings,
    allocator: &mut A,
    frame: &CameraFrame,
) -> TaaResult<BlendTargets> {
    let history_desc = ImageDesc::new(
        frame.viewport,
        frame.color_format,
        history_filter(settings.quality.tier),
    );
    ctx.history.ensure_desc(allocator, history_desc)?;
    let resolve = ctx.resolve.ensure(
        allocator,
        "taa resolve",
        ImageDesc::new(frame.viewport, frame.color_format, FilterMode::Point),
    )?;
    let (history_read, history_write) = ctx
        .history
        .current_slots()
        .ok_or_else(|| TaaError::allocation("taa history", "pair missing after ensure"))?;
    let (velocity, mask) = match (ctx.velocity.handle(), ctx.mask.handle()) {
        (Some(v), Some(m)) => (v, m),
        _ => return Err(TaaError::allocation("taa motion targets", "missing")),
    };

    Ok(BlendTargets {
        color: frame.targets.color,
        depth_stencil: frame.targets.depth_stencil,
        output: frame.targets.output,
        history_read,
        history_write,
        velocity,
        mask,
        resolve,
    })
}

fn mark_blended(ctx: &mut CameraContext, accumulated: bool) -> TaaResult<()> {
    let pending = pending_after(ctx, TaaStage::TemporalBlend)?;
    pending.completed = TaaStage::TemporalBlend;
    pending.accumulated = accumulated;
    Ok(())
}

/// Close a frame whose blend list the host executed: swap (when the write slot was
/// filled), then advance. The only place a frame ends.
pub fn end_frame(ctx: &mut CameraContext) -> TaaResult<()> {
    let accumulated = match ctx.pending.as_ref() {
        Some(pending) if pending.completed == TaaStage::TemporalBlend => pending.accumulated,
        other => {
            return Err(TaaError::StageOrder {
                camera: ctx.id(),
                stage: TaaStage::TemporalBlend,
                expected: TaaStage::TemporalBlend,
                found: other.map(|p| p.completed),
            })
        }
    };
    if accumulated {
        ctx.history.swap();
    }
    ctx.matrices.advance();
    ctx.frame_index += 1;
    ctx.pending = None;
    Ok(())
}
