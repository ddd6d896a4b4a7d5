//! Per-frame blend sequence: uniform assembly, blend into the write slot, sharpen,
//! present, and the optional debug overlay.

use glam::UVec2;
use temporal_gpu_shared::kernels::KernelId;
use temporal_gpu_shared::uniforms::{TemporalUniforms, MAX_NEIGHBORHOOD_TAPS};

use crate::commands::{
    CompareOp, DepthStencilBinding, FullscreenPass, LoadOp, PassInputs, RenderCommand,
    StencilTest,
};
use crate::images::{FilterMode, ImageHandle};
use crate::jitter::JitterPair;
use crate::matrices::FrameMatrices;
use crate::settings::{DebugView, QualityTier, TaaSettings};

/// 3x3 window, center first.
const TAPS_3X3: [[f32; 2]; 9] = [
    [0.0, 0.0],
    [-1.0, 0.0],
    [1.0, 0.0],
    [0.0, -1.0],
    [0.0, 1.0],
    [-1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [1.0, 1.0],
];

/// Clamp window taps for a tier: a 5-tap cross on Low, the full 3x3 otherwise.
pub fn neighborhood_taps(tier: QualityTier) -> &'static [[f32; 2]] {
    match tier {
        QualityTier::Low => &TAPS_3X3[..5],
        QualityTier::Middle | QualityTier::High => &TAPS_3X3[..],
    }
}

/// Mutually exclusive (low, middle, high) flags.
pub fn tier_flags(tier: QualityTier) -> [i32; 3] {
    match tier {
        QualityTier::Low => [1, 0, 0],
        QualityTier::Middle => [0, 1, 0],
        QualityTier::High => [0, 0, 1],
    }
}

pub fn history_filter(tier: QualityTier) -> FilterMode {
    match tier {
        QualityTier::Low => FilterMode::Point,
        QualityTier::Middle | QualityTier::High => FilterMode::Bilinear,
    }
}

/// Sharpening runs unless the tier is Low or sharpness is zero.
pub fn sharpen_enabled(settings: &TaaSettings) -> bool {
    settings.quality.tier != QualityTier::Low && settings.quality.sharpness > 0.0
}

/// Fill the uniform block shared by every kernel of a frame.
pub fn build_uniforms(
    settings: &TaaSettings,
    matrices: &FrameMatrices,
    jitter: JitterPair,
    size: UVec2,
    history_valid: bool,
) -> TemporalUniforms {
    let quality = &settings.quality;
    let debug = settings.debug_overlay();
    let [low, middle, high] = tier_flags(quality.tier);

    let taps = neighborhood_taps(quality.tier);
    let mut neighborhood = [[0.0f32; 4]; MAX_NEIGHBORHOOD_TAPS];
    for (slot, tap) in neighborhood.iter_mut().zip(taps) {
        *slot = [tap[0], tap[1], 0.0, 0.0];
    }

    let w = size.x.max(1) as f32;
    let h = size.y.max(1) as f32;

    TemporalUniforms {
        prev_view_proj: matrices.view_proj_prev.to_cols_array_2d(),
        prev_inv_view_proj: matrices.inv_view_proj_prev.to_cols_array_2d(),
        curr_view_proj: matrices.view_proj_curr.to_cols_array_2d(),
        curr_inv_view_proj: matrices.inv_view_proj_curr.to_cols_array_2d(),
        jitter: jitter.to_array(),
        texel_size: [w, h, 1.0 / w, 1.0 / h],
        weights: [
            quality.current_frame_weight,
            quality.static_frame_weight,
            quality.dynamic_frame_weight,
            quality.sharpness,
        ],
        quality_flags: [low, middle, high, debug.is_some() as i32],
        motion_vector_ref: quality.motion_vector_reference as u32,
        mask_ref: quality.mask_reference as u32,
        debug_intensity: debug.map_or(0.0, |d| d.intensity),
        history_valid: history_valid as i32,
        debug_view: match debug.map(|d| d.view) {
            Some(DebugView::Mask) => 1,
            _ => 0,
        },
        neighborhood_taps: taps.len() as u32,
        clip_y_sign: if matrices.clip.flip_y { -1.0 } else { 1.0 },
        _pad2: 0.0,
        neighborhood,
    }
}

/// Images one blend sequence reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendTargets {
    pub color: ImageHandle,
    pub depth_stencil: ImageHandle,
    pub output: ImageHandle,
    pub history_read: ImageHandle,
    pub history_write: ImageHandle,
    pub velocity: ImageHandle,
    pub mask: ImageHandle,
    /// Sharpened result; keeps the history itself unsharpened.
    pub resolve: ImageHandle,
}

#[derive(Debug, Clone, Copy)]
pub struct ReprojectionOrchestrator<'a> {
    settings: &'a TaaSettings,
}

impl<'a> ReprojectionOrchestrator<'a> {
    pub fn new(settings: &'a TaaSettings) -> Self {
        Self { settings }
    }

    /// Blend, masked blend, sharpen, present.
    pub fn record(&self, targets: &BlendTargets) -> Vec<RenderCommand> {
        let mut commands = self.record_accumulation(targets);
        commands.push(self.present(targets));
        commands
    }

    /// Everything that feeds next frame's history, without the final present.
    pub fn record_accumulation(&self, targets: &BlendTargets) -> Vec<RenderCommand> {
        let inputs = PassInputs {
            source_color: Some(targets.color),
            history: Some(targets.history_read),
            velocity: Some(targets.velocity),
            mask: Some(targets.mask),
            depth: Some(targets.depth_stencil),
        };

        let mut commands = vec![
            RenderCommand::Fullscreen(FullscreenPass {
                label: "taa blend",
                kernel: KernelId::TemporalBlend,
                target: targets.history_write,
                load: LoadOp::Clear,
                inputs,
                depth_stencil: None,
            }),
            RenderCommand::Fullscreen(FullscreenPass {
                label: "taa masked blend",
                kernel: KernelId::MaskedBlend,
                target: targets.history_write,
                load: LoadOp::Load,
                inputs,
                depth_stencil: Some(DepthStencilBinding {
                    image: targets.depth_stencil,
                    depth_compare: CompareOp::Always,
                    stencil: StencilTest::equal(self.settings.quality.mask_reference),
                }),
            }),
        ];

        if sharpen_enabled(self.settings) {
            commands.push(RenderCommand::Fullscreen(FullscreenPass {
                label: "taa sharpen",
                kernel: KernelId::Sharpen,
                target: targets.resolve,
                load: LoadOp::Clear,
                inputs: PassInputs {
                    source_color: Some(targets.history_write),
                    ..Default::default()
                },
                depth_stencil: None,
            }));
        } else {
            commands.push(RenderCommand::Copy {
                source: targets.history_write,
                destination: targets.resolve,
            });
        }
        commands
    }

    /// Resolve into the output, through the debug overlay when it is on.
    pub fn present(&self, targets: &BlendTargets) -> RenderCommand {
        match self.settings.debug_overlay() {
            Some(_) => RenderCommand::Fullscreen(FullscreenPass {
                label: "taa debug overlay",
                kernel: KernelId::DebugOverlay,
                target: targets.output,
                load: LoadOp::Clear,
                inputs: PassInputs {
                    source_color: Some(targets.resolve),
                    velocity: Some(targets.velocity),
                    mask: Some(targets.mask),
                    ..Default::default()
                },
                depth_stencil: None,
            }),
            None => RenderCommand::Copy {
                source: targets.resolve,
                destination: targets.output,
            },
        }
    }
}
