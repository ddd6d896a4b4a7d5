//! Recorded GPU work handed to the host.
//!
//! The core never touches a device. Each stage produces a [`CommandList`] whose order
//! is the execution order; a backend replays it verbatim.

use glam::Mat4;
use temporal_gpu_shared::kernels::KernelId;
use temporal_gpu_shared::uniforms::{ObjectMotionUniforms, TemporalUniforms};

use crate::camera::CameraId;
use crate::images::ImageHandle;
use crate::motion_vectors::MeshHandle;
use crate::stages::TaaStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Clear,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Always,
    Equal,
    NotEqual,
    LessEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Replace,
}

/// Stencil state of a pass against the host's depth-stencil target.
///
/// Tags are bit flags: a pass reads and writes only the bits of its own reference,
/// so a dynamic-motion stamp leaves a mask tag on the same pixel intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilTest {
    pub compare: CompareOp,
    pub reference: u8,
    pub pass_op: StencilOp,
    /// Bits compared and written; `0xff` for a zero reference.
    pub mask: u8,
}

fn tag_bits(reference: u8) -> u8 {
    if reference == 0 {
        0xff
    } else {
        reference
    }
}

impl StencilTest {
    /// Pass where the tag bits of `reference` are set, leave stencil untouched.
    pub fn equal(reference: u8) -> Self {
        Self {
            compare: CompareOp::Equal,
            reference,
            pass_op: StencilOp::Keep,
            mask: tag_bits(reference),
        }
    }

    pub fn not_equal(reference: u8) -> Self {
        Self {
            compare: CompareOp::NotEqual,
            reference,
            pass_op: StencilOp::Keep,
            mask: tag_bits(reference),
        }
    }

    /// Always pass and stamp the bits of `reference` into stencil.
    pub fn write(reference: u8) -> Self {
        Self {
            compare: CompareOp::Always,
            reference,
            pass_op: StencilOp::Replace,
            mask: tag_bits(reference),
        }
    }

    pub fn writes_stencil(&self) -> bool {
        self.pass_op != StencilOp::Keep
    }
}

/// Attachment of the scene depth-stencil target to a pass. Depth is never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilBinding {
    pub image: ImageHandle,
    pub depth_compare: CompareOp,
    pub stencil: StencilTest,
}

/// Texture inputs of a fullscreen kernel, mapped onto the shared binding slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassInputs {
    pub source_color: Option<ImageHandle>,
    pub history: Option<ImageHandle>,
    pub velocity: Option<ImageHandle>,
    pub mask: Option<ImageHandle>,
    /// Depth aspect of a depth-stencil target.
    pub depth: Option<ImageHandle>,
}

impl PassInputs {
    pub fn images(&self) -> impl Iterator<Item = ImageHandle> + '_ {
        [
            self.source_color,
            self.history,
            self.velocity,
            self.mask,
            self.depth,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FullscreenPass {
    pub label: &'static str,
    pub kernel: KernelId,
    pub target: ImageHandle,
    pub load: LoadOp,
    pub inputs: PassInputs,
    pub depth_stencil: Option<DepthStencilBinding>,
}

/// One motion-capable object drawn by the dynamic motion kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectDraw {
    pub object_id: u64,
    pub mesh: MeshHandle,
    pub prev_model: Mat4,
    pub curr_model: Mat4,
}

impl ObjectDraw {
    pub fn uniforms(&self) -> ObjectMotionUniforms {
        ObjectMotionUniforms::new(self.prev_model, self.curr_model)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDrawPass {
    pub label: &'static str,
    pub kernel: KernelId,
    pub target: ImageHandle,
    pub depth_stencil: DepthStencilBinding,
    pub draws: Vec<ObjectDraw>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    Clear { target: ImageHandle, value: [f32; 4] },
    DrawObjects(ObjectDrawPass),
    Fullscreen(FullscreenPass),
    Copy {
        source: ImageHandle,
        destination: ImageHandle,
    },
}

impl RenderCommand {
    /// Image this command writes.
    pub fn target(&self) -> ImageHandle {
        match self {
            RenderCommand::Clear { target, .. } => *target,
            RenderCommand::DrawObjects(pass) => pass.target,
            RenderCommand::Fullscreen(pass) => pass.target,
            RenderCommand::Copy { destination, .. } => *destination,
        }
    }

    pub fn kernel(&self) -> Option<KernelId> {
        match self {
            RenderCommand::DrawObjects(pass) => Some(pass.kernel),
            RenderCommand::Fullscreen(pass) => Some(pass.kernel),
            _ => None,
        }
    }
}

/// Work of one stage of one camera, with the uniform block every kernel in it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandList {
    pub camera: CameraId,
    pub stage: TaaStage,
    pub uniforms: TemporalUniforms,
    pub commands: Vec<RenderCommand>,
}

impl CommandList {
    pub fn new(camera: CameraId, stage: TaaStage, uniforms: TemporalUniforms) -> Self {
        Self {
            camera,
            stage,
            uniforms,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn kernels(&self) -> Vec<KernelId> {
        self.commands.iter().filter_map(RenderCommand::kernel).collect()
    }
}
