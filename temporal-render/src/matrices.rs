//! Cross-frame camera matrix bookkeeping.

use glam::{Mat4, UVec2, Vec2};

use crate::camera::ClipConvention;
use crate::jitter::apply_jitter;

/// Current and previous camera matrices of one camera.
///
/// `view_proj_*` include the clip convention and are built from the non-jittered
/// projection; jitter reaches the kernels as separate offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatrices {
    pub view_prev: Mat4,
    pub view_curr: Mat4,
    pub proj_prev_jittered: Mat4,
    pub proj_curr_jittered: Mat4,
    pub proj_curr_non_jittered: Mat4,
    pub view_proj_prev: Mat4,
    pub view_proj_curr: Mat4,
    pub inv_view_proj_prev: Mat4,
    pub inv_view_proj_curr: Mat4,
    /// Convention folded into `view_proj_*`.
    pub clip: ClipConvention,
}

impl Default for FrameMatrices {
    fn default() -> Self {
        Self {
            view_prev: Mat4::IDENTITY,
            view_curr: Mat4::IDENTITY,
            proj_prev_jittered: Mat4::IDENTITY,
            proj_curr_jittered: Mat4::IDENTITY,
            proj_curr_non_jittered: Mat4::IDENTITY,
            view_proj_prev: Mat4::IDENTITY,
            view_proj_curr: Mat4::IDENTITY,
            inv_view_proj_prev: Mat4::IDENTITY,
            inv_view_proj_curr: Mat4::IDENTITY,
            clip: ClipConvention::NATIVE,
        }
    }
}

/// Owns [`FrameMatrices`] for one camera. `update` fills Curr once per frame and
/// `advance` rolls Curr into Prev once the frame's consumers are done.
#[derive(Debug, Clone, Default)]
pub struct CameraMatrixTracker {
    matrices: FrameMatrices,
    /// Prev holds a real previous frame.
    primed: bool,
    /// `update` ran since the last `advance`.
    pending: bool,
}

impl CameraMatrixTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrices(&self) -> &FrameMatrices {
        &self.matrices
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Store this frame's Curr matrices and return the jittered projection the scene
    /// is rendered with.
    pub fn update(
        &mut self,
        view: Mat4,
        projection: Mat4,
        jitter_px: Vec2,
        viewport: UVec2,
        clip: ClipConvention,
    ) -> Mat4 {
        let jittered = apply_jitter(projection, jitter_px, viewport);
        let view_proj = clip.matrix() * projection * view;

        let m = &mut self.matrices;
        m.view_curr = view;
        m.proj_curr_non_jittered = projection;
        m.proj_curr_jittered = jittered;
        m.view_proj_curr = view_proj;
        m.inv_view_proj_curr = view_proj.inverse();
        m.clip = clip;

        if !self.primed {
            m.view_prev = m.view_curr;
            m.proj_prev_jittered = m.proj_curr_jittered;
            m.view_proj_prev = m.view_proj_curr;
            m.inv_view_proj_prev = m.inv_view_proj_curr;
        }
        self.pending = true;
        jittered
    }

    /// Roll Curr into Prev. Called once per rendered frame when the frame ends, never
    /// by hosts.
    pub(crate) fn advance(&mut self) {
        if !self.pending {
            log::debug!("matrix advance without a prior update ignored");
            return;
        }
        let m = &mut self.matrices;
        m.view_prev = m.view_curr;
        m.proj_prev_jittered = m.proj_curr_jittered;
        m.view_proj_prev = m.view_proj_curr;
        m.inv_view_proj_prev = m.inv_view_proj_curr;
        self.primed = true;
        self.pending = false;
    }

    /// Forget history, e.g. after a camera cut.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
