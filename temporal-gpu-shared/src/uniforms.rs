use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Maximum number of neighborhood taps the clamp step may read.
pub const MAX_NEIGHBORHOOD_TAPS: usize = 9;

/// Per-frame temporal uniforms. Matches group 0, binding 0 of every TAA kernel.
///
/// One block is shared by the motion-vector kernels and the reprojection kernels so
/// both stages see exactly the same matrices and jitter for a frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TemporalUniforms {
    pub prev_view_proj: [[f32; 4]; 4],
    pub prev_inv_view_proj: [[f32; 4]; 4],
    pub curr_view_proj: [[f32; 4]; 4],
    pub curr_inv_view_proj: [[f32; 4]; 4],
    /// xy = current jitter, zw = previous jitter, in pixels.
    pub jitter: [f32; 4],
    /// (width, height, 1/width, 1/height) of the history images.
    pub texel_size: [f32; 4],
    /// (current frame weight, static weight, dynamic weight, sharpness).
    pub weights: [f32; 4],
    /// (low, middle, high, debug). Exactly one of the first three is 1.
    pub quality_flags: [i32; 4],
    pub motion_vector_ref: u32,
    pub mask_ref: u32,
    pub debug_intensity: f32,
    /// 0 on the first blend after the history pair was (re)allocated.
    pub history_valid: i32,
    /// 0 = motion vectors, 1 = mask.
    pub debug_view: i32,
    pub neighborhood_taps: u32,
    /// -1 when the clip convention flips Y, else 1.
    pub clip_y_sign: f32,
    pub _pad2: f32,
    /// Pixel offsets (xy) of the clamp window; only `neighborhood_taps` entries are live.
    pub neighborhood: [[f32; 4]; MAX_NEIGHBORHOOD_TAPS],
}

/// Per-object motion uniforms: group 1, binding 0 of the dynamic motion kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectMotionUniforms {
    pub prev_model: [[f32; 4]; 4],
    pub curr_model: [[f32; 4]; 4],
}

impl ObjectMotionUniforms {
    pub fn new(prev_model: Mat4, curr_model: Mat4) -> Self {
        Self {
            prev_model: prev_model.to_cols_array_2d(),
            curr_model: curr_model.to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_blocks_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<TemporalUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<TemporalUniforms>(), 496);
        assert_eq!(std::mem::size_of::<ObjectMotionUniforms>(), 128);
    }

    #[test]
    fn object_uniforms_keep_column_order() {
        let curr = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let u = ObjectMotionUniforms::new(Mat4::IDENTITY, curr);
        assert_eq!(u.curr_model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(u.prev_model[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
