//! Sub-pixel jitter sequence for temporal accumulation.
//!
//! Halton bases 2 and 3 give well-spread 2D offsets; the sequence wraps every
//! [`JITTER_PERIOD`] frames and depends on nothing but the frame index.

use glam::{Mat4, UVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Number of frames before the sequence repeats.
pub const JITTER_PERIOD: u64 = 1024;

/// Radical inverse of `index` in `base`, in [0, 1).
#[inline]
pub fn halton(index: u32, base: u32) -> f32 {
    let mut result = 0.0f32;
    let mut f = 1.0f32;
    let mut i = index;

    while i > 0 {
        f /= base as f32;
        result += f * (i % base) as f32;
        i /= base;
    }

    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JitterSequenceKind {
    #[default]
    #[serde(rename = "halton23")]
    Halton23,
}

/// Raw offset for one frame, in pixels, each axis in [-0.5, 0.5).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JitterSample {
    pub offset: Vec2,
}

impl JitterSample {
    pub const ZERO: JitterSample = JitterSample { offset: Vec2::ZERO };

    pub fn scaled(self, intensity: f32) -> Vec2 {
        self.offset * intensity
    }
}

/// Effective offsets, in pixels with intensity applied, of this frame and the frame before.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JitterPair {
    pub current: Vec2,
    pub previous: Vec2,
}

impl JitterPair {
    /// Shift `current` into `previous` and store the new offset.
    pub fn push(&mut self, offset: Vec2) {
        self.previous = self.current;
        self.current = offset;
    }

    /// (current.x, current.y, previous.x, previous.y), the layout kernels read.
    pub fn to_array(self) -> [f32; 4] {
        [self.current.x, self.current.y, self.previous.x, self.previous.y]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JitterSequencer {
    kind: JitterSequenceKind,
}

impl JitterSequencer {
    pub fn new(kind: JitterSequenceKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> JitterSequenceKind {
        self.kind
    }

    pub fn sample(&self, frame_index: u64) -> JitterSample {
        match self.kind {
            JitterSequenceKind::Halton23 => {
                // 1-based so frame 0 does not land on the pixel corner
                let index = (frame_index % JITTER_PERIOD) as u32 + 1;
                JitterSample {
                    offset: Vec2::new(halton(index, 2) - 0.5, halton(index, 3) - 0.5),
                }
            }
        }
    }
}

/// Offset `projection` so the rasterized image shifts by `offset_px` pixels.
///
/// Only the clip-space translation terms change: column 2 rows 0/1 for a perspective
/// projection, column 3 rows 0/1 for an orthographic one (no w term).
pub fn apply_jitter(projection: Mat4, offset_px: Vec2, viewport: UVec2) -> Mat4 {
    if viewport.x == 0 || viewport.y == 0 {
        return projection;
    }
    let ndc = Vec2::new(
        2.0 * offset_px.x / viewport.x as f32,
        2.0 * offset_px.y / viewport.y as f32,
    );
    let mut jittered = projection;
    if projection.w_axis.w == 0.0 {
        jittered.z_axis.x += ndc.x * projection.z_axis.w;
        jittered.z_axis.y += ndc.y * projection.z_axis.w;
    } else {
        jittered.w_axis.x += ndc.x * projection.w_axis.w;
        jittered.w_axis.y += ndc.y * projection.w_axis.w;
    }
    jittered
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn halton_base_2_and_3() {
        assert_relative_eq!(halton(1, 2), 0.5);
        assert_relative_eq!(halton(2, 2), 0.25);
        assert_relative_eq!(halton(3, 2), 0.75);
        assert_relative_eq!(halton(1, 3), 1.0 / 3.0);
        assert_relative_eq!(halton(2, 3), 2.0 / 3.0);
        assert_relative_eq!(halton(4, 3), 1.0 / 9.0);
    }

    #[test]
    fn first_sample_is_centered_halton_1() {
        let s = JitterSequencer::default().sample(0);
        assert_relative_eq!(s.offset.x, 0.0);
        assert_relative_eq!(s.offset.y, 1.0 / 3.0 - 0.5);
    }

    #[test]
    fn sequence_repeats_with_period() {
        let seq = JitterSequencer::new(JitterSequenceKind::Halton23);
        for i in [0u64, 1, 17, 511, 1023] {
            assert_eq!(seq.sample(i), seq.sample(i + JITTER_PERIOD));
            assert_eq!(seq.sample(i), seq.sample(i + 7 * JITTER_PERIOD));
        }
        assert_ne!(seq.sample(0), seq.sample(1));
    }

    #[test]
    fn samples_stay_inside_half_pixel() {
        let seq = JitterSequencer::default();
        for i in 0..JITTER_PERIOD {
            let o = seq.sample(i).offset;
            assert!((-0.5..0.5).contains(&o.x), "x out of range at {i}: {}", o.x);
            assert!((-0.5..0.5).contains(&o.y), "y out of range at {i}: {}", o.y);
        }
    }

    #[test]
    fn pair_shifts_current_into_previous() {
        let mut pair = JitterPair::default();
        pair.push(Vec2::new(0.1, 0.2));
        pair.push(Vec2::new(-0.3, 0.4));
        assert_eq!(pair.previous, Vec2::new(0.1, 0.2));
        assert_eq!(pair.to_array(), [-0.3, 0.4, 0.1, 0.2]);
    }

    #[test]
    fn perspective_jitter_shifts_ndc_by_offset() {
        let proj = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0);
        let viewport = UVec2::new(1920, 1080);
        let offset = Vec2::new(0.5, -0.25);
        let jittered = apply_jitter(proj, offset, viewport);

        let p = Vec4::new(0.3, -0.2, -5.0, 1.0);
        let a = proj * p;
        let b = jittered * p;
        assert_relative_eq!(b.x / b.w - a.x / a.w, 2.0 * 0.5 / 1920.0, epsilon = 1e-6);
        assert_relative_eq!(b.y / b.w - a.y / a.w, 2.0 * -0.25 / 1080.0, epsilon = 1e-6);
        assert_relative_eq!(b.z / b.w, a.z / a.w, epsilon = 1e-6);
    }

    #[test]
    fn orthographic_jitter_uses_translation_column() {
        let proj = Mat4::orthographic_rh(-10.0, 10.0, -5.0, 5.0, 0.1, 50.0);
        let jittered = apply_jitter(proj, Vec2::new(0.5, 0.5), UVec2::new(100, 50));
        assert_eq!(jittered.z_axis, proj.z_axis);
        assert_relative_eq!(jittered.w_axis.x - proj.w_axis.x, 0.01);
        assert_relative_eq!(jittered.w_axis.y - proj.w_axis.y, 0.02);
    }

    #[test]
    fn zero_viewport_leaves_projection_alone() {
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 10.0);
        assert_eq!(apply_jitter(proj, Vec2::splat(0.3), UVec2::new(0, 10)), proj);
    }
}
