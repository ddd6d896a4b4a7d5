//! Declarative TAA configuration.
//!
//! Settings are plain `Copy` data read once at the start of a frame, so every stage of
//! that frame sees the same values. They deserialize from JSON with per-field defaults;
//! out-of-range values are clamped by [`TaaSettings::sanitized`].

use serde::{Deserialize, Serialize};

use crate::error::TaaResult;
use crate::jitter::JitterSequenceKind;

/// Quality tier. Gates the clamp window, history filtering and the sharpen pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Middle,
    #[default]
    High,
}

/// 32-bit visibility layer filter for the dynamic motion-vector pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: LayerMask = LayerMask(u32::MAX);
    pub const NONE: LayerMask = LayerMask(0);

    pub fn layer(index: u32) -> Self {
        LayerMask(1u32.checked_shl(index).unwrap_or(0))
    }

    pub fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Intermediate shown by the debug overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugView {
    #[default]
    MotionVectors,
    Mask,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    pub tier: QualityTier,
    pub jitter_sequence: JitterSequenceKind,
    /// [0, 1]
    pub jitter_intensity: f32,
    /// [0, 1]
    pub current_frame_weight: f32,
    /// [0, 1] history weight for pixels with camera-only motion.
    pub static_frame_weight: f32,
    /// [0, 1] history weight for moving or masked pixels.
    pub dynamic_frame_weight: f32,
    /// [0, 2]
    pub sharpness: f32,
    /// Stencil value written by dynamic motion-vector draws.
    pub motion_vector_reference: u8,
    /// Stencil value tagging surfaces for the mask pass.
    pub mask_reference: u8,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            tier: QualityTier::High,
            jitter_sequence: JitterSequenceKind::Halton23,
            jitter_intensity: 1.0,
            current_frame_weight: 0.5,
            static_frame_weight: 0.5,
            dynamic_frame_weight: 0.5,
            sharpness: 1.0,
            motion_vector_reference: 1,
            mask_reference: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    pub enabled: bool,
    /// [0, 100] visualization gain.
    pub intensity: f32,
    pub view: DebugView,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 1.0,
            view: DebugView::MotionVectors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaaSettings {
    pub quality: QualitySettings,
    pub motion_vector_layers: LayerMask,
    /// Draw per-object motion vectors; when off only depth-based reprojection runs.
    pub dynamic_motion_vectors: bool,
    /// Present only when the debug capability is configured.
    pub debug: Option<DebugSettings>,
}

impl Default for TaaSettings {
    fn default() -> Self {
        Self {
            quality: QualitySettings::default(),
            motion_vector_layers: LayerMask::ALL,
            dynamic_motion_vectors: true,
            debug: None,
        }
    }
}

impl TaaSettings {
    /// Parse settings from JSON and clamp them into range.
    pub fn from_json(json: &str) -> TaaResult<Self> {
        let settings: TaaSettings = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    pub fn to_json(&self) -> TaaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Copy with every ranged field clamped; non-finite values fall back to defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = QualitySettings::default();
        let q = &mut self.quality;
        q.jitter_intensity =
            clamp_field("jitter_intensity", q.jitter_intensity, 0.0, 1.0, defaults.jitter_intensity);
        q.current_frame_weight = clamp_field(
            "current_frame_weight",
            q.current_frame_weight,
            0.0,
            1.0,
            defaults.current_frame_weight,
        );
        q.static_frame_weight = clamp_field(
            "static_frame_weight",
            q.static_frame_weight,
            0.0,
            1.0,
            defaults.static_frame_weight,
        );
        q.dynamic_frame_weight = clamp_field(
            "dynamic_frame_weight",
            q.dynamic_frame_weight,
            0.0,
            1.0,
            defaults.dynamic_frame_weight,
        );
        q.sharpness = clamp_field("sharpness", q.sharpness, 0.0, 2.0, defaults.sharpness);

        if let Some(debug) = self.debug.as_mut() {
            debug.intensity = clamp_field(
                "debug.intensity",
                debug.intensity,
                0.0,
                100.0,
                DebugSettings::default().intensity,
            );
        }
        self
    }

    /// Debug overlay is active only when the capability is configured and switched on.
    pub fn debug_overlay(&self) -> Option<DebugSettings> {
        self.debug.filter(|d| d.enabled)
    }
}

fn clamp_field(name: &str, value: f32, min: f32, max: f32, default: f32) -> f32 {
    if !value.is_finite() {
        log::warn!("TAA setting {name} is not finite, using {default}");
        return default;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::warn!("TAA setting {name}={value} clamped to {clamped}");
    }
    clamped
}
