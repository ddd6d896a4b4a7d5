//! Render pass implementations for the recorded TAA commands.

pub mod motion_vectors;
pub mod present;
pub mod taa;
