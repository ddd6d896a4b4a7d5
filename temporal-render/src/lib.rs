//! Temporal anti-aliasing orchestration.
//!
//! The crate jitters each camera's projection, tracks current and previous camera
//! matrices, records the motion-vector and blend passes, and manages the ping-pong
//! history images. It never talks to a GPU: every pass is recorded into a
//! [`CommandList`] that a [`RenderHost`] executes.

pub mod camera;
pub mod commands;
pub mod context;
pub mod error;
pub mod history;
pub mod images;
pub mod jitter;
pub mod matrices;
pub mod motion_vectors;
pub mod pipeline;
pub mod reprojection;
pub mod settings;
pub mod stages;

pub use camera::{CameraFrame, CameraId, CameraKind, CameraTargets, ClipConvention};
pub use commands::{CommandList, RenderCommand};
pub use context::{CameraContext, CameraPhase, CameraRegistry};
pub use error::{TaaError, TaaResult};
pub use history::HistoryBufferManager;
pub use images::{FilterMode, ImageAllocator, ImageDesc, ImageFormat, ImageHandle};
pub use jitter::{JitterPair, JitterSample, JitterSequenceKind, JitterSequencer};
pub use matrices::{CameraMatrixTracker, FrameMatrices};
pub use motion_vectors::{MeshHandle, MotionVectorOrchestrator, RenderObject};
pub use pipeline::{FrameOutcome, RenderHost, TemporalAntiAliasing};
pub use reprojection::ReprojectionOrchestrator;
pub use settings::{DebugSettings, DebugView, LayerMask, QualitySettings, QualityTier, TaaSettings};
pub use stages::TaaStage;

pub use temporal_gpu_shared::kernels::{KernelId, KernelLibrary};
