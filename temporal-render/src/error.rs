//! Error type shared by the orchestrators and the GPU backends.

use crate::camera::CameraId;
use crate::stages::TaaStage;
use temporal_gpu_shared::kernels::KernelId;

pub type TaaResult<T> = Result<T, TaaError>;

#[derive(thiserror::Error, Debug)]
pub enum TaaError {
    /// A kernel the configured feature set needs is absent; TAA is disabled for the session.
    #[error("missing kernel: {0}")]
    MissingKernel(KernelId),

    /// An image could not be (re)allocated for this frame.
    #[error("image allocation failed for {label}: {reason}")]
    ImageAllocation { label: String, reason: String },

    #[error("settings error: {0}")]
    Settings(String),

    #[error("unknown camera: {0}")]
    UnknownCamera(CameraId),

    /// A stage ran before the stage it depends on completed for this frame.
    #[error("{camera}: {stage:?} requires {expected:?} first, last completed {found:?}")]
    StageOrder {
        camera: CameraId,
        stage: TaaStage,
        expected: TaaStage,
        found: Option<TaaStage>,
    },

    /// Failure reported by the host or GPU backend while executing recorded work.
    #[error("backend error: {0}")]
    Backend(String),
}

impl TaaError {
    pub fn allocation(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ImageAllocation {
            label: label.into(),
            reason: reason.into(),
        }
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<serde_json::Error> for TaaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Settings(err.to_string())
    }
}
