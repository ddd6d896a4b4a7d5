//! Per-camera temporal state and the registry that owns it.

use std::collections::HashMap;

use crate::camera::{CameraFrame, CameraId};
use crate::history::HistoryBufferManager;
use crate::images::{ImageAllocator, ImageHandle, ImageSlot};
use crate::jitter::JitterPair;
use crate::matrices::CameraMatrixTracker;
use crate::stages::TaaStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    Uninitialized,
    Steady,
}

/// Progress of the frame currently being recorded for a camera.
#[derive(Debug, Clone)]
pub(crate) struct PendingFrame {
    pub frame: CameraFrame,
    pub completed: TaaStage,
    /// Jitter before this frame started, restored if the frame is abandoned.
    pub jitter_before: JitterPair,
    pub degraded: Option<String>,
    /// The recorded blend writes history; set by the blend stage.
    pub accumulated: bool,
}

/// Everything temporal about one render camera. Nothing here is shared between
/// cameras.
#[derive(Debug)]
pub struct CameraContext {
    id: CameraId,
    pub(crate) phase: CameraPhase,
    pub(crate) frame_index: u64,
    pub(crate) jitter: JitterPair,
    pub(crate) matrices: CameraMatrixTracker,
    pub(crate) history: HistoryBufferManager,
    pub(crate) velocity: ImageSlot,
    pub(crate) mask: ImageSlot,
    pub(crate) resolve: ImageSlot,
    pub(crate) pending: Option<PendingFrame>,
}

impl CameraContext {
    pub fn new(id: CameraId) -> Self {
        Self {
            id,
            phase: CameraPhase::Uninitialized,
            frame_index: 0,
            jitter: JitterPair::default(),
            matrices: CameraMatrixTracker::new(),
            history: HistoryBufferManager::new(),
            velocity: ImageSlot::new(),
            mask: ImageSlot::new(),
            resolve: ImageSlot::new(),
            pending: None,
        }
    }

    pub fn id(&self) -> CameraId {
        self.id
    }

    pub fn phase(&self) -> CameraPhase {
        self.phase
    }

    /// Frames completed by this camera; also the next jitter sequence index.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn jitter(&self) -> JitterPair {
        self.jitter
    }

    pub fn matrices(&self) -> &CameraMatrixTracker {
        &self.matrices
    }

    pub fn history(&self) -> &HistoryBufferManager {
        &self.history
    }

    pub fn velocity_image(&self) -> Option<ImageHandle> {
        self.velocity.handle()
    }

    pub fn mask_image(&self) -> Option<ImageHandle> {
        self.mask.handle()
    }

    pub fn resolve_image(&self) -> Option<ImageHandle> {
        self.resolve.handle()
    }

    /// Last stage finished for the frame in flight.
    pub fn completed_stage(&self) -> Option<TaaStage> {
        self.pending.as_ref().map(|p| p.completed)
    }

    /// Drop a frame whose recorded work never ran. History is invalidated since the
    /// host may have executed part of it.
    pub(crate) fn abandon_submitted(&mut self) {
        self.history.invalidate();
        self.abandon_pending();
    }

    /// Drop a half-recorded frame so the next one starts clean.
    pub(crate) fn abandon_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::warn!(
                "{}: frame {} abandoned after {:?}",
                self.id,
                self.frame_index,
                pending.completed
            );
            self.jitter = pending.jitter_before;
        }
    }

    /// Free every image and forget all temporal state.
    pub fn release<A: ImageAllocator + ?Sized>(&mut self, allocator: &mut A) {
        self.history.release(allocator);
        self.velocity.release(allocator);
        self.mask.release(allocator);
        self.resolve.release(allocator);
        self.matrices.reset();
        self.jitter = JitterPair::default();
        self.pending = None;
        self.phase = CameraPhase::Uninitialized;
    }
}

/// Per-camera contexts keyed by stable camera id.
#[derive(Debug, Default)]
pub struct CameraRegistry {
    contexts: HashMap<CameraId, CameraContext>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: CameraId) -> Option<&CameraContext> {
        self.contexts.get(&id)
    }

    pub fn get_mut(&mut self, id: CameraId) -> Option<&mut CameraContext> {
        self.contexts.get_mut(&id)
    }

    pub fn get_or_create(&mut self, id: CameraId) -> &mut CameraContext {
        self.contexts.entry(id).or_insert_with(|| {
            log::debug!("{id}: temporal context created");
            CameraContext::new(id)
        })
    }

    pub fn contains(&self, id: CameraId) -> bool {
        self.contexts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = CameraId> + '_ {
        self.contexts.keys().copied()
    }

    /// Remove a camera and release its images. Returns false for unknown ids.
    pub fn remove<A: ImageAllocator + ?Sized>(&mut self, id: CameraId, allocator: &mut A) -> bool {
        match self.contexts.remove(&id) {
            Some(mut ctx) => {
                ctx.release(allocator);
                log::debug!("{id}: temporal context removed");
                true
            }
            None => false,
        }
    }

    pub fn clear<A: ImageAllocator + ?Sized>(&mut self, allocator: &mut A) {
        for (_, mut ctx) in self.contexts.drain() {
            ctx.release(allocator);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::test_support::CountingAllocator;
    use crate::images::{FilterMode, ImageDesc, ImageFormat};
    use glam::UVec2;

    #[test]
    fn contexts_are_per_camera() {
        let mut registry = CameraRegistry::new();
        registry.get_or_create(CameraId(1)).frame_index = 5;
        registry.get_or_create(CameraId(2));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(CameraId(1)).map(|c| c.frame_index()), Some(5));
        assert_eq!(registry.get(CameraId(2)).map(|c| c.frame_index()), Some(0));
    }

    #[test]
    fn remove_releases_every_image() {
        let mut alloc = CountingAllocator::default();
        let mut registry = CameraRegistry::new();
        let ctx = registry.get_or_create(CameraId(9));
        ctx.history
            .ensure(&mut alloc, 8, 8, ImageFormat::Rgba16Float, FilterMode::Bilinear)
            .unwrap();
        let desc = ImageDesc::new(UVec2::new(8, 8), ImageFormat::Rg16Float, FilterMode::Point);
        ctx.velocity.ensure(&mut alloc, "velocity", desc).unwrap();
        assert_eq!(alloc.live.len(), 3);

        assert!(registry.remove(CameraId(9), &mut alloc));
        assert!(alloc.live.is_empty());
        assert!(!registry.remove(CameraId(9), &mut alloc));
    }

    #[test]
    fn new_context_starts_uninitialized() {
        let ctx = CameraContext::new(CameraId(3));
        assert_eq!(ctx.phase(), CameraPhase::Uninitialized);
        assert_eq!(ctx.completed_stage(), None);
        assert!(ctx.history().current_slots().is_none());
    }
}
