//! Ping-pong accumulation images of one camera.

use glam::UVec2;

use crate::error::TaaResult;
use crate::images::{FilterMode, ImageAllocator, ImageDesc, ImageFormat, ImageHandle};

#[derive(Debug, Clone, Copy)]
struct HistoryPair {
    images: [ImageHandle; 2],
    desc: ImageDesc,
}

/// Owns the two history images and the single-bit write index.
///
/// The pair is built and destroyed as a unit. `read_index` is always `1 - write_index`.
#[derive(Debug, Clone, Default)]
pub struct HistoryBufferManager {
    pair: Option<HistoryPair>,
    write_index: usize,
    valid: bool,
}

impl HistoryBufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a pair with exactly these parameters exists and return (A, B).
    pub fn ensure<A: ImageAllocator + ?Sized>(
        &mut self,
        allocator: &mut A,
        width: u32,
        height: u32,
        format: ImageFormat,
        filter: FilterMode,
    ) -> TaaResult<(ImageHandle, ImageHandle)> {
        self.ensure_desc(
            allocator,
            ImageDesc::new(UVec2::new(width, height), format, filter),
        )
    }

    pub fn ensure_desc<A: ImageAllocator + ?Sized>(
        &mut self,
        allocator: &mut A,
        desc: ImageDesc,
    ) -> TaaResult<(ImageHandle, ImageHandle)> {
        if let Some(pair) = &self.pair {
            if pair.desc == desc {
                return Ok((pair.images[0], pair.images[1]));
            }
        }

        self.release(allocator);

        let a = allocator.allocate_image("taa history A", &desc)?;
        let b = match allocator.allocate_image("taa history B", &desc) {
            Ok(b) => b,
            Err(err) => {
                allocator.release_image(a);
                return Err(err);
            }
        };

        log::info!(
            "TAA history allocated: {}x{} {:?} {:?}",
            desc.width,
            desc.height,
            desc.format,
            desc.filter
        );
        self.pair = Some(HistoryPair {
            images: [a, b],
            desc,
        });
        self.write_index = 0;
        self.valid = false;
        Ok((a, b))
    }

    /// (read, write) for this frame, or `None` before the first `ensure`.
    pub fn current_slots(&self) -> Option<(ImageHandle, ImageHandle)> {
        self.pair.map(|p| (p.images[self.read_index()], p.images[self.write_index]))
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn read_index(&self) -> usize {
        1 - self.write_index
    }

    pub fn desc(&self) -> Option<ImageDesc> {
        self.pair.map(|p| p.desc)
    }

    /// True once a completed frame has been written into the current read slot.
    pub fn is_history_valid(&self) -> bool {
        self.valid && self.pair.is_some()
    }

    /// Mark the history unusable without freeing it, e.g. after a skipped blend.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Flip the write index. Only valid after the write slot is fully populated.
    pub(crate) fn swap(&mut self) {
        if self.pair.is_none() {
            return;
        }
        self.write_index = 1 - self.write_index;
        self.valid = true;
    }

    pub fn release<A: ImageAllocator + ?Sized>(&mut self, allocator: &mut A) {
        if let Some(pair) = self.pair.take() {
            allocator.release_image(pair.images[0]);
            allocator.release_image(pair.images[1]);
            log::debug!("TAA history released");
        }
        self.write_index = 0;
        self.valid = false;
    }
}
