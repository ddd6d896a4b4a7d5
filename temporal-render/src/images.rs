//! Image descriptions and the allocator seam between the core and a GPU backend.

use glam::UVec2;

use crate::error::TaaResult;

/// Opaque image id issued by the host's allocator or registered host targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Default HDR color, used for history and resolve.
    Rgba16Float,
    Rgba8Unorm,
    /// Velocity.
    Rg16Float,
    /// Mask.
    R8Unorm,
}

impl ImageFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            ImageFormat::Rgba16Float => 8,
            ImageFormat::Rgba8Unorm => 4,
            ImageFormat::Rg16Float => 4,
            ImageFormat::R8Unorm => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Point,
    Bilinear,
}

/// Allocation key of every image the core owns. Two images are interchangeable
/// exactly when their descriptions are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub filter: FilterMode,
    pub sample_count: u32,
}

impl ImageDesc {
    pub fn new(size: UVec2, format: ImageFormat, filter: FilterMode) -> Self {
        Self {
            width: size.x,
            height: size.y,
            format,
            filter,
            sample_count: 1,
        }
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

/// Creates and destroys GPU images on behalf of the core.
pub trait ImageAllocator {
    fn allocate_image(&mut self, label: &str, desc: &ImageDesc) -> TaaResult<ImageHandle>;
    fn release_image(&mut self, image: ImageHandle);
}

/// A single lazily (re)allocated image, e.g. a per-camera scratch target.
#[derive(Debug, Clone, Default)]
pub struct ImageSlot {
    current: Option<(ImageHandle, ImageDesc)>,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<ImageHandle> {
        self.current.map(|(h, _)| h)
    }

    pub fn desc(&self) -> Option<ImageDesc> {
        self.current.map(|(_, d)| d)
    }

    /// Return the image matching `desc`, replacing the held one if it differs.
    pub fn ensure<A: ImageAllocator + ?Sized>(
        &mut self,
        allocator: &mut A,
        label: &str,
        desc: ImageDesc,
    ) -> TaaResult<ImageHandle> {
        if let Some((handle, held)) = self.current {
            if held == desc {
                return Ok(handle);
            }
        }
        self.release(allocator);
        let handle = allocator.allocate_image(label, &desc)?;
        log::debug!("allocated {label} {}x{} {:?}", desc.width, desc.height, desc.format);
        self.current = Some((handle, desc));
        Ok(handle)
    }

    pub fn release<A: ImageAllocator + ?Sized>(&mut self, allocator: &mut A) {
        if let Some((handle, _)) = self.current.take() {
            allocator.release_image(handle);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::CountingAllocator;
    use super::*;

    #[test]
    fn slot_reuses_matching_image() {
        let mut alloc = CountingAllocator::default();
        let mut slot = ImageSlot::new();
        let desc = ImageDesc::new(UVec2::new(64, 32), ImageFormat::Rg16Float, FilterMode::Point);
        let a = slot.ensure(&mut alloc, "velocity", desc).unwrap();
        let b = slot.ensure(&mut alloc, "velocity", desc).unwrap();
        assert_eq!(a, b);
        assert_eq!(alloc.allocations, 1);
    }

    #[test]
    fn slot_replaces_on_change_and_releases_old() {
        let mut alloc = CountingAllocator::default();
        let mut slot = ImageSlot::new();
        let desc = ImageDesc::new(UVec2::new(64, 32), ImageFormat::R8Unorm, FilterMode::Point);
        let a = slot.ensure(&mut alloc, "mask", desc).unwrap();
        let b = slot
            .ensure(&mut alloc, "mask", ImageDesc { width: 128, ..desc })
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(alloc.live, vec![b]);
        slot.release(&mut alloc);
        assert!(alloc.live.is_empty());
        assert_eq!(slot.handle(), None);
    }

    #[test]
    fn byte_size_follows_format() {
        let desc = ImageDesc::new(UVec2::new(10, 10), ImageFormat::Rgba16Float, FilterMode::Bilinear);
        assert_eq!(desc.byte_size(), 800);
        assert_eq!(desc.sample_count, 1);
    }
}
