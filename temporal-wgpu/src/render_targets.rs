//! Texture creation for TAA images, host targets and binding fallbacks.

use temporal_render::images::{FilterMode, ImageDesc, ImageFormat};

/// Scene depth-stencil format; stencil carries the motion-vector and mask tags.
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
/// Format of the 1x1 depth texture bound when a pass has no depth input.
pub const FALLBACK_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub fn texture_format(format: ImageFormat) -> wgpu::TextureFormat {
    match format {
        ImageFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        ImageFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ImageFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
        ImageFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
    }
}

/// A texture the backend can bind, render into or copy.
pub struct ImageEntry {
    pub texture: wgpu::Texture,
    /// Attachment view (all aspects).
    pub view: wgpu::TextureView,
    /// View bound for sampling; depth-only for depth-stencil textures.
    pub sample_view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub filter: FilterMode,
    pub width: u32,
    pub height: u32,
}

impl ImageEntry {
    /// Wrap an existing texture, deriving views from its format.
    pub fn from_texture(texture: wgpu::Texture, filter: FilterMode) -> Self {
        let format = texture.format();
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sample_view = if format.has_depth_aspect() {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Depth Sample View"),
                aspect: wgpu::TextureAspect::DepthOnly,
                ..Default::default()
            })
        } else {
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        };
        Self {
            width: texture.width(),
            height: texture.height(),
            texture,
            view,
            sample_view,
            format,
            filter,
        }
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// Color image usable as attachment, binding and copy source/destination.
pub fn create_image_texture(device: &wgpu::Device, label: &str, desc: &ImageDesc) -> wgpu::Texture {
    create_color_texture(
        device,
        label,
        desc.width,
        desc.height,
        texture_format(desc.format),
        desc.sample_count,
    )
}

pub fn create_color_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    sample_count: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

/// Scene depth-stencil target, sampleable through its depth aspect.
pub fn create_depth_stencil_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_STENCIL_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

/// 1x1 textures bound to slots a pass leaves empty.
pub struct FallbackTextures {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
}

pub fn create_fallback_textures(device: &wgpu::Device) -> FallbackTextures {
    let color = create_color_texture(
        device,
        "Fallback Color",
        1,
        1,
        wgpu::TextureFormat::Rgba16Float,
        1,
    );
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Fallback Depth"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FALLBACK_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    FallbackTextures {
        color: color.create_view(&wgpu::TextureViewDescriptor::default()),
        depth: depth.create_view(&wgpu::TextureViewDescriptor::default()),
    }
}
