//! Fullscreen TAA kernel passes, clears and image copies.

use temporal_render::commands::LoadOp;

/// Read-only attachment of the scene depth-stencil target for stencil-tested passes.
pub struct StencilAttachment<'a> {
    pub view: &'a wgpu::TextureView,
    pub reference: u32,
}

pub fn load_op(load: LoadOp) -> wgpu::LoadOp<wgpu::Color> {
    match load {
        LoadOp::Clear => wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        LoadOp::Load => wgpu::LoadOp::Load,
    }
}

/// Draw one fullscreen kernel into `target_view`.
pub fn render_kernel_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target_view: &wgpu::TextureView,
    load: LoadOp,
    stencil: Option<StencilAttachment<'_>>,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: load_op(load),
                store: wgpu::StoreOp::Store,
            },
        })],
        // depth is also bound for sampling, so the attachment stays read-only
        depth_stencil_attachment: stencil.as_ref().map(|s| {
            wgpu::RenderPassDepthStencilAttachment {
                view: s.view,
                depth_ops: None,
                stencil_ops: None,
            }
        }),
        ..Default::default()
    });

    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    if let Some(s) = &stencil {
        pass.set_stencil_reference(s.reference);
    }
    pass.draw(0..3, 0..1);
}

pub fn clear_image(encoder: &mut wgpu::CommandEncoder, target_view: &wgpu::TextureView, value: [f32; 4]) {
    let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("TAA Clear"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color {
                    r: value[0] as f64,
                    g: value[1] as f64,
                    b: value[2] as f64,
                    a: value[3] as f64,
                }),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });
}

/// Texel copy between images of identical format and size.
pub fn copy_image(
    encoder: &mut wgpu::CommandEncoder,
    source: &wgpu::Texture,
    destination: &wgpu::Texture,
    size: wgpu::Extent3d,
) {
    encoder.copy_texture_to_texture(
        wgpu::ImageCopyTexture {
            texture: source,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyTexture {
            texture: destination,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        size,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_ops_map_to_transparent_clear_or_load() {
        assert_eq!(load_op(LoadOp::Load), wgpu::LoadOp::Load);
        assert_eq!(
            load_op(LoadOp::Clear),
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        );
    }
}
