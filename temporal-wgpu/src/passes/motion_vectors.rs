//! Dynamic motion pass: per-object velocity drawn with mesh geometry.

/// One mesh draw with its object motion bind group (group 1).
pub struct MotionDraw<'a> {
    pub vertex_buffer: &'a wgpu::Buffer,
    pub index_buffer: Option<&'a wgpu::Buffer>,
    pub element_count: u32,
    pub bind_group: &'a wgpu::BindGroup,
}

/// Draw every motion-capable object into the velocity image, depth tested against
/// the scene and stamping `stencil_reference` where velocity was written.
pub fn render_dynamic_motion_pass(
    encoder: &mut wgpu::CommandEncoder,
    target_view: &wgpu::TextureView,
    depth_stencil_view: &wgpu::TextureView,
    stencil_reference: u32,
    pipeline: &wgpu::RenderPipeline,
    temporal_bind_group: &wgpu::BindGroup,
    draws: &[MotionDraw<'_>],
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Dynamic Motion Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: depth_stencil_view,
            depth_ops: None,
            stencil_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            }),
        }),
        ..Default::default()
    });

    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, temporal_bind_group, &[]);
    pass.set_stencil_reference(stencil_reference);

    for draw in draws {
        pass.set_bind_group(1, draw.bind_group, &[]);
        pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
        match draw.index_buffer {
            Some(indices) => {
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.element_count, 0, 0..1);
            }
            None => pass.draw(0..draw.element_count, 0..1),
        }
    }
}
