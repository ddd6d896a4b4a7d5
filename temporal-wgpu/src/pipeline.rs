//! Bind group layouts and render pipelines for the TAA kernels.

use temporal_gpu_shared::kernels::{self, bindings, KernelId};
use temporal_render::commands::{CompareOp, DepthStencilBinding, StencilOp};

use crate::render_targets::DEPTH_STENCIL_FORMAT;

/// Shared fullscreen triangle vertex state (vertex-index based, no buffers).
fn fullscreen_vertex_state(module: &wgpu::ShaderModule) -> wgpu::VertexState<'_> {
    wgpu::VertexState {
        module,
        entry_point: Some("vs_main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        buffers: &[],
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Temporal bind group layout shared by every TAA kernel:
///   0: uniform TemporalUniforms
///   1: texture_2d<f32>  (source_color)
///   2: texture_2d<f32>  (history_tex)
///   3: texture_2d<f32>  (motion_tex)
///   4: texture_2d<f32>  (mask_tex)
///   5: texture_depth_2d (depth_tex)
///   6: sampler           (linear_sampler)
///   7: sampler           (point_sampler)
pub fn create_temporal_bgl(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Temporal BGL"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: bindings::UNIFORMS,
                // the dynamic kernel reads matrices and jitter in its vertex stage
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture_entry(bindings::SOURCE_COLOR),
            texture_entry(bindings::HISTORY),
            texture_entry(bindings::MOTION_VECTORS),
            texture_entry(bindings::MASK),
            wgpu::BindGroupLayoutEntry {
                binding: bindings::DEPTH,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            sampler_entry(bindings::LINEAR_SAMPLER),
            sampler_entry(bindings::POINT_SAMPLER),
        ],
    })
}

/// Object motion BGL: 0: uniform ObjectMotion (prev/curr model).
pub fn create_object_motion_bgl(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Object Motion BGL"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Blit BGL, matches blit.wgsl:
///   0: texture_2d<f32>  (source_tex)
///   1: sampler           (point_sampler)
pub fn create_blit_bgl(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Blit BGL"),
        entries: &[texture_entry(0), sampler_entry(1)],
    })
}

pub fn compare_function(op: CompareOp) -> wgpu::CompareFunction {
    match op {
        CompareOp::Always => wgpu::CompareFunction::Always,
        CompareOp::Equal => wgpu::CompareFunction::Equal,
        CompareOp::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareOp::LessEqual => wgpu::CompareFunction::LessEqual,
    }
}

pub fn stencil_operation(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
    }
}

/// Depth-stencil state of a pass bound to the scene depth-stencil target.
/// Depth is tested but never written; stencil is written only by tagging passes, and
/// only in the bits of their tag.
pub fn depth_stencil_state(binding: &DepthStencilBinding) -> wgpu::DepthStencilState {
    let face = wgpu::StencilFaceState {
        compare: compare_function(binding.stencil.compare),
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op: stencil_operation(binding.stencil.pass_op),
    };
    wgpu::DepthStencilState {
        format: DEPTH_STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: compare_function(binding.depth_compare),
        stencil: wgpu::StencilState {
            front: face,
            back: face,
            read_mask: u32::from(binding.stencil.mask),
            write_mask: if binding.stencil.writes_stencil() {
                u32::from(binding.stencil.mask)
            } else {
                0
            },
        },
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Identity of a compiled pipeline. `kernel: None` is the blit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub kernel: Option<KernelId>,
    pub format: wgpu::TextureFormat,
    /// Depth compare, stencil compare, stencil pass op and stencil mask.
    pub depth_stencil: Option<(CompareOp, CompareOp, StencilOp, u8)>,
}

impl PipelineKey {
    pub fn blit(format: wgpu::TextureFormat) -> Self {
        Self {
            kernel: None,
            format,
            depth_stencil: None,
        }
    }

    pub fn kernel(
        kernel: KernelId,
        format: wgpu::TextureFormat,
        depth_stencil: Option<&DepthStencilBinding>,
    ) -> Self {
        Self {
            kernel: Some(kernel),
            format,
            depth_stencil: depth_stencil
                .map(|ds| {
                (
                    ds.depth_compare,
                    ds.stencil.compare,
                    ds.stencil.pass_op,
                    ds.stencil.mask,
                )
            }),
        }
    }
}

/// Fullscreen pipeline for a kernel fragment, optionally tested against depth-stencil.
pub fn create_fullscreen_effect_pipeline(
    device: &wgpu::Device,
    label: &str,
    frag_source: &str,
    frag_entry: &str,
    bgl: &wgpu::BindGroupLayout,
    output_format: wgpu::TextureFormat,
    depth_stencil: Option<wgpu::DepthStencilState>,
) -> wgpu::RenderPipeline {
    let vert_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Fullscreen Vert"),
        source: wgpu::ShaderSource::Wgsl(kernels::FULLSCREEN_TRIANGLE_VERT.into()),
    });

    let frag_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(frag_source.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{label} Layout")),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: fullscreen_vertex_state(&vert_module),
        fragment: Some(wgpu::FragmentState {
            module: &frag_module,
            entry_point: Some(frag_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: output_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Per-object velocity pipeline: mesh positions in, velocity out, stencil tagged.
pub fn create_dynamic_motion_pipeline(
    device: &wgpu::Device,
    source: &str,
    temporal_bgl: &wgpu::BindGroupLayout,
    object_bgl: &wgpu::BindGroupLayout,
    output_format: wgpu::TextureFormat,
    depth_stencil: wgpu::DepthStencilState,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Dynamic Motion Shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Dynamic Motion Pipeline Layout"),
        bind_group_layouts: &[temporal_bgl, object_bgl],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Dynamic Motion Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[
                // location 0: position vec3
                wgpu::VertexBufferLayout {
                    array_stride: 12,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    }],
                },
            ],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some(KernelId::DynamicMotion.fragment_entry()),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: output_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(depth_stencil),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

pub fn create_linear_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("TAA Linear Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

pub fn create_point_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("TAA Point Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
