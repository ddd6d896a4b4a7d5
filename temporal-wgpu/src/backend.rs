use std::collections::HashMap;

use glam::Mat4;
use temporal_gpu_shared::kernels::{self, bindings, KernelLibrary};
use temporal_render::commands::{FullscreenPass, ObjectDrawPass, PassInputs, RenderCommand};
use temporal_render::images::{FilterMode, ImageAllocator, ImageDesc, ImageFormat, ImageHandle};
use temporal_render::motion_vectors::MeshHandle;
use temporal_render::pipeline::RenderHost;
use temporal_render::{CameraFrame, CommandList, TaaError, TaaResult};
use wgpu::util::DeviceExt;

use crate::handle::HandleStore;
use crate::passes::{self, motion_vectors::MotionDraw, taa::StencilAttachment};
use crate::pipeline::{self, PipelineKey};
use crate::render_targets::{self, FallbackTextures, ImageEntry};

/// Position-only mesh drawn by the dynamic motion kernel.
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: Option<wgpu::Buffer>,
    pub element_count: u32,
}

/// Owns the device and every image the TAA core or the host allocated through it,
/// and replays recorded command lists.
pub struct WgpuTaaBackend {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    images: HandleStore<ImageEntry>,
    meshes: HandleStore<GpuMesh>,

    library: KernelLibrary,
    temporal_bgl: wgpu::BindGroupLayout,
    object_bgl: wgpu::BindGroupLayout,
    blit_bgl: wgpu::BindGroupLayout,
    linear_sampler: wgpu::Sampler,
    point_sampler: wgpu::Sampler,
    fallback: FallbackTextures,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl WgpuTaaBackend {
    /// Create a device without a surface. Output images are read back or handed to the
    /// host's own presentation.
    pub fn new_headless(library: KernelLibrary) -> TaaResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| TaaError::backend("Failed to find suitable GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Temporal AA Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| TaaError::backend(format!("Failed to create device: {e}")))?;

        let info = adapter.get_info();
        log::info!("TAA backend on {} ({:?})", info.name, info.backend);

        Ok(Self::from_device(adapter, device, queue, library))
    }

    /// Wrap a device the host already owns.
    pub fn from_device(
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        library: KernelLibrary,
    ) -> Self {
        let temporal_bgl = pipeline::create_temporal_bgl(&device);
        let object_bgl = pipeline::create_object_motion_bgl(&device);
        let blit_bgl = pipeline::create_blit_bgl(&device);
        let linear_sampler = pipeline::create_linear_sampler(&device);
        let point_sampler = pipeline::create_point_sampler(&device);
        let fallback = render_targets::create_fallback_textures(&device);

        Self {
            adapter,
            device,
            queue,
            images: HandleStore::new(),
            meshes: HandleStore::new(),
            library,
            temporal_bgl,
            object_bgl,
            blit_bgl,
            linear_sampler,
            point_sampler,
            fallback,
            pipelines: HashMap::new(),
        }
    }

    pub fn library(&self) -> &KernelLibrary {
        &self.library
    }

    /// Make a host-created texture addressable by recorded commands.
    pub fn register_texture(&mut self, texture: wgpu::Texture) -> ImageHandle {
        ImageHandle(self.images.insert(ImageEntry::from_texture(texture, FilterMode::Point)))
    }

    pub fn create_color_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> ImageHandle {
        let texture = render_targets::create_color_texture(
            &self.device,
            label,
            width,
            height,
            render_targets::texture_format(format),
            1,
        );
        self.register_texture(texture)
    }

    pub fn create_depth_stencil_target(&mut self, label: &str, width: u32, height: u32) -> ImageHandle {
        let texture = render_targets::create_depth_stencil_texture(&self.device, label, width, height);
        self.register_texture(texture)
    }

    pub fn image(&self, handle: ImageHandle) -> TaaResult<&ImageEntry> {
        self.images
            .get(handle.0)
            .ok_or_else(|| TaaError::backend(format!("unknown image {}", handle.0)))
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Upload a position-only mesh (xyz triples) for the dynamic motion kernel.
    pub fn upload_mesh(&mut self, positions: &[f32], indices: &[u32]) -> MeshHandle {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Motion Vertex Position Buffer"),
                contents: bytemuck::cast_slice(positions),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let (index_buffer, element_count) = if indices.is_empty() {
            (None, (positions.len() / 3) as u32)
        } else {
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Motion Index Buffer"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
            (Some(buffer), indices.len() as u32)
        };

        MeshHandle(self.meshes.insert(GpuMesh {
            vertex_buffer,
            index_buffer,
            element_count,
        }))
    }

    pub fn destroy_mesh(&mut self, mesh: MeshHandle) {
        if let Some(mesh) = self.meshes.remove(mesh.0) {
            mesh.vertex_buffer.destroy();
            if let Some(indices) = mesh.index_buffer {
                indices.destroy();
            }
        }
    }

    /// Upload tightly packed RGBA8 texels into an Rgba8Unorm image.
    pub fn write_rgba8(&self, handle: ImageHandle, texels: &[u8]) -> TaaResult<()> {
        let entry = self.image(handle)?;
        if entry.format != wgpu::TextureFormat::Rgba8Unorm {
            return Err(TaaError::backend(format!(
                "write_rgba8 on {:?} image {}",
                entry.format, handle.0
            )));
        }
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            texels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * entry.width),
                rows_per_image: Some(entry.height),
            },
            entry.extent(),
        );
        Ok(())
    }

    /// Clear a depth-stencil target before the scene pass.
    pub fn clear_depth_stencil(&self, handle: ImageHandle, depth: f32, stencil: u32) -> TaaResult<()> {
        let entry = self.image(handle)?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Depth Stencil Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Depth Stencil Clear"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &entry.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(stencil),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                ..Default::default()
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Read an Rgba8Unorm image back as tightly packed texels.
    pub fn read_rgba8(&self, handle: ImageHandle) -> TaaResult<Vec<u8>> {
        let entry = self.image(handle)?;
        if entry.format != wgpu::TextureFormat::Rgba8Unorm {
            return Err(TaaError::backend(format!(
                "read_rgba8 on {:?} image {}",
                entry.format, handle.0
            )));
        }

        let row_bytes = 4 * entry.width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = row_bytes.div_ceil(align) * align;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded_row as u64 * entry.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(entry.height),
                },
            },
            entry.extent(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| TaaError::backend(format!("readback channel closed: {e}")))?
            .map_err(|e| TaaError::backend(format!("readback map failed: {e}")))?;

        let mut texels = Vec::with_capacity((row_bytes * entry.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded_row as usize) {
                texels.extend_from_slice(&row[..row_bytes as usize]);
            }
        }
        buffer.unmap();
        Ok(texels)
    }

    /// Replay one recorded command list in order and submit it.
    pub fn execute(&mut self, list: &CommandList) -> TaaResult<()> {
        if list.is_empty() {
            return Ok(());
        }
        self.prepare_pipelines(list)?;

        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Temporal Uniforms"),
                contents: bytemuck::bytes_of(&list.uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("TAA Encoder"),
            });

        for command in &list.commands {
            match command {
                RenderCommand::Clear { target, value } => {
                    passes::taa::clear_image(&mut encoder, &self.image(*target)?.view, *value);
                }
                RenderCommand::Fullscreen(pass) => {
                    self.record_fullscreen(&mut encoder, &uniform_buffer, pass)?;
                }
                RenderCommand::DrawObjects(pass) => {
                    self.record_object_draws(&mut encoder, &uniform_buffer, pass)?;
                }
                RenderCommand::Copy {
                    source,
                    destination,
                } => {
                    self.record_copy(&mut encoder, *source, *destination)?;
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        log::trace!(
            "{}: executed {:?} ({} commands)",
            list.camera,
            list.stage,
            list.len()
        );
        Ok(())
    }

    fn needs_blit(&self, source: ImageHandle, destination: ImageHandle) -> TaaResult<bool> {
        let src = self.image(source)?;
        let dst = self.image(destination)?;
        Ok(src.format != dst.format || src.width != dst.width || src.height != dst.height)
    }

    /// Compile every pipeline the list needs before any pass borrows them.
    fn prepare_pipelines(&mut self, list: &CommandList) -> TaaResult<()> {
        for command in &list.commands {
            let key = match command {
                RenderCommand::Clear { .. } => continue,
                RenderCommand::Fullscreen(pass) => PipelineKey::kernel(
                    pass.kernel,
                    self.image(pass.target)?.format,
                    pass.depth_stencil.as_ref(),
                ),
                RenderCommand::DrawObjects(pass) => PipelineKey::kernel(
                    pass.kernel,
                    self.image(pass.target)?.format,
                    Some(&pass.depth_stencil),
                ),
                RenderCommand::Copy {
                    source,
                    destination,
                } => {
                    if !self.needs_blit(*source, *destination)? {
                        continue;
                    }
                    PipelineKey::blit(self.image(*destination)?.format)
                }
            };
            if self.pipelines.contains_key(&key) {
                continue;
            }
            let pipeline = self.create_pipeline(&key, command)?;
            self.pipelines.insert(key, pipeline);
        }
        Ok(())
    }

    fn create_pipeline(&self, key: &PipelineKey, command: &RenderCommand) -> TaaResult<wgpu::RenderPipeline> {
        let Some(kernel) = key.kernel else {
            log::debug!("Creating blit pipeline for {:?}", key.format);
            return Ok(pipeline::create_fullscreen_effect_pipeline(
                &self.device,
                "Blit",
                kernels::BLIT_FRAG,
                "fs_main",
                &self.blit_bgl,
                key.format,
                None,
            ));
        };

        let source = self
            .library
            .get(kernel)
            .ok_or(TaaError::MissingKernel(kernel))?;
        log::debug!("Creating {kernel} pipeline for {:?}", key.format);

        match command {
            RenderCommand::DrawObjects(pass) => Ok(pipeline::create_dynamic_motion_pipeline(
                &self.device,
                source,
                &self.temporal_bgl,
                &self.object_bgl,
                key.format,
                pipeline::depth_stencil_state(&pass.depth_stencil),
            )),
            RenderCommand::Fullscreen(pass) if kernel.is_fullscreen() => {
                Ok(pipeline::create_fullscreen_effect_pipeline(
                    &self.device,
                    kernel.name(),
                    source,
                    kernel.fragment_entry(),
                    &self.temporal_bgl,
                    key.format,
                    pass.depth_stencil.as_ref().map(pipeline::depth_stencil_state),
                ))
            }
            _ => Err(TaaError::backend(format!(
                "kernel {kernel} cannot be drawn as {command:?}"
            ))),
        }
    }

    fn pipeline(&self, key: &PipelineKey) -> TaaResult<&wgpu::RenderPipeline> {
        self.pipelines
            .get(key)
            .ok_or_else(|| TaaError::backend(format!("pipeline not prepared: {key:?}")))
    }

    fn color_view(&self, handle: Option<ImageHandle>) -> TaaResult<&wgpu::TextureView> {
        match handle {
            Some(h) => Ok(&self.image(h)?.sample_view),
            None => Ok(&self.fallback.color),
        }
    }

    fn temporal_bind_group(&self, uniforms: &wgpu::Buffer, inputs: &PassInputs) -> TaaResult<wgpu::BindGroup> {
        let depth = match inputs.depth {
            Some(h) => &self.image(h)?.sample_view,
            None => &self.fallback.depth,
        };
        // Low tier allocates a point-filtered history and reprojects without bilinear taps.
        let history_sampler = match inputs.history {
            Some(h) if self.image(h)?.filter == FilterMode::Point => &self.point_sampler,
            _ => &self.linear_sampler,
        };

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Temporal Bind Group"),
            layout: &self.temporal_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings::UNIFORMS,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::SOURCE_COLOR,
                    resource: wgpu::BindingResource::TextureView(self.color_view(inputs.source_color)?),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::HISTORY,
                    resource: wgpu::BindingResource::TextureView(self.color_view(inputs.history)?),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::MOTION_VECTORS,
                    resource: wgpu::BindingResource::TextureView(self.color_view(inputs.velocity)?),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::MASK,
                    resource: wgpu::BindingResource::TextureView(self.color_view(inputs.mask)?),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::DEPTH,
                    resource: wgpu::BindingResource::TextureView(depth),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::LINEAR_SAMPLER,
                    resource: wgpu::BindingResource::Sampler(history_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::POINT_SAMPLER,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
            ],
        }))
    }

    fn record_fullscreen(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &wgpu::Buffer,
        pass: &FullscreenPass,
    ) -> TaaResult<()> {
        let target = self.image(pass.target)?;
        let key = PipelineKey::kernel(pass.kernel, target.format, pass.depth_stencil.as_ref());
        let bind_group = self.temporal_bind_group(uniforms, &pass.inputs)?;
        let stencil = match &pass.depth_stencil {
            Some(ds) => Some(StencilAttachment {
                view: &self.image(ds.image)?.view,
                reference: u32::from(ds.stencil.reference),
            }),
            None => None,
        };

        passes::taa::render_kernel_pass(
            encoder,
            pass.label,
            &target.view,
            pass.load,
            stencil,
            self.pipeline(&key)?,
            &bind_group,
        );
        Ok(())
    }

    fn record_object_draws(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &wgpu::Buffer,
        pass: &ObjectDrawPass,
    ) -> TaaResult<()> {
        let target = self.image(pass.target)?;
        let key = PipelineKey::kernel(pass.kernel, target.format, Some(&pass.depth_stencil));
        // depth is attached for testing, so the depth slot takes the fallback
        let bind_group = self.temporal_bind_group(uniforms, &PassInputs::default())?;

        let mut object_groups = Vec::with_capacity(pass.draws.len());
        for draw in &pass.draws {
            let mesh = self
                .meshes
                .get(draw.mesh.0)
                .ok_or_else(|| TaaError::backend(format!("unknown mesh {}", draw.mesh.0)))?;
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Object Motion Uniforms"),
                    contents: bytemuck::bytes_of(&draw.uniforms()),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Object Motion Bind Group"),
                layout: &self.object_bgl,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            object_groups.push((mesh, group));
        }

        let draws: Vec<MotionDraw<'_>> = object_groups
            .iter()
            .map(|(mesh, group)| MotionDraw {
                vertex_buffer: &mesh.vertex_buffer,
                index_buffer: mesh.index_buffer.as_ref(),
                element_count: mesh.element_count,
                bind_group: group,
            })
            .collect();

        passes::motion_vectors::render_dynamic_motion_pass(
            encoder,
            &target.view,
            &self.image(pass.depth_stencil.image)?.view,
            u32::from(pass.depth_stencil.stencil.reference),
            self.pipeline(&key)?,
            &bind_group,
            &draws,
        );
        Ok(())
    }

    fn record_copy(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: ImageHandle,
        destination: ImageHandle,
    ) -> TaaResult<()> {
        let src = self.image(source)?;
        let dst = self.image(destination)?;
        if !self.needs_blit(source, destination)? {
            passes::taa::copy_image(encoder, &src.texture, &dst.texture, src.extent());
            return Ok(());
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout: &self.blit_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src.sample_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
            ],
        });
        passes::present::render_blit_pass(
            encoder,
            &dst.view,
            self.pipeline(&PipelineKey::blit(dst.format))?,
            &bind_group,
        );
        Ok(())
    }
}

impl ImageAllocator for WgpuTaaBackend {
    fn allocate_image(&mut self, label: &str, desc: &ImageDesc) -> TaaResult<ImageHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(TaaError::allocation(
                label,
                format!("{}x{} outside 1..={max}", desc.width, desc.height),
            ));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = render_targets::create_image_texture(&self.device, label, desc);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            texture.destroy();
            return Err(TaaError::allocation(label, err.to_string()));
        }

        log::debug!(
            "Allocated {label} {}x{} {:?} ({} bytes)",
            desc.width,
            desc.height,
            desc.format,
            desc.byte_size()
        );
        Ok(ImageHandle(self.images.insert(ImageEntry::from_texture(texture, desc.filter))))
    }

    fn release_image(&mut self, image: ImageHandle) {
        if let Some(entry) = self.images.remove(image.0) {
            entry.texture.destroy();
        }
    }
}

/// Draws one camera's scene into the frame's color and depth-stencil targets.
pub trait SceneRenderer {
    fn render(
        &mut self,
        backend: &mut WgpuTaaBackend,
        frame: &CameraFrame,
        projection: &Mat4,
    ) -> TaaResult<()>;
}

/// [`RenderHost`] pairing the backend with the host's scene renderer.
pub struct WgpuHost<'a, S: SceneRenderer> {
    pub backend: &'a mut WgpuTaaBackend,
    pub scene: &'a mut S,
}

impl<'a, S: SceneRenderer> WgpuHost<'a, S> {
    pub fn new(backend: &'a mut WgpuTaaBackend, scene: &'a mut S) -> Self {
        Self { backend, scene }
    }
}

impl<S: SceneRenderer> ImageAllocator for WgpuHost<'_, S> {
    fn allocate_image(&mut self, label: &str, desc: &ImageDesc) -> TaaResult<ImageHandle> {
        self.backend.allocate_image(label, desc)
    }

    fn release_image(&mut self, image: ImageHandle) {
        self.backend.release_image(image)
    }
}

impl<S: SceneRenderer> RenderHost for WgpuHost<'_, S> {
    fn render_scene(&mut self, frame: &CameraFrame, projection: &Mat4) -> TaaResult<()> {
        self.scene.render(&mut *self.backend, frame, projection)
    }

    fn submit(&mut self, commands: CommandList) -> TaaResult<()> {
        self.backend.execute(&commands)
    }
}

