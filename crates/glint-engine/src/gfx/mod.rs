//! GPU resource registries and instanced draw management.
//!
//! [`Gfx`] is the root object: it owns every buffer, texture, framebuffer,
//! mesh store, shader program and compute program, plus the draw dispatcher
//! and the shared view/projection matrices. Operations borrow a [`GfxCtx`]
//! (device + queue), so one registry works against a windowed device, a
//! headless device or a test device alike.

pub mod buffer;
pub mod compute;
pub mod context;
pub mod draw;
pub mod error;
pub mod format;
pub mod framebuffer;
pub mod geometry;
pub mod handle;
pub mod shader;
pub mod texture;
pub mod texture_buffer;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytemuck::Pod;
use glam::Mat4;

pub use buffer::{BufferKind, GrowableBuffer};
pub use compute::{ComputeDesc, ComputeProgram, WORKGROUP_SIZE};
pub use context::GfxCtx;
pub use draw::{Dispatcher, FrameStats, InstanceBase};
pub use error::GfxError;
pub use format::{AttachmentFormat, InstanceData, TexelFormat};
pub use framebuffer::Framebuffer;
pub use geometry::{Geometry, MeshStore};
pub use handle::{Arena, Handle};
pub use shader::{Binding, ProgramDesc, RenderOptions, ShaderProgram};
pub use texture::{plan_texture, Texture, TextureKind, TexturePlan};
pub use texture_buffer::TextureBuffer;

use shader::{load_wgsl, premul_alpha_blend, validate_bindings, BindingResolver};

pub type BufferId = Handle<GrowableBuffer>;
pub type TextureId = Handle<Texture>;
pub type FramebufferId = Handle<Framebuffer>;

/// Root GPU resource registry.
pub struct Gfx {
    buffers: Arena<GrowableBuffer>,
    textures: Arena<Texture>,
    framebuffers: Arena<Framebuffer>,
    meshes: HashMap<String, MeshStore>,
    programs: HashMap<String, ShaderProgram>,
    computes: HashMap<String, ComputeProgram>,

    dispatcher: Dispatcher,
    active_program: Option<String>,

    /// Camera matrices shared by whatever shaders want them; plain fields
    /// because they are per-frame inputs, not resources.
    pub view: Mat4,
    pub proj: Mat4,

    surface_format: wgpu::TextureFormat,
    shader_dir: PathBuf,
    max_dimension: u32,
}

impl Gfx {
    /// Creates an empty registry.
    ///
    /// `surface_format` is the format programs with no target framebuffer
    /// render to. `shader_dir` is the directory `load_program` /
    /// `load_compute` resolve `<name>.wgsl` against.
    pub fn new(
        ctx: &GfxCtx<'_>,
        surface_format: wgpu::TextureFormat,
        shader_dir: impl Into<PathBuf>,
    ) -> Self {
        let max_dimension = ctx.device.limits().max_texture_dimension_2d;
        Self {
            buffers: Arena::new(),
            textures: Arena::new(),
            framebuffers: Arena::new(),
            meshes: HashMap::new(),
            programs: HashMap::new(),
            computes: HashMap::new(),
            dispatcher: Dispatcher::new(ctx),
            active_program: None,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            surface_format,
            shader_dir: shader_dir.into(),
            max_dimension,
        }
    }

    fn resolver(&self) -> BindingResolver<'_> {
        BindingResolver {
            buffers: &self.buffers,
            textures: &self.textures,
            framebuffers: &self.framebuffers,
        }
    }

    /// Combined projection * view matrix.
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }

    // ── buffers ───────────────────────────────────────────────────────────

    pub fn create_buffer(
        &mut self,
        ctx: &GfxCtx<'_>,
        label: &str,
        kind: BufferKind,
        element_size: u64,
        len: u64,
    ) -> Result<BufferId, GfxError> {
        let buffer = GrowableBuffer::new(ctx, label, kind, element_size, len)?;
        Ok(self.buffers.insert(buffer))
    }

    pub fn create_buffer_with<T: Pod>(
        &mut self,
        ctx: &GfxCtx<'_>,
        label: &str,
        kind: BufferKind,
        data: &[T],
    ) -> Result<BufferId, GfxError> {
        let buffer = GrowableBuffer::with_data(ctx, label, kind, data)?;
        Ok(self.buffers.insert(buffer))
    }

    pub fn buffer(&self, id: BufferId) -> Result<&GrowableBuffer, GfxError> {
        self.buffers.get(id).ok_or(GfxError::StaleHandle("buffer"))
    }

    pub fn write_buffer<T: Pod>(
        &mut self,
        ctx: &GfxCtx<'_>,
        id: BufferId,
        element_offset: u64,
        data: &[T],
    ) -> Result<(), GfxError> {
        self.buffers
            .get_mut(id)
            .ok_or(GfxError::StaleHandle("buffer"))?
            .write(ctx, element_offset, data)
    }

    /// Ensures a buffer holds at least `len` elements.
    pub fn resize_buffer(
        &mut self,
        ctx: &GfxCtx<'_>,
        id: BufferId,
        len: u64,
    ) -> Result<(), GfxError> {
        self.buffers
            .get_mut(id)
            .ok_or(GfxError::StaleHandle("buffer"))?
            .resize(ctx, len);
        Ok(())
    }

    /// Blocking full-range readback; test/debug aid.
    pub fn read_buffer(&self, ctx: &GfxCtx<'_>, id: BufferId) -> Result<Vec<u8>, GfxError> {
        self.buffer(id)?.read_back(ctx)
    }

    /// Drops a buffer. Every copy of the handle goes stale.
    pub fn destroy_buffer(&mut self, id: BufferId) {
        self.buffers.remove(id);
    }

    // ── texture buffers ───────────────────────────────────────────────────

    /// Creates a typed per-instance array. The element format is inferred
    /// from `T`; there is no way to create a view whose format disagrees
    /// with its buffer.
    pub fn create_texture_buffer<T: InstanceData>(
        &mut self,
        ctx: &GfxCtx<'_>,
        label: &str,
        data: &[T],
    ) -> Result<TextureBuffer, GfxError> {
        let buffer = GrowableBuffer::with_data(ctx, label, BufferKind::Instance, data)?;
        let handle = self.buffers.insert(buffer);
        log::debug!(
            "texture buffer '{label}': {} x {}",
            data.len(),
            T::FORMAT.name()
        );
        Ok(TextureBuffer { buffer: handle, format: T::FORMAT })
    }

    /// Writes elements into a texture buffer, growing it as needed. The
    /// element type must match the one the view was created with.
    pub fn write_texture_buffer<T: InstanceData>(
        &mut self,
        ctx: &GfxCtx<'_>,
        view: TextureBuffer,
        element_offset: u64,
        data: &[T],
    ) -> Result<(), GfxError> {
        if T::FORMAT != view.format() {
            return Err(GfxError::TexelFormatMismatch {
                bound: T::FORMAT.name(),
                created: view.format().name(),
            });
        }
        self.write_buffer(ctx, view.buffer(), element_offset, data)
    }

    // ── textures ──────────────────────────────────────────────────────────

    pub fn load_texture(&mut self, ctx: &GfxCtx<'_>, path: &Path) -> Result<TextureId, GfxError> {
        let texture = Texture::load_image(ctx, path)?;
        Ok(self.textures.insert(texture))
    }

    pub fn texture(&self, id: TextureId) -> Result<&Texture, GfxError> {
        self.textures.get(id).ok_or(GfxError::StaleHandle("texture"))
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    pub fn create_framebuffer(
        &mut self,
        ctx: &GfxCtx<'_>,
        label: &str,
        size: (u32, u32),
        clear_color: wgpu::Color,
        formats: &[AttachmentFormat],
    ) -> Result<FramebufferId, GfxError> {
        let fb = Framebuffer::new(ctx, label, size, clear_color, formats, self.max_dimension)?;
        Ok(self.framebuffers.insert(fb))
    }

    pub fn framebuffer(&self, id: FramebufferId) -> Result<&Framebuffer, GfxError> {
        self.framebuffers
            .get(id)
            .ok_or(GfxError::StaleHandle("framebuffer"))
    }

    pub fn resize_framebuffer(
        &mut self,
        ctx: &GfxCtx<'_>,
        id: FramebufferId,
        size: (u32, u32),
    ) -> Result<(), GfxError> {
        let max_dimension = self.max_dimension;
        self.framebuffers
            .get_mut(id)
            .ok_or(GfxError::StaleHandle("framebuffer"))?
            .resize(ctx, size, max_dimension)
    }

    /// Begins a pass over a framebuffer, clearing all its attachments.
    pub fn begin_framebuffer_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        id: FramebufferId,
    ) -> Result<wgpu::RenderPass<'e>, GfxError> {
        Ok(self.framebuffer(id)?.begin_pass(encoder))
    }

    // ── mesh stores ───────────────────────────────────────────────────────

    /// Registers a named mesh store. Capacity hints are in vertices/indices.
    pub fn create_mesh_store(
        &mut self,
        ctx: &GfxCtx<'_>,
        name: &str,
        attributes: &[u32],
        vertex_capacity: u64,
        index_capacity: u64,
    ) -> Result<(), GfxError> {
        let store = MeshStore::new(ctx, name, attributes, vertex_capacity, index_capacity)?;
        self.meshes.insert(name.to_string(), store);
        Ok(())
    }

    pub fn mesh(&self, name: &str) -> Result<&MeshStore, GfxError> {
        self.meshes
            .get(name)
            .ok_or_else(|| GfxError::UnknownMeshStore(name.to_string()))
    }

    /// Looks up where a named geometry lives inside a store.
    pub fn geometry(&self, store: &str, name: &str) -> Result<Geometry, GfxError> {
        self.mesh(store)?
            .geometry(name)
            .copied()
            .ok_or_else(|| GfxError::UnknownGeometry(name.to_string()))
    }

    /// Packs a named geometry into a mesh store.
    pub fn append_geometry(
        &mut self,
        ctx: &GfxCtx<'_>,
        store: &str,
        name: &str,
        vertex_data: &[f32],
        index_data: &[u32],
        topology: wgpu::PrimitiveTopology,
    ) -> Result<Geometry, GfxError> {
        self.meshes
            .get_mut(store)
            .ok_or_else(|| GfxError::UnknownMeshStore(store.to_string()))?
            .append(ctx, name, vertex_data, index_data, topology)
    }

    // ── shader programs ───────────────────────────────────────────────────

    /// Loads a render program from `<shader_dir>/<name>.wgsl`.
    pub fn load_program(&mut self, ctx: &GfxCtx<'_>, desc: ProgramDesc<'_>) -> Result<(), GfxError> {
        validate_bindings(&desc.bindings)?;

        let store = self
            .meshes
            .get(desc.mesh)
            .ok_or_else(|| GfxError::UnknownMeshStore(desc.mesh.to_string()))?;

        let (color_formats, depth_format) = match desc.framebuffer {
            Some(id) => {
                let fb = self
                    .framebuffers
                    .get(id)
                    .ok_or(GfxError::StaleHandle("framebuffer"))?;
                (fb.color_formats(), fb.depth_format())
            }
            None => (vec![self.surface_format], None),
        };
        let color_targets = color_formats
            .into_iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: desc.options.blend.then(premul_alpha_blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let module = load_wgsl(ctx.device, &self.shader_dir, desc.name)?;

        let uniform_buffer = desc.bindings.iter().find_map(|b| match b {
            Binding::Uniforms { size } => Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.name),
                size: size.next_multiple_of(16),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })),
            _ => None,
        });
        let sampler = desc
            .bindings
            .iter()
            .any(|b| matches!(b, Binding::Sampler))
            .then(|| {
                ctx.device.create_sampler(&wgpu::SamplerDescriptor {
                    label: Some(desc.name),
                    mag_filter: wgpu::FilterMode::Linear,
                    min_filter: wgpu::FilterMode::Linear,
                    mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                    ..Default::default()
                })
            });

        let bind_group_layout = if desc.bindings.is_empty() {
            None
        } else {
            let entries = self.resolver().layout_entries(
                desc.name,
                &desc.bindings,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )?;
            Some(
                ctx.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(desc.name),
                        entries: &entries,
                    }),
            )
        };

        let mut layouts = vec![self.dispatcher.layout()];
        if let Some(bgl) = &bind_group_layout {
            layouts.push(bgl);
        }
        let pipeline_layout =
            ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.name),
                bind_group_layouts: &layouts,
                immediate_size: 0,
            });

        let program = ShaderProgram {
            name: desc.name.to_string(),
            mesh: desc.mesh.to_string(),
            framebuffer: desc.framebuffer,
            options: desc.options,
            bindings: desc.bindings,
            module,
            pipeline_layout,
            color_targets,
            depth_format: depth_format.filter(|_| desc.options.depth),
            vertex_stride: store.stride(),
            vertex_attrs: store.vertex_attributes().to_vec(),
            pipelines: HashMap::new(),
            uniform_buffer,
            sampler,
            bind_group_layout,
            bind_group: None,
            bound_revisions: Vec::new(),
        };

        log::info!("loaded program '{}' (mesh '{}')", program.name, program.mesh);
        self.programs.insert(program.name.clone(), program);
        Ok(())
    }

    /// Writes a program's uniform block.
    pub fn set_uniforms<T: Pod>(
        &self,
        ctx: &GfxCtx<'_>,
        program: &str,
        value: &T,
    ) -> Result<(), GfxError> {
        self.programs
            .get(program)
            .ok_or_else(|| GfxError::UnknownShader(program.to_string()))?
            .set_uniforms(ctx, value);
        Ok(())
    }

    /// Makes `program` the active one on a pass: refreshes its bind group if
    /// any bound resource moved, and binds group 1. The pipeline itself is
    /// set per draw (it depends on the geometry's topology).
    pub fn bind_program(
        &mut self,
        ctx: &GfxCtx<'_>,
        pass: &mut wgpu::RenderPass<'_>,
        program: &str,
    ) -> Result<(), GfxError> {
        let resolver = BindingResolver {
            buffers: &self.buffers,
            textures: &self.textures,
            framebuffers: &self.framebuffers,
        };
        let prog = self
            .programs
            .get_mut(program)
            .ok_or_else(|| GfxError::UnknownShader(program.to_string()))?;

        prog.ensure_bind_group(ctx, &resolver)?;
        if let Some(bind_group) = &prog.bind_group {
            pass.set_bind_group(1, bind_group, &[]);
        }

        self.active_program = Some(program.to_string());
        Ok(())
    }

    /// Records an instanced draw of `geometry` through the active program.
    ///
    /// Recoverable mistakes (no active program, missing geometry) log an
    /// error and record nothing, so one absent batch cannot take down an
    /// interactive session.
    pub fn draw(
        &mut self,
        ctx: &GfxCtx<'_>,
        pass: &mut wgpu::RenderPass<'_>,
        geometry: &str,
        instances: u32,
    ) {
        let Some(name) = self.active_program.clone() else {
            log::error!("draw('{geometry}') with no active program");
            return;
        };
        let Some(program) = self.programs.get_mut(&name) else {
            log::error!("active program '{name}' no longer loaded");
            return;
        };
        let Some(store) = self.meshes.get(&program.mesh) else {
            log::error!("program '{name}' references missing mesh store '{}'", program.mesh);
            return;
        };
        let Some(geo) = store.geometry(geometry) else {
            log::error!("draw: unknown geometry '{geometry}' in store '{}'", program.mesh);
            return;
        };

        let pipeline = program.pipeline(ctx, geo.topology, geo.is_indexed());
        pass.set_pipeline(pipeline);
        self.dispatcher.draw(ctx, pass, store, geometry, instances);
    }

    // ── compute programs ──────────────────────────────────────────────────

    /// Loads a compute program from `<shader_dir>/<name>.wgsl`.
    pub fn load_compute(&mut self, ctx: &GfxCtx<'_>, desc: ComputeDesc<'_>) -> Result<(), GfxError> {
        validate_bindings(&desc.bindings)?;
        let name = desc.name.to_string();
        let program = ComputeProgram::new(ctx, &self.shader_dir, desc, &self.resolver())?;
        log::info!("loaded compute program '{name}'");
        self.computes.insert(name, program);
        Ok(())
    }

    pub fn compute(&self, name: &str) -> Result<&ComputeProgram, GfxError> {
        self.computes
            .get(name)
            .ok_or_else(|| GfxError::UnknownShader(name.to_string()))
    }

    /// Runs a compute program over `[first, first + count)` source instances
    /// and returns how many it compacted into its outputs.
    pub fn dispatch_count(
        &mut self,
        ctx: &GfxCtx<'_>,
        name: &str,
        first: u32,
        count: u32,
    ) -> Result<u32, GfxError> {
        let resolver = BindingResolver {
            buffers: &self.buffers,
            textures: &self.textures,
            framebuffers: &self.framebuffers,
        };
        self.computes
            .get_mut(name)
            .ok_or_else(|| GfxError::UnknownShader(name.to_string()))?
            .run(ctx, &resolver, first, count)
    }

    // ── frame control ─────────────────────────────────────────────────────

    /// Resets per-frame draw state. Call once before recording a frame.
    pub fn begin_frame(&mut self, ctx: &GfxCtx<'_>) {
        self.dispatcher.begin_frame(ctx);
        self.active_program = None;
    }

    pub fn instance_base(&self) -> u32 {
        self.dispatcher.instance_base()
    }

    pub fn set_instance_base(&mut self, base: u32) {
        self.dispatcher.set_instance_base(base);
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.dispatcher.stats()
    }

    pub fn set_instancing(&mut self, enabled: bool) {
        self.dispatcher.set_instancing(enabled);
    }
}

/// Begins a pass over the window surface, clearing it to `clear`.
pub fn begin_surface_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    clear: wgpu::Color,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("surface"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared test device. GPU-dependent tests bail out quietly on machines
    //! with no adapter (CI without a GPU), keeping the suite green there
    //! while still exercising the real paths everywhere else.

    use super::GfxCtx;

    pub struct TestGpu {
        pub device: wgpu::Device,
        pub queue: wgpu::Queue,
    }

    impl TestGpu {
        pub fn ctx(&self) -> GfxCtx<'_> {
            GfxCtx::new(&self.device, &self.queue)
        }
    }

    pub fn gpu() -> Option<TestGpu> {
        let (device, queue) = crate::device::headless().ok()?;
        Some(TestGpu { device, queue })
    }
}
