//! Shader programs.
//!
//! Programs load WGSL from a `shaders/<name>.wgsl` path convention. A render
//! program records which mesh store it draws from, which framebuffer it
//! targets (None = the window surface), its render-state options and a
//! declared binding list. Pipelines are created lazily per primitive
//! topology, since a pass may draw triangle meshes and line strips through
//! the same program.
//!
//! Bind groups are rebuilt automatically when a bound buffer or framebuffer
//! has been reallocated since the last build; resource revisions make stale
//! bindings detectable (growing a buffer replaces the underlying allocation,
//! exactly like the classic "reconfigure attribute pointers after resize"
//! protocol, only checked instead of remembered).

use std::collections::HashMap;
use std::path::Path;

use bytemuck::Pod;

use super::buffer::GrowableBuffer;
use super::context::GfxCtx;
use super::error::GfxError;
use super::format::TexelFormat;
use super::framebuffer::Framebuffer;
use super::handle::{Arena, Handle};
use super::texture::Texture;
use super::texture_buffer::TextureBuffer;

/// Render-state options applied when a program draws.
#[derive(Debug, Copy, Clone)]
pub struct RenderOptions {
    /// Premultiplied-alpha blending on the color targets.
    pub blend: bool,
    /// Depth test + write (only takes effect on targets with a depth
    /// attachment).
    pub depth: bool,
    /// Back-face culling.
    pub cull: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { blend: true, depth: true, cull: true }
    }
}

pub(crate) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

/// One declared shader binding. Bindings occupy group 1, numbered in
/// declaration order (group 0 belongs to the draw dispatcher).
#[derive(Debug, Clone)]
pub enum Binding {
    /// A plain uniform block, written through `set_uniforms`.
    Uniforms { size: u64 },
    /// Read-only per-instance array (texture buffer). `format` is the
    /// element type the shader reads; it must match the view's creation
    /// format, checked at program load.
    TexBuffer { view: TextureBuffer, format: TexelFormat },
    /// Read-write storage buffer (compute outputs).
    RwBuffer(Handle<GrowableBuffer>),
    /// Sampled texture from the texture registry.
    Texture(Handle<Texture>),
    /// A framebuffer color attachment, sampled after that pass completed.
    Attachment { framebuffer: Handle<Framebuffer>, slot: usize },
    /// A framebuffer depth attachment.
    DepthAttachment { framebuffer: Handle<Framebuffer> },
    /// A filtering sampler (created and owned by the program).
    Sampler,
}

/// Loads `dir/<name>.wgsl` into a shader module.
pub(crate) fn load_wgsl(
    device: &wgpu::Device,
    dir: &Path,
    name: &str,
) -> Result<wgpu::ShaderModule, GfxError> {
    let path = dir.join(format!("{name}.wgsl"));
    if !path.exists() {
        return Err(GfxError::ShaderNotFound(path));
    }
    let source = std::fs::read_to_string(&path)
        .map_err(|source| GfxError::ShaderRead { path: path.clone(), source })?;

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    }))
}

/// Checks the declared element type of every texture-buffer binding against
/// the type its view was created with.
pub(crate) fn validate_bindings(bindings: &[Binding]) -> Result<(), GfxError> {
    for binding in bindings {
        if let Binding::TexBuffer { view, format } = binding {
            if view.format() != *format {
                return Err(GfxError::TexelFormatMismatch {
                    bound: format.name(),
                    created: view.format().name(),
                });
            }
        }
    }
    Ok(())
}

/// Borrowed view over the registries a binding list resolves against.
pub(crate) struct BindingResolver<'a> {
    pub buffers: &'a Arena<GrowableBuffer>,
    pub textures: &'a Arena<Texture>,
    pub framebuffers: &'a Arena<Framebuffer>,
}

impl BindingResolver<'_> {
    /// Layout entries for a binding list, in declaration order.
    pub fn layout_entries(
        &self,
        program: &str,
        bindings: &[Binding],
        visibility: wgpu::ShaderStages,
    ) -> Result<Vec<wgpu::BindGroupLayoutEntry>, GfxError> {
        bindings
            .iter()
            .enumerate()
            .map(|(i, binding)| self.layout_entry(program, i as u32, binding, visibility))
            .collect()
    }

    fn layout_entry(
        &self,
        program: &str,
        index: u32,
        binding: &Binding,
        visibility: wgpu::ShaderStages,
    ) -> Result<wgpu::BindGroupLayoutEntry, GfxError> {
        let missing = || GfxError::MissingBinding { name: program.to_string(), binding: index };

        let entry = match binding {
            Binding::Uniforms { .. } => wgpu::BindGroupLayoutEntry {
                binding: index,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            Binding::TexBuffer { view, .. } => {
                self.buffers.get(view.buffer()).ok_or_else(missing)?;
                let mut entry = TextureBuffer::layout_entry(index);
                entry.visibility = visibility;
                entry
            }
            Binding::RwBuffer(handle) => {
                self.buffers.get(*handle).ok_or_else(missing)?;
                wgpu::BindGroupLayoutEntry {
                    binding: index,
                    visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }
            }
            Binding::Texture(handle) => {
                let texture = self.textures.get(*handle).ok_or_else(missing)?;
                wgpu::BindGroupLayoutEntry {
                    binding: index,
                    visibility,
                    ty: wgpu::BindingType::Texture {
                        sample_type: sample_type_of(texture.format()),
                        view_dimension: texture.plan().view_dimension(),
                        multisampled: false,
                    },
                    count: None,
                }
            }
            Binding::Attachment { framebuffer, slot } => {
                let fb = self.framebuffers.get(*framebuffer).ok_or_else(missing)?;
                let texture = fb.color_attachment(*slot).ok_or_else(missing)?;
                wgpu::BindGroupLayoutEntry {
                    binding: index,
                    visibility,
                    ty: wgpu::BindingType::Texture {
                        sample_type: sample_type_of(texture.format()),
                        view_dimension: texture.plan().view_dimension(),
                        multisampled: false,
                    },
                    count: None,
                }
            }
            Binding::DepthAttachment { framebuffer } => {
                let fb = self.framebuffers.get(*framebuffer).ok_or_else(missing)?;
                let texture = fb.depth_attachment().ok_or_else(missing)?;
                wgpu::BindGroupLayoutEntry {
                    binding: index,
                    visibility,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: texture.plan().view_dimension(),
                        multisampled: false,
                    },
                    count: None,
                }
            }
            Binding::Sampler => wgpu::BindGroupLayoutEntry {
                binding: index,
                visibility,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        };
        Ok(entry)
    }

    /// Current revisions of every bound resource. A mismatch against the
    /// revisions captured at bind-group build time means the group is stale.
    pub fn revisions(&self, bindings: &[Binding]) -> Vec<u64> {
        bindings
            .iter()
            .map(|binding| match binding {
                Binding::TexBuffer { view, .. } => {
                    self.buffers.get(view.buffer()).map_or(0, |b| b.revision())
                }
                Binding::RwBuffer(handle) => {
                    self.buffers.get(*handle).map_or(0, |b| b.revision())
                }
                Binding::Attachment { framebuffer, .. }
                | Binding::DepthAttachment { framebuffer } => {
                    self.framebuffers.get(*framebuffer).map_or(0, |f| f.revision())
                }
                _ => 0,
            })
            .collect()
    }

    /// Builds the bind group for a binding list.
    pub fn build_bind_group(
        &self,
        ctx: &GfxCtx<'_>,
        program: &str,
        bindings: &[Binding],
        layout: &wgpu::BindGroupLayout,
        uniform_buffer: Option<&wgpu::Buffer>,
        sampler: Option<&wgpu::Sampler>,
    ) -> Result<wgpu::BindGroup, GfxError> {
        let mut entries = Vec::with_capacity(bindings.len());
        for (i, binding) in bindings.iter().enumerate() {
            let index = i as u32;
            let missing =
                || GfxError::MissingBinding { name: program.to_string(), binding: index };

            let resource = match binding {
                Binding::Uniforms { .. } => {
                    uniform_buffer.ok_or_else(missing)?.as_entire_binding()
                }
                Binding::TexBuffer { view, .. } => self
                    .buffers
                    .get(view.buffer())
                    .ok_or_else(missing)?
                    .raw()
                    .as_entire_binding(),
                Binding::RwBuffer(handle) => self
                    .buffers
                    .get(*handle)
                    .ok_or_else(missing)?
                    .raw()
                    .as_entire_binding(),
                Binding::Texture(handle) => wgpu::BindingResource::TextureView(
                    self.textures.get(*handle).ok_or_else(missing)?.view(),
                ),
                Binding::Attachment { framebuffer, slot } => {
                    let fb = self.framebuffers.get(*framebuffer).ok_or_else(missing)?;
                    wgpu::BindingResource::TextureView(
                        fb.color_attachment(*slot).ok_or_else(missing)?.view(),
                    )
                }
                Binding::DepthAttachment { framebuffer } => {
                    let fb = self.framebuffers.get(*framebuffer).ok_or_else(missing)?;
                    wgpu::BindingResource::TextureView(
                        fb.depth_attachment().ok_or_else(missing)?.sample_view(),
                    )
                }
                Binding::Sampler => {
                    wgpu::BindingResource::Sampler(sampler.ok_or_else(missing)?)
                }
            };
            entries.push(wgpu::BindGroupEntry { binding: index, resource });
        }

        Ok(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program),
            layout,
            entries: &entries,
        }))
    }
}

fn sample_type_of(format: wgpu::TextureFormat) -> wgpu::TextureSampleType {
    match format {
        wgpu::TextureFormat::Depth24PlusStencil8
        | wgpu::TextureFormat::Depth32Float
        | wgpu::TextureFormat::Depth24Plus => wgpu::TextureSampleType::Depth,
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => {
            wgpu::TextureSampleType::Float { filterable: true }
        }
        // 16/32-bit float color is unfilterable without extra device features.
        _ => wgpu::TextureSampleType::Float { filterable: false },
    }
}

/// Description of a render program to load.
pub struct ProgramDesc<'a> {
    /// Shader name; source comes from `<shader_dir>/<name>.wgsl`, with
    /// `vs_main` mandatory and `fs_main` expected for color output.
    pub name: &'a str,
    /// Mesh store the program draws from.
    pub mesh: &'a str,
    /// Target framebuffer; None draws to the window surface.
    pub framebuffer: Option<Handle<Framebuffer>>,
    pub options: RenderOptions,
    pub bindings: Vec<Binding>,
}

/// A loaded render program.
///
/// Owns its shader module, per-topology pipelines, uniform buffer and bind
/// group. Not constructed directly; see [`crate::gfx::Gfx::load_program`].
pub struct ShaderProgram {
    pub(crate) name: String,
    pub(crate) mesh: String,
    pub(crate) framebuffer: Option<Handle<Framebuffer>>,
    pub(crate) options: RenderOptions,
    pub(crate) bindings: Vec<Binding>,

    pub(crate) module: wgpu::ShaderModule,
    pub(crate) pipeline_layout: wgpu::PipelineLayout,
    pub(crate) color_targets: Vec<Option<wgpu::ColorTargetState>>,
    pub(crate) depth_format: Option<wgpu::TextureFormat>,
    pub(crate) vertex_stride: u32,
    pub(crate) vertex_attrs: Vec<wgpu::VertexAttribute>,
    /// Keyed by (topology, indexed); strips need an index format baked in.
    pub(crate) pipelines: HashMap<(wgpu::PrimitiveTopology, bool), wgpu::RenderPipeline>,

    pub(crate) uniform_buffer: Option<wgpu::Buffer>,
    pub(crate) sampler: Option<wgpu::Sampler>,
    pub(crate) bind_group_layout: Option<wgpu::BindGroupLayout>,
    pub(crate) bind_group: Option<wgpu::BindGroup>,
    pub(crate) bound_revisions: Vec<u64>,
}

impl ShaderProgram {
    /// Writes the program's uniform block.
    ///
    /// One block per program per frame: all draws of the frame observe the
    /// last value written before submission. Per-draw variation belongs in
    /// instance buffers indexed with the instance base.
    pub fn set_uniforms<T: Pod>(&self, ctx: &GfxCtx<'_>, value: &T) {
        match &self.uniform_buffer {
            Some(buffer) => ctx.queue.write_buffer(buffer, 0, bytemuck::bytes_of(value)),
            None => log::error!(
                "program '{}' has no Uniforms binding; set_uniforms ignored",
                self.name
            ),
        }
    }

    /// Rebuilds the group-1 bind group when any bound resource moved (a
    /// buffer grew, a framebuffer was resized).
    pub(crate) fn ensure_bind_group(
        &mut self,
        ctx: &GfxCtx<'_>,
        resolver: &BindingResolver<'_>,
    ) -> Result<(), GfxError> {
        let Some(layout) = &self.bind_group_layout else { return Ok(()) };

        let current = resolver.revisions(&self.bindings);
        if self.bind_group.is_some() && current == self.bound_revisions {
            return Ok(());
        }

        self.bind_group = Some(resolver.build_bind_group(
            ctx,
            &self.name,
            &self.bindings,
            layout,
            self.uniform_buffer.as_ref(),
            self.sampler.as_ref(),
        )?);
        self.bound_revisions = current;
        Ok(())
    }

    /// Fetches or creates the pipeline for a topology.
    pub(crate) fn pipeline(
        &mut self,
        ctx: &GfxCtx<'_>,
        topology: wgpu::PrimitiveTopology,
        indexed: bool,
    ) -> &wgpu::RenderPipeline {
        if !self.pipelines.contains_key(&(topology, indexed)) {
            let strip = matches!(
                topology,
                wgpu::PrimitiveTopology::LineStrip | wgpu::PrimitiveTopology::TriangleStrip
            );

            let buffers = if self.vertex_stride > 0 {
                vec![wgpu::VertexBufferLayout {
                    array_stride: u64::from(self.vertex_stride) * 4,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &self.vertex_attrs,
                }]
            } else {
                Vec::new()
            };

            let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&self.name),
                layout: Some(&self.pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &self.module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },

                fragment: Some(wgpu::FragmentState {
                    module: &self.module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &self.color_targets,
                }),

                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: (strip && indexed).then_some(wgpu::IndexFormat::Uint32),
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: self.options.cull.then_some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: self.depth_format.filter(|_| self.options.depth).map(|format| {
                    wgpu::DepthStencilState {
                        format,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }
                }),
                multisample: wgpu::MultisampleState::default(),

                multiview_mask: None,
                cache: None,
            });

            self.pipelines.insert((topology, indexed), pipeline);
        }

        &self.pipelines[&(topology, indexed)]
    }
}
