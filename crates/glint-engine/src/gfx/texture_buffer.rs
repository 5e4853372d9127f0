//! Texture buffers: raw instance data + a typed view contract.
//!
//! Shaders consume large per-instance arrays (colors, model matrices, orbit
//! parameters) through these. The buffer half holds the bytes; the format tag
//! is the read-only typed view a shader binds against, and it is checked when
//! a program declares the binding so a `mat4x4` array can never be handed a
//! buffer created for `vec4` elements.

use super::buffer::GrowableBuffer;
use super::format::TexelFormat;
use super::handle::Handle;

/// Paired (buffer, typed view) handle for per-instance shader data.
///
/// Invariant: the buffer's element size always equals
/// `format.element_size()`; [`crate::gfx::Gfx::create_texture_buffer`] is the
/// only constructor and derives both from the same element type.
#[derive(Debug, Copy, Clone)]
pub struct TextureBuffer {
    pub(crate) buffer: Handle<GrowableBuffer>,
    pub(crate) format: TexelFormat,
}

impl TextureBuffer {
    pub fn buffer(&self) -> Handle<GrowableBuffer> {
        self.buffer
    }

    pub fn format(&self) -> TexelFormat {
        self.format
    }

    /// Bind-group layout entry for this view: read-only storage, visible to
    /// every stage (vertex placement, fragment lookup, compute culling).
    pub(crate) fn layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX
                | wgpu::ShaderStages::FRAGMENT
                | wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }
}
