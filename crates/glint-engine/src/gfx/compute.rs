//! Compute programs for GPU-side instance placement and culling.
//!
//! A compute program runs `cs_main` over a contiguous range of source
//! instances and compacts whatever it keeps into its output buffers. The
//! engine supplies group 0: a params uniform (`first`, `count`) and an atomic
//! counter the shader bumps to claim compacted output slots. After dispatch
//! the counter is read back so the caller knows how many instances survived
//! and can feed that number straight into an instanced draw.

use bytemuck::{Pod, Zeroable};

use super::context::GfxCtx;
use super::error::GfxError;
use super::shader::{load_wgsl, Binding, BindingResolver};

/// Threads per workgroup; `cs_main` must declare the same size.
pub const WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ComputeParams {
    first: u32,
    count: u32,
    _pad: [u32; 2],
}

/// Description of a compute program to load.
pub struct ComputeDesc<'a> {
    /// Shader name; source comes from `<shader_dir>/<name>.wgsl` and must
    /// export `cs_main`.
    pub name: &'a str,
    /// Group-1 bindings, in declaration order.
    pub bindings: Vec<Binding>,
}

/// A loaded compute program. See [`crate::gfx::Gfx::load_compute`].
pub struct ComputeProgram {
    pub(crate) name: String,
    pub(crate) bindings: Vec<Binding>,

    pipeline: wgpu::ComputePipeline,
    params: wgpu::Buffer,
    counter: wgpu::Buffer,
    counter_readback: wgpu::Buffer,
    builtin_group: wgpu::BindGroup,

    pub(crate) uniform_buffer: Option<wgpu::Buffer>,
    pub(crate) bind_group_layout: Option<wgpu::BindGroupLayout>,
    pub(crate) bind_group: Option<wgpu::BindGroup>,
    pub(crate) bound_revisions: Vec<u64>,
}

impl ComputeProgram {
    pub(crate) fn new(
        ctx: &GfxCtx<'_>,
        shader_dir: &std::path::Path,
        desc: ComputeDesc<'_>,
        resolver: &BindingResolver<'_>,
    ) -> Result<Self, GfxError> {
        let module = load_wgsl(ctx.device, shader_dir, desc.name)?;

        let params = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("compute params"),
            size: std::mem::size_of::<ComputeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let counter = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("compute counter"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let counter_readback = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("compute counter readback"),
            size: 4,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let builtin_layout =
            ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("compute builtin"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });
        let builtin_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("compute builtin"),
            layout: &builtin_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: counter.as_entire_binding() },
            ],
        });

        let uniform_buffer = desc.bindings.iter().find_map(|b| match b {
            Binding::Uniforms { size } => Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.name),
                size: size.next_multiple_of(16),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })),
            _ => None,
        });

        let bind_group_layout = if desc.bindings.is_empty() {
            None
        } else {
            let entries = resolver.layout_entries(
                desc.name,
                &desc.bindings,
                wgpu::ShaderStages::COMPUTE,
            )?;
            Some(ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(desc.name),
                entries: &entries,
            }))
        };

        let mut layouts = vec![&builtin_layout];
        if let Some(bgl) = &bind_group_layout {
            layouts.push(bgl);
        }
        let pipeline_layout =
            ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.name),
                bind_group_layouts: &layouts,
                immediate_size: 0,
            });

        let pipeline = ctx.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(desc.name),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            name: desc.name.to_string(),
            bindings: desc.bindings,
            pipeline,
            params,
            counter,
            counter_readback,
            builtin_group,
            uniform_buffer,
            bind_group_layout,
            bind_group: None,
            bound_revisions: Vec::new(),
        })
    }

    /// Writes the program's uniform block (if it declared one).
    pub fn set_uniforms<T: Pod>(&self, ctx: &GfxCtx<'_>, value: &T) {
        match &self.uniform_buffer {
            Some(buffer) => ctx.queue.write_buffer(buffer, 0, bytemuck::bytes_of(value)),
            None => log::error!(
                "compute '{}' has no Uniforms binding; set_uniforms ignored",
                self.name
            ),
        }
    }

    /// Rebuilds the group-1 bind group when any bound resource moved.
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
            None,
        )?);
        self.bound_revisions = current;
        Ok(())
    }

    /// Dispatches over `[first, first + count)` and blocks on the compacted
    /// instance count.
    ///
    /// The synchronous readback is the point of the operation: the survivor
    /// count is needed on the CPU to record the instanced draw that consumes
    /// the compacted output.
    pub(crate) fn run(
        &mut self,
        ctx: &GfxCtx<'_>,
        resolver: &BindingResolver<'_>,
        first: u32,
        count: u32,
    ) -> Result<u32, GfxError> {
        if count == 0 {
            return Ok(0);
        }
        self.ensure_bind_group(ctx, resolver)?;

        let params = ComputeParams { first, count, _pad: [0; 2] };
        ctx.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
        ctx.queue.write_buffer(&self.counter, 0, bytemuck::bytes_of(&0u32));

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(&self.name) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&self.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.builtin_group, &[]);
            if let Some(bind_group) = &self.bind_group {
                pass.set_bind_group(1, bind_group, &[]);
            }
            pass.dispatch_workgroups(count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&self.counter, 0, &self.counter_readback, 0, 4);
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let slice = self.counter_readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            drop(sender.send(res));
        });
        loop {
            drop(ctx.device.poll(wgpu::PollType::wait_indefinitely()));
            if let Ok(res) = receiver.try_recv() {
                res.map_err(|e| GfxError::Readback(e.to_string()))?;
                break;
            }
        }

        let kept = {
            let view = slice.get_mapped_range();
            u32::from_le_bytes([view[0], view[1], view[2], view[3]])
        };
        self.counter_readback.unmap();

        log::trace!("compute '{}': {count} in, {kept} kept", self.name);
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroup_count_covers_every_instance() {
        for count in [1u32, 63, 64, 65, 1000, 10_000] {
            let groups = count.div_ceil(WORKGROUP_SIZE);
            assert!(groups * WORKGROUP_SIZE >= count);
            assert!((groups - 1) * WORKGROUP_SIZE < count);
        }
    }
}
