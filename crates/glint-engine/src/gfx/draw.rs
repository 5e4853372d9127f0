//! Instanced draw dispatch and instance-base accounting.
//!
//! Every draw of a frame reads its per-instance data from shared instance
//! buffers, offset by a running *instance base*: draw N instances, the base
//! advances by N, and the next draw picks up where the previous one left off.
//! Shaders receive the base through a small uniform at group 0.
//!
//! wgpu has no per-draw uniform update inside a pass, so the dispatcher
//! pre-writes one 256-byte-aligned slot per draw call into a single uniform
//! buffer and rebinds group 0 with a dynamic offset. Slots are recycled every
//! frame; when a frame records more draws than there are slots, the overflow
//! draws are skipped with an error and the capacity is raised for the next
//! frame (the buffer cannot be reallocated while a pass holds it).

use bytemuck::{Pod, Zeroable};

use super::context::GfxCtx;
use super::geometry::MeshStore;

/// Dynamic-offset alignment required for uniform buffers.
const SLOT_STRIDE: u64 = 256;
const DEFAULT_SLOTS: u32 = 1024;

/// Group-0 uniform visible to every draw.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DrawUniform {
    instance_base: u32,
    _pad: [u32; 3],
}

/// Running instance-base counter.
///
/// `take(n)` returns the base the draw observes and advances past it, so
/// consecutive draws of 5 and 3 instances observe 0 and 5 and leave the
/// counter at 8.
#[derive(Debug, Default, Copy, Clone)]
pub struct InstanceBase {
    value: u32,
}

impl InstanceBase {
    pub fn get(&self) -> u32 {
        self.value
    }

    pub fn set(&mut self, value: u32) {
        self.value = value;
    }

    pub fn take(&mut self, instances: u32) -> u32 {
        let base = self.value;
        self.value += instances;
        base
    }
}

/// Per-frame draw statistics.
#[derive(Debug, Default, Copy, Clone)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub instances: u32,
}

/// Records instanced draws into render passes.
pub struct Dispatcher {
    slots: wgpu::Buffer,
    capacity: u32,
    wanted_capacity: u32,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,

    base: InstanceBase,
    next_slot: u32,
    stats: FrameStats,

    /// When false, an N-instance draw is issued as N single-instance draws
    /// with the base advancing one at a time. Debug aid for drivers with
    /// broken instancing; massively slower.
    instancing: bool,
}

impl Dispatcher {
    pub fn new(ctx: &GfxCtx<'_>) -> Self {
        let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw dispatch"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let (slots, bind_group) = Self::create_slots(ctx, &layout, DEFAULT_SLOTS);
        Self {
            slots,
            capacity: DEFAULT_SLOTS,
            wanted_capacity: DEFAULT_SLOTS,
            layout,
            bind_group,
            base: InstanceBase::default(),
            next_slot: 0,
            stats: FrameStats::default(),
            instancing: true,
        }
    }

    fn create_slots(
        ctx: &GfxCtx<'_>,
        layout: &wgpu::BindGroupLayout,
        capacity: u32,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let slots = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw dispatch slots"),
            size: u64::from(capacity) * SLOT_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw dispatch"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &slots,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniform>() as u64),
                }),
            }],
        });
        (slots, bind_group)
    }

    /// Group-0 layout every render pipeline is created against.
    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    /// Resets the instance base, slot cursor and stats. Applies any capacity
    /// raise requested by an overflowing previous frame.
    pub fn begin_frame(&mut self, ctx: &GfxCtx<'_>) {
        if self.wanted_capacity > self.capacity {
            log::info!(
                "draw dispatch: raising slot capacity {} -> {}",
                self.capacity,
                self.wanted_capacity
            );
            let (slots, bind_group) = Self::create_slots(ctx, &self.layout, self.wanted_capacity);
            self.slots = slots;
            self.bind_group = bind_group;
            self.capacity = self.wanted_capacity;
        }

        self.base = InstanceBase::default();
        self.next_slot = 0;
        self.stats = FrameStats::default();
    }

    pub fn instance_base(&self) -> u32 {
        self.base.get()
    }

    /// Repositions the instance base, for callers that lay out instance
    /// buffers in fixed regions rather than strictly sequentially.
    pub fn set_instance_base(&mut self, base: u32) {
        self.base.set(base);
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn set_instancing(&mut self, enabled: bool) {
        self.instancing = enabled;
    }

    /// Records one instanced draw of a named geometry.
    ///
    /// The pipeline and group-1 bindings must already be set on the pass.
    /// A missing geometry logs an error and records nothing; the instance
    /// base does not advance.
    pub fn draw(
        &mut self,
        ctx: &GfxCtx<'_>,
        pass: &mut wgpu::RenderPass<'_>,
        store: &MeshStore,
        geometry: &str,
        instances: u32,
    ) {
        let Some(geo) = store.geometry(geometry).copied() else {
            log::error!("draw: unknown geometry '{geometry}', skipping");
            return;
        };
        if instances == 0 {
            return;
        }

        if store.stride() > 0 {
            pass.set_vertex_buffer(0, store.vertices().raw().slice(..));
        }
        if geo.is_indexed() {
            pass.set_index_buffer(store.indices().raw().slice(..), wgpu::IndexFormat::Uint32);
        }

        if self.instancing {
            let base = self.base.take(instances);
            if !self.emit(ctx, pass, &geo, base, instances) {
                return;
            }
        } else {
            for _ in 0..instances {
                let base = self.base.take(1);
                if !self.emit(ctx, pass, &geo, base, 1) {
                    return;
                }
            }
        }

        self.stats.draw_calls += 1;
        self.stats.instances += instances;
    }

    /// Writes one slot and issues the draw. False means the slot table is
    /// full for this frame.
    fn emit(
        &mut self,
        ctx: &GfxCtx<'_>,
        pass: &mut wgpu::RenderPass<'_>,
        geo: &super::geometry::Geometry,
        instance_base: u32,
        instances: u32,
    ) -> bool {
        if self.next_slot >= self.capacity {
            self.wanted_capacity = (self.capacity * 2).max(self.next_slot + 1);
            log::error!(
                "draw dispatch: out of slots ({} used), draw skipped; \
                 capacity grows next frame",
                self.capacity
            );
            return false;
        }

        let offset = u64::from(self.next_slot) * SLOT_STRIDE;
        self.next_slot += 1;

        let uniform = DrawUniform { instance_base, _pad: [0; 3] };
        ctx.queue.write_buffer(&self.slots, offset, bytemuck::bytes_of(&uniform));
        pass.set_bind_group(0, &self.bind_group, &[offset as u32]);

        if geo.is_indexed() {
            pass.draw_indexed(
                geo.index_offset..geo.index_offset + geo.index_count,
                geo.vertex_offset as i32,
                0..instances,
            );
        } else {
            pass.draw(
                geo.vertex_offset..geo.vertex_offset + geo.vertex_count,
                0..instances,
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── instance-base accounting (pure) ───────────────────────────────────

    #[test]
    fn bases_accumulate_across_draws() {
        let mut base = InstanceBase::default();
        assert_eq!(base.take(5), 0);
        assert_eq!(base.take(3), 5);
        assert_eq!(base.take(2), 8);
        assert_eq!(base.get(), 10);
    }

    #[test]
    fn zero_instance_draw_does_not_advance() {
        let mut base = InstanceBase::default();
        base.take(7);
        assert_eq!(base.take(0), 7);
        assert_eq!(base.get(), 7);
    }

    #[test]
    fn manual_repositioning_overrides_the_running_count() {
        let mut base = InstanceBase::default();
        base.take(100);
        base.set(16);
        assert_eq!(base.take(4), 16);
        assert_eq!(base.get(), 20);
    }

    #[test]
    fn single_instance_fallback_matches_instanced_totals() {
        // One draw of N must cover the same base range as N draws of 1.
        let mut instanced = InstanceBase::default();
        let first = instanced.take(6);

        let mut fallback = InstanceBase::default();
        let bases: Vec<u32> = (0..6).map(|_| fallback.take(1)).collect();

        assert_eq!(bases.first().copied(), Some(first));
        assert_eq!(instanced.get(), fallback.get());
        assert_eq!(bases, vec![0, 1, 2, 3, 4, 5]);
    }
}
