//! Growable GPU data buffers.
//!
//! A [`GrowableBuffer`] tracks a logical element count separately from its
//! backing allocation and lets callers treat it as an unbounded array
//! addressed by element index: writes past the end grow the allocation and
//! preserve prior content through a GPU-side copy (old bytes never round-trip
//! through host memory).

use bytemuck::Pod;

use super::context::GfxCtx;
use super::error::GfxError;

/// What a buffer feeds. Determines the wgpu usage flags; every kind also
/// carries COPY_SRC/COPY_DST so growth copies and readback always work.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    /// Per-vertex attribute data.
    Vertex,
    /// Index data (u32).
    Index,
    /// Per-instance array read by shaders as storage, writable by compute
    /// passes that place/cull instances.
    Instance,
}

impl BufferKind {
    fn usages(self) -> wgpu::BufferUsages {
        let base = wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;
        match self {
            BufferKind::Vertex => base | wgpu::BufferUsages::VERTEX,
            BufferKind::Index => base | wgpu::BufferUsages::INDEX,
            BufferKind::Instance => base | wgpu::BufferUsages::STORAGE,
        }
    }
}

/// GPU buffer with logical length, byte capacity and exact-fit growth.
///
/// Invariant: `len * element_size <= capacity_bytes` at all times.
///
/// Growth is exact-fit rather than geometric: a caller that overshoots the
/// capacity repeatedly pays one reallocation per overshoot. Load-time
/// append patterns make this a non-issue and it keeps logical sizes exact.
pub struct GrowableBuffer {
    raw: wgpu::Buffer,
    label: String,
    kind: BufferKind,
    element_size: u64,
    len: u64,
    capacity_bytes: u64,
    revision: u64,
}

impl GrowableBuffer {
    /// Creates a buffer sized for `len` elements. `len = 0` is a valid empty
    /// allocation.
    ///
    /// `element_size` must be a multiple of 4 (wgpu copy alignment).
    pub fn new(
        ctx: &GfxCtx<'_>,
        label: &str,
        kind: BufferKind,
        element_size: u64,
        len: u64,
    ) -> Result<Self, GfxError> {
        if element_size == 0 || element_size % 4 != 0 {
            return Err(GfxError::UnalignedElement(element_size));
        }

        let capacity_bytes = len * element_size;
        let raw = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity_bytes,
            usage: kind.usages(),
            mapped_at_creation: false,
        });

        Ok(Self {
            raw,
            label: label.to_string(),
            kind,
            element_size,
            len,
            capacity_bytes,
            revision: 0,
        })
    }

    /// Creates a buffer from an initial element slice and uploads it.
    pub fn with_data<T: Pod>(
        ctx: &GfxCtx<'_>,
        label: &str,
        kind: BufferKind,
        data: &[T],
    ) -> Result<Self, GfxError> {
        let element_size = std::mem::size_of::<T>() as u64;
        let mut buffer = Self::new(ctx, label, kind, element_size, data.len() as u64)?;
        if !data.is_empty() {
            ctx.queue.write_buffer(&buffer.raw, 0, bytemuck::cast_slice(data));
        }
        buffer.len = data.len() as u64;
        Ok(buffer)
    }

    /// Logical element count.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes currently allocated on the GPU.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// Logical size in bytes (`len * element_size`).
    pub fn size_bytes(&self) -> u64 {
        self.len * self.element_size
    }

    /// Bumped every time the backing allocation is replaced. Bind groups and
    /// vertex bindings created against an older revision must be rebuilt.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    /// Ensures the buffer holds at least `new_len` logical elements.
    ///
    /// Within capacity this only moves the logical length forward. Beyond it,
    /// a new exact-fit allocation is created, existing bytes are copied
    /// GPU-side, and the old buffer is dropped. Content between the old and
    /// new length is unspecified (fresh allocations read back as zero).
    pub fn resize(&mut self, ctx: &GfxCtx<'_>, new_len: u64) {
        let needed = new_len * self.element_size;
        if needed <= self.capacity_bytes {
            self.len = self.len.max(new_len);
            return;
        }

        log::debug!(
            "buffer '{}': growing {} -> {} bytes",
            self.label,
            self.capacity_bytes,
            needed
        );

        let grown = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&self.label),
            size: needed,
            usage: self.kind.usages(),
            mapped_at_creation: false,
        });

        let live_bytes = self.len * self.element_size;
        if live_bytes > 0 {
            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("glint buffer grow"),
                });
            encoder.copy_buffer_to_buffer(&self.raw, 0, &grown, 0, live_bytes);
            ctx.queue.submit(std::iter::once(encoder.finish()));
        }

        self.raw = grown;
        self.capacity_bytes = needed;
        self.len = new_len;
        self.revision += 1;
    }

    /// Writes `data` at `element_offset`, growing the buffer first when the
    /// write would land past the current logical end.
    pub fn write<T: Pod>(
        &mut self,
        ctx: &GfxCtx<'_>,
        element_offset: u64,
        data: &[T],
    ) -> Result<(), GfxError> {
        self.write_bytes(ctx, element_offset, bytemuck::cast_slice(data))
    }

    /// Byte-slice variant of [`write`](Self::write). The slice length must be
    /// a whole number of elements.
    pub fn write_bytes(
        &mut self,
        ctx: &GfxCtx<'_>,
        element_offset: u64,
        bytes: &[u8],
    ) -> Result<(), GfxError> {
        if bytes.len() as u64 % self.element_size != 0 {
            return Err(GfxError::UnalignedElement(bytes.len() as u64));
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let count = bytes.len() as u64 / self.element_size;
        if element_offset + count > self.len {
            self.resize(ctx, element_offset + count);
        }

        ctx.queue
            .write_buffer(&self.raw, element_offset * self.element_size, bytes);
        Ok(())
    }

    /// Reads the full logical range back to the host.
    ///
    /// Debug/test aid: stalls until the GPU finishes. Never call this on a
    /// frame path.
    pub fn read_back(&self, ctx: &GfxCtx<'_>) -> Result<Vec<u8>, GfxError> {
        let size = self.size_bytes();
        if size == 0 {
            return Ok(Vec::new());
        }

        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glint buffer readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glint buffer readback"),
            });
        encoder.copy_buffer_to_buffer(&self.raw, 0, &staging, 0, size);
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
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

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::testutil;

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn rejects_unaligned_element_size() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();
        let err = GrowableBuffer::new(&ctx, "t", BufferKind::Vertex, 3, 0);
        assert!(matches!(err, Err(GfxError::UnalignedElement(3))));
    }

    #[test]
    fn zero_length_is_a_valid_allocation() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();
        let buf = GrowableBuffer::new(&ctx, "t", BufferKind::Vertex, 4, 0).unwrap();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity_bytes(), 0);
        assert!(buf.read_back(&ctx).unwrap().is_empty());
    }

    // ── growth ────────────────────────────────────────────────────────────

    #[test]
    fn resize_within_capacity_keeps_allocation() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();
        let mut buf = GrowableBuffer::new(&ctx, "t", BufferKind::Instance, 4, 8).unwrap();
        let rev = buf.revision();
        buf.resize(&ctx, 5);
        assert_eq!(buf.len(), 8, "logical length never shrinks");
        assert_eq!(buf.revision(), rev, "no reallocation inside capacity");
    }

    #[test]
    fn growth_is_exact_fit() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();
        let mut buf = GrowableBuffer::new(&ctx, "t", BufferKind::Instance, 4, 0).unwrap();
        buf.resize(&ctx, 7);
        assert_eq!(buf.capacity_bytes(), 28);
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn growth_preserves_content() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();

        let mut buf = GrowableBuffer::new(&ctx, "t", BufferKind::Instance, 4, 0).unwrap();
        buf.write(&ctx, 0, &[1.0f32, 2.0, 3.0]).unwrap();
        assert_eq!(buf.len(), 3);

        // Write at element 5: grows to 6 elements, 0..3 must survive the copy.
        buf.write(&ctx, 5, &[4.0f32]).unwrap();
        assert_eq!(buf.len(), 6);

        let bytes = buf.read_back(&ctx).unwrap();
        let floats: &[f32] = bytemuck::cast_slice(&bytes);
        assert_eq!(&floats[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(floats[5], 4.0);
    }

    #[test]
    fn sequential_writes_behave_like_an_unbounded_array() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();

        let mut buf = GrowableBuffer::new(&ctx, "t", BufferKind::Instance, 4, 0).unwrap();
        buf.write(&ctx, 0, &[10u32, 11, 12, 13]).unwrap();
        buf.write(&ctx, 2, &[99u32]).unwrap();
        buf.write(&ctx, 4, &[14u32, 15]).unwrap();

        let bytes = buf.read_back(&ctx).unwrap();
        let words: &[u32] = bytemuck::cast_slice(&bytes);
        assert_eq!(words, &[10, 11, 99, 13, 14, 15]);
    }
}
