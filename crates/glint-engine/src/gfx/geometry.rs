//! Mesh stores: vertex layouts + packed geometry.
//!
//! A [`MeshStore`] owns one shared vertex buffer and one shared index buffer
//! and packs many named geometries into them, recording where each one lives.
//! Keeping every mesh in one pair of buffers means a frame never rebinds
//! vertex state between draw calls, which is the whole point of the
//! instanced-draw design.

use std::collections::HashMap;

use super::buffer::{BufferKind, GrowableBuffer};
use super::context::GfxCtx;
use super::error::GfxError;

/// Where one named mesh lives inside a store's shared buffers.
///
/// Offsets and counts are in vertices / indices, not bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Geometry {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub index_offset: u32,
    pub index_count: u32,
    pub topology: wgpu::PrimitiveTopology,
}

impl Geometry {
    /// A geometry with zero indices draws non-indexed.
    pub fn is_indexed(&self) -> bool {
        self.index_count > 0
    }
}

/// First free vertex/index offsets given the geometries already packed.
///
/// Bump allocation: the next geometry starts after the highest occupied
/// offset. Freed ranges are never reused (nothing is ever freed; replaced
/// entries leak their range, see [`MeshStore::append`]).
pub fn next_offsets<'a>(geometries: impl Iterator<Item = &'a Geometry>) -> (u32, u32) {
    let mut vertex = 0;
    let mut index = 0;
    for g in geometries {
        vertex = vertex.max(g.vertex_offset + g.vertex_count);
        index = index.max(g.index_offset + g.index_count);
    }
    (vertex, index)
}

fn attribute_format(components: u32) -> Result<wgpu::VertexFormat, GfxError> {
    match components {
        1 => Ok(wgpu::VertexFormat::Float32),
        2 => Ok(wgpu::VertexFormat::Float32x2),
        3 => Ok(wgpu::VertexFormat::Float32x3),
        4 => Ok(wgpu::VertexFormat::Float32x4),
        other => Err(GfxError::UnsupportedAttribute(other)),
    }
}

/// Named vertex layout + shared vertex/index buffers + geometry registry.
///
/// The layout is an ordered list of per-vertex float component counts
/// (e.g. `[3]` position-only, `[3, 2]` position + uv), interleaved with
/// stride = sum. An empty list is a valid "no vertex input" layout for
/// passes that synthesize positions in the shader.
pub struct MeshStore {
    label: String,
    attributes: Vec<u32>,
    attrs: Vec<wgpu::VertexAttribute>,
    stride: u32,
    vertices: GrowableBuffer,
    indices: GrowableBuffer,
    geometries: HashMap<String, Geometry>,
}

impl MeshStore {
    /// Creates a store. Capacity hints are in vertices / indices; 0 means
    /// start empty and grow on demand.
    pub fn new(
        ctx: &GfxCtx<'_>,
        label: &str,
        attributes: &[u32],
        vertex_capacity: u64,
        index_capacity: u64,
    ) -> Result<Self, GfxError> {
        let stride: u32 = attributes.iter().sum();

        let mut attrs = Vec::with_capacity(attributes.len());
        let mut offset = 0u64;
        for (i, &components) in attributes.iter().enumerate() {
            attrs.push(wgpu::VertexAttribute {
                format: attribute_format(components)?,
                offset,
                shader_location: i as u32,
            });
            offset += u64::from(components) * 4;
        }

        // Empty layouts still get (empty) buffers so the struct stays uniform;
        // element size falls back to one float.
        let vertex_element = u64::from(stride.max(1)) * 4;
        let vertices = GrowableBuffer::new(
            ctx,
            &format!("{label} vertices"),
            BufferKind::Vertex,
            vertex_element,
            vertex_capacity,
        )?;
        let indices = GrowableBuffer::new(
            ctx,
            &format!("{label} indices"),
            BufferKind::Index,
            4,
            index_capacity,
        )?;

        Ok(Self {
            label: label.to_string(),
            attributes: attributes.to_vec(),
            attrs,
            stride,
            vertices,
            indices,
            geometries: HashMap::new(),
        })
    }

    /// Floats per vertex.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn attributes(&self) -> &[u32] {
        &self.attributes
    }

    /// Vertex buffer layout for pipeline creation. Empty when the store has
    /// no vertex input.
    pub fn vertex_layouts(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        if self.stride == 0 {
            return Vec::new();
        }
        vec![wgpu::VertexBufferLayout {
            array_stride: u64::from(self.stride) * 4,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attrs,
        }]
    }

    pub(crate) fn vertex_attributes(&self) -> &[wgpu::VertexAttribute] {
        &self.attrs
    }

    pub fn vertices(&self) -> &GrowableBuffer {
        &self.vertices
    }

    pub fn indices(&self) -> &GrowableBuffer {
        &self.indices
    }

    pub fn geometry(&self, name: &str) -> Option<&Geometry> {
        self.geometries.get(name)
    }

    pub fn geometries(&self) -> impl Iterator<Item = (&str, &Geometry)> {
        self.geometries.iter().map(|(n, g)| (n.as_str(), g))
    }

    /// Packs a named geometry after the highest occupied offset and records
    /// where it landed. Buffers grow transparently.
    ///
    /// Re-appending under an existing name replaces the registry entry but
    /// appends the data at the end regardless; the old range is leaked, not
    /// compacted (callers may hold offsets into it).
    pub fn append(
        &mut self,
        ctx: &GfxCtx<'_>,
        name: &str,
        vertex_data: &[f32],
        index_data: &[u32],
        topology: wgpu::PrimitiveTopology,
    ) -> Result<Geometry, GfxError> {
        if self.stride == 0 || vertex_data.len() % self.stride as usize != 0 {
            return Err(GfxError::RaggedVertexData {
                len: vertex_data.len(),
                stride: self.stride,
            });
        }

        let (vertex_offset, index_offset) = next_offsets(self.geometries.values());
        let geometry = Geometry {
            vertex_offset,
            vertex_count: (vertex_data.len() / self.stride as usize) as u32,
            index_offset,
            index_count: index_data.len() as u32,
            topology,
        };

        self.vertices
            .write(ctx, u64::from(vertex_offset), vertex_data)?;
        if !index_data.is_empty() {
            self.indices
                .write(ctx, u64::from(index_offset), index_data)?;
        }

        if let Some(old) = self.geometries.insert(name.to_string(), geometry) {
            log::warn!(
                "mesh store '{}': geometry '{}' replaced ({} -> {} vertices); \
                 the old range stays allocated",
                self.label,
                name,
                old.vertex_count,
                geometry.vertex_count
            );
        } else {
            log::debug!(
                "mesh store '{}': geometry '{}' at v[{}..{}] i[{}..{}]",
                self.label,
                name,
                geometry.vertex_offset,
                geometry.vertex_offset + geometry.vertex_count,
                geometry.index_offset,
                geometry.index_offset + geometry.index_count,
            );
        }

        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::testutil;

    fn geo(vo: u32, vc: u32, io: u32, ic: u32) -> Geometry {
        Geometry {
            vertex_offset: vo,
            vertex_count: vc,
            index_offset: io,
            index_count: ic,
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }

    // ── bump allocation (pure) ────────────────────────────────────────────

    #[test]
    fn next_offsets_empty_store_starts_at_zero() {
        assert_eq!(next_offsets(std::iter::empty()), (0, 0));
    }

    #[test]
    fn next_offsets_is_max_end_not_sum() {
        let geoms = [geo(0, 3, 0, 6), geo(3, 4, 6, 9), geo(1, 1, 0, 0)];
        assert_eq!(next_offsets(geoms.iter()), (7, 15));
    }

    #[test]
    fn packed_ranges_never_overlap() {
        // Simulate a sequence of appends over the pure allocator.
        let mut geoms: Vec<Geometry> = Vec::new();
        for &(vc, ic) in &[(3u32, 3u32), (4, 6), (10, 0), (2, 3)] {
            let (vo, io) = next_offsets(geoms.iter());
            geoms.push(geo(vo, vc, io, ic));
        }
        for (i, a) in geoms.iter().enumerate() {
            for b in geoms.iter().skip(i + 1) {
                let a_end = a.vertex_offset + a.vertex_count;
                let b_end = b.vertex_offset + b.vertex_count;
                assert!(a_end <= b.vertex_offset || b_end <= a.vertex_offset);
            }
        }
    }

    // ── store behavior (needs a device) ───────────────────────────────────

    #[test]
    fn append_packs_sequentially() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();
        let mut store = MeshStore::new(&ctx, "main", &[3], 0, 0).unwrap();

        let tri1 = store
            .append(&ctx, "tri1", &[0.0; 9], &[], wgpu::PrimitiveTopology::TriangleList)
            .unwrap();
        let tri2 = store
            .append(&ctx, "tri2", &[0.0; 12], &[], wgpu::PrimitiveTopology::TriangleList)
            .unwrap();

        assert_eq!((tri1.vertex_offset, tri1.vertex_count), (0, 3));
        assert_eq!((tri2.vertex_offset, tri2.vertex_count), (3, 4));
        assert!(!tri1.is_indexed());
    }

    #[test]
    fn reappend_replaces_entry_without_compacting() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();
        let mut store = MeshStore::new(&ctx, "main", &[3], 0, 0).unwrap();

        store
            .append(&ctx, "a", &[0.0; 9], &[0, 1, 2], wgpu::PrimitiveTopology::TriangleList)
            .unwrap();
        let replaced = store
            .append(&ctx, "a", &[0.0; 18], &[0, 1, 2, 3, 4, 5], wgpu::PrimitiveTopology::TriangleList)
            .unwrap();

        // New data lands after the old range; the registry holds one entry.
        assert_eq!(replaced.vertex_offset, 3);
        assert_eq!(replaced.vertex_count, 6);
        assert_eq!(store.geometries().count(), 1);
        assert_eq!(store.geometry("a"), Some(&replaced).copied().as_ref());
    }

    #[test]
    fn ragged_vertex_data_is_rejected() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();
        let mut store = MeshStore::new(&ctx, "main", &[3, 2], 0, 0).unwrap();

        // stride 5, 7 floats is not a whole vertex.
        let err = store.append(&ctx, "bad", &[0.0; 7], &[], wgpu::PrimitiveTopology::TriangleList);
        assert!(matches!(err, Err(GfxError::RaggedVertexData { len: 7, stride: 5 })));
    }

    #[test]
    fn empty_layout_rejects_appends() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();
        let mut store = MeshStore::new(&ctx, "empty", &[], 0, 0).unwrap();
        assert!(store.vertex_layouts().is_empty());

        let err = store.append(&ctx, "x", &[1.0], &[], wgpu::PrimitiveTopology::TriangleList);
        assert!(matches!(err, Err(GfxError::RaggedVertexData { .. })));
    }

    #[test]
    fn unsupported_attribute_width_fails_closed() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();
        let err = MeshStore::new(&ctx, "bad", &[5], 0, 0);
        assert!(matches!(err, Err(GfxError::UnsupportedAttribute(5))));
    }
}
