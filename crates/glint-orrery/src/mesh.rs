//! Procedural meshes. All vertices are position-only (`[3]` layout).

use std::f32::consts::{PI, TAU};

/// Unit UV sphere. `segments` around the equator, `rings` from pole to pole.
pub fn uv_sphere(segments: u32, rings: u32) -> (Vec<f32>, Vec<u32>) {
    assert!(segments >= 3 && rings >= 2);

    let mut vertices = Vec::new();
    for ring in 0..=rings {
        let phi = PI * ring as f32 / rings as f32;
        let (sp, cp) = phi.sin_cos();
        for seg in 0..=segments {
            let theta = TAU * seg as f32 / segments as f32;
            let (st, ct) = theta.sin_cos();
            vertices.extend_from_slice(&[sp * ct, cp, sp * st]);
        }
    }

    let mut indices = Vec::new();
    let stride = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            // Counter-clockwise when seen from outside.
            indices.extend_from_slice(&[a, a + 1, b]);
            indices.extend_from_slice(&[a + 1, b + 1, b]);
        }
    }

    (vertices, indices)
}

/// Unit cube, 8 vertices, 12 triangles.
pub fn cube() -> (Vec<f32>, Vec<u32>) {
    let vertices = vec![
        1.0, 1.0, 1.0, //
        1.0, 1.0, -1.0, //
        -1.0, 1.0, -1.0, //
        -1.0, 1.0, 1.0, //
        1.0, -1.0, 1.0, //
        1.0, -1.0, -1.0, //
        -1.0, -1.0, -1.0, //
        -1.0, -1.0, 1.0,
    ];
    let indices = vec![
        0, 2, 1, 0, 3, 2, // top
        4, 5, 6, 4, 6, 7, // bottom
        0, 1, 5, 0, 5, 4, //
        3, 6, 2, 3, 7, 6, //
        0, 7, 3, 0, 4, 7, //
        1, 2, 6, 1, 6, 5,
    ];
    (vertices, indices)
}

/// Unit circle in the XZ plane as a closed line strip, non-indexed.
pub fn circle(points: u32) -> Vec<f32> {
    let mut vertices = Vec::with_capacity(((points + 1) * 3) as usize);
    for i in 0..=points {
        let t = TAU * i as f32 / points as f32;
        vertices.extend_from_slice(&[t.cos(), 0.0, t.sin()]);
    }
    vertices
}

/// One clip-space triangle covering the screen, for composite passes.
pub fn fullscreen_triangle() -> Vec<f32> {
    vec![
        -1.0, -1.0, 0.0, //
        3.0, -1.0, 0.0, //
        -1.0, 3.0, 0.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_vertex_and_index_counts() {
        let (vertices, indices) = uv_sphere(16, 8);
        assert_eq!(vertices.len() as u32, (16 + 1) * (8 + 1) * 3);
        assert_eq!(indices.len() as u32, 16 * 8 * 6);
    }

    #[test]
    fn sphere_vertices_lie_on_the_unit_sphere() {
        let (vertices, _) = uv_sphere(12, 6);
        for v in vertices.chunks_exact(3) {
            let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sphere_indices_stay_in_range() {
        let (vertices, indices) = uv_sphere(20, 10);
        let count = (vertices.len() / 3) as u32;
        assert!(indices.iter().all(|&i| i < count));
    }

    #[test]
    fn circle_is_closed() {
        let vertices = circle(64);
        let n = vertices.len();
        assert_eq!(n, 65 * 3);
        assert!((vertices[0] - vertices[n - 3]).abs() < 1e-5);
        assert!((vertices[2] - vertices[n - 1]).abs() < 1e-5);
    }
}
