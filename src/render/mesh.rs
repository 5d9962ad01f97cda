use crate::scene::MeshKind;

/// Position, colour and texture coordinate, interleaved.
pub const FLOATS_PER_VERTEX: usize = 8;
pub const VERTEX_STRIDE: u64 = (FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as u64;

/// Interleaved vertex data ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn for_kind(kind: MeshKind, texture_scale: f32) -> Self {
        match kind {
            MeshKind::Triangle => Self::triangle(texture_scale),
            MeshKind::Cube => Self::cube(texture_scale),
        }
    }

    pub fn triangle(texture_scale: f32) -> Self {
        let mut vertices = Vec::with_capacity(TRIANGLE_VERTICES.len());
        for vertex in TRIANGLE_VERTICES.chunks_exact(FLOATS_PER_VERTEX) {
            vertices.extend_from_slice(&vertex[..6]);
            vertices.push(vertex[6] * texture_scale);
            vertices.push(vertex[7] * texture_scale);
        }
        Self {
            vertices,
            indices: vec![0, 1, 2],
        }
    }

    /// Unit cube centred on the origin, one quad per face so every face maps
    /// the full texture.
    pub fn cube(texture_scale: f32) -> Self {
        let mut vertices = Vec::with_capacity(CUBE_FACES.len() / 5 * FLOATS_PER_VERTEX);
        for vertex in CUBE_FACES.chunks_exact(5) {
            vertices.extend_from_slice(&vertex[..3]);
            vertices.extend_from_slice(&[1.0, 1.0, 1.0]);
            vertices.push(vertex[3] * texture_scale);
            vertices.push(vertex[4] * texture_scale);
        }
        let indices = (0..6u32)
            .flat_map(|face| {
                let base = face * 4;
                [base, base + 1, base + 2, base, base + 2, base + 3]
            })
            .collect();
        Self { vertices, indices }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }
}

const TRIANGLE_VERTICES: &[f32] = &[
    // positions      // colors       // tex coords
    0.5, -0.5, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, //
    -0.5, -0.5, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, //
    0.0, 0.5, 0.0, 1.0, 0.0, 1.0, 0.5, 1.0, //
];

const CUBE_FACES: &[f32] = &[
    // positions        // tex coords
    -0.5, -0.5, 0.5, 0.0, 0.0, 0.5, -0.5, 0.5, 1.0, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0, -0.5, 0.5,
    0.5, 0.0, 1.0, // front
    0.5, -0.5, -0.5, 0.0, 0.0, -0.5, -0.5, -0.5, 1.0, 0.0, -0.5, 0.5, -0.5, 1.0, 1.0, 0.5, 0.5,
    -0.5, 0.0, 1.0, // back
    -0.5, -0.5, -0.5, 0.0, 0.0, -0.5, -0.5, 0.5, 1.0, 0.0, -0.5, 0.5, 0.5, 1.0, 1.0, -0.5, 0.5,
    -0.5, 0.0, 1.0, // left
    0.5, -0.5, 0.5, 0.0, 0.0, 0.5, -0.5, -0.5, 1.0, 0.0, 0.5, 0.5, -0.5, 1.0, 1.0, 0.5, 0.5, 0.5,
    0.0, 1.0, // right
    -0.5, -0.5, -0.5, 0.0, 0.0, 0.5, -0.5, -0.5, 1.0, 0.0, 0.5, -0.5, 0.5, 1.0, 1.0, -0.5, -0.5,
    0.5, 0.0, 1.0, // bottom
    -0.5, 0.5, 0.5, 0.0, 0.0, 0.5, 0.5, 0.5, 1.0, 0.0, 0.5, 0.5, -0.5, 1.0, 1.0, -0.5, 0.5, -0.5,
    0.0, 1.0, // top
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_four_vertices_per_face() {
        let cube = Mesh::cube(1.0);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&index| (index as usize) < 24));
        assert!(cube
            .vertices
            .chunks_exact(FLOATS_PER_VERTEX)
            .all(|v| v[..3].iter().all(|c| c.abs() == 0.5)));
    }

    #[test]
    fn texture_scale_multiplies_uvs_only() {
        let plain = Mesh::triangle(1.0);
        let scaled = Mesh::triangle(2.0);
        for (a, b) in plain
            .vertices
            .chunks_exact(FLOATS_PER_VERTEX)
            .zip(scaled.vertices.chunks_exact(FLOATS_PER_VERTEX))
        {
            assert_eq!(a[..6], b[..6]);
            assert_eq!(a[6] * 2.0, b[6]);
            assert_eq!(a[7] * 2.0, b[7]);
        }
        assert_eq!(scaled.vertices[22..24], [1.0, 2.0]);
    }

    #[test]
    fn stride_matches_layout() {
        assert_eq!(VERTEX_STRIDE, 32);
        assert_eq!(Mesh::for_kind(MeshKind::Triangle, 1.0).vertex_count(), 3);
    }
}
