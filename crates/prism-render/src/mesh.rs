// SPDX-License-Identifier: CEPL-1.0
use std::collections::HashMap;

use crate::{RenderError, Vertex};

/// CPU-side indexed mesh, ready for staging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Builds an indexed mesh from a triangle soup.
    ///
    /// The first occurrence of a vertex takes the next free index; exact repeats
    /// reuse it. One index is emitted per input vertex, in input order.
    pub fn from_triangle_soup(soup: &[Vertex]) -> Self {
        let mut unique: HashMap<Vertex, u32> = HashMap::with_capacity(soup.len());
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(soup.len());

        for v in soup {
            let index = *unique.entry(*v).or_insert_with(|| {
                vertices.push(*v);
                (vertices.len() - 1) as u32
            });
            indices.push(index);
        }

        Self { vertices, indices }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(RenderError::EmptyMesh);
        }
        Ok(())
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, u: f32) -> Vertex {
        Vertex::new([x, 0.0, 0.0], Vertex::WHITE, [u, 0.0])
    }

    #[test]
    fn repeated_vertex_collapses_to_one_entry() {
        let mesh = MeshData::from_triangle_soup(&[v(1.0, 0.5), v(1.0, 0.5)]);
        assert_eq!(mesh.vertices.len(), 1);
        assert_eq!(mesh.indices, vec![0, 0]);
    }

    #[test]
    fn quad_from_two_triangles_shares_the_diagonal() {
        let (a, b, c, d) = (v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0));
        let mesh = MeshData::from_triangle_soup(&[a, b, c, c, d, a]);
        assert_eq!(mesh.vertices, vec![a, b, c, d]);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn negative_zero_position_merges() {
        let plus = Vertex::new([0.0, 0.0, 0.0], Vertex::WHITE, [0.0, 0.0]);
        let minus = Vertex::new([-0.0, 0.0, 0.0], Vertex::WHITE, [0.0, 0.0]);
        let mesh = MeshData::from_triangle_soup(&[plus, minus]);
        assert_eq!(mesh.vertices.len(), 1);
        assert_eq!(mesh.indices, vec![0, 0]);
    }

    #[test]
    fn differing_texcoord_keeps_vertices_apart() {
        let mesh = MeshData::from_triangle_soup(&[v(1.0, 0.0), v(1.0, 1.0)]);
        assert_eq!(mesh.vertices.len(), 2);
        assert_eq!(mesh.indices, vec![0, 1]);
    }

    #[test]
    fn dedup_is_idempotent() {
        let soup = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 0.0)];
        let once = MeshData::from_triangle_soup(&soup);
        let expanded: Vec<Vertex> = once
            .indices
            .iter()
            .map(|&i| once.vertices[i as usize])
            .collect();
        assert_eq!(MeshData::from_triangle_soup(&expanded), once);
    }

    #[test]
    fn empty_mesh_is_rejected() {
        assert_eq!(
            MeshData::from_triangle_soup(&[]).validate(),
            Err(RenderError::EmptyMesh)
        );
    }

    #[test]
    fn byte_views_cover_whole_arrays() {
        let mesh = MeshData::from_triangle_soup(&[v(0.0, 0.0), v(1.0, 0.0), v(2.0, 0.0)]);
        assert_eq!(mesh.vertex_bytes().len(), 3 * 32);
        assert_eq!(mesh.index_bytes().len(), 3 * 4);
    }
}
