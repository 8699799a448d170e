//! # Geometry Buffers
//!
//! CPU-side vertex data for meshes, helpers and loaded models. Loaders hand
//! back `Geometry` values; the scene graph stores them in an arena and
//! renderers upload them on demand.
//!
//! ## Usage
//!
//! ```rust
//! use model_viewer::gfx::geometry::{generate_plane, Geometry};
//!
//! let mut floor = generate_plane(100.0, 100.0, 1, 1);
//! floor.compute_bounds();
//! assert_eq!(floor.triangle_count(), 2);
//! ```

pub mod primitives;

pub use primitives::*;

use crate::gfx::bounds::Aabb;

/// How index data is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    #[default]
    Triangles,
    Lines,
}

/// Vertex data ready for upload
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    /// Vertex positions (x, y, z)
    pub positions: Vec<[f32; 3]>,
    /// Normal vectors; empty until computed or supplied by a loader
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates (u, v)
    pub uvs: Vec<[f32; 2]>,
    /// Optional per-vertex colors, used by line helpers
    pub colors: Vec<[f32; 3]>,
    /// Indices; empty means non-indexed
    pub indices: Vec<u32>,
    pub topology: Topology,
    /// Cached bounds, filled by `compute_bounds`
    pub bounds: Option<Aabb>,
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        match self.topology {
            Topology::Triangles if self.indices.is_empty() => self.positions.len() / 3,
            Topology::Triangles => self.indices.len() / 3,
            Topology::Lines => 0,
        }
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.positions.len()
    }

    /// Triangle vertex indices, synthesizing them for non-indexed data
    fn triangle_indices(&self) -> Vec<u32> {
        if self.indices.is_empty() {
            (0..self.positions.len() as u32).collect()
        } else {
            self.indices.clone()
        }
    }

    /// Computes smooth per-vertex normals by accumulating face normals
    ///
    /// Vertices not referenced by any triangle get an up-facing normal.
    pub fn compute_vertex_normals(&mut self) {
        if self.topology != Topology::Triangles {
            return;
        }

        let mut accum = vec![[0.0f32; 3]; self.positions.len()];
        let indices = self.triangle_indices();

        for triangle in indices.chunks_exact(3) {
            let (i0, i1, i2) = (
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            );
            let (Some(v0), Some(v1), Some(v2)) = (
                self.positions.get(i0),
                self.positions.get(i1),
                self.positions.get(i2),
            ) else {
                continue;
            };

            let edge1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
            let edge2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
            let face_normal = [
                edge1[1] * edge2[2] - edge1[2] * edge2[1],
                edge1[2] * edge2[0] - edge1[0] * edge2[2],
                edge1[0] * edge2[1] - edge1[1] * edge2[0],
            ];

            for &vertex_idx in &[i0, i1, i2] {
                for axis in 0..3 {
                    accum[vertex_idx][axis] += face_normal[axis];
                }
            }
        }

        self.normals = accum
            .into_iter()
            .map(|n| {
                let length = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
                if length > f32::EPSILON {
                    [n[0] / length, n[1] / length, n[2] / length]
                } else {
                    [0.0, 1.0, 0.0]
                }
            })
            .collect();
    }

    pub fn compute_bounds(&mut self) -> Aabb {
        let bounds = Aabb::from_vertices(&self.positions);
        self.bounds = Some(bounds);
        bounds
    }

    /// Cached bounds, or freshly computed ones without caching
    pub fn bounding_box(&self) -> Aabb {
        self.bounds
            .unwrap_or_else(|| Aabb::from_vertices(&self.positions))
    }

    /// Fills in whatever derived data a loader left out
    pub fn ensure_derived_data(&mut self) {
        if !self.has_normals() {
            self.compute_vertex_normals();
        }
        if self.bounds.is_none() {
            self.compute_bounds();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_normals_flat_triangle() {
        let mut geometry = Geometry::from_positions(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
        );
        geometry.compute_vertex_normals();
        assert_eq!(geometry.normals.len(), 3);
        for n in &geometry.normals {
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_non_indexed_normals() {
        let mut geometry = Geometry::from_positions(
            vec![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
            Vec::new(),
        );
        geometry.ensure_derived_data();
        assert!(geometry.has_normals());
        assert!((geometry.normals[0][1] - 1.0).abs() < 1e-6);
        assert!(geometry.bounds.is_some());
    }

    #[test]
    fn test_out_of_range_index_is_skipped() {
        let mut geometry = Geometry::from_positions(vec![[0.0, 0.0, 0.0]], vec![0, 5, 9]);
        geometry.compute_vertex_normals();
        assert_eq!(geometry.normals, vec![[0.0, 1.0, 0.0]]);
    }
}
