//! # Axis-Aligned Bounds
//!
//! Bounding boxes for geometry and whole models. Model placement derives its
//! uniform scale and ground-resting translation from these.
//!
//! ## Usage
//!
//! ```rust
//! use model_viewer::gfx::bounds::Aabb;
//!
//! let bounds = Aabb::from_vertices(&[[-1.0, -50.0, 0.0], [1.0, 50.0, 2.0]]);
//! assert_eq!(bounds.size().y, 100.0);
//! ```

use cgmath::{Matrix4, Vector3, Vector4};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vector3<f32>,
    /// Maximum corner of the bounding box
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// An inverted box that any `extend` call will overwrite
    pub fn empty() -> Self {
        Self::new(
            Vector3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            Vector3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Create a box from a set of vertices; empty input yields an empty box
    pub fn from_vertices(vertices: &[[f32; 3]]) -> Self {
        let mut bounds = Self::empty();
        for vertex in vertices {
            bounds.extend_point(Vector3::new(vertex[0], vertex[1], vertex[2]));
        }
        bounds
    }

    pub fn extend_point(&mut self, p: Vector3<f32>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn union(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.extend_point(other.min);
        self.extend_point(other.max);
    }

    pub fn size(&self) -> Vector3<f32> {
        if self.is_empty() {
            return Vector3::new(0.0, 0.0, 0.0);
        }
        self.max - self.min
    }

    pub fn center(&self) -> Vector3<f32> {
        if self.is_empty() {
            return Vector3::new(0.0, 0.0, 0.0);
        }
        (self.min + self.max) * 0.5
    }

    /// Largest extent along any axis
    pub fn max_dimension(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }

    /// Apply a transformation matrix to the box
    pub fn transform(&self, matrix: &Matrix4<f32>) -> Self {
        if self.is_empty() {
            return *self;
        }

        let corners = [
            Vector3::new(self.min.x, self.min.y, self.min.z),
            Vector3::new(self.max.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.min.z),
            Vector3::new(self.min.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.min.z),
            Vector3::new(self.max.x, self.min.y, self.max.z),
            Vector3::new(self.min.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut out = Self::empty();
        for corner in &corners {
            let t = matrix * Vector4::new(corner.x, corner.y, corner.z, 1.0);
            out.extend_point(Vector3::new(t.x / t.w, t.y / t.w, t.z / t.w));
        }
        out
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vertices() {
        let aabb = Aabb::from_vertices(&[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-1.0, -1.0, -1.0]]);
        assert_eq!(aabb.min, Vector3::new(-1.0, -1.0, -1.0));
        assert_eq!(aabb.max, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.max_dimension(), 4.0);
    }

    #[test]
    fn test_empty_has_zero_size() {
        let aabb = Aabb::from_vertices(&[]);
        assert!(aabb.is_empty());
        assert_eq!(aabb.size(), Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_transform_translation() {
        let aabb = Aabb::new(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        let moved = aabb.transform(&Matrix4::from_translation(Vector3::new(0.0, 5.0, 0.0)));
        assert_eq!(moved.min.y, 4.0);
        assert_eq!(moved.max.y, 6.0);
    }
}
