//! Scene graph nodes and their local transforms.

use cgmath::{Euler, Matrix4, One, Quaternion, Rad, Vector3};

use super::graph::{GeometryId, MaterialId, NodeId};
use crate::gfx::lights::{Light, LightRole};

/// Local transform: translation, rotation, non-uniform scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Sets rotation from Euler angles in radians, applied in XYZ order
    pub fn set_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quaternion::from(Euler::new(Rad(x), Rad(y), Rad(z)));
    }

    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vector3::new(x, y, z);
        self
    }

    pub fn with_euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.set_euler(x, y, z);
        self
    }

    pub fn set_uniform_scale(&mut self, s: f32) {
        self.scale = Vector3::new(s, s, s);
    }

    /// T * R * S
    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

/// Geometry plus one or more material slots
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: GeometryId,
    /// Material slots; line helpers may have none and use vertex colors
    pub materials: Vec<MaterialId>,
}

impl Mesh {
    pub fn new(geometry: GeometryId, material: MaterialId) -> Self {
        Self {
            geometry,
            materials: vec![material],
        }
    }

    pub fn uses(&self, material: MaterialId) -> bool {
        self.materials.contains(&material)
    }
}

/// Non-asset decorations added for authoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelperKind {
    Grid,
    Axes,
    Floor,
    Light(LightRole),
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Light(Light),
    Helper { kind: HelperKind, mesh: Mesh },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub visible: bool,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub(super) parent: Option<NodeId>,
    pub(super) children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::default(),
            visible: true,
            cast_shadow: false,
            receive_shadow: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn helper_kind(&self) -> Option<HelperKind> {
        match &self.kind {
            NodeKind::Helper { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Geometry and material slots of meshes and helpers alike
    pub fn drawable(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) | NodeKind::Helper { mesh, .. } => Some(mesh),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector4};

    #[test]
    fn test_transform_matrix_order() {
        let mut t = Transform::default().with_position(10.0, 0.0, 0.0);
        t.set_uniform_scale(2.0);
        let p = t.matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p.x - 12.0).abs() < 1e-5);
    }

    #[test]
    fn test_floor_rotation_lays_plane_flat() {
        let t = Transform::default().with_euler(-std::f32::consts::FRAC_PI_2, 0.0, 0.0);
        let n = t.matrix() * Vector4::new(0.0, 0.0, 1.0, 0.0);
        let n = Vector3::new(n.x, n.y, n.z).normalize();
        assert!((n.y - 1.0).abs() < 1e-5);
    }
}
