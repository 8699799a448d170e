use cgmath::{Matrix4, SquareMatrix};
use log::debug;
use slotmap::{new_key_type, SlotMap};

use super::node::{HelperKind, Node, NodeKind};
use crate::gfx::bounds::Aabb;
use crate::gfx::color::Color;
use crate::gfx::geometry::Geometry;
use crate::gfx::resources::material::Material;
use crate::gfx::resources::texture::Texture;

new_key_type! {
    pub struct NodeId;
    pub struct GeometryId;
    pub struct MaterialId;
    pub struct TextureId;
}

/// Scene background, either a flat color or an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    Color { color: Color, opacity: f32 },
    Image { texture: TextureId, opacity: f32 },
}

impl Default for Background {
    fn default() -> Self {
        Background::Color {
            color: Color::from_hex(0xf0f2f5),
            opacity: 1.0,
        }
    }
}

/// Node tree plus the resources its meshes reference
///
/// Nodes, geometries, materials and textures live in separate arenas. A node
/// counts as part of the scene only while it is reachable from `root`; built
/// but unattached nodes stay in the arena until removed.
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
    geometries: SlotMap<GeometryId, Geometry>,
    materials: SlotMap<MaterialId, Material>,
    textures: SlotMap<TextureId, Texture>,
    root: NodeId,
    pub background: Background,
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::group("Scene"));
        Self {
            nodes,
            geometries: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            root,
            background: Background::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // ---- nodes ----

    /// Inserts a detached node
    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Makes `child` a child of `parent`, detaching it from any previous
    /// parent. Returns `false` when either id is stale or the edge would
    /// create a cycle. Attaching to the current parent is a no-op.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return false;
        }
        if self.is_ancestor(child, parent) {
            return false;
        }
        if self.nodes[child].parent == Some(parent) {
            return true;
        }

        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        true
    }

    /// Attaches `child` directly under the root
    pub fn add_to_root(&mut self, child: NodeId) -> bool {
        self.attach(self.root, child)
    }

    /// Unlinks a node from its parent; the subtree stays in the arena
    pub fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.nodes.get(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        self.nodes[child].parent = None;
    }

    /// Whether the node is reachable from the root
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id) && self.is_ancestor(self.root, id)
    }

    /// Pre-order traversal of `id` and its descendants
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Nodes reachable from the root that satisfy `pred`
    pub fn count_in_scene(&self, pred: impl Fn(&Node) -> bool) -> usize {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| pred(&self.nodes[*id]))
            .count()
    }

    pub fn helper_count(&self, kind: HelperKind) -> usize {
        self.count_in_scene(|n| n.helper_kind() == Some(kind))
    }

    pub fn find_by_name(&self, from: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(from)
            .into_iter()
            .find(|id| self.nodes[*id].name == name)
    }

    /// Removes a subtree from the arena and returns the removed nodes
    ///
    /// Geometry and material references are not disposed here; callers that
    /// own them release them separately.
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<Node> {
        if id == self.root {
            return Vec::new();
        }
        self.detach(id);
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.nodes.remove(n))
            .collect()
    }

    /// Accumulated transform from the root down to `id`
    pub fn world_matrix(&self, id: NodeId) -> Matrix4<f32> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            let Some(node) = self.nodes.get(c) else {
                break;
            };
            chain.push(node.transform.matrix());
            current = node.parent;
        }
        chain
            .into_iter()
            .rev()
            .fold(Matrix4::identity(), |acc, m| acc * m)
    }

    /// World-space bounds of all mesh geometry in a subtree
    pub fn subtree_bounds(&self, id: NodeId) -> Aabb {
        let mut bounds = Aabb::empty();
        for node_id in self.descendants(id) {
            let Some(mesh) = self.nodes[node_id].mesh() else {
                continue;
            };
            if let Some(geometry) = self.geometries.get(mesh.geometry) {
                bounds.union(&geometry.bounding_box().transform(&self.world_matrix(node_id)));
            }
        }
        bounds
    }

    // ---- geometry ----

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        self.geometries.insert(geometry)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id)
    }

    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        self.geometries.get_mut(id)
    }

    pub fn dispose_geometry(&mut self, id: GeometryId) -> Option<Geometry> {
        self.geometries.remove(id)
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    // ---- materials ----

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    pub fn dispose_material(&mut self, id: MaterialId) -> Option<Material> {
        self.materials.remove(id)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    // ---- textures ----

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.insert(texture)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.get_mut(id)
    }

    /// Whether any live material samples `id`
    pub fn texture_in_use(&self, id: TextureId) -> bool {
        self.materials.values().any(|m| m.map == Some(id))
    }

    pub fn dispose_texture(&mut self, id: TextureId) -> Option<Texture> {
        self.textures.remove(id)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Drops every node except the root and empties all resource arenas
    pub fn clear(&mut self) {
        let root = self.root;
        self.nodes.retain(|id, _| id == root);
        self.nodes[root].children.clear();
        self.geometries.clear();
        self.materials.clear();
        self.textures.clear();
        debug!("Scene graph cleared");
    }

    /// Mesh nodes under `from`, in traversal order
    pub fn meshes_under(&self, from: NodeId) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|id| matches!(self.nodes[*id].kind, NodeKind::Mesh(_)))
            .collect()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::generate_cube;
    use crate::gfx::resources::material::MaterialKind;
    use crate::gfx::scene::node::{Mesh, Transform};

    #[test]
    fn test_attach_detach_and_contains() {
        let mut graph = SceneGraph::new();
        let group = graph.add_node(Node::group("group"));
        assert!(!graph.contains(group));

        assert!(graph.add_to_root(group));
        assert!(graph.contains(group));
        // second attach is a no-op
        assert!(graph.add_to_root(group));
        assert_eq!(graph.node(graph.root()).unwrap().children().len(), 1);

        graph.detach(group);
        assert!(!graph.contains(group));
        assert!(graph.node(group).is_some());
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(Node::group("a"));
        let b = graph.add_node(Node::group("b"));
        assert!(graph.attach(a, b));
        assert!(!graph.attach(b, a));
    }

    #[test]
    fn test_remove_subtree() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(Node::group("a"));
        let b = graph.add_node(Node::group("b"));
        graph.attach(a, b);
        graph.add_to_root(a);

        let removed = graph.remove_subtree(a);
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.node_count(), 1);
        assert!(graph.remove_subtree(graph.root()).is_empty());
    }

    #[test]
    fn test_subtree_bounds_applies_transforms() {
        let mut graph = SceneGraph::new();
        let geometry = graph.add_geometry(generate_cube());
        let material = graph.add_material(Material::new("m", MaterialKind::Standard));
        let mut node = Node::new("cube", NodeKind::Mesh(Mesh::new(geometry, material)));
        node.transform = Transform::default().with_position(0.0, 10.0, 0.0);
        let id = graph.add_node(node);
        graph.add_to_root(id);

        let bounds = graph.subtree_bounds(graph.root());
        assert!((bounds.min.y - 9.5).abs() < 1e-5);
        assert!((bounds.max.y - 10.5).abs() < 1e-5);
    }
}
