//! Moves a finished [`LoadedModel`] into a scene graph.

use log::{debug, info};

use super::asset::{AssetNode, LoadedModel, Placement};
use super::ModelFileType;
use crate::animation::{ActionId, AnimationClip, AnimationMixer, LoopMode};
use crate::gfx::bounds::Aabb;
use crate::gfx::scene::{GeometryId, MaterialId, Mesh, Node, NodeId, NodeKind, SceneGraph, TextureId};

/// Seconds of fade-in for clips embedded in a group
pub const EMBEDDED_CLIP_FADE_IN: f32 = 0.5;

/// The model currently owned by a scene, with everything needed to dispose it
#[derive(Debug)]
pub struct ActiveModel {
    pub root: NodeId,
    pub url: String,
    pub file_type: ModelFileType,
    pub bounds: Aabb,
    pub placement: Placement,
    pub clips: Vec<AnimationClip>,
    geometries: Vec<GeometryId>,
    materials: Vec<MaterialId>,
    textures: Vec<TextureId>,
}

/// An installed model plus a mixer with one action per clip
#[derive(Debug)]
pub struct LoadResult {
    pub model: ActiveModel,
    pub mixer: AnimationMixer,
    pub actions: Vec<ActionId>,
}

/// Inserts the model's nodes and resources as a detached subtree
///
/// Every mesh casts and receives shadows. The caller attaches `model.root`
/// to the scene once any previous model is gone.
pub fn install(graph: &mut SceneGraph, loaded: LoadedModel) -> LoadResult {
    let LoadedModel {
        url,
        file_type,
        scene,
        bounds,
        placement,
        embedded_clips,
    } = loaded;

    let textures: Vec<TextureId> = scene
        .textures
        .into_iter()
        .map(|t| graph.add_texture(t))
        .collect();

    let materials: Vec<MaterialId> = scene
        .materials
        .into_iter()
        .map(|asset| {
            let mut material = asset.material;
            material.map = asset.map.and_then(|i| textures.get(i).copied());
            graph.add_material(material)
        })
        .collect();

    let mut geometries = Vec::new();
    let root = insert_node(graph, scene.root, &materials, &mut geometries);

    let mut mixer = AnimationMixer::new(root);
    let actions: Vec<ActionId> = scene
        .animations
        .iter()
        .map(|clip| mixer.clip_action(clip))
        .collect();
    if embedded_clips {
        for &id in &actions {
            if let Some(action) = mixer.action_mut(id) {
                action.set_loop(LoopMode::Repeat);
                action.fade_in(EMBEDDED_CLIP_FADE_IN);
            }
        }
    }

    info!(
        "Installed {} ({} geometries, {} materials, {} textures, {} clips)",
        url,
        geometries.len(),
        materials.len(),
        textures.len(),
        actions.len()
    );

    LoadResult {
        model: ActiveModel {
            root,
            url,
            file_type,
            bounds,
            placement,
            clips: scene.animations,
            geometries,
            materials,
            textures,
        },
        mixer,
        actions,
    }
}

fn insert_node(
    graph: &mut SceneGraph,
    asset: AssetNode,
    materials: &[MaterialId],
    geometries: &mut Vec<GeometryId>,
) -> NodeId {
    let kind = match asset.mesh {
        Some(mesh) => {
            let geometry = graph.add_geometry(mesh.geometry);
            geometries.push(geometry);
            let material_ids = mesh
                .material
                .and_then(|i| materials.get(i).copied())
                .into_iter()
                .collect();
            NodeKind::Mesh(Mesh {
                geometry,
                materials: material_ids,
            })
        }
        None => NodeKind::Group,
    };

    let mut node = Node::new(asset.name, kind).with_transform(asset.transform);
    if matches!(node.kind, NodeKind::Mesh(_)) {
        node.cast_shadow = true;
        node.receive_shadow = true;
    }
    let id = graph.add_node(node);

    for child in asset.children {
        let child_id = insert_node(graph, child, materials, geometries);
        graph.attach(id, child_id);
    }
    id
}

impl ActiveModel {
    /// Removes the model's nodes and releases every resource it references
    ///
    /// Materials swapped in after install (type conversion) are found through
    /// the meshes, so nothing leaks when the registry replaced originals.
    pub fn dispose(self, graph: &mut SceneGraph) {
        let mut materials = self.materials;
        let mut geometries = self.geometries;
        for id in graph.meshes_under(self.root) {
            if let Some(mesh) = graph.node(id).and_then(|n| n.mesh()) {
                geometries.push(mesh.geometry);
                materials.extend(mesh.materials.iter().copied());
            }
        }
        graph.remove_subtree(self.root);

        let mut textures = self.textures;
        for id in materials {
            if let Some(material) = graph.dispose_material(id) {
                textures.extend(material.map);
            }
        }
        for id in geometries {
            graph.dispose_geometry(id);
        }
        for id in textures {
            graph.dispose_texture(id);
        }
        debug!("Disposed model {}", self.url);
    }

    pub fn update_position(&self, graph: &mut SceneGraph, x: f32, y: f32, z: f32) {
        if let Some(node) = graph.node_mut(self.root) {
            node.transform.position = cgmath::Vector3::new(x, y, z);
        }
    }

    /// Euler angles in radians
    pub fn update_rotation(&self, graph: &mut SceneGraph, x: f32, y: f32, z: f32) {
        if let Some(node) = graph.node_mut(self.root) {
            node.transform.set_euler(x, y, z);
        }
    }

    pub fn update_scale(&self, graph: &mut SceneGraph, scale: f32) {
        if let Some(node) = graph.node_mut(self.root) {
            node.transform.set_uniform_scale(scale);
        }
    }

    pub fn geometry_ids(&self) -> &[GeometryId] {
        &self.geometries
    }

    pub fn material_ids(&self) -> &[MaterialId] {
        &self.materials
    }

    pub fn texture_ids(&self) -> &[TextureId] {
        &self.textures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::generate_cube;
    use crate::gfx::resources::material::{Material, MaterialKind};
    use crate::gfx::resources::texture::Texture;
    use crate::loader::asset::{normalize, AssetMesh, AssetScene, NormalizeOptions, RawAsset};

    fn loaded(embedded: bool) -> LoadedModel {
        let mut root = AssetNode::group("robot");
        let mut arm = AssetNode::with_mesh(
            "arm",
            AssetMesh {
                geometry: generate_cube(),
                material: Some(0),
            },
        );
        arm.children.push(AssetNode::with_mesh(
            "hand",
            AssetMesh {
                geometry: generate_cube(),
                material: Some(1),
            },
        ));
        root.children.push(arm);

        let scene = AssetScene {
            root,
            materials: vec![
                Material::new("Steel", MaterialKind::Standard).into(),
                crate::loader::AssetMaterial {
                    material: Material::new("Skin", MaterialKind::Phong),
                    map: Some(0),
                },
            ],
            textures: vec![Texture::from_rgba8("skin.png", 1, 1, vec![255; 4])],
            animations: vec![AnimationClip::new("idle", Vec::new())],
        };
        let raw = if embedded {
            RawAsset::Group(scene)
        } else {
            RawAsset::SceneWrapper {
                scene,
                animations: Vec::new(),
            }
        };
        let options = NormalizeOptions {
            target_size: Some(100.0),
            optimize_geometry: false,
            texture_compression: false,
        };
        normalize(raw, "robot.glb", ModelFileType::Glb, options)
    }

    #[test]
    fn test_install_builds_detached_subtree() {
        let mut graph = SceneGraph::new();
        let before = graph.node_count();
        let result = install(&mut graph, loaded(false));

        assert_eq!(graph.node_count(), before + 3);
        assert!(!graph.contains(result.model.root));
        assert_eq!(graph.material_count(), 2);
        assert_eq!(graph.texture_count(), 1);

        let hand = graph.find_by_name(result.model.root, "hand").unwrap();
        let node = graph.node(hand).unwrap();
        assert!(node.cast_shadow && node.receive_shadow);
        let skin = graph.material(node.mesh().unwrap().materials[0]).unwrap();
        assert!(skin.map.is_some());

        assert_eq!(result.actions.len(), 1);
        let action = result.mixer.action(result.actions[0]).unwrap();
        assert_eq!(action.weight(), 1.0);
    }

    #[test]
    fn test_install_places_model_on_ground() {
        let mut graph = SceneGraph::new();
        let result = install(&mut graph, loaded(false));
        graph.add_to_root(result.model.root);
        let bounds = graph.subtree_bounds(result.model.root);
        assert!(bounds.min.y.abs() < 1e-3);
        assert!((bounds.max_dimension() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_embedded_clips_fade_in() {
        let mut graph = SceneGraph::new();
        let mut result = install(&mut graph, loaded(true));
        let id = result.actions[0];
        let action = result.mixer.action_mut(id).unwrap();
        assert_eq!(action.loop_mode, LoopMode::Repeat);
        action.play();
        assert!(action.weight() < 1.0);
    }

    #[test]
    fn test_dispose_releases_everything() {
        let mut graph = SceneGraph::new();
        let before = graph.node_count();
        let result = install(&mut graph, loaded(false));
        graph.add_to_root(result.model.root);

        result.model.dispose(&mut graph);
        assert_eq!(graph.node_count(), before);
        assert_eq!(graph.geometry_count(), 0);
        assert_eq!(graph.material_count(), 0);
        assert_eq!(graph.texture_count(), 0);
    }

    #[test]
    fn test_update_transform_ops() {
        let mut graph = SceneGraph::new();
        let result = install(&mut graph, loaded(false));
        let model = result.model;
        model.update_position(&mut graph, 1.0, 2.0, 3.0);
        model.update_scale(&mut graph, 0.5);
        let node = graph.node(model.root).unwrap();
        assert_eq!(node.transform.position, cgmath::Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(node.transform.scale, cgmath::Vector3::new(0.5, 0.5, 0.5));
    }
}
