//! Loader output and its normalization into a placed model.

use cgmath::{Matrix4, SquareMatrix, Vector3};
use log::warn;

use super::ModelFileType;
use crate::animation::AnimationClip;
use crate::gfx::bounds::Aabb;
use crate::gfx::geometry::Geometry;
use crate::gfx::resources::material::{Material, MaterialKind};
use crate::gfx::resources::texture::Texture;
use crate::gfx::scene::Transform;

/// Geometry plus an index into the owning scene's material list
#[derive(Debug, Clone)]
pub struct AssetMesh {
    pub geometry: Geometry,
    /// `None` falls back to the default material
    pub material: Option<usize>,
}

/// Node of a loaded asset before it is inserted into a scene graph
#[derive(Debug, Clone, Default)]
pub struct AssetNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<AssetMesh>,
    pub children: Vec<AssetNode>,
}

impl AssetNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mesh(name: impl Into<String>, mesh: AssetMesh) -> Self {
        Self {
            name: name.into(),
            mesh: Some(mesh),
            ..Default::default()
        }
    }

    /// Depth-first visit of every node with its accumulated matrix
    pub fn visit(&self, parent: Matrix4<f32>, f: &mut dyn FnMut(&AssetNode, Matrix4<f32>)) {
        let world = parent * self.transform.matrix();
        f(self, world);
        for child in &self.children {
            child.visit(world, f);
        }
    }

    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut AssetNode)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit(Matrix4::identity(), &mut |node, _| {
            if node.mesh.is_some() {
                count += 1;
            }
        });
        count
    }

    /// Bounds of all mesh geometry, in the space of this node's parent
    pub fn bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        self.visit(Matrix4::identity(), &mut |node, world| {
            if let Some(mesh) = &node.mesh {
                bounds.union(&mesh.geometry.bounding_box().transform(&world));
            }
        });
        bounds
    }
}

/// Material with its base color map as an index into the texture list
#[derive(Debug, Clone)]
pub struct AssetMaterial {
    pub material: Material,
    pub map: Option<usize>,
}

impl From<Material> for AssetMaterial {
    fn from(material: Material) -> Self {
        Self { material, map: None }
    }
}

/// A node tree with the resources it references
#[derive(Debug, Clone, Default)]
pub struct AssetScene {
    pub root: AssetNode,
    pub materials: Vec<AssetMaterial>,
    pub textures: Vec<Texture>,
    /// Clips embedded in the node tree itself
    pub animations: Vec<AnimationClip>,
}

/// What a format loader hands back, by shape
#[derive(Debug, Clone)]
pub enum RawAsset {
    /// GLTF/GLB/DAE style: a scene plus top-level animations
    SceneWrapper {
        scene: AssetScene,
        animations: Vec<AnimationClip>,
    },
    /// OBJ/STL style: bare geometry
    Geometry { name: String, geometry: Geometry },
    /// FBX style: a group carrying its own embedded clips
    Group(AssetScene),
}

/// Uniform scale plus translation that rests a model on the ground plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f32,
    pub offset: Vector3<f32>,
}

impl Placement {
    pub const IDENTITY: Placement = Placement {
        scale: 1.0,
        offset: Vector3::new(0.0, 0.0, 0.0),
    };

    /// Scales so the largest dimension equals `target_size` (when given),
    /// centers X/Z on the origin and moves the lowest point to y = 0
    pub fn from_bounds(bounds: &Aabb, target_size: Option<f32>) -> Self {
        if bounds.is_empty() {
            return Self::IDENTITY;
        }

        let max_dim = bounds.max_dimension();
        let scale = match target_size {
            Some(target) if target > 0.0 && max_dim > f32::EPSILON => target / max_dim,
            _ => 1.0,
        };
        let center = bounds.center();
        Self {
            scale,
            offset: Vector3::new(-center.x * scale, -bounds.min.y * scale, -center.z * scale),
        }
    }

    /// Folds the placement into an existing root transform
    pub fn apply(&self, transform: &mut Transform) {
        transform.position = transform.position * self.scale + self.offset;
        transform.scale *= self.scale;
    }

    pub fn apply_to_bounds(&self, bounds: &Aabb) -> Aabb {
        if bounds.is_empty() {
            return *bounds;
        }
        Aabb::new(bounds.min * self.scale + self.offset, bounds.max * self.scale + self.offset)
    }
}

/// A normalized, placed model that has not touched any scene yet
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub url: String,
    pub file_type: ModelFileType,
    pub scene: AssetScene,
    /// Bounds after placement
    pub bounds: Aabb,
    pub placement: Placement,
    /// Whether clips were embedded in a group and get looping fade-in actions
    pub embedded_clips: bool,
}

/// Options that shape normalization
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub target_size: Option<f32>,
    pub optimize_geometry: bool,
    pub texture_compression: bool,
}

fn default_material() -> Material {
    Material::new("", MaterialKind::Standard)
}

/// Brings every loader shape into one representation and places it
pub fn normalize(
    raw: RawAsset,
    url: &str,
    file_type: ModelFileType,
    options: NormalizeOptions,
) -> LoadedModel {
    let (mut scene, embedded_clips) = match raw {
        RawAsset::SceneWrapper { mut scene, animations } => {
            scene.animations.extend(animations);
            (scene, false)
        }
        RawAsset::Geometry { name, geometry } => {
            let mut root = AssetNode::group(name.clone());
            root.children.push(AssetNode::with_mesh(
                name,
                AssetMesh {
                    geometry,
                    material: Some(0),
                },
            ));
            let scene = AssetScene {
                root,
                materials: vec![default_material().into()],
                ..Default::default()
            };
            (scene, false)
        }
        RawAsset::Group(scene) => (scene, true),
    };

    // Meshes without a material share one appended default
    let mut needs_default = false;
    let material_count = scene.materials.len();
    scene.root.visit_mut(&mut |node| {
        if let Some(mesh) = &mut node.mesh {
            if mesh.material.map_or(true, |i| i >= material_count) {
                mesh.material = Some(material_count);
                needs_default = true;
            }
        }
    });
    if needs_default {
        scene.materials.push(default_material().into());
    }

    let optimize = options.optimize_geometry;
    scene.root.visit_mut(&mut |node| {
        if let Some(mesh) = &mut node.mesh {
            if optimize {
                mesh.geometry.compute_vertex_normals();
                mesh.geometry.compute_bounds();
            } else {
                mesh.geometry.ensure_derived_data();
            }
        }
    });

    if options.texture_compression {
        for texture in &mut scene.textures {
            texture.enable_mipmaps();
        }
    }

    let raw_bounds = scene.root.bounds();
    if raw_bounds.is_empty() {
        warn!("Model {} has no geometry; skipping placement", url);
    }
    let placement = Placement::from_bounds(&raw_bounds, options.target_size);
    placement.apply(&mut scene.root.transform);

    LoadedModel {
        url: url.to_string(),
        file_type,
        bounds: placement.apply_to_bounds(&raw_bounds),
        placement,
        scene,
        embedded_clips,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::generate_cube;
    use rand::Rng;

    fn opts(target: Option<f32>) -> NormalizeOptions {
        NormalizeOptions {
            target_size: target,
            optimize_geometry: false,
            texture_compression: false,
        }
    }

    #[test]
    fn test_placement_rests_on_ground() {
        let bounds = Aabb::new(Vector3::new(-10.0, -50.0, 5.0), Vector3::new(10.0, 50.0, 25.0));
        let placement = Placement::from_bounds(&bounds, Some(100.0));
        assert_eq!(placement.scale, 1.0);
        let placed = placement.apply_to_bounds(&bounds);
        assert!(placed.min.y.abs() < 1e-5);
        assert!(placed.center().x.abs() < 1e-5);
        assert!(placed.center().z.abs() < 1e-5);
    }

    #[test]
    fn test_random_bounds_placement() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let min = Vector3::new(
                rng.random_range(-500.0..500.0),
                rng.random_range(-500.0..500.0),
                rng.random_range(-500.0..500.0),
            );
            let size = Vector3::new(
                rng.random_range(0.1..300.0),
                rng.random_range(0.1..300.0),
                rng.random_range(0.1..300.0),
            );
            let bounds = Aabb::new(min, min + size);
            let placed = Placement::from_bounds(&bounds, Some(100.0)).apply_to_bounds(&bounds);
            assert!(placed.min.y.abs() < 1e-2);
            assert!((placed.max_dimension() - 100.0).abs() < 1e-2);
            assert!(placed.center().x.abs() < 1e-2);
            assert!(placed.center().z.abs() < 1e-2);
        }
    }

    #[test]
    fn test_no_target_size_keeps_scale() {
        let bounds = Aabb::new(Vector3::new(0.0, 2.0, 0.0), Vector3::new(4.0, 6.0, 4.0));
        let placement = Placement::from_bounds(&bounds, None);
        assert_eq!(placement.scale, 1.0);
        assert_eq!(placement.offset, Vector3::new(-2.0, -2.0, -2.0));
    }

    #[test]
    fn test_normalize_bare_geometry_wraps_default_material() {
        let raw = RawAsset::Geometry {
            name: "part".into(),
            geometry: generate_cube(),
        };
        let model = normalize(raw, "part.stl", ModelFileType::Stl, opts(Some(100.0)));
        assert_eq!(model.scene.materials.len(), 1);
        assert_eq!(model.scene.materials[0].material.kind, MaterialKind::Standard);
        assert_eq!(model.scene.root.mesh_count(), 1);
        assert!((model.placement.scale - 100.0).abs() < 1e-4);
        assert!(model.bounds.min.y.abs() < 1e-4);
    }

    #[test]
    fn test_normalize_merges_wrapper_animations() {
        let scene = AssetScene {
            root: AssetNode::group("root"),
            animations: vec![AnimationClip::new("embedded", Vec::new())],
            ..Default::default()
        };
        let raw = RawAsset::SceneWrapper {
            scene,
            animations: vec![AnimationClip::new("top", Vec::new())],
        };
        let model = normalize(raw, "a.gltf", ModelFileType::Gltf, opts(Some(100.0)));
        let names: Vec<_> = model.scene.animations.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["embedded", "top"]);
        assert!(!model.embedded_clips);
    }

    #[test]
    fn test_missing_material_index_gets_default() {
        let mut root = AssetNode::group("root");
        root.children.push(AssetNode::with_mesh(
            "mesh",
            AssetMesh {
                geometry: generate_cube(),
                material: Some(7),
            },
        ));
        let scene = AssetScene {
            root,
            ..Default::default()
        };
        let model = normalize(RawAsset::Group(scene), "a.fbx", ModelFileType::Fbx, opts(None));
        assert_eq!(model.scene.materials.len(), 1);
        assert!(model.embedded_clips);
        assert!(model.scene.root.children[0].mesh.as_ref().unwrap().geometry.has_normals());
    }
}
