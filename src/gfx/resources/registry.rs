//! # Material Registry
//!
//! Indexes the materials of the active model by name and edits them in place:
//! selection highlighting, property updates, texture swaps and kind
//! conversion.
//!
//! ## Usage
//!
//! ```rust
//! use model_viewer::gfx::resources::material::{Material, MaterialKind};
//! use model_viewer::gfx::resources::registry::{MaterialProperty, MaterialRegistry};
//! use model_viewer::gfx::geometry::generate_cube;
//! use model_viewer::gfx::scene::{Mesh, Node, NodeKind, SceneGraph};
//!
//! let mut graph = SceneGraph::new();
//! let geometry = graph.add_geometry(generate_cube());
//! let paint = graph.add_material(Material::new("Paint", MaterialKind::Standard));
//! let body = graph.add_node(Node::new("body", NodeKind::Mesh(Mesh::new(geometry, paint))));
//!
//! let mut registry = MaterialRegistry::new();
//! registry.extract(&mut graph, body);
//! registry.update_property(&mut graph, "Paint", MaterialProperty::Wireframe(true))?;
//! assert!(graph.material(paint).unwrap().wireframe);
//! # Ok::<(), model_viewer::ViewerError>(())
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, error, info, warn};
use serde_json::Value;

use super::material::{KindParams, Material, MaterialField, MaterialKind};
use super::texture::{ColorSpace, Texture, WrapMode};
use crate::error::{ViewerError, ViewerResult};
use crate::gfx::color::Color;
use crate::gfx::scene::{MaterialId, NodeId, SceneGraph, TextureId};

pub const HIGHLIGHT_COLOR: u32 = 0xff0000;
pub const HIGHLIGHT_OPACITY: f32 = 0.4;
pub const HIGHLIGHT_EMISSIVE: u32 = 0xff2222;
pub const HIGHLIGHT_EMISSIVE_INTENSITY: f32 = 0.5;

/// One editable property change
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialProperty {
    Color(Color),
    Opacity(f32),
    /// `false` also forces opacity back to 1
    Transparent(bool),
    Wireframe(bool),
    Visible(bool),
    DepthWrite(bool),
    /// `Some(url)` loads a new texture asynchronously; `None` clears the map
    Map(Option<String>),
}

impl MaterialProperty {
    /// Parses a host event's `(property, value)` pair
    pub fn from_json(property: &str, value: &Value) -> ViewerResult<Self> {
        let expect_bool = || {
            value
                .as_bool()
                .ok_or_else(|| ViewerError::invalid_property(property, "expected a boolean"))
        };
        match property {
            "color" => serde_json::from_value::<Color>(value.clone())
                .map(MaterialProperty::Color)
                .map_err(|e| ViewerError::invalid_property(property, e.to_string())),
            "opacity" => value
                .as_f64()
                .map(|v| MaterialProperty::Opacity(v as f32))
                .ok_or_else(|| ViewerError::invalid_property(property, "expected a number")),
            "transparent" => expect_bool().map(MaterialProperty::Transparent),
            "wireframe" => expect_bool().map(MaterialProperty::Wireframe),
            "visible" => expect_bool().map(MaterialProperty::Visible),
            "depthWrite" | "depth_write" => expect_bool().map(MaterialProperty::DepthWrite),
            "map" => match value {
                Value::Null => Ok(MaterialProperty::Map(None)),
                Value::String(url) if url.is_empty() => Ok(MaterialProperty::Map(None)),
                Value::String(url) => Ok(MaterialProperty::Map(Some(url.clone()))),
                _ => Err(ViewerError::invalid_property(property, "expected a URL or null")),
            },
            other => Err(ViewerError::invalid_property(other, "unknown material property")),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MaterialProperty::Color(_) => "color",
            MaterialProperty::Opacity(_) => "opacity",
            MaterialProperty::Transparent(_) => "transparent",
            MaterialProperty::Wireframe(_) => "wireframe",
            MaterialProperty::Visible(_) => "visible",
            MaterialProperty::DepthWrite(_) => "depthWrite",
            MaterialProperty::Map(_) => "map",
        }
    }
}

/// Which materials a conversion applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Name(String),
    All,
}

impl From<&str> for Target {
    /// `"all"` addresses every registered material
    fn from(name: &str) -> Self {
        if name == "all" {
            Target::All
        } else {
            Target::Name(name.to_string())
        }
    }
}

/// Pending texture load for a material's color map
///
/// Only the most recent request per material is honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRequest {
    pub material: String,
    pub url: String,
    generation: u64,
}

/// Snapshot of a registered material for listing in a UI
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialEntry {
    pub name: String,
    pub kind: MaterialKind,
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub wireframe: bool,
    pub visible: bool,
    pub depth_write: bool,
    pub emissive: Option<(Color, f32)>,
    pub map: Option<TextureId>,
    /// Source URL or embedded label of the map, when known
    pub map_source: Option<String>,
    pub params: KindParams,
    pub mesh_names: Vec<String>,
    pub selected: bool,
}

/// Pre-highlight state restored on deselect
#[derive(Debug, Clone, Copy)]
struct HighlightBackup {
    color: Color,
    opacity: f32,
    transparent: bool,
    depth_write: bool,
    emissive: Option<(Color, f32)>,
}

impl HighlightBackup {
    fn capture(material: &Material) -> Self {
        Self {
            color: material.color,
            opacity: material.opacity,
            transparent: material.transparent,
            depth_write: material.depth_write,
            emissive: material
                .supports(MaterialField::Emissive)
                .then_some((material.emissive, material.emissive_intensity)),
        }
    }

    fn restore(&self, material: &mut Material) {
        material.color = self.color;
        material.opacity = self.opacity;
        material.transparent = self.transparent;
        material.depth_write = self.depth_write;
        if let Some((emissive, intensity)) = self.emissive {
            material.emissive = emissive;
            material.emissive_intensity = intensity;
        }
        material.mark_dirty();
    }
}

#[derive(Debug)]
struct Registered {
    id: MaterialId,
    meshes: Vec<NodeId>,
}

/// Name-indexed view over the active model's materials
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    materials: BTreeMap<String, Registered>,
    selected: Option<String>,
    backups: HashMap<MaterialId, HighlightBackup>,
    generation: u64,
    pending: HashMap<String, u64>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Representative material for `name`
    pub fn get(&self, name: &str) -> Option<MaterialId> {
        self.materials.get(name).map(|r| r.id)
    }

    /// Drops all entries, selection and pending requests
    pub fn clear(&mut self) {
        self.materials.clear();
        self.selected = None;
        self.backups.clear();
        self.pending.clear();
    }

    /// Rebuilds the registry from every mesh beneath `root`
    ///
    /// Unnamed materials are named `material_{n}` in traversal order, skipping
    /// any `n` whose name the model already uses, and materials sharing a name
    /// collapse into one entry whose mesh list holds every user.
    pub fn extract(&mut self, graph: &mut SceneGraph, root: NodeId) {
        self.clear();

        let meshes = graph.meshes_under(root);
        let mut taken: HashSet<String> = meshes
            .iter()
            .filter_map(|&n| graph.node(n)?.mesh())
            .flat_map(|m| m.materials.iter())
            .filter_map(|&id| graph.material(id))
            .filter(|m| !m.name.is_empty())
            .map(|m| m.name.clone())
            .collect();

        let mut synthetic = 0;
        let mut mesh_count = 0;
        for node_id in meshes {
            let Some(slots) = graph.node(node_id).and_then(|n| n.mesh()).map(|m| m.materials.clone())
            else {
                continue;
            };
            mesh_count += 1;

            for material_id in slots {
                let Some(material) = graph.material_mut(material_id) else {
                    continue;
                };
                if material.name.is_empty() {
                    let name = loop {
                        let candidate = format!("material_{synthetic}");
                        synthetic += 1;
                        if !taken.contains(&candidate) {
                            break candidate;
                        }
                    };
                    taken.insert(name.clone());
                    material.name = name;
                }
                let name = material.name.clone();
                let map = material.map;

                if let Some(texture) = map.and_then(|t| graph.texture_mut(t)) {
                    texture.color_space = ColorSpace::Srgb;
                    texture.wrap_s = WrapMode::Repeat;
                    texture.wrap_t = WrapMode::Repeat;
                }

                let entry = self.materials.entry(name).or_insert(Registered {
                    id: material_id,
                    meshes: Vec::new(),
                });
                if !entry.meshes.contains(&node_id) {
                    entry.meshes.push(node_id);
                }
            }
        }

        info!(
            "Extracted {} materials from {} meshes",
            self.materials.len(),
            mesh_count
        );
    }

    /// Every live material id carrying `name` on the registered meshes
    fn slot_ids(&self, graph: &SceneGraph, name: &str) -> Vec<MaterialId> {
        let Some(registered) = self.materials.get(name) else {
            return Vec::new();
        };
        let mut ids = vec![registered.id];
        for mesh in registered.meshes.iter().filter_map(|&n| graph.node(n)?.mesh()) {
            for &id in &mesh.materials {
                let same_name = graph.material(id).is_some_and(|m| m.name == name);
                if same_name && !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids.retain(|&id| graph.material(id).is_some());
        ids
    }

    fn set_highlight(&mut self, graph: &mut SceneGraph, name: &str, highlight: bool) {
        for id in self.slot_ids(graph, name) {
            let Some(material) = graph.material_mut(id) else {
                continue;
            };
            if highlight {
                self.backups
                    .entry(id)
                    .or_insert_with(|| HighlightBackup::capture(material));
                material.transparent = true;
                material.opacity = HIGHLIGHT_OPACITY;
                material.depth_write = true;
                material.color = Color::from_hex(HIGHLIGHT_COLOR);
                if material.supports(MaterialField::Emissive) {
                    material.emissive = Color::from_hex(HIGHLIGHT_EMISSIVE);
                    material.emissive_intensity = HIGHLIGHT_EMISSIVE_INTENSITY;
                }
                material.mark_dirty();
            } else if let Some(backup) = self.backups.remove(&id) {
                backup.restore(material);
            }
        }
    }

    /// Highlights `name`, restoring whichever material was highlighted before
    pub fn select(&mut self, graph: &mut SceneGraph, name: &str) -> ViewerResult<()> {
        if !self.materials.contains_key(name) {
            warn!("Cannot select unknown material {}", name);
            return Err(ViewerError::MaterialNotFound(name.to_string()));
        }

        if let Some(previous) = self.selected.take() {
            if previous != name {
                debug!("Restoring material {}", previous);
                self.set_highlight(graph, &previous, false);
            }
        }
        self.set_highlight(graph, name, true);
        self.selected = Some(name.to_string());
        debug!("Selected material {}", name);
        Ok(())
    }

    /// Restores the highlighted material, if any
    pub fn deselect(&mut self, graph: &mut SceneGraph) {
        if let Some(previous) = self.selected.take() {
            self.set_highlight(graph, &previous, false);
        }
    }

    /// Applies one property change to every material carrying `name`
    ///
    /// A map URL is not applied here: the returned request is completed with
    /// [`MaterialRegistry::apply_texture`] once the texture has loaded.
    pub fn update_property(
        &mut self,
        graph: &mut SceneGraph,
        name: &str,
        property: MaterialProperty,
    ) -> ViewerResult<Option<TextureRequest>> {
        if !self.materials.contains_key(name) {
            return Err(ViewerError::MaterialNotFound(name.to_string()));
        }
        if let MaterialProperty::Opacity(v) = property {
            if !(0.0..=1.0).contains(&v) {
                return Err(ViewerError::invalid_property("opacity", format!("{v} is outside [0, 1]")));
            }
        }

        if let MaterialProperty::Map(Some(url)) = property {
            self.generation += 1;
            self.pending.insert(name.to_string(), self.generation);
            debug!("Requested texture {} for material {}", url, name);
            return Ok(Some(TextureRequest {
                material: name.to_string(),
                url,
                generation: self.generation,
            }));
        }

        let mut released = Vec::new();
        for id in self.slot_ids(graph, name) {
            let backup = self.backups.get_mut(&id);
            let Some(material) = graph.material_mut(id) else {
                continue;
            };
            apply_property(material, backup, &property, &mut released);
            material.mark_dirty();
        }
        if matches!(property, MaterialProperty::Map(None)) {
            self.pending.remove(name);
        }
        release_textures(graph, released);
        debug!("Updated {} on material {}", property.name(), name);
        Ok(None)
    }

    /// Applies `property` to every registered material
    pub fn update_all(
        &mut self,
        graph: &mut SceneGraph,
        property: MaterialProperty,
    ) -> ViewerResult<Vec<TextureRequest>> {
        let names: Vec<String> = self.materials.keys().cloned().collect();
        let mut requests = Vec::new();
        for name in names {
            if let Some(request) = self.update_property(graph, &name, property.clone())? {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    /// Installs a loaded texture for a still-current request
    ///
    /// Returns `false` and drops the texture when the request was superseded
    /// or its material is gone. The previous map is released once unused.
    pub fn apply_texture(
        &mut self,
        graph: &mut SceneGraph,
        request: &TextureRequest,
        mut texture: Texture,
    ) -> bool {
        if self.pending.get(&request.material) != Some(&request.generation) {
            debug!("Ignoring stale texture {} for {}", request.url, request.material);
            return false;
        }
        self.pending.remove(&request.material);

        let ids = self.slot_ids(graph, &request.material);
        if ids.is_empty() {
            warn!(
                "Material {} disappeared before texture {} arrived",
                request.material, request.url
            );
            return false;
        }

        texture.color_space = ColorSpace::Srgb;
        texture.wrap_s = WrapMode::Repeat;
        texture.wrap_t = WrapMode::Repeat;
        let texture_id = graph.add_texture(texture);

        let mut released = Vec::new();
        for id in ids {
            if let Some(material) = graph.material_mut(id) {
                released.extend(material.map.replace(texture_id));
                material.mark_dirty();
            }
        }
        release_textures(graph, released);
        info!("Applied texture {} to material {}", request.url, request.material);
        true
    }

    /// Records a failed texture load; the material keeps its current map
    pub fn texture_failed(&mut self, request: &TextureRequest, err: &ViewerError) {
        if self.pending.get(&request.material) == Some(&request.generation) {
            self.pending.remove(&request.material);
        }
        error!("Texture {} for material {} failed: {}", request.url, request.material, err);
    }

    pub fn toggle_visibility(&mut self, graph: &mut SceneGraph, name: &str) -> ViewerResult<bool> {
        let visible = self
            .get(name)
            .and_then(|id| graph.material(id))
            .map(|m| !m.visible)
            .ok_or_else(|| ViewerError::MaterialNotFound(name.to_string()))?;
        self.update_property(graph, name, MaterialProperty::Visible(visible))?;
        Ok(visible)
    }

    /// Replaces materials with ones of `kind`, carrying over shared fields
    ///
    /// Meshes are re-pointed at the new material and the old one is disposed.
    /// A highlighted material stays highlighted, with its pre-highlight state
    /// carried into the new kind.
    pub fn convert_type(
        &mut self,
        graph: &mut SceneGraph,
        target: Target,
        kind: MaterialKind,
    ) -> ViewerResult<()> {
        let names: Vec<String> = match target {
            Target::All => self.materials.keys().cloned().collect(),
            Target::Name(name) if self.materials.contains_key(&name) => vec![name],
            Target::Name(name) => return Err(ViewerError::MaterialNotFound(name)),
        };

        for name in names {
            let was_selected = self.selected.as_deref() == Some(name.as_str());
            if was_selected {
                self.set_highlight(graph, &name, false);
            }

            let mut first_new = None;
            for old_id in self.slot_ids(graph, &name) {
                let Some(converted) = graph.material(old_id).map(|m| m.convert_to(kind)) else {
                    continue;
                };
                let new_id = graph.add_material(converted);
                first_new.get_or_insert(new_id);

                let meshes = self.materials.get(&name).map(|r| r.meshes.clone()).unwrap_or_default();
                for node_id in meshes {
                    if let Some(mesh) = graph.node_mut(node_id).and_then(|n| n.mesh_mut()) {
                        for slot in mesh.materials.iter_mut().filter(|s| **s == old_id) {
                            *slot = new_id;
                        }
                    }
                }
                graph.dispose_material(old_id);
            }

            if let (Some(new_id), Some(registered)) = (first_new, self.materials.get_mut(&name)) {
                registered.id = new_id;
            }
            if was_selected {
                self.set_highlight(graph, &name, true);
            }
            debug!("Converted material {} to {}", name, kind);
        }
        Ok(())
    }

    /// Snapshot of every entry, sorted by name
    pub fn entries(&self, graph: &SceneGraph) -> Vec<MaterialEntry> {
        self.materials
            .iter()
            .filter_map(|(name, registered)| {
                let material = graph.material(registered.id)?;
                // A highlighted material reports its real values
                let shown = match self.backups.get(&registered.id) {
                    Some(backup) => {
                        let mut m = material.clone();
                        backup.restore(&mut m);
                        m
                    }
                    None => material.clone(),
                };
                Some(MaterialEntry {
                    name: name.clone(),
                    kind: shown.kind,
                    color: shown.color,
                    opacity: shown.opacity,
                    transparent: shown.transparent,
                    wireframe: shown.wireframe,
                    visible: shown.visible,
                    depth_write: shown.depth_write,
                    emissive: shown
                        .supports(MaterialField::Emissive)
                        .then_some((shown.emissive, shown.emissive_intensity)),
                    map: shown.map,
                    map_source: shown
                        .map
                        .and_then(|t| graph.texture(t))
                        .map(|t| t.source.clone()),
                    params: shown.params,
                    mesh_names: registered
                        .meshes
                        .iter()
                        .filter_map(|&n| graph.node(n).map(|node| node.name.clone()))
                        .collect(),
                    selected: self.selected.as_deref() == Some(name.as_str()),
                })
            })
            .collect()
    }
}

/// Highlight-controlled fields go to the backup while a highlight is active
fn apply_property(
    material: &mut Material,
    backup: Option<&mut HighlightBackup>,
    property: &MaterialProperty,
    released: &mut Vec<TextureId>,
) {
    match (property, backup) {
        (MaterialProperty::Color(c), Some(b)) => b.color = *c,
        (MaterialProperty::Color(c), None) => material.color = *c,
        (MaterialProperty::Opacity(v), Some(b)) => b.opacity = *v,
        (MaterialProperty::Opacity(v), None) => material.opacity = *v,
        (MaterialProperty::Transparent(t), Some(b)) => {
            b.transparent = *t;
            if !t {
                b.opacity = 1.0;
            }
        }
        (MaterialProperty::Transparent(t), None) => {
            material.transparent = *t;
            if !t {
                material.opacity = 1.0;
            }
        }
        (MaterialProperty::DepthWrite(d), Some(b)) => b.depth_write = *d,
        (MaterialProperty::DepthWrite(d), None) => material.depth_write = *d,
        (MaterialProperty::Wireframe(w), _) => material.wireframe = *w,
        (MaterialProperty::Visible(v), _) => material.visible = *v,
        (MaterialProperty::Map(None), _) => released.extend(material.map.take()),
        (MaterialProperty::Map(Some(_)), _) => {}
    }
}

fn release_textures(graph: &mut SceneGraph, textures: Vec<TextureId>) {
    for id in textures {
        if !graph.texture_in_use(id) {
            graph.dispose_texture(id);
        }
    }
}
