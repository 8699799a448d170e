//! # Light Rig
//!
//! Four fixed light roles (ambient, directional, point, spot), each backed by
//! exactly one light node for the lifetime of the rig. Disabled roles keep an
//! invisible node so they can be switched on later without rebuilding.
//!
//! ## Usage
//!
//! ```rust
//! use model_viewer::config::LightsConfig;
//! use model_viewer::gfx::lights::{LightRig, LightRole, LightUpdate};
//! use model_viewer::gfx::scene::SceneGraph;
//!
//! let mut graph = SceneGraph::new();
//! let mut rig = LightRig::build(&LightsConfig::default(), &mut graph);
//! rig.attach(&mut graph);
//!
//! let update = LightUpdate {
//!     enabled: Some(true),
//!     intensity: Some(2.0),
//!     ..Default::default()
//! };
//! rig.update(&mut graph, LightRole::Point, &update)?;
//! assert!(rig.is_enabled(&graph, LightRole::Point));
//! # Ok::<(), model_viewer::ViewerError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use cgmath::{InnerSpace, Vector3};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{LightsConfig, Position, ShadowConfig};
use crate::error::{ViewerError, ViewerResult};
use crate::gfx::color::Color;
use crate::gfx::geometry::generate_light_marker;
use crate::gfx::scene::{HelperKind, Mesh, Node, NodeId, NodeKind, SceneGraph, Transform};

/// Radius used by [`LightRig::set_light_angle`] for the main (directional) light
pub const MAIN_LIGHT_RADIUS: f32 = 100.0;
/// Radius used by [`LightRig::set_light_angle`] for every other role
pub const FILL_LIGHT_RADIUS: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightRole {
    Ambient,
    Directional,
    Point,
    Spot,
}

impl LightRole {
    pub const ALL: [LightRole; 4] = [
        LightRole::Ambient,
        LightRole::Directional,
        LightRole::Point,
        LightRole::Spot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LightRole::Ambient => "ambient",
            LightRole::Directional => "directional",
            LightRole::Point => "point",
            LightRole::Spot => "spot",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn node_name(self) -> &'static str {
        match self {
            LightRole::Ambient => "AmbientLight",
            LightRole::Directional => "DirectionalLight",
            LightRole::Point => "PointLight",
            LightRole::Spot => "SpotLight",
        }
    }

    fn helper_size(self) -> f32 {
        match self {
            LightRole::Directional => 10.0,
            _ => 5.0,
        }
    }
}

impl fmt::Display for LightRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightRole {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ambient" => Ok(LightRole::Ambient),
            "directional" => Ok(LightRole::Directional),
            "point" => Ok(LightRole::Point),
            "spot" => Ok(LightRole::Spot),
            _ => Err(ViewerError::LightRoleNotFound(s.to_string())),
        }
    }
}

/// Projection used when rendering a light's shadow map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCamera {
    pub near: f32,
    pub far: f32,
    /// Orthographic extents; only directional lights use them
    pub extents: Option<[f32; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    pub map_size: u32,
    pub bias: f32,
    pub radius: f32,
    pub blur_samples: u32,
    pub camera: ShadowCamera,
}

impl From<&ShadowConfig> for ShadowSettings {
    fn from(config: &ShadowConfig) -> Self {
        let c = &config.camera;
        let extents = match (c.left, c.right, c.top, c.bottom) {
            (Some(l), Some(r), Some(t), Some(b)) => Some([l, r, t, b]),
            _ => None,
        };
        Self {
            map_size: config.map_size,
            bias: config.bias,
            radius: config.radius,
            blur_samples: config.blur_samples,
            camera: ShadowCamera {
                near: c.near,
                far: c.far,
                extents,
            },
        }
    }
}

/// Role-specific light parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Ambient fill, modeled as a sky/ground hemisphere
    Hemisphere { ground_color: Color },
    Directional { target: Vector3<f32> },
    Point { distance: f32, decay: f32 },
    Spot {
        target: Vector3<f32>,
        angle: f32,
        penumbra: f32,
        distance: f32,
        decay: f32,
    },
}

/// Light payload stored on a light node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub shadow: ShadowSettings,
}

impl Light {
    pub fn role(&self) -> LightRole {
        match self.kind {
            LightKind::Hemisphere { .. } => LightRole::Ambient,
            LightKind::Directional { .. } => LightRole::Directional,
            LightKind::Point { .. } => LightRole::Point,
            LightKind::Spot { .. } => LightRole::Spot,
        }
    }

    pub fn target(&self) -> Option<Vector3<f32>> {
        match self.kind {
            LightKind::Directional { target } | LightKind::Spot { target, .. } => Some(target),
            _ => None,
        }
    }

    fn set_target(&mut self, value: Vector3<f32>) {
        if let LightKind::Directional { target } | LightKind::Spot { target, .. } = &mut self.kind {
            *target = value;
        }
    }
}

/// Partial update applied by [`LightRig::update`]; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LightUpdate {
    pub enabled: Option<bool>,
    pub intensity: Option<f32>,
    pub color: Option<Color>,
    pub position: Option<Position>,
    pub cast_shadow: Option<bool>,
}

struct Built {
    light: Light,
    position: Position,
    enabled: bool,
    cast_shadow: bool,
    helper: bool,
}

fn built_lights(config: &LightsConfig) -> [Built; 4] {
    let a = &config.ambient;
    let d = &config.directional;
    let p = &config.point;
    let s = &config.spot;
    [
        Built {
            light: Light {
                kind: LightKind::Hemisphere {
                    ground_color: a.ground_color,
                },
                color: a.color,
                intensity: a.intensity,
                shadow: ShadowSettings::from(&ShadowConfig::default()),
            },
            position: Position::default(),
            enabled: a.enabled,
            cast_shadow: false,
            helper: false,
        },
        Built {
            light: Light {
                kind: LightKind::Directional {
                    target: Vector3::new(0.0, 0.0, 0.0),
                },
                color: d.color,
                intensity: d.intensity,
                shadow: ShadowSettings::from(&d.shadow),
            },
            position: d.position,
            enabled: d.enabled,
            cast_shadow: d.shadow.enabled,
            helper: d.helper,
        },
        Built {
            light: Light {
                kind: LightKind::Point {
                    distance: p.distance,
                    decay: p.decay,
                },
                color: p.color,
                intensity: p.intensity,
                shadow: ShadowSettings::from(&p.shadow),
            },
            position: p.position,
            enabled: p.enabled,
            cast_shadow: p.shadow.enabled,
            helper: p.helper,
        },
        Built {
            light: Light {
                kind: LightKind::Spot {
                    target: s.target.into(),
                    angle: s.angle,
                    penumbra: s.penumbra,
                    distance: s.distance,
                    decay: s.decay,
                },
                color: s.color,
                intensity: s.intensity,
                shadow: ShadowSettings::from(&s.shadow),
            },
            position: s.position,
            enabled: s.enabled,
            cast_shadow: s.shadow.enabled,
            helper: s.helper,
        },
    ]
}

/// Owner of the four light nodes and their optional debug helpers
#[derive(Debug)]
pub struct LightRig {
    lights: [NodeId; 4],
    helpers: [Option<NodeId>; 4],
    attached: bool,
}

impl LightRig {
    /// Builds every role from `config` as detached nodes
    pub fn build(config: &LightsConfig, graph: &mut SceneGraph) -> Self {
        let built = built_lights(config);
        let lights = LightRole::ALL.map(|role| {
            let b = &built[role.index()];
            let mut node = Node::new(role.node_name(), NodeKind::Light(b.light))
                .with_transform(Transform::default().with_position(b.position.x, b.position.y, b.position.z))
                .with_visible(b.enabled);
            node.cast_shadow = b.cast_shadow;
            graph.add_node(node)
        });

        let mut rig = Self {
            lights,
            helpers: [None; 4],
            attached: false,
        };
        for role in LightRole::ALL {
            let b = &built[role.index()];
            if b.helper && b.enabled {
                if let Err(e) = rig.set_debug_helper(graph, role, true) {
                    warn!("Could not create {} light helper: {}", role, e);
                }
            }
        }
        debug!("Light rig built");
        rig
    }

    pub fn light_node(&self, role: LightRole) -> NodeId {
        self.lights[role.index()]
    }

    pub fn helper_node(&self, role: LightRole) -> Option<NodeId> {
        self.helpers[role.index()]
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn light<'g>(&self, graph: &'g SceneGraph, role: LightRole) -> Option<&'g Light> {
        graph.node(self.light_node(role)).and_then(|n| n.light())
    }

    pub fn is_enabled(&self, graph: &SceneGraph, role: LightRole) -> bool {
        graph.node(self.light_node(role)).is_some_and(|n| n.visible)
    }

    pub fn position(&self, graph: &SceneGraph, role: LightRole) -> Option<Vector3<f32>> {
        graph.node(self.light_node(role)).map(|n| n.transform.position)
    }

    /// Adds every light node and live helper under the scene root
    pub fn attach(&mut self, graph: &mut SceneGraph) {
        for id in self.lights.iter().chain(self.helpers.iter().flatten()) {
            graph.add_to_root(*id);
        }
        self.attached = true;
    }

    /// Unlinks every light node and live helper; nodes stay built
    pub fn detach(&mut self, graph: &mut SceneGraph) {
        for id in self.lights.iter().chain(self.helpers.iter().flatten()) {
            graph.detach(*id);
        }
        self.attached = false;
    }

    fn node_mut<'g>(&self, graph: &'g mut SceneGraph, role: LightRole) -> ViewerResult<&'g mut Node> {
        graph
            .node_mut(self.light_node(role))
            .ok_or_else(|| ViewerError::uninitialized("light"))
    }

    /// Applies a partial update to one role in place
    ///
    /// Disabling a role removes its debug helper. Moving the point light
    /// recomputes its shadow far plane from the distance to the origin.
    pub fn update(&mut self, graph: &mut SceneGraph, role: LightRole, update: &LightUpdate) -> ViewerResult<()> {
        if let Some(intensity) = update.intensity {
            if !intensity.is_finite() || intensity < 0.0 {
                return Err(ViewerError::invalid_property("intensity", "must be a non-negative number"));
            }
        }

        let node = self.node_mut(graph, role)?;
        if let Some(enabled) = update.enabled {
            node.visible = enabled;
        }
        if let Some(cast_shadow) = update.cast_shadow {
            // Hemisphere lights never cast
            node.cast_shadow = cast_shadow && role != LightRole::Ambient;
        }
        if let Some(position) = update.position {
            node.transform.position = position.into();
        }
        let position = node.transform.position;
        let Some(light) = node.light_mut() else {
            return Err(ViewerError::uninitialized("light"));
        };
        if let Some(intensity) = update.intensity {
            light.intensity = intensity;
        }
        if let Some(color) = update.color {
            light.color = color;
        }
        if update.position.is_some() {
            if let LightKind::Point { distance, .. } = light.kind {
                let camera = &mut light.shadow.camera;
                camera.far = (position.magnitude() + distance).max(camera.near + 1.0);
            }
        }

        if update.enabled == Some(false) {
            self.remove_helper(graph, role);
        } else {
            self.sync_helper(graph, role);
        }
        debug!("Updated {} light", role);
        Ok(())
    }

    /// Creates or removes the debug helper for a role
    ///
    /// The ambient role has no helper; asking for one is logged and ignored.
    /// A helper is never created for a disabled role.
    pub fn set_debug_helper(&mut self, graph: &mut SceneGraph, role: LightRole, show: bool) -> ViewerResult<()> {
        if role == LightRole::Ambient {
            info!("Ambient light has no debug helper");
            return Ok(());
        }
        if !show {
            self.remove_helper(graph, role);
            return Ok(());
        }
        if self.helpers[role.index()].is_some() {
            return Ok(());
        }
        if !self.is_enabled(graph, role) {
            warn!("Not adding a helper for disabled {} light", role);
            return Ok(());
        }

        let geometry = graph.add_geometry(generate_light_marker(role.helper_size(), [0.0; 3]));
        let node = Node::new(
            format!("{}Helper", role.node_name()),
            NodeKind::Helper {
                kind: HelperKind::Light(role),
                mesh: Mesh {
                    geometry,
                    materials: Vec::new(),
                },
            },
        );
        let id = graph.add_node(node);
        self.helpers[role.index()] = Some(id);
        self.sync_helper(graph, role);
        if self.attached {
            graph.add_to_root(id);
        }
        debug!("Added {} light helper", role);
        Ok(())
    }

    fn remove_helper(&mut self, graph: &mut SceneGraph, role: LightRole) {
        let Some(id) = self.helpers[role.index()].take() else {
            return;
        };
        for node in graph.remove_subtree(id) {
            if let Some(mesh) = node.drawable() {
                graph.dispose_geometry(mesh.geometry);
            }
        }
        debug!("Removed {} light helper", role);
    }

    /// Moves a helper to its light and re-aims it at the light's target
    fn sync_helper(&self, graph: &mut SceneGraph, role: LightRole) {
        let Some(helper) = self.helpers[role.index()] else {
            return;
        };
        let Some(node) = graph.node(self.light_node(role)) else {
            return;
        };
        let position = node.transform.position;
        let Some(light) = node.light().copied() else {
            return;
        };
        let offset = light.target().map_or([0.0; 3], |t| (t - position).into());

        let Some(helper_node) = graph.node_mut(helper) else {
            return;
        };
        helper_node.transform.position = position;
        let Some(geometry_id) = helper_node.drawable().map(|m| m.geometry) else {
            return;
        };
        if let Some(geometry) = graph.geometry_mut(geometry_id) {
            *geometry = generate_light_marker(role.helper_size(), offset);
            geometry.colors = vec![light.color.to_array(); geometry.positions.len()];
        }
    }

    /// Host-facing entry point: `role` and `property` as strings, value as JSON
    ///
    /// # Arguments
    /// * `role` - `ambient`, `directional`, `point` or `spot`
    /// * `property` - `enabled`, `intensity`, `color`, `position`, `castShadow`,
    ///   `helper`, `groundColor`, `distance`, `decay`, `angle` or `penumbra`
    /// * `value` - JSON value for the property
    pub fn apply_change(&mut self, graph: &mut SceneGraph, role: &str, property: &str, value: &Value) -> ViewerResult<()> {
        let role: LightRole = role.parse()?;
        let parse_err = |e: serde_json::Error| ViewerError::invalid_property(property, e.to_string());

        match property {
            "enabled" | "intensity" | "color" | "position" | "castShadow" => {
                let mut object = serde_json::Map::new();
                object.insert(property.to_string(), value.clone());
                let update: LightUpdate = serde_json::from_value(Value::Object(object)).map_err(parse_err)?;
                self.update(graph, role, &update)
            }
            "helper" => {
                let show: bool = serde_json::from_value(value.clone()).map_err(parse_err)?;
                self.set_debug_helper(graph, role, show)
            }
            "groundColor" | "distance" | "decay" | "angle" | "penumbra" => {
                self.apply_kind_field(graph, role, property, value)
            }
            _ => Err(ViewerError::invalid_property(property, format!("not a {} light property", role))),
        }
    }

    fn apply_kind_field(&mut self, graph: &mut SceneGraph, role: LightRole, property: &str, value: &Value) -> ViewerResult<()> {
        let parse_err = |e: serde_json::Error| ViewerError::invalid_property(property, e.to_string());
        let node = self.node_mut(graph, role)?;
        let position = node.transform.position;
        let light = node.light_mut().ok_or_else(|| ViewerError::uninitialized("light"))?;

        match (&mut light.kind, property) {
            (LightKind::Hemisphere { ground_color }, "groundColor") => {
                *ground_color = serde_json::from_value(value.clone()).map_err(parse_err)?;
            }
            (LightKind::Point { distance, .. } | LightKind::Spot { distance, .. }, "distance") => {
                let v: f32 = serde_json::from_value(value.clone()).map_err(parse_err)?;
                if v < 0.0 {
                    return Err(ViewerError::invalid_property(property, "must not be negative"));
                }
                *distance = v;
                if role == LightRole::Point {
                    let camera = &mut light.shadow.camera;
                    camera.far = (position.magnitude() + v).max(camera.near + 1.0);
                }
            }
            (LightKind::Point { decay, .. } | LightKind::Spot { decay, .. }, "decay") => {
                *decay = serde_json::from_value(value.clone()).map_err(parse_err)?;
            }
            (LightKind::Spot { angle, .. }, "angle") => {
                let v: f32 = serde_json::from_value(value.clone()).map_err(parse_err)?;
                if !(0.0..=std::f32::consts::FRAC_PI_2).contains(&v) {
                    return Err(ViewerError::invalid_property(property, "must be within [0, PI/2]"));
                }
                *angle = v;
            }
            (LightKind::Spot { penumbra, .. }, "penumbra") => {
                let v: f32 = serde_json::from_value(value.clone()).map_err(parse_err)?;
                *penumbra = v.clamp(0.0, 1.0);
            }
            _ => {
                return Err(ViewerError::invalid_property(property, format!("not a {} light property", role)));
            }
        }
        Ok(())
    }

    /// Places a light on a sphere around the origin and aims it there
    ///
    /// Angles are in degrees. The directional light orbits at
    /// [`MAIN_LIGHT_RADIUS`], the others at [`FILL_LIGHT_RADIUS`]. Roll (`z`)
    /// does not change where a light sits on the sphere.
    pub fn set_light_angle(&mut self, graph: &mut SceneGraph, role: LightRole, x: f32, y: f32, _z: f32) -> ViewerResult<()> {
        let radius = if role == LightRole::Directional {
            MAIN_LIGHT_RADIUS
        } else {
            FILL_LIGHT_RADIUS
        };
        let (rx, ry) = (x.to_radians(), y.to_radians());
        let position = Vector3::new(radius * ry.sin() * rx.cos(), radius * rx.sin(), radius * ry.cos() * rx.cos());

        let node = self.node_mut(graph, role)?;
        if let Some(light) = node.light_mut() {
            light.set_target(Vector3::new(0.0, 0.0, 0.0));
        }
        let update = LightUpdate {
            position: Some(position.into()),
            ..Default::default()
        };
        self.update(graph, role, &update)
    }

    /// Removes every light and helper from the graph
    pub fn dispose(mut self, graph: &mut SceneGraph) {
        for role in LightRole::ALL {
            self.remove_helper(graph, role);
            graph.remove_subtree(self.light_node(role));
        }
        debug!("Light rig disposed");
    }
}
