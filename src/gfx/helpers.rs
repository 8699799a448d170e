//! # Environment Helpers
//!
//! Grid, axes, floor plane and the stats overlay. Every helper is built once
//! from a [`HelperConfig`] snapshot and then toggled in and out of the scene
//! graph; toggling to the current state is a no-op.
//!
//! ## Usage
//!
//! ```rust
//! use model_viewer::config::HelperConfig;
//! use model_viewer::gfx::helpers::HelperSet;
//! use model_viewer::gfx::scene::{HelperKind, SceneGraph};
//! use model_viewer::surface::HeadlessContainer;
//!
//! let mut graph = SceneGraph::new();
//! let mut container = HeadlessContainer::default();
//! let mut helpers = HelperSet::build(&HelperConfig::default(), &mut graph, &mut container);
//!
//! helpers.toggle_grid(&mut graph, true);
//! helpers.toggle_grid(&mut graph, true);
//! assert_eq!(graph.helper_count(HelperKind::Grid), 1);
//! ```

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use log::{debug, warn};

use crate::config::HelperConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::gfx::color::Color;
use crate::gfx::geometry::{generate_axes, generate_grid, generate_plane};
use crate::gfx::resources::material::{Material, MaterialKind};
use crate::gfx::scene::{HelperKind, MaterialId, Mesh, Node, NodeId, NodeKind, SceneGraph, Transform};
use crate::performance::PerformanceMonitor;
use crate::surface::{Container, ElementId, ElementKind};

/// Grid lines sit just above the floor to avoid z-fighting
pub const GRID_ELEVATION: f32 = 0.1;

#[derive(Debug, Clone, Copy)]
struct HelperNode {
    node: NodeId,
    material: Option<MaterialId>,
}

pub struct HelperSet {
    grid: Option<HelperNode>,
    axes: Option<HelperNode>,
    floor: Option<HelperNode>,
    stats: Option<ElementId>,
    monitor: PerformanceMonitor,
}

impl HelperSet {
    /// Builds every helper, attaching the ones `config` shows
    pub fn build(config: &HelperConfig, graph: &mut SceneGraph, container: &mut dyn Container) -> Self {
        let grid = {
            let geometry = graph.add_geometry(generate_grid(
                config.grid.size,
                config.grid.divisions,
                config.grid.color.to_array(),
            ));
            let material = graph.add_material(Material::new("GridHelper", MaterialKind::Basic).with_color(config.grid.color));
            let node = Node::new(
                "GridHelper",
                NodeKind::Helper {
                    kind: HelperKind::Grid,
                    mesh: Mesh::new(geometry, material),
                },
            )
            .with_transform(Transform::default().with_position(0.0, GRID_ELEVATION, 0.0));
            HelperNode {
                node: graph.add_node(node),
                material: Some(material),
            }
        };

        let axes = {
            let geometry = graph.add_geometry(generate_axes(config.axes.size));
            let node = Node::new(
                "AxesHelper",
                NodeKind::Helper {
                    kind: HelperKind::Axes,
                    mesh: Mesh {
                        geometry,
                        materials: Vec::new(),
                    },
                },
            );
            HelperNode {
                node: graph.add_node(node),
                material: None,
            }
        };

        let floor = {
            let size = config.floor.size;
            let geometry = graph.add_geometry(generate_plane(size, size, 1, 1));
            let mut material = Material::new("Floor", MaterialKind::Standard)
                .with_color(config.floor.color)
                .with_pbr(0.8, 0.2);
            material.opacity = config.floor.opacity.clamp(0.0, 1.0);
            material.transparent = true;
            let material = graph.add_material(material);
            let mut node = Node::new(
                "Floor",
                NodeKind::Helper {
                    kind: HelperKind::Floor,
                    mesh: Mesh::new(geometry, material),
                },
            )
            .with_transform(Transform::default().with_euler(-FRAC_PI_2, 0.0, 0.0));
            node.receive_shadow = true;
            HelperNode {
                node: graph.add_node(node),
                material: Some(material),
            }
        };

        let mut set = Self {
            grid: Some(grid),
            axes: Some(axes),
            floor: Some(floor),
            stats: None,
            monitor: PerformanceMonitor::new(),
        };
        set.toggle_grid(graph, config.grid.show);
        set.toggle_axes(graph, config.axes.show);
        set.toggle_floor(graph, config.floor.show);
        set.toggle_stats(container, config.stats.show);
        debug!("Helpers built");
        set
    }

    fn toggle(graph: &mut SceneGraph, helper: Option<HelperNode>, show: bool) -> bool {
        let Some(helper) = helper else {
            warn!("Helper is not initialized");
            return false;
        };
        if show {
            graph.add_to_root(helper.node)
        } else {
            graph.detach(helper.node);
            true
        }
    }

    pub fn toggle_grid(&mut self, graph: &mut SceneGraph, show: bool) -> bool {
        Self::toggle(graph, self.grid, show)
    }

    pub fn toggle_axes(&mut self, graph: &mut SceneGraph, show: bool) -> bool {
        Self::toggle(graph, self.axes, show)
    }

    pub fn toggle_floor(&mut self, graph: &mut SceneGraph, show: bool) -> bool {
        Self::toggle(graph, self.floor, show)
    }

    /// Creates or removes the stats overlay element
    pub fn toggle_stats(&mut self, container: &mut dyn Container, show: bool) {
        match (show, self.stats) {
            (true, None) => {
                let id = container.append_element(ElementKind::StatsOverlay);
                container.set_text(id, &self.monitor.overlay_text());
                self.stats = Some(id);
            }
            (false, Some(id)) => {
                container.remove_element(id);
                self.stats = None;
                self.monitor.reset();
            }
            _ => {}
        }
    }

    pub fn stats_element(&self) -> Option<ElementId> {
        self.stats
    }

    pub fn is_visible(&self, graph: &SceneGraph, kind: HelperKind) -> bool {
        let helper = match kind {
            HelperKind::Grid => self.grid,
            HelperKind::Axes => self.axes,
            HelperKind::Floor => self.floor,
            HelperKind::Light(_) => None,
        };
        helper.is_some_and(|h| graph.contains(h.node))
    }

    fn material_mut<'g>(graph: &'g mut SceneGraph, helper: Option<HelperNode>, name: &'static str) -> ViewerResult<&'g mut Material> {
        helper
            .and_then(|h| h.material)
            .and_then(|id| graph.material_mut(id))
            .ok_or_else(|| ViewerError::uninitialized(name))
    }

    pub fn update_floor_color(&mut self, graph: &mut SceneGraph, color: Color) -> ViewerResult<()> {
        let material = Self::material_mut(graph, self.floor, "floor")?;
        material.color = color;
        material.mark_dirty();
        Ok(())
    }

    pub fn update_floor_opacity(&mut self, graph: &mut SceneGraph, opacity: f32) -> ViewerResult<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(ViewerError::invalid_property("opacity", format!("{opacity} is outside [0, 1]")));
        }
        let material = Self::material_mut(graph, self.floor, "floor")?;
        material.opacity = opacity;
        material.mark_dirty();
        Ok(())
    }

    /// Recolors the grid material and its line colors
    pub fn update_grid_color(&mut self, graph: &mut SceneGraph, color: Color) -> ViewerResult<()> {
        let material = Self::material_mut(graph, self.grid, "grid")?;
        material.color = color;
        material.mark_dirty();

        let geometry = self
            .grid
            .and_then(|h| graph.node(h.node))
            .and_then(|n| n.drawable())
            .map(|m| m.geometry);
        if let Some(geometry) = geometry.and_then(|id| graph.geometry_mut(id)) {
            geometry.colors.fill(color.to_array());
        }
        Ok(())
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Feeds one frame into the stats overlay, when shown
    pub fn tick_stats(&mut self, container: &mut dyn Container, frame_time: Duration, draw_calls: u32, vertex_count: u32) {
        let Some(id) = self.stats else {
            return;
        };
        self.monitor.record_frame(frame_time);
        self.monitor.update_render_stats(draw_calls, vertex_count);
        container.set_text(id, &self.monitor.overlay_text());
    }

    /// Removes every helper node, the floor's resources and the stats element
    ///
    /// Safe on a partially built or already disposed set.
    pub fn dispose(&mut self, graph: &mut SceneGraph, container: &mut dyn Container) {
        for helper in [self.grid.take(), self.axes.take(), self.floor.take()].into_iter().flatten() {
            for node in graph.remove_subtree(helper.node) {
                if let Some(mesh) = node.drawable() {
                    graph.dispose_geometry(mesh.geometry);
                }
            }
            if let Some(material) = helper.material {
                graph.dispose_material(material);
            }
        }
        if let Some(id) = self.stats.take() {
            container.remove_element(id);
        }
        debug!("Helpers disposed");
    }
}
