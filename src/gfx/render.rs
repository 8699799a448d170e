//! # Renderer Seam
//!
//! The viewer composes a scene graph each frame and hands it to a
//! [`Renderer`]. Rasterization lives behind this trait; the crate ships a
//! [`HeadlessRenderer`] that counts draw work and produces point-splat
//! captures, which is enough for tools, screenshots in tests and hosts
//! without a GPU.

use cgmath::{Matrix4, SquareMatrix, Vector4};
use image::{Rgba, RgbaImage};
use log::{debug, info};

use super::camera::{Camera, PerspectiveCamera};
use crate::config::RendererConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::gfx::scene::{Background, NodeId, SceneGraph};
use crate::surface::{Container, ElementId, ElementKind};

/// Work submitted by one render call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub vertex_count: u32,
}

pub trait Renderer {
    /// Canvas element the renderer appended to its container
    fn canvas(&self) -> ElementId;

    fn size(&self) -> (u32, u32);

    fn set_size(&mut self, width: u32, height: u32);

    fn render(&mut self, graph: &SceneGraph, camera: &PerspectiveCamera) -> FrameStats;

    /// Renders one frame into an image
    fn capture(&mut self, graph: &SceneGraph, camera: &PerspectiveCamera) -> anyhow::Result<RgbaImage>;

    /// Releases the drawing context; later calls render nothing
    fn force_context_loss(&mut self);

    fn frames_rendered(&self) -> u64;
}

/// Builds a renderer inside a container
pub type RendererFactory = Box<dyn Fn(&mut dyn Container, &RendererConfig) -> ViewerResult<Box<dyn Renderer>>>;

/// Factory for [`HeadlessRenderer`]
pub fn headless_factory() -> RendererFactory {
    Box::new(|container, config| Ok(Box::new(HeadlessRenderer::new(container, config)?)))
}

/// Visible drawable nodes with their world matrices, in draw order
///
/// A node hidden by itself or by any ancestor is skipped, and so are slots
/// whose every material is invisible.
pub fn visible_drawables(graph: &SceneGraph) -> Vec<(NodeId, Matrix4<f32>)> {
    let mut out = Vec::new();
    let mut stack = vec![(graph.root(), Matrix4::identity())];
    while let Some((id, parent)) = stack.pop() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        if !node.visible {
            continue;
        }
        let world = parent * node.transform.matrix();
        if let Some(mesh) = node.drawable() {
            let shown = mesh.materials.is_empty()
                || mesh
                    .materials
                    .iter()
                    .any(|m| graph.material(*m).is_some_and(|m| m.visible));
            if shown {
                out.push((id, world));
            }
        }
        stack.extend(node.children().iter().rev().map(|c| (*c, world)));
    }
    out
}

pub struct HeadlessRenderer {
    canvas: ElementId,
    width: u32,
    height: u32,
    config: RendererConfig,
    context_lost: bool,
    frames: u64,
}

impl HeadlessRenderer {
    pub fn new(container: &mut dyn Container, config: &RendererConfig) -> ViewerResult<Self> {
        if !config.pixel_ratio.is_finite() || config.pixel_ratio <= 0.0 {
            return Err(ViewerError::RendererInit(format!(
                "pixel ratio {} must be positive",
                config.pixel_ratio
            )));
        }
        let (width, height) = container.size();
        let canvas = container.append_element(ElementKind::Canvas);
        info!(
            "Headless renderer {}x{} ({:?}, {:?})",
            width, height, config.shadow_map, config.tone_mapping
        );
        Ok(Self {
            canvas,
            width,
            height,
            config: config.clone(),
            context_lost: false,
            frames: 0,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    fn pixel_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.config.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }

    fn clear_color(&self, graph: &SceneGraph, image: &mut RgbaImage) {
        match graph.background {
            Background::Color { color, opacity } => {
                let alpha = if self.config.alpha { opacity } else { 1.0 };
                let px = Rgba(color.to_rgba8(alpha));
                for p in image.pixels_mut() {
                    *p = px;
                }
            }
            Background::Image { texture, opacity } => {
                let Some(tex) = graph.texture(texture).filter(|t| t.width > 0 && t.height > 0) else {
                    return;
                };
                let (w, h) = image.dimensions();
                for (x, y, p) in image.enumerate_pixels_mut() {
                    let tx = (x as u64 * tex.width as u64 / w as u64) as u32;
                    let ty = (y as u64 * tex.height as u64 / h as u64) as u32;
                    let i = ((ty * tex.width + tx) * 4) as usize;
                    if let Some(s) = tex.pixels.get(i..i + 4) {
                        *p = Rgba([s[0], s[1], s[2], (s[3] as f32 * opacity.clamp(0.0, 1.0)) as u8]);
                    }
                }
            }
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn canvas(&self) -> ElementId {
        self.canvas
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn render(&mut self, graph: &SceneGraph, _camera: &PerspectiveCamera) -> FrameStats {
        if self.context_lost {
            return FrameStats::default();
        }
        let mut stats = FrameStats::default();
        for (id, _) in visible_drawables(graph) {
            let Some(geometry) = graph
                .node(id)
                .and_then(|n| n.drawable())
                .and_then(|m| graph.geometry(m.geometry))
            else {
                continue;
            };
            stats.draw_calls += 1;
            stats.vertex_count += geometry.vertex_count() as u32;
        }
        self.frames += 1;
        stats
    }

    fn capture(&mut self, graph: &SceneGraph, camera: &PerspectiveCamera) -> anyhow::Result<RgbaImage> {
        if self.context_lost {
            anyhow::bail!("rendering context was lost");
        }
        let (w, h) = self.pixel_size();
        let mut image = RgbaImage::new(w, h);
        self.clear_color(graph, &mut image);

        let view_proj = camera.build_view_projection_matrix();
        for (id, world) in visible_drawables(graph) {
            let Some(mesh) = graph.node(id).and_then(|n| n.drawable()) else {
                continue;
            };
            let Some(geometry) = graph.geometry(mesh.geometry) else {
                continue;
            };
            let base = mesh
                .materials
                .first()
                .and_then(|m| graph.material(*m))
                .map(|m| m.color.to_rgba8(m.opacity));
            let mvp = view_proj * world;
            for (i, p) in geometry.positions.iter().enumerate() {
                let clip = mvp * Vector4::new(p[0], p[1], p[2], 1.0);
                if clip.w <= 0.0 {
                    continue;
                }
                let (nx, ny) = (clip.x / clip.w, clip.y / clip.w);
                if !(-1.0..=1.0).contains(&nx) || !(-1.0..=1.0).contains(&ny) {
                    continue;
                }
                let x = (((nx + 1.0) * 0.5 * w as f32) as u32).min(w - 1);
                let y = (((1.0 - ny) * 0.5 * h as f32) as u32).min(h - 1);
                let rgba = match geometry.colors.get(i) {
                    Some(c) => [
                        (c[0].clamp(0.0, 1.0) * 255.0) as u8,
                        (c[1].clamp(0.0, 1.0) * 255.0) as u8,
                        (c[2].clamp(0.0, 1.0) * 255.0) as u8,
                        255,
                    ],
                    None => base.unwrap_or([255; 4]),
                };
                image.put_pixel(x, y, Rgba(rgba));
            }
        }
        self.frames += 1;
        Ok(image)
    }

    fn force_context_loss(&mut self) {
        if !self.context_lost {
            debug!("Headless renderer context lost");
        }
        self.context_lost = true;
    }

    fn frames_rendered(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::color::Color;
    use crate::gfx::geometry::generate_cube;
    use crate::gfx::resources::material::{Material, MaterialKind};
    use crate::gfx::scene::{Mesh, Node, NodeKind};
    use crate::surface::HeadlessContainer;
    use cgmath::Vector3;

    fn scene() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let geometry = graph.add_geometry(generate_cube());
        let material = graph.add_material(Material::new("red", MaterialKind::Basic).with_color(Color::from_hex(0xff0000)));
        let id = graph.add_node(Node::new("cube", NodeKind::Mesh(Mesh::new(geometry, material))));
        graph.add_to_root(id);
        (graph, id)
    }

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0);
        camera.position = Vector3::new(0.0, 0.0, 5.0);
        camera
    }

    #[test]
    fn test_new_appends_canvas() {
        let mut container = HeadlessContainer::new(320, 240);
        let renderer = HeadlessRenderer::new(&mut container, &RendererConfig::default()).unwrap();
        assert!(container.contains(renderer.canvas()));
        assert_eq!(renderer.size(), (320, 240));
    }

    #[test]
    fn test_render_counts_visible_work() {
        let (mut graph, id) = scene();
        let mut container = HeadlessContainer::new(64, 64);
        let mut renderer = HeadlessRenderer::new(&mut container, &RendererConfig::default()).unwrap();

        let stats = renderer.render(&graph, &camera());
        assert_eq!(stats, FrameStats { draw_calls: 1, vertex_count: 24 });

        graph.node_mut(id).unwrap().visible = false;
        assert_eq!(renderer.render(&graph, &camera()).draw_calls, 0);
        assert_eq!(renderer.frames_rendered(), 2);
    }

    #[test]
    fn test_capture_draws_over_background() {
        let (graph, _) = scene();
        let mut container = HeadlessContainer::new(64, 64);
        let mut renderer = HeadlessRenderer::new(&mut container, &RendererConfig::default()).unwrap();
        let image = renderer.capture(&graph, &camera()).unwrap();
        assert_eq!(image.dimensions(), (64, 64));
        assert_eq!(image.get_pixel(0, 0).0, Color::from_hex(0xf0f2f5).to_rgba8(1.0));
        assert!(image.pixels().any(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn test_context_loss() {
        let (graph, _) = scene();
        let mut container = HeadlessContainer::new(8, 8);
        let mut renderer = HeadlessRenderer::new(&mut container, &RendererConfig::default()).unwrap();
        renderer.force_context_loss();
        assert_eq!(renderer.render(&graph, &camera()), FrameStats::default());
        assert!(renderer.capture(&graph, &camera()).is_err());
    }

    #[test]
    fn test_bad_pixel_ratio() {
        let mut container = HeadlessContainer::new(8, 8);
        let config = RendererConfig {
            pixel_ratio: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            HeadlessRenderer::new(&mut container, &config),
            Err(ViewerError::RendererInit(_))
        ));
        assert_eq!(container.count(ElementKind::Canvas), 0);
    }
}
