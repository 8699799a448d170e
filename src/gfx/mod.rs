//! # Graphics Module
//!
//! Everything that makes up a viewable scene, independent of how it is
//! rasterized.
//!
//! ## Architecture Overview
//!
//! - **Camera System** ([`camera`]) - Perspective camera and damped orbit controls
//! - **Lighting** ([`lights`]) - Ambient, directional, point and spot light rig
//! - **Helpers** ([`helpers`]) - Grid, axes, floor and stats overlay
//! - **Scene Management** ([`scene`]) - Node hierarchy and resource arenas
//! - **Resource Management** ([`resources`]) - Materials, textures and the material registry
//! - **Rendering Seam** ([`render`]) - The [`render::Renderer`] trait and a headless implementation
//!
//! ## Usage
//!
//! ```rust
//! use model_viewer::config::LightsConfig;
//! use model_viewer::gfx::{lights::LightRig, scene::SceneGraph};
//!
//! let mut graph = SceneGraph::new();
//! let mut lights = LightRig::build(&LightsConfig::default(), &mut graph);
//! lights.attach(&mut graph);
//! ```

pub mod bounds;
pub mod camera;
pub mod color;
pub mod geometry;
pub mod helpers;
pub mod lights;
pub mod render;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use camera::{ControlsManager, OrbitControls, PerspectiveCamera};
pub use render::{HeadlessRenderer, Renderer};
