//! Model Viewer
//!
//! Scene orchestration core for an embeddable 3D model viewer: camera, orbit
//! controls, light rig, environment helpers, GLTF/GLB/OBJ/STL loading,
//! material editing and animation playback. Rasterization sits behind the
//! [`gfx::render::Renderer`] trait.

pub mod animation;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod gfx;
pub mod loader;
pub mod performance;
pub mod prelude;
pub mod surface;

// Re-export main types for convenience
pub use app::SceneContext;
pub use config::ViewerConfig;
pub use error::{ViewerError, ViewerResult};

/// Creates a context with the default configuration
pub fn default() -> SceneContext {
    SceneContext::new(ViewerConfig::default())
}
