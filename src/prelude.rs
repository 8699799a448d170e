//! # Model Viewer Prelude
//!
//! Commonly used types in one import.
//!
//! ## Usage
//!
//! ```no_run
//! use model_viewer::prelude::*;
//!
//! fn main() -> ViewerResult<()> {
//!     let mut ctx = model_viewer::default();
//!     ctx.mount(Box::new(HeadlessContainer::new(1280, 720)));
//!     let token = pollster::block_on(ctx.init_scene("assets/helmet.glb"))?;
//!     ctx.frame(token, 1.0 / 60.0);
//!     ctx.dispatch(SceneCommand::ToggleGrid(true));
//!     Ok(())
//! }
//! ```

// Re-export core application types
pub use crate::app::{CommandOutcome, LoopToken, SceneContext};
pub use crate::config::ViewerConfig;
pub use crate::default;
pub use crate::error::{ViewerError, ViewerResult};
pub use crate::events::{EventBus, SceneCommand, SceneEvent};

// Re-export graphics and scene types
pub use crate::gfx::camera::{CameraManager, ControlsManager, PerspectiveCamera};
pub use crate::gfx::color::Color;
pub use crate::gfx::lights::{LightRig, LightRole, LightUpdate};
pub use crate::gfx::render::{HeadlessRenderer, Renderer};
pub use crate::gfx::resources::material::{Material, MaterialKind};
pub use crate::gfx::scene::{Node, NodeId, SceneGraph};

// Re-export loading and playback
pub use crate::animation::{AnimationController, PlaybackState};
pub use crate::loader::source::{AssetSource, FileSource, MemorySource};
pub use crate::loader::{LoaderOptions, LoaderRegistry, ModelFileType};

// Re-export performance monitoring
pub use crate::performance::{PerformanceMetrics, PerformanceMonitor};

pub use crate::surface::{Container, HeadlessContainer};

// Re-export common external dependencies
pub use cgmath::{InnerSpace, Vector3, Zero};
