//! # Animation
//!
//! Keyframe clips, a mixer that binds them to a model's node tree, and the
//! transport controller the viewer exposes to hosts.
//!
//! ## Usage
//!
//! ```rust
//! use model_viewer::animation::{AnimationController, AnimationMixer};
//! use model_viewer::gfx::scene::{Node, SceneGraph};
//!
//! let mut graph = SceneGraph::new();
//! let model = graph.add_node(Node::group("model"));
//! let mut mixer = AnimationMixer::new(model);
//! let mut controller = AnimationController::new();
//!
//! // No clips: start is a no-op and playback stays idle
//! controller.start(&mut mixer, &[], &mut graph);
//! assert!(!controller.is_playing());
//! ```

pub mod clip;
pub mod controller;
pub mod mixer;

pub use clip::{AnimationClip, Interpolation, KeyframeTrack, Sample, TrackProperty, TrackValues};
pub use controller::{AnimationController, PlaybackState};
pub use mixer::{ActionId, AnimationAction, AnimationError, AnimationMixer, LoopMode};
