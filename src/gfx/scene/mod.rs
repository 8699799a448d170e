//! # Scene Graph
//!
//! The in-memory node tree composed for each frame, together with the arenas
//! holding the geometry, materials and textures its meshes reference.
//!
//! ## Key Components
//!
//! - [`SceneGraph`] - Node arena with a single root plus resource arenas
//! - [`Node`] - Named node with a kind, local transform and shadow flags
//! - [`Transform`] - Position, rotation and scale of a node
//!
//! ## Usage
//!
//! ```rust
//! use model_viewer::gfx::scene::{Node, SceneGraph};
//!
//! let mut graph = SceneGraph::new();
//! let group = graph.add_node(Node::group("model"));
//! graph.add_to_root(group);
//! assert!(graph.contains(group));
//! ```
//!
//! Handles are `slotmap` keys: removing a node or resource invalidates its id
//! and later lookups return `None` instead of aliasing a new entry.

pub mod graph;
pub mod node;

pub use graph::{Background, GeometryId, MaterialId, NodeId, SceneGraph, TextureId};
pub use node::{HelperKind, Mesh, Node, NodeKind, Transform};
