//! Scene resources
//!
//! Materials, textures and the name-indexed registry used for editing.

pub mod material;
pub mod registry;
pub mod texture;

// Re-export main types
pub use material::{Material, MaterialKind};
pub use registry::{MaterialProperty, MaterialRegistry, TextureRequest};
pub use texture::{Texture, TextureLoader};
