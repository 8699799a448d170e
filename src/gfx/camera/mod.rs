pub mod camera_utils;
pub mod orbit_controls;
pub mod perspective;

// Re-export main types
pub use camera_utils::{Camera, CameraManager};
pub use orbit_controls::{ControlsManager, ControlsOverrides, OrbitBounds, OrbitControls};
pub use perspective::PerspectiveCamera;
