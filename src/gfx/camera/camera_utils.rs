use cgmath::Matrix4;
use log::{debug, error};

use super::perspective::PerspectiveCamera;
use crate::config::CameraConfig;
use crate::error::{ViewerError, ViewerResult};

pub trait Camera: Sized {
    fn build_view_projection_matrix(&self) -> Matrix4<f32>;
}

/// Owns the scene camera and the configuration it is built from
pub struct CameraManager {
    config: CameraConfig,
    camera: Option<PerspectiveCamera>,
}

impl CameraManager {
    pub fn new(config: CameraConfig) -> Self {
        Self { config, camera: None }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    fn validate(&self, aspect: f32) -> Result<(), String> {
        let c = &self.config;
        if !aspect.is_finite() || aspect <= 0.0 {
            return Err(format!("aspect ratio {aspect} must be positive"));
        }
        if !c.fov.is_finite() || c.fov <= 0.0 || c.fov >= 180.0 {
            return Err(format!("fov {} must be within (0, 180)", c.fov));
        }
        if !c.near.is_finite() || c.near <= 0.0 {
            return Err(format!("near plane {} must be positive", c.near));
        }
        if !c.far.is_finite() || c.far <= c.near {
            return Err(format!("far plane {} must exceed near plane {}", c.far, c.near));
        }
        Ok(())
    }

    /// Builds the camera at its configured position, looking at the target
    ///
    /// # Arguments
    /// * `aspect` - Viewport width divided by height
    ///
    /// # Errors
    /// `InvalidCamera` when the aspect or configured projection is unusable;
    /// any previous camera is left in place.
    pub fn create(&mut self, aspect: f32) -> ViewerResult<&PerspectiveCamera> {
        if let Err(reason) = self.validate(aspect) {
            error!("Failed to create camera: {}", reason);
            return Err(ViewerError::InvalidCamera(reason));
        }

        let mut camera = PerspectiveCamera::new(self.config.fov, aspect, self.config.near, self.config.far);
        camera.position = self.config.position.into();
        camera.look_at(self.config.target.into());
        debug!("Camera created (fov {}, aspect {:.3})", camera.fov, aspect);
        Ok(self.camera.insert(camera))
    }

    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> Option<&mut PerspectiveCamera> {
        self.camera.as_mut()
    }

    /// No-op without a camera or for a degenerate aspect
    pub fn update_aspect(&mut self, aspect: f32) {
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        if aspect.is_finite() && aspect > 0.0 {
            camera.aspect = aspect;
        }
    }

    /// Restores the configured position and look-at target
    pub fn reset(&mut self) -> bool {
        let Some(camera) = self.camera.as_mut() else {
            return false;
        };
        camera.position = self.config.position.into();
        camera.look_at(self.config.target.into());
        true
    }

    /// Drops the camera; scene graph cleanup is the caller's concern
    pub fn dispose(&mut self) {
        self.camera = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    #[test]
    fn test_create_uses_config() {
        let mut manager = CameraManager::new(CameraConfig::default());
        let camera = manager.create(16.0 / 9.0).unwrap();
        assert_eq!(camera.fov, 75.0);
        assert_eq!(camera.position, Vector3::new(0.0, 100.0, 200.0));
        assert_eq!(camera.target, Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_invalid_parameters() {
        let mut manager = CameraManager::new(CameraConfig::default());
        assert!(matches!(manager.create(0.0), Err(ViewerError::InvalidCamera(_))));
        assert!(matches!(manager.create(f32::NAN), Err(ViewerError::InvalidCamera(_))));
        assert!(manager.camera().is_none());

        let config = CameraConfig {
            near: 10.0,
            far: 5.0,
            ..Default::default()
        };
        let mut manager = CameraManager::new(config);
        assert!(manager.create(1.0).is_err());
    }

    #[test]
    fn test_update_aspect_and_reset() {
        let mut manager = CameraManager::new(CameraConfig::default());
        manager.update_aspect(2.0);
        assert!(!manager.reset());

        manager.create(1.0).unwrap();
        manager.update_aspect(2.0);
        manager.update_aspect(-1.0);
        assert_eq!(manager.camera().unwrap().aspect, 2.0);

        manager.camera_mut().unwrap().position = Vector3::new(5.0, 5.0, 5.0);
        assert!(manager.reset());
        assert_eq!(manager.camera().unwrap().position, Vector3::new(0.0, 100.0, 200.0));

        manager.dispose();
        assert!(manager.camera().is_none());
    }
}
