use std::f32::consts::{FRAC_PI_2, PI};

use cgmath::{InnerSpace, Vector3, Zero};
use log::{debug, error, warn};
use serde::Deserialize;

use super::perspective::PerspectiveCamera;
use crate::config::ControlsConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::surface::ElementId;

/// Keeps the orbit away from the poles where the view basis degenerates
const POLE_EPSILON: f32 = 1e-4;

/// Clamps applied every update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitBounds {
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angle measured from +Y, in radians
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
}

impl Default for OrbitBounds {
    fn default() -> Self {
        Self {
            min_distance: 1.0,
            max_distance: 1000.0,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
        }
    }
}

/// Orbit-style camera controller: rotate around a target, zoom, pan
///
/// Input accumulates as deltas; [`OrbitControls::update`] applies them to a
/// camera. With damping enabled each update applies a fraction of the
/// remaining delta, so motion eases out over several frames.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vector3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    /// 2.0 means one orbit every 30 seconds at 60 updates per second
    pub auto_rotate_speed: f32,
    pub bounds: OrbitBounds,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    surface: ElementId,
    yaw_delta: f32,
    pitch_delta: f32,
    scale: f32,
    pan_delta: (f32, f32),
}

impl OrbitControls {
    pub fn new(camera: &PerspectiveCamera, surface: ElementId) -> Self {
        Self {
            target: camera.target,
            enable_damping: false,
            damping_factor: 0.05,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            bounds: OrbitBounds::default(),
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            surface,
            yaw_delta: 0.0,
            pitch_delta: 0.0,
            scale: 1.0,
            pan_delta: (0.0, 0.0),
        }
    }

    pub fn surface(&self) -> ElementId {
        self.surface
    }

    /// Orbit by `dx` (around Y) and `dy` (toward the poles), in radians
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw_delta -= dx * self.rotate_speed;
        self.pitch_delta += dy * self.rotate_speed;
    }

    /// Positive `delta` moves closer to the target
    pub fn zoom(&mut self, delta: f32) {
        self.scale *= 0.95f32.powf(delta * self.zoom_speed);
    }

    /// Pan relative to the view; scaled by distance so it feels the same at
    /// any zoom level
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pan_delta.0 += dx * self.pan_speed;
        self.pan_delta.1 += dy * self.pan_speed;
    }

    fn auto_rotation_angle(&self) -> f32 {
        2.0 * PI / 60.0 / 60.0 * self.auto_rotate_speed
    }

    fn has_pending_motion(&self) -> bool {
        self.yaw_delta.abs() > f32::EPSILON
            || self.pitch_delta.abs() > f32::EPSILON
            || (self.scale - 1.0).abs() > f32::EPSILON
            || self.pan_delta.0.abs() > f32::EPSILON
            || self.pan_delta.1.abs() > f32::EPSILON
    }

    /// Applies pending input to `camera`; returns whether the camera moved
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        if self.auto_rotate {
            self.yaw_delta -= self.auto_rotation_angle();
        }

        let offset = camera.position - self.target;
        let radius = offset.magnitude();
        let (mut yaw, mut pitch) = if radius > f32::EPSILON {
            (offset.x.atan2(offset.z), (offset.y / radius).clamp(-1.0, 1.0).asin())
        } else {
            (0.0, 0.0)
        };

        let factor = if self.enable_damping {
            self.damping_factor.clamp(0.0, 1.0)
        } else {
            1.0
        };
        yaw += self.yaw_delta * factor;
        pitch += self.pitch_delta * factor;

        // polar = PI/2 - pitch
        let min_pitch = (FRAC_PI_2 - self.bounds.max_polar_angle).max(-FRAC_PI_2 + POLE_EPSILON);
        let max_pitch = (FRAC_PI_2 - self.bounds.min_polar_angle).min(FRAC_PI_2 - POLE_EPSILON);
        pitch = pitch.clamp(min_pitch, max_pitch.max(min_pitch));

        let distance = (radius * self.scale).clamp(
            self.bounds.min_distance,
            self.bounds.max_distance.max(self.bounds.min_distance),
        );

        let (px, py) = (self.pan_delta.0 * factor, self.pan_delta.1 * factor);
        if px != 0.0 || py != 0.0 {
            let forward = (self.target - camera.position).normalize();
            let right = forward.cross(camera.up).normalize();
            let up = right.cross(forward).normalize();
            let pan_scale = distance * 0.1;
            let movement = right * px * pan_scale + up * py * pan_scale;
            if movement.x.is_finite() && movement.y.is_finite() && movement.z.is_finite() {
                self.target += movement;
            }
        }

        let previous = camera.position;
        camera.position = calculate_cartesian_eye_position(pitch, yaw, distance, self.target);
        camera.look_at(self.target);

        if self.enable_damping {
            let keep = 1.0 - factor;
            self.yaw_delta *= keep;
            self.pitch_delta *= keep;
            self.pan_delta = (self.pan_delta.0 * keep, self.pan_delta.1 * keep);
        } else {
            self.yaw_delta = 0.0;
            self.pitch_delta = 0.0;
            self.pan_delta = (0.0, 0.0);
        }
        self.scale = 1.0;

        (camera.position - previous).magnitude2() > 1e-12
    }

    /// Returns the target to the origin and drops pending input
    pub fn reset(&mut self) {
        self.target = Vector3::zero();
        self.yaw_delta = 0.0;
        self.pitch_delta = 0.0;
        self.scale = 1.0;
        self.pan_delta = (0.0, 0.0);
    }

    pub fn is_settled(&self) -> bool {
        !self.has_pending_motion()
    }
}

fn calculate_cartesian_eye_position(pitch: f32, yaw: f32, distance: f32, target: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(
        distance * yaw.sin() * pitch.cos(),
        distance * pitch.sin(),
        distance * yaw.cos() * pitch.cos(),
    ) + target
}

/// Runtime overrides merged onto a live controller
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlsOverrides {
    pub enable_damping: Option<bool>,
    pub damping_factor: Option<f32>,
    pub auto_rotate: Option<bool>,
    pub auto_rotate_speed: Option<f32>,
    pub min_polar_angle: Option<f32>,
    pub max_polar_angle: Option<f32>,
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
}

impl From<&ControlsConfig> for ControlsOverrides {
    fn from(c: &ControlsConfig) -> Self {
        Self {
            enable_damping: Some(c.enable_damping),
            damping_factor: Some(c.damping_factor),
            auto_rotate: Some(c.auto_rotate),
            auto_rotate_speed: Some(c.auto_rotate_speed),
            min_polar_angle: Some(c.min_polar_angle),
            max_polar_angle: Some(c.max_polar_angle),
            min_distance: Some(c.min_distance),
            max_distance: Some(c.max_distance),
        }
    }
}

/// Owns the orbit controller bound to the render surface
pub struct ControlsManager {
    config: ControlsConfig,
    controls: Option<OrbitControls>,
}

impl ControlsManager {
    pub fn new(config: ControlsConfig) -> Self {
        Self { config, controls: None }
    }

    /// Binds a controller to `surface`, orbiting the camera's target
    ///
    /// # Errors
    /// `UninitializedResource` when there is no camera yet.
    pub fn create(&mut self, camera: Option<&PerspectiveCamera>, surface: ElementId) -> ViewerResult<&OrbitControls> {
        let Some(camera) = camera else {
            error!("Cannot create controls without a camera");
            return Err(ViewerError::uninitialized("camera"));
        };
        let mut controls = OrbitControls::new(camera, surface);
        apply_overrides(&mut controls, &ControlsOverrides::from(&self.config));
        debug!("Orbit controls bound to {:?}", surface);
        Ok(self.controls.insert(controls))
    }

    pub fn controls(&self) -> Option<&OrbitControls> {
        self.controls.as_ref()
    }

    pub fn controls_mut(&mut self) -> Option<&mut OrbitControls> {
        self.controls.as_mut()
    }

    /// Returns `false` when there is no controller to update
    pub fn apply_options(&mut self, overrides: &ControlsOverrides) -> bool {
        match self.controls.as_mut() {
            Some(controls) => {
                apply_overrides(controls, overrides);
                true
            }
            None => {
                warn!("Controls options ignored: controls not created");
                false
            }
        }
    }

    /// Advances damping; does nothing when damping is off
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        match self.controls.as_mut() {
            Some(controls) if controls.enable_damping => controls.update(camera),
            _ => false,
        }
    }

    fn with_input(&mut self, camera: &mut PerspectiveCamera, input: impl FnOnce(&mut OrbitControls)) {
        let Some(controls) = self.controls.as_mut() else {
            return;
        };
        input(controls);
        // Undamped input lands immediately, like a pointer handler would
        if !controls.enable_damping {
            controls.update(camera);
        }
    }

    pub fn rotate(&mut self, camera: &mut PerspectiveCamera, dx: f32, dy: f32) {
        self.with_input(camera, |c| c.rotate(dx, dy));
    }

    pub fn zoom(&mut self, camera: &mut PerspectiveCamera, delta: f32) {
        self.with_input(camera, |c| c.zoom(delta));
    }

    pub fn pan(&mut self, camera: &mut PerspectiveCamera, dx: f32, dy: f32) {
        self.with_input(camera, |c| c.pan(dx, dy));
    }

    pub fn reset(&mut self) {
        if let Some(controls) = self.controls.as_mut() {
            controls.reset();
        }
    }

    /// Releases the controller and its surface binding
    pub fn dispose(&mut self) -> Option<ElementId> {
        let surface = self.controls.take().map(|c| c.surface());
        if let Some(surface) = surface {
            debug!("Orbit controls released from {:?}", surface);
        }
        surface
    }
}

fn apply_overrides(controls: &mut OrbitControls, o: &ControlsOverrides) {
    if let Some(v) = o.enable_damping {
        controls.enable_damping = v;
    }
    if let Some(v) = o.damping_factor {
        controls.damping_factor = v.clamp(0.0, 1.0);
    }
    if let Some(v) = o.auto_rotate {
        controls.auto_rotate = v;
    }
    if let Some(v) = o.auto_rotate_speed {
        controls.auto_rotate_speed = v;
    }
    let b = &mut controls.bounds;
    if let Some(v) = o.min_polar_angle {
        b.min_polar_angle = v.clamp(0.0, PI);
    }
    if let Some(v) = o.max_polar_angle {
        b.max_polar_angle = v.clamp(0.0, PI);
    }
    if let Some(v) = o.min_distance {
        b.min_distance = v.max(0.0);
        b.max_distance = b.max_distance.max(b.min_distance);
    }
    if let Some(v) = o.max_distance {
        b.max_distance = v.max(b.min_distance);
    }
}
