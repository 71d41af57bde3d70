//! Camera and orbit controls of the scatter plot.
//!
//! [`CameraManager`] owns the current [`ProjectorCamera`] (perspective in
//! 3D, orthographic in 2D), its [`OrbitControls`] and the orbit animation.
//! The animation is a repeating per-frame task identified by a token: the
//! host calls [`CameraManager::tick_orbit_animation`] once per frame and
//! stopping it only clears the token.

pub mod controls;
pub mod projector_camera;

use bevy::input::mouse::MouseButton;
use bevy::prelude::*;
use constants::camera::{
    MAX_ZOOM, MIN_ZOOM, ORBIT_ANIMATION_ROTATION_CYCLE_IN_SECONDS, ORBIT_MOUSE_ROTATION_SPEED,
    START_CAMERA_POS_2D, START_CAMERA_POS_3D, START_CAMERA_TARGET_2D, START_CAMERA_TARGET_3D,
};
use serde::{Deserialize, Serialize};

use crate::engine::math::vector::Point3D;
use crate::error::ProjectorError;

pub use controls::{Gesture, MouseButtonRoles, OrbitControls};
pub use projector_camera::{CameraType, Projection, ProjectorCamera};

/// Serialisable camera state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDef {
    #[serde(default)]
    pub orthographic: bool,
    pub position: Point3D,
    pub target: Point3D,
    #[serde(default = "default_zoom")]
    pub zoom: f32,
}

fn default_zoom() -> f32 {
    1.0
}

impl CameraDef {
    /// Start camera of a 2D or 3D scene. Any value other than 2 is 3D.
    pub fn default_for(dimensionality: u32) -> Self {
        if dimensionality == 2 {
            Self {
                orthographic: true,
                position: START_CAMERA_POS_2D,
                target: START_CAMERA_TARGET_2D,
                zoom: 1.0,
            }
        } else {
            Self {
                orthographic: false,
                position: START_CAMERA_POS_3D,
                target: START_CAMERA_TARGET_3D,
                zoom: 1.0,
            }
        }
    }
}

impl Default for CameraDef {
    fn default() -> Self {
        Self::default_for(3)
    }
}

/// Called with `(position, target)` when the user starts moving the camera.
pub type CameraMoveListener = Box<dyn Fn(Vec3, Vec3) + Send + Sync>;

pub struct CameraManager {
    dimensionality: u32,
    width: f32,
    height: f32,
    camera: ProjectorCamera,
    controls: OrbitControls,
    camera_def: Option<CameraDef>,
    orbit_animation_on_next_camera_creation: bool,
    orbit_animation_id: Option<u64>,
    next_animation_id: u64,
    move_listeners: Vec<CameraMoveListener>,
}

impl CameraManager {
    /// A 3D manager with the default camera for a `width × height` viewport.
    pub fn new(width: f32, height: f32) -> Self {
        let width = width.max(1.0);
        let height = height.max(1.0);
        let def = CameraDef::default_for(3);
        let camera = ProjectorCamera::from_def(&def, width, height);
        let controls = OrbitControls::new(&camera, Vec3::from_array(def.target), def.zoom, true);

        let mut manager = Self {
            dimensionality: 3,
            width,
            height,
            camera,
            controls,
            camera_def: None,
            orbit_animation_on_next_camera_creation: false,
            orbit_animation_id: None,
            next_animation_id: 0,
            move_listeners: Vec::new(),
        };
        manager.recreate_camera(&def);
        manager
    }

    pub fn dimensionality(&self) -> u32 {
        self.dimensionality
    }

    pub fn is_3d(&self) -> bool {
        self.dimensionality == 3
    }

    pub fn camera(&self) -> &ProjectorCamera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Switches between 2D and 3D, rebuilding the camera from the stashed
    /// definition or the mode default. A stashed definition of the other
    /// camera variant is ignored. Fails before touching any state.
    pub fn set_dimensions(&mut self, dimensionality: u32) -> Result<(), ProjectorError> {
        if dimensionality != 2 && dimensionality != 3 {
            return Err(ProjectorError::InvalidDimensionality(dimensionality));
        }
        self.dimensionality = dimensionality;
        let wants_orthographic = dimensionality == 2;
        let def = match &self.camera_def {
            Some(def) if def.orthographic == wants_orthographic => def.clone(),
            _ => CameraDef::default_for(dimensionality),
        };
        self.recreate_camera(&def);
        Ok(())
    }

    /// Builds the camera and fresh orbit controls from `def`.
    pub fn recreate_camera(&mut self, def: &CameraDef) {
        self.camera = ProjectorCamera::from_def(def, self.width, self.height);
        let is_3d = !def.orthographic;
        self.controls = OrbitControls::new(&self.camera, Vec3::from_array(def.target), def.zoom, is_3d);
        self.controls.reset(&mut self.camera);

        self.controls.min_distance = MIN_ZOOM;
        self.controls.max_distance = MAX_ZOOM;
        self.controls.screen_space_panning = true;
        self.controls.update(&mut self.camera);

        if self.orbit_animation_on_next_camera_creation {
            self.start_orbit_animation();
        }
    }

    /// Rebuilds the default camera of the current dimensionality.
    pub fn reset_zoom(&mut self) {
        let def = CameraDef::default_for(self.dimensionality);
        self.recreate_camera(&def);
    }

    pub fn get_camera_def(&self) -> CameraDef {
        CameraDef {
            orthographic: !self.is_3d(),
            position: self.camera.position.to_array(),
            target: self.controls.target.to_array(),
            zoom: self.camera.zoom,
        }
    }

    pub fn get_camera_position(&self) -> Point3D {
        self.camera.position.to_array()
    }

    pub fn get_camera_target(&self) -> Point3D {
        self.controls.target.to_array()
    }

    /// Stashes the definition and animation flag used the next time the
    /// camera is created.
    pub fn set_camera_parameters_for_next_camera_creation(
        &mut self,
        def: Option<CameraDef>,
        orbit_animation: bool,
    ) {
        self.camera_def = def;
        self.orbit_animation_on_next_camera_creation = orbit_animation;
    }

    pub fn set_camera_position_and_target(&mut self, position: Point3D, target: Point3D) {
        self.stop_orbit_animation();
        self.camera.position = Vec3::from_array(position);
        self.controls.target = Vec3::from_array(target);
        self.controls.update(&mut self.camera);
    }

    /// Starts orbiting around the current target. 3D only.
    pub fn start_orbit_animation(&mut self) {
        if !self.is_3d() {
            return;
        }
        if self.orbit_animation_id.is_some() {
            self.stop_orbit_animation();
        }
        self.controls.auto_rotate = true;
        self.controls.rotate_speed = ORBIT_ANIMATION_ROTATION_CYCLE_IN_SECONDS;
        self.update_orbit_animation();
    }

    fn update_orbit_animation(&mut self) {
        self.controls.update(&mut self.camera);
        self.orbit_animation_id = Some(self.next_animation_id);
        self.next_animation_id = self.next_animation_id.wrapping_add(1);
    }

    /// Runs one scheduled animation frame. Returns whether a frame ran.
    pub fn tick_orbit_animation(&mut self) -> bool {
        if self.orbit_animation_id.is_none() {
            return false;
        }
        self.update_orbit_animation();
        true
    }

    /// Cancels the pending animation frame. Safe to call at any time.
    pub fn stop_orbit_animation(&mut self) {
        self.controls.auto_rotate = false;
        self.controls.rotate_speed = ORBIT_MOUSE_ROTATION_SPEED;
        self.orbit_animation_id = None;
    }

    pub fn is_orbit_animating(&self) -> bool {
        self.orbit_animation_id.is_some()
    }

    /// Handle of the pending animation frame, if any.
    pub fn orbit_animation_id(&self) -> Option<u64> {
        self.orbit_animation_id
    }

    /// Swaps orbit and pan buttons while ctrl is held in 3D.
    pub fn set_ctrl_held(&mut self, held: bool) {
        if !self.is_3d() {
            return;
        }
        self.controls.mouse_buttons = if held {
            MouseButtonRoles::ORBIT_RIGHT
        } else {
            MouseButtonRoles::ORBIT_LEFT
        };
    }

    /// Reconciles the button roles with the modifier state seen on a mouse
    /// press, for a ctrl released while the window was unfocused. Returns
    /// whether the roles changed.
    pub fn sync_ctrl_on_press(&mut self, ctrl: bool) -> bool {
        if !self.is_3d() {
            return false;
        }
        let orbit = self.controls.mouse_buttons.orbit;
        if !ctrl && orbit == Some(MouseButton::Right) {
            self.controls.mouse_buttons = MouseButtonRoles::ORBIT_LEFT;
            true
        } else if ctrl && orbit == Some(MouseButton::Left) {
            self.controls.mouse_buttons = MouseButtonRoles::ORBIT_RIGHT;
            true
        } else {
            false
        }
    }

    /// Resizes the viewport. Orthographic frusta are scaled by the change so
    /// the current zoom level survives.
    pub fn resize(&mut self, width: f32, height: f32) {
        let (old_w, old_h) = (self.width, self.height);
        let new_w = width.max(1.0);
        let new_h = height.max(1.0);
        if self.is_3d() {
            self.camera.set_aspect(new_w / new_h);
        } else {
            self.camera.scale_frustum(new_w / old_w, new_h / old_h);
        }
        self.width = new_w;
        self.height = new_h;
    }

    pub fn add_camera_move_listener(&mut self, listener: CameraMoveListener) {
        self.move_listeners.push(listener);
    }

    /// Marks the start of a user camera gesture.
    pub fn begin_user_interaction(&mut self) {
        self.stop_orbit_animation();
        let (position, target) = (self.camera.position, self.controls.target);
        for listener in &self.move_listeners {
            listener(position, target);
        }
    }

    /// Applies a drag of `delta` pixels with `button`. Returns whether the
    /// camera moved.
    pub fn drag(&mut self, button: MouseButton, delta: Vec2) -> bool {
        if !self.controls.enabled {
            return false;
        }
        match self.controls.gesture_for(button) {
            Some(Gesture::Orbit) => self.controls.rotate(delta, self.height),
            Some(Gesture::Pan) => {
                let viewport = self.viewport();
                self.controls.pan(delta, &self.camera, viewport);
            }
            None => return false,
        }
        self.controls.update(&mut self.camera)
    }

    /// Applies a wheel step. Returns whether the camera changed.
    pub fn wheel(&mut self, delta_y: f32) -> bool {
        if !self.controls.enabled || delta_y == 0.0 {
            return false;
        }
        self.begin_user_interaction();
        let zoom = self.camera.zoom;
        self.controls.dolly(delta_y, &mut self.camera);
        let moved = self.controls.update(&mut self.camera);
        moved || self.camera.zoom != zoom
    }

    pub fn view_projection(&self) -> Mat4 {
        self.camera.view_projection(self.controls.target)
    }
}
