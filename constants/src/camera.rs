/// The length of the cube (diameter of the circumscribing sphere) where all
/// the points live.
pub const CUBE_LENGTH: f32 = 2.0;

/// Orbit controls may not dolly further away than this from the target.
pub const MAX_ZOOM: f32 = 5.0 * CUBE_LENGTH;

/// Orbit controls may not dolly closer than this to the target.
pub const MIN_ZOOM: f32 = 0.025 * CUBE_LENGTH;

/// Vertical field of view of the 3D camera, in degrees.
pub const PERSP_CAMERA_FOV_VERTICAL: f32 = 70.0;
pub const PERSP_CAMERA_NEAR_CLIP_PLANE: f32 = 0.01;
pub const PERSP_CAMERA_FAR_CLIP_PLANE: f32 = 100.0;

/// Half extent of the 2D camera frustum along its shorter viewport side.
pub const ORTHO_CAMERA_FRUSTUM_HALF_EXTENT: f32 = 1.2;
pub const ORTHO_CAMERA_NEAR_CLIP_PLANE: f32 = -1000.0;
pub const ORTHO_CAMERA_FAR_CLIP_PLANE: f32 = 1000.0;

pub const START_CAMERA_POS_3D: [f32; 3] = [0.45, 0.9, 1.6];
pub const START_CAMERA_TARGET_3D: [f32; 3] = [0.0, 0.0, 0.0];
pub const START_CAMERA_POS_2D: [f32; 3] = [0.0, 0.0, 4.0];
pub const START_CAMERA_TARGET_2D: [f32; 3] = [0.0, 0.0, 0.0];

/// Rotate speed while the user drags the camera.
pub const ORBIT_MOUSE_ROTATION_SPEED: f32 = 1.0;

/// Rotate speed while the orbit animation is running.
pub const ORBIT_ANIMATION_ROTATION_CYCLE_IN_SECONDS: f32 = 7.0;

/// Default auto-rotate speed of the orbit controls (one turn per 30s at 60fps).
pub const ORBIT_AUTO_ROTATE_SPEED: f32 = 2.0;

/// Scale applied per wheel notch when dollying.
pub const ORBIT_ZOOM_SCALE: f32 = 0.95;
