/// Clear colour of both the canvas and the picking target.
pub const BACKGROUND_COLOR: u32 = 0xFF_FFFF;

/// Length of each arm of the 3D axes helper.
pub const AXES_HELPER_SIZE: f32 = 1.0;

/// Offset of the point light from the camera on the x and y axes.
pub const LIGHT_CAMERA_OFFSET: f32 = 1.0;

pub const DEFAULT_VIEWPORT_WIDTH: u32 = 800;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 600;
