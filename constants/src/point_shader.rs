/// Fog grows with the number of points until this count.
pub const NUM_POINTS_FOG_THRESHOLD: usize = 5000;

/// Floor applied to every emitted point size, in device pixels.
pub const MIN_POINT_SIZE: f32 = 5.0;

/// Point size used when points are drawn as sprite images.
pub const IMAGE_SIZE: f32 = 30.0;

// Default point size scales inverse-logarithmically with the point count.
pub const POINT_SIZE_SCALE: f32 = 200.0;
pub const POINT_SIZE_LOG_BASE: f32 = 8.0;
pub const POINT_SIZE_2D_DIVISOR: f32 = 1.5;

// 2D zoom curve.
pub const ZOOM_MIN_SCALE: f32 = 0.1;
pub const ZOOM_OUT_SPEED: f32 = 2.0;
pub const ZOOM_MAX_SCALE: f32 = 15.0;
pub const ZOOM_IN_SPEED: f32 = 0.02;
pub const ZOOM_OFFSET: f32 = 0.3;

/// Number of packed elements per point in each attribute buffer.
pub const RGB_NUM_ELEMENTS: usize = 3;
pub const XYZ_NUM_ELEMENTS: usize = 3;
