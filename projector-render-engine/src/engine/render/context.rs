use std::collections::HashMap;
use std::sync::Arc;

use bevy::math::Vec3;

use crate::engine::camera::{CameraType, ProjectorCamera};

/// Labels to draw for a subset of points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelRenderParams {
    pub point_indices: Vec<usize>,
    pub label_strings: Vec<String>,
    pub scale_factors: Vec<f32>,
    pub use_scene_opacity_flags: Vec<bool>,
    pub default_font_size: f32,
    /// RGB bytes per label.
    pub fill_colors: Vec<u8>,
    pub stroke_colors: Vec<u8>,
}

/// Per-frame snapshot handed to every visualizer. Read only.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub camera: ProjectorCamera,
    pub camera_type: CameraType,
    pub camera_target: Vec3,
    pub screen_width: f32,
    pub screen_height: f32,
    pub nearest_camera_space_point_z: f32,
    pub farthest_camera_space_point_z: f32,
    pub background_color: u32,
    pub point_colors: Option<Arc<[f32]>>,
    pub point_scale_factors: Option<Arc<[f32]>>,
    pub labels: Option<Arc<LabelRenderParams>>,
    pub polyline_colors: Option<Arc<HashMap<usize, Vec<f32>>>>,
    pub polyline_opacities: Option<Arc<[f32]>>,
    pub polyline_widths: Option<Arc<[f32]>>,
}
