use std::sync::Arc;

use constants::point_shader::RGB_NUM_ELEMENTS;

use super::ScatterPlotVisualizer;
use crate::engine::camera::CameraType;
use crate::engine::picking::encode_point_id;
use crate::engine::render::shaders::{Fog, default_point_size, fog_distances};
use crate::engine::render::{NodeId, PointMaterial, PointsNode, RenderContext, Scene, SceneNode, SpriteSheet};

/// Draws every point as a sprite: a filled circle, or an atlas tile when a
/// sprite sheet is set.
#[derive(Default)]
pub struct PointsVisualizer {
    node: Option<NodeId>,
    positions: Option<Arc<[f32]>>,
    picking_colors: Option<Arc<[f32]>>,
    sprites: Option<Arc<SpriteSheet>>,
    standin_colors: Option<Arc<[f32]>>,
    viewport: (f32, f32),
}

impl PointsVisualizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn viewport(&self) -> (f32, f32) {
        self.viewport
    }

    fn point_count(&self) -> usize {
        self.positions.as_ref().map_or(0, |p| p.len() / 3)
    }

    fn ensure_node(&mut self, scene: &mut Scene) {
        let Some(positions) = self.positions.clone() else {
            return;
        };
        if let Some(id) = self.node {
            if scene.get(id).is_some() {
                return;
            }
        }
        let colors = self.picking_colors.clone().unwrap_or_else(|| Arc::from(Vec::new()));
        self.node = Some(scene.add(SceneNode::Points(PointsNode {
            positions,
            colors,
            scale_factors: None,
            point_size: default_point_size(self.point_count(), true, self.sprites.is_some()),
            size_attenuation: true,
            sprites: self.sprites.clone(),
            material: PointMaterial::Picking,
        })));
    }

    fn points_mut<'a>(&self, scene: &'a mut Scene) -> Option<&'a mut PointsNode> {
        match scene.get_mut(self.node?)? {
            SceneNode::Points(points) => Some(points),
            _ => None,
        }
    }

    /// White for every point, used when no colours were provided.
    fn white(&mut self) -> Arc<[f32]> {
        let len = self.point_count() * RGB_NUM_ELEMENTS;
        match &self.standin_colors {
            Some(colors) if colors.len() == len => colors.clone(),
            _ => {
                let colors: Arc<[f32]> = Arc::from(vec![1.0; len]);
                self.standin_colors = Some(colors.clone());
                colors
            }
        }
    }

    fn apply_common(&self, points: &mut PointsNode, context: &RenderContext) {
        let is_3d = context.camera_type == CameraType::Perspective;
        points.sprites = self.sprites.clone();
        points.size_attenuation = is_3d;
        points.point_size = default_point_size(self.point_count(), is_3d, self.sprites.is_some());
        points.scale_factors = context.point_scale_factors.clone();
    }
}

fn picking_colors(point_count: usize) -> Arc<[f32]> {
    let mut colors = Vec::with_capacity(point_count * RGB_NUM_ELEMENTS);
    for id in 0..point_count {
        for channel in encode_point_id(id as u32) {
            colors.push(f32::from(channel) / 255.0);
        }
    }
    Arc::from(colors)
}

impl ScatterPlotVisualizer for PointsVisualizer {
    fn set_scene(&mut self, scene: &mut Scene) {
        self.ensure_node(scene);
    }

    fn on_resize(&mut self, width: f32, height: f32) {
        self.viewport = (width, height);
    }

    fn on_point_positions_changed(&mut self, scene: &mut Scene, positions: Option<&Arc<[f32]>>) {
        let Some(positions) = positions else {
            self.dispose(scene);
            self.positions = None;
            return;
        };

        let count_changed = self.point_count() != positions.len() / 3;
        self.positions = Some(positions.clone());
        if count_changed || self.picking_colors.is_none() {
            self.picking_colors = Some(picking_colors(self.point_count()));
        }

        let picking = self.picking_colors.clone();
        match self.points_mut(scene) {
            Some(points) => {
                points.positions = positions.clone();
                if let Some(colors) = picking {
                    points.colors = colors;
                }
            }
            None => self.ensure_node(scene),
        }
    }

    fn on_picking_render(&mut self, scene: &mut Scene, context: &RenderContext) {
        let Some(colors) = self.picking_colors.clone() else {
            return;
        };
        let Some(points) = self.points_mut(scene) else {
            return;
        };
        points.colors = colors;
        points.material = PointMaterial::Picking;
        self.apply_common(points, context);
    }

    fn on_render(&mut self, scene: &mut Scene, context: &RenderContext) {
        let colors = match &context.point_colors {
            Some(colors) => colors.clone(),
            None => self.white(),
        };
        let fog = fog_distances(
            context.camera_type == CameraType::Perspective,
            context.nearest_camera_space_point_z,
            context.farthest_camera_space_point_z,
            self.point_count(),
        )
        .map(|(near, far)| Fog::from_hex(context.background_color, near, far));

        let Some(points) = self.points_mut(scene) else {
            return;
        };
        points.colors = colors;
        points.material = PointMaterial::Visible { fog };
        self.apply_common(points, context);
    }

    fn dispose(&mut self, scene: &mut Scene) {
        if let Some(id) = self.node.take() {
            scene.remove(id);
        }
    }

    fn set_sprite_sheet(&mut self, sprites: Option<Arc<SpriteSheet>>) {
        self.sprites = sprites;
    }
}
