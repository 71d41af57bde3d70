//! GPU presentation of the scene.
//!
//! [`GpuSceneRenderer`] records every pass into a [`FrameSnapshot`] shared
//! with the Bevy world through [`GpuFrames`]. The point sprite plugin turns
//! the snapshot into meshes drawn with
//! [`super::point_material::PointSpriteMaterial`]; picking ids come back
//! through a texture readback into the plot's [`PickingTexture`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bevy::math::{Mat4, UVec2, Vec2, Vec3};
use bevy::prelude::Resource;
use constants::render_settings::BACKGROUND_COLOR;

use super::renderer::{SceneRenderer, device_size};
use super::scene::{PointsNode, Scene, SceneNode};
use crate::engine::camera::ProjectorCamera;
use crate::engine::picking::PickingTexture;

/// Drawable content of one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSnapshot {
    pub layers: Vec<PointsNode>,
    /// Arm length of the axes helper, when shown.
    pub axes: Option<f32>,
}

impl PassSnapshot {
    pub fn capture(scene: &Scene) -> Self {
        let mut pass = Self::default();
        for node in scene.nodes() {
            match node {
                SceneNode::Points(points) => pass.layers.push(points.clone()),
                SceneNode::Axes { size } => pass.axes = Some(*size),
                SceneNode::Light { .. } => {}
            }
        }
        pass
    }
}

/// Everything the GPU needs to draw the latest frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    /// Bumped whenever the snapshot changes.
    pub generation: u64,
    pub view: Mat4,
    pub projection: Mat4,
    /// Device pixels.
    pub viewport: UVec2,
    /// 0xRRGGBB
    pub clear_color: u32,
    pub night_mode: bool,
    pub picking: PassSnapshot,
    pub visible: PassSnapshot,
}

impl Default for FrameSnapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            viewport: UVec2::ONE,
            clear_color: BACKGROUND_COLOR,
            night_mode: false,
            picking: PassSnapshot::default(),
            visible: PassSnapshot::default(),
        }
    }
}

/// Latest [`FrameSnapshot`], written by the plot and read by render systems.
#[derive(Resource, Clone, Default)]
pub struct GpuFrames(Arc<Mutex<FrameSnapshot>>);

impl GpuFrames {
    fn lock(&self) -> MutexGuard<'_, FrameSnapshot> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The latest snapshot, if it is newer than `generation`.
    pub fn newer_than(&self, generation: u64) -> Option<FrameSnapshot> {
        let frame = self.lock();
        (frame.generation > generation).then(|| frame.clone())
    }

    fn update(&self, change: impl FnOnce(&mut FrameSnapshot)) {
        let mut frame = self.lock();
        change(&mut frame);
        frame.generation += 1;
    }
}

/// Scene renderer of the Bevy host.
///
/// Passes are recorded rather than drawn. [`SceneRenderer::frame`] stays
/// empty and the picking target is filled by the readback of the id pass.
pub struct GpuSceneRenderer {
    frames: GpuFrames,
    pixel_ratio: f32,
    size: Vec2,
    clear_color: u32,
    night_mode: bool,
}

impl GpuSceneRenderer {
    pub fn new(width: f32, height: f32, frames: GpuFrames) -> Self {
        let mut renderer = Self {
            frames,
            pixel_ratio: 1.0,
            size: Vec2::ONE,
            clear_color: BACKGROUND_COLOR,
            night_mode: false,
        };
        renderer.set_size(width, height);
        renderer
    }
}

impl SceneRenderer for GpuSceneRenderer {
    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio.max(f32::EPSILON);
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn set_size(&mut self, width: f32, height: f32) {
        self.size = Vec2::new(width.max(1.0), height.max(1.0));
    }

    fn size(&self) -> Vec2 {
        self.size
    }

    fn set_clear_color(&mut self, color: u32) {
        self.clear_color = color;
    }

    fn set_night_mode(&mut self, is_night: bool) {
        self.night_mode = is_night;
        self.frames.update(|frame| frame.night_mode = is_night);
    }

    fn render(&mut self, scene: &Scene, camera: &ProjectorCamera, target: Vec3) {
        let viewport = self.frame_size();
        let (clear_color, night_mode) = (self.clear_color, self.night_mode);
        self.frames.update(|frame| {
            frame.view = camera.view_matrix(target);
            frame.projection = camera.projection_matrix();
            frame.viewport = viewport;
            frame.clear_color = clear_color;
            frame.night_mode = night_mode;
            frame.visible = PassSnapshot::capture(scene);
        });
    }

    fn render_to_picking(
        &mut self,
        scene: &Scene,
        _camera: &ProjectorCamera,
        _target: Vec3,
        _texture: &mut PickingTexture,
    ) {
        self.frames
            .update(|frame| frame.picking = PassSnapshot::capture(scene));
    }

    fn frame(&self) -> &[u8] {
        &[]
    }

    fn frame_size(&self) -> UVec2 {
        device_size(self.size, self.pixel_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::camera::CameraDef;
    use crate::engine::render::PointMaterial;
    use pretty_assertions::assert_eq;

    fn points(material: PointMaterial) -> SceneNode {
        SceneNode::Points(PointsNode {
            positions: Arc::from(vec![0.0, 0.0, 0.0]),
            colors: Arc::from(vec![1.0, 0.0, 0.0]),
            scale_factors: None,
            point_size: 10.0,
            size_attenuation: true,
            sprites: None,
            material,
        })
    }

    #[test]
    fn passes_are_recorded_with_the_camera() {
        let frames = GpuFrames::default();
        let mut renderer = GpuSceneRenderer::new(200.0, 100.0, frames.clone());
        renderer.set_pixel_ratio(2.0);
        let camera = ProjectorCamera::from_def(&CameraDef::default_for(3), 200.0, 100.0);

        let mut scene = Scene::new();
        scene.add(points(PointMaterial::Picking));
        let mut texture = PickingTexture::new(400, 200);
        renderer.render_to_picking(&scene, &camera, Vec3::ZERO, &mut texture);

        let mut scene = Scene::new();
        scene.add(points(PointMaterial::Visible { fog: None }));
        scene.add(SceneNode::Axes { size: 0.5 });
        renderer.render(&scene, &camera, Vec3::ZERO);

        let frame = frames.newer_than(0).unwrap();
        assert_eq!(frame.generation, 2);
        assert_eq!(frame.viewport, UVec2::new(400, 200));
        assert_eq!(frame.projection, camera.projection_matrix());
        assert_eq!(frame.picking.layers[0].material, PointMaterial::Picking);
        assert_eq!(frame.picking.axes, None);
        assert_eq!(frame.visible.axes, Some(0.5));
        assert!(frames.newer_than(2).is_none());
        assert!(renderer.frame().is_empty());
        assert_eq!(texture, PickingTexture::new(400, 200));
    }

    #[test]
    fn night_mode_reaches_the_snapshot_without_a_render() {
        let frames = GpuFrames::default();
        let mut renderer = GpuSceneRenderer::new(10.0, 10.0, frames.clone());
        renderer.set_night_mode(true);
        let frame = frames.newer_than(0).unwrap();
        assert!(frame.night_mode);
    }
}
