//! Scatter plot controller: owns the scene, camera, renderer and picking
//! target, drives the registered visualizers through both render passes
//! and turns pointer and keyboard input into camera moves, hover and
//! selection notifications.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::input::keyboard::KeyCode;
use bevy::input::mouse::MouseButton;
use bevy::prelude::*;
use constants::picking::{
    BOUNDING_BOX_CAUSE, BOX_SELECTION_LIMIT_WARNING, HOVER_BOX_SIZE, UNDO_LIMIT_WARNING,
};
use constants::render_settings::{AXES_HELPER_SIZE, BACKGROUND_COLOR, LIGHT_CAMERA_OFFSET};

use crate::engine::camera::{CameraDef, CameraManager, CameraMoveListener};
use crate::engine::events::ProjectorEventContext;
use crate::engine::interaction::{CursorStyle, MouseMode, RectangleSelector, ScatterBoundingBox};
use crate::engine::math::vector::{Point3D, get_near_far_points};
use crate::engine::picking::{
    PickingTexture, nearest_point_in_box, point_indices_in_box, select_in_box,
};
use crate::engine::render::{
    LabelRenderParams, NodeId, RenderContext, Scene, SceneNode, SceneRenderer, SpriteSheet,
};
use crate::engine::visualizers::ScatterPlotVisualizer;
use crate::error::ProjectorError;

const AXES_NODE_NAME: &str = "axes";
const LIGHT_NODE_NAME: &str = "light";

pub struct ScatterPlot {
    cameras: CameraManager,
    scene: Scene,
    light: NodeId,
    renderer: Box<dyn SceneRenderer>,
    picking_texture: Option<PickingTexture>,
    event_context: Arc<dyn ProjectorEventContext>,
    visualizers: Vec<Box<dyn ScatterPlotVisualizer>>,

    width: f32,
    height: f32,
    device_pixel_ratio: f32,
    mouse_mode: MouseMode,
    background_color: u32,
    night_mode: bool,

    world_space_point_positions: Option<Arc<[f32]>>,
    point_colors: Option<Arc<[f32]>>,
    point_scale_factors: Option<Arc<[f32]>>,
    labels: Option<Arc<LabelRenderParams>>,
    polyline_colors: Option<Arc<HashMap<usize, Vec<f32>>>>,
    polyline_opacities: Option<Arc<[f32]>>,
    polyline_widths: Option<Arc<[f32]>>,
    real_data_number: usize,

    selecting: bool,
    is_ctrling: bool,
    is_shifting: bool,
    nearest_point: Option<usize>,
    mouse_is_down: bool,
    is_drag_sequence: bool,
    drag_button: Option<MouseButton>,
    last_cursor: Option<Vec2>,
    rectangle_selector: RectangleSelector,
    cursor: CursorStyle,

    current_selection: Vec<usize>,
    previous_selection: Option<Vec<usize>>,
}

impl ScatterPlot {
    /// Creates a 3D plot of `width × height` CSS pixels and renders the
    /// first frame.
    pub fn new(
        width: f32,
        height: f32,
        device_pixel_ratio: f32,
        mut renderer: Box<dyn SceneRenderer>,
        event_context: Arc<dyn ProjectorEventContext>,
    ) -> Self {
        let width = width.max(1.0);
        let height = height.max(1.0);
        renderer.set_clear_color(BACKGROUND_COLOR);

        let mut scene = Scene::new();
        let light = scene.add_named(
            LIGHT_NODE_NAME,
            SceneNode::Light {
                position: Vec3::ZERO,
                color: 0xFF_FFFF,
            },
        );

        let mut plot = Self {
            cameras: CameraManager::new(width, height),
            scene,
            light,
            renderer,
            picking_texture: None,
            event_context,
            visualizers: Vec::new(),
            width,
            height,
            device_pixel_ratio: device_pixel_ratio.max(f32::EPSILON),
            mouse_mode: MouseMode::CameraAndClickSelect,
            background_color: BACKGROUND_COLOR,
            night_mode: false,
            world_space_point_positions: None,
            point_colors: None,
            point_scale_factors: None,
            labels: None,
            polyline_colors: None,
            polyline_opacities: None,
            polyline_widths: None,
            real_data_number: 0,
            selecting: false,
            is_ctrling: false,
            is_shifting: false,
            nearest_point: None,
            mouse_is_down: false,
            is_drag_sequence: false,
            drag_button: None,
            last_cursor: None,
            rectangle_selector: RectangleSelector::default(),
            cursor: CursorStyle::Default,
            current_selection: Vec::new(),
            previous_selection: None,
        };
        plot.add_3d_axis();
        plot.resize(width, height, true);
        plot
    }

    // ---- dimensionality and camera ----

    /// Switches between 2D and 3D. The axes helper exists only in 3D.
    pub fn set_dimensions(&mut self, dimensionality: u32) -> Result<(), ProjectorError> {
        self.cameras.set_dimensions(dimensionality)?;
        self.remove_3d_axis_from_scene();
        if dimensionality == 3 {
            self.add_3d_axis();
        }
        Ok(())
    }

    pub fn dimensionality(&self) -> u32 {
        self.cameras.dimensionality()
    }

    fn scene_is_3d(&self) -> bool {
        self.cameras.is_3d()
    }

    fn remove_3d_axis_from_scene(&mut self) -> Option<SceneNode> {
        let id = self.scene.get_by_name(AXES_NODE_NAME)?;
        self.scene.remove(id).map(|(_, node)| node)
    }

    fn add_3d_axis(&mut self) {
        self.scene.add_named(
            AXES_NODE_NAME,
            SceneNode::Axes {
                size: AXES_HELPER_SIZE,
            },
        );
    }

    pub fn recreate_camera(&mut self, def: &CameraDef) {
        self.cameras.recreate_camera(def);
    }

    pub fn reset_zoom(&mut self) {
        self.cameras.reset_zoom();
        self.render();
    }

    pub fn get_camera_def(&self) -> CameraDef {
        self.cameras.get_camera_def()
    }

    pub fn get_camera_position(&self) -> Point3D {
        self.cameras.get_camera_position()
    }

    pub fn get_camera_target(&self) -> Point3D {
        self.cameras.get_camera_target()
    }

    pub fn set_camera_parameters_for_next_camera_creation(
        &mut self,
        def: Option<CameraDef>,
        orbit_animation: bool,
    ) {
        self.cameras
            .set_camera_parameters_for_next_camera_creation(def, orbit_animation);
    }

    pub fn set_camera_position_and_target(&mut self, position: Point3D, target: Point3D) {
        self.cameras.set_camera_position_and_target(position, target);
        self.render();
    }

    pub fn start_orbit_animation(&mut self) {
        self.cameras.start_orbit_animation();
    }

    pub fn stop_orbit_animation(&mut self) {
        self.cameras.stop_orbit_animation();
    }

    pub fn is_orbit_animating(&self) -> bool {
        self.cameras.is_orbit_animating()
    }

    /// Frame callback. Advances the orbit animation and re-renders when it
    /// moved the camera.
    pub fn on_animation_frame(&mut self) -> bool {
        let ticked = self.cameras.tick_orbit_animation();
        if ticked {
            self.render();
        }
        ticked
    }

    pub fn on_camera_move(&mut self, listener: CameraMoveListener) {
        self.cameras.add_camera_move_listener(listener);
    }

    pub fn camera_manager(&self) -> &CameraManager {
        &self.cameras
    }

    // ---- visualizers and data ----

    /// Registers a visualizer and replays the current scene state to it.
    pub fn add_visualizer(&mut self, mut visualizer: Box<dyn ScatterPlotVisualizer>) {
        visualizer.set_scene(&mut self.scene);
        visualizer.on_resize(self.width, self.height);
        visualizer.on_point_positions_changed(&mut self.scene, self.world_space_point_positions.as_ref());
        self.visualizers.push(visualizer);
    }

    pub fn remove_all_visualizers(&mut self) {
        for mut visualizer in self.visualizers.drain(..) {
            visualizer.dispose(&mut self.scene);
        }
    }

    pub fn visualizer_count(&self) -> usize {
        self.visualizers.len()
    }

    /// Replaces the packed xyz positions and the real-data boundary.
    pub fn set_point_positions(&mut self, positions: impl Into<Arc<[f32]>>, real_data_number: usize) {
        let positions = positions.into();
        for visualizer in &mut self.visualizers {
            visualizer.on_point_positions_changed(&mut self.scene, Some(&positions));
        }
        self.world_space_point_positions = Some(positions);
        self.real_data_number = real_data_number;
    }

    pub fn point_count(&self) -> usize {
        self.world_space_point_positions
            .as_ref()
            .map_or(0, |positions| positions.len() / 3)
    }

    pub fn real_data_number(&self) -> usize {
        self.real_data_number
    }

    /// RGB triplets per point.
    pub fn set_point_colors(&mut self, colors: impl Into<Arc<[f32]>>) {
        self.point_colors = Some(colors.into());
    }

    pub fn set_point_scale_factors(&mut self, scale_factors: impl Into<Arc<[f32]>>) {
        self.point_scale_factors = Some(scale_factors.into());
    }

    pub fn set_labels(&mut self, labels: LabelRenderParams) {
        self.labels = Some(Arc::new(labels));
    }

    /// RGB triplets per polyline vertex, keyed by polyline index.
    pub fn set_polyline_colors(&mut self, colors: HashMap<usize, Vec<f32>>) {
        self.polyline_colors = Some(Arc::new(colors));
    }

    pub fn set_polyline_opacities(&mut self, opacities: impl Into<Arc<[f32]>>) {
        self.polyline_opacities = Some(opacities.into());
    }

    pub fn set_polyline_widths(&mut self, widths: impl Into<Arc<[f32]>>) {
        self.polyline_widths = Some(widths.into());
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    // ---- appearance ----

    pub fn set_mouse_mode(&mut self, mouse_mode: MouseMode) {
        self.mouse_mode = mouse_mode;
        self.selecting = mouse_mode == MouseMode::AreaSelect;
        self.cursor = if self.selecting {
            CursorStyle::Crosshair
        } else {
            CursorStyle::Default
        };
    }

    pub fn mouse_mode(&self) -> MouseMode {
        self.mouse_mode
    }

    /// Background colour handed to visualizers, used as the fog colour.
    pub fn set_background_color(&mut self, color: u32) {
        self.background_color = color;
    }

    pub fn set_day_night_mode(&mut self, is_night: bool) {
        self.night_mode = is_night;
        self.renderer.set_night_mode(is_night);
    }

    /// Atlas the point layers draw their sprites from. `None` returns them
    /// to circles.
    pub fn set_sprite_sheet(&mut self, sprites: Option<SpriteSheet>) {
        let sprites = sprites.map(Arc::new);
        for visualizer in &mut self.visualizers {
            visualizer.set_sprite_sheet(sprites.clone());
        }
    }

    pub fn is_night_mode(&self) -> bool {
        self.night_mode
    }

    pub fn cursor(&self) -> CursorStyle {
        self.cursor
    }

    // ---- rendering ----

    /// Renders the picking pass, then the visible pass, from the same
    /// camera and position snapshot.
    pub fn render(&mut self) {
        let camera = self.cameras.camera().clone();
        let target = self.cameras.controls().target;

        if let Some(SceneNode::Light { position, .. }) = self.scene.get_mut(self.light) {
            *position = camera.position + Vec3::new(LIGHT_CAMERA_OFFSET, LIGHT_CAMERA_OFFSET, 0.0);
        }

        let (nearest, farthest) = match &self.world_space_point_positions {
            Some(positions) => get_near_far_points(positions, camera.position, target),
            None => (0.0, 0.0),
        };

        let context = RenderContext {
            camera_type: camera.camera_type(),
            camera: camera.clone(),
            camera_target: target,
            screen_width: self.width,
            screen_height: self.height,
            nearest_camera_space_point_z: nearest,
            farthest_camera_space_point_z: farthest,
            background_color: self.background_color,
            point_colors: self.point_colors.clone(),
            point_scale_factors: self.point_scale_factors.clone(),
            labels: self.labels.clone(),
            polyline_colors: self.polyline_colors.clone(),
            polyline_opacities: self.polyline_opacities.clone(),
            polyline_widths: self.polyline_widths.clone(),
        };

        // Picking pass: point ids as colours, axes hidden.
        for visualizer in &mut self.visualizers {
            visualizer.on_picking_render(&mut self.scene, &context);
        }
        let axes = self.remove_3d_axis_from_scene();
        match self.picking_texture.as_mut() {
            Some(texture) => self
                .renderer
                .render_to_picking(&self.scene, &camera, target, texture),
            None => self.renderer.render(&self.scene, &camera, target),
        }
        if let Some(axes) = axes {
            self.scene.add_named(AXES_NODE_NAME, axes);
        }

        // Visible pass.
        for visualizer in &mut self.visualizers {
            visualizer.on_render(&mut self.scene, &context);
        }
        self.renderer.render(&self.scene, &camera, target);
    }

    /// Last drawn RGBA8 frame, empty when the renderer presents on the GPU.
    pub fn frame(&self) -> &[u8] {
        self.renderer.frame()
    }

    pub fn frame_size(&self) -> UVec2 {
        self.renderer.frame_size()
    }

    pub fn picking_texture(&self) -> Option<&PickingTexture> {
        self.picking_texture.as_ref()
    }

    /// Takes the ids of a GPU picking pass read back from its render target.
    /// Readbacks issued before the last resize no longer match the target
    /// and are dropped.
    pub fn apply_picking_readback(&mut self, bytes: &[u8]) -> bool {
        self.picking_texture
            .as_mut()
            .is_some_and(|texture| texture.copy_from_readback(bytes))
    }

    pub fn set_device_pixel_ratio(&mut self, device_pixel_ratio: f32) {
        self.device_pixel_ratio = device_pixel_ratio.max(f32::EPSILON);
        self.resize(self.width, self.height, true);
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Resizes the canvas and replaces the picking target with one matching
    /// the new canvas exactly.
    pub fn resize(&mut self, width: f32, height: f32, render: bool) {
        let width = width.max(1.0);
        let height = height.max(1.0);
        self.cameras.resize(width, height);
        self.width = width;
        self.height = height;

        self.renderer.set_pixel_ratio(self.device_pixel_ratio);
        self.renderer.set_size(width, height);
        let size = self.renderer.frame_size();
        self.picking_texture = Some(PickingTexture::new(size.x, size.y));

        for visualizer in &mut self.visualizers {
            visualizer.on_resize(width, height);
        }
        if render {
            self.render();
        }
    }

    // ---- picking and selection ----

    /// Point ids under `bbox`, or `None` before any positions or picking
    /// target exist.
    fn get_point_indices_from_picking_texture(&self, bbox: &ScatterBoundingBox) -> Option<Vec<usize>> {
        self.world_space_point_positions.as_ref()?;
        let texture = self.picking_texture.as_ref()?;
        Some(point_indices_in_box(
            texture,
            bbox,
            self.device_pixel_ratio,
            self.point_count(),
        ))
    }

    fn set_nearest_point_to_mouse(&mut self, cursor: Vec2) {
        let bbox = ScatterBoundingBox::centered(cursor, HOVER_BOX_SIZE);
        self.nearest_point = self
            .get_point_indices_from_picking_texture(&bbox)
            .and_then(|indices| nearest_point_in_box(&indices, self.real_data_number));
    }

    /// Point currently under the cursor.
    pub fn nearest_point(&self) -> Option<usize> {
        self.nearest_point
    }

    /// Hover hit test at a cursor position, without side effects.
    pub fn point_at(&self, cursor: Vec2) -> Option<usize> {
        let bbox = ScatterBoundingBox::centered(cursor, HOVER_BOX_SIZE);
        self.get_point_indices_from_picking_texture(&bbox)
            .and_then(|indices| nearest_point_in_box(&indices, self.real_data_number))
    }

    /// Selects the real points inside `bbox`, at most one full selection.
    pub fn select_bounding_box(&mut self, bbox: &ScatterBoundingBox) {
        let indices = self
            .get_point_indices_from_picking_texture(bbox)
            .unwrap_or_default();
        let selection = select_in_box(&indices, self.real_data_number);
        if selection.over_capacity {
            self.event_context.notify_user_warning(BOX_SELECTION_LIMIT_WARNING);
            self.is_shifting = false;
        }
        self.push_selection(selection.indices.clone());
        self.event_context
            .notify_selection_changed(&selection.indices, true, Some(BOUNDING_BOX_CAUSE));
    }

    fn push_selection(&mut self, selection: Vec<usize>) {
        let previous = std::mem::replace(&mut self.current_selection, selection);
        self.previous_selection = Some(previous);
    }

    pub fn selection(&self) -> &[usize] {
        &self.current_selection
    }

    /// Restores the selection made before the latest one. Only one step is
    /// kept; without it the user is warned and nothing changes.
    pub fn undo_selection(&mut self) {
        match self.previous_selection.take() {
            Some(previous) if !previous.is_empty() => {
                self.event_context
                    .notify_selection_changed(&previous, true, Some(BOUNDING_BOX_CAUSE));
                self.current_selection = previous;
            }
            _ => self.event_context.notify_user_warning(UNDO_LIMIT_WARNING),
        }
        self.is_ctrling = false;
    }

    fn on_click(&mut self, from_event: bool, notify: bool) {
        if from_event && self.selecting {
            return;
        }
        if !self.is_drag_sequence && notify {
            let selection: Vec<usize> = self
                .nearest_point
                .filter(|&index| index < self.real_data_number)
                .into_iter()
                .collect();
            self.push_selection(selection.clone());
            self.event_context
                .notify_selection_changed(&selection, false, None);
        }
        self.is_drag_sequence = false;
        self.render();
    }

    /// Programmatic click on a point. Nobody is notified.
    pub fn click_on_point(&mut self, point_index: usize) {
        self.nearest_point = Some(point_index);
        self.on_click(false, false);
    }

    // ---- input ----

    pub fn on_mouse_down(&mut self, button: MouseButton, position: Vec2, ctrl: bool) {
        self.is_drag_sequence = false;
        self.mouse_is_down = true;
        self.last_cursor = Some(position);

        if self.selecting && self.is_shifting {
            self.cameras.controls_mut().enabled = false;
            self.rectangle_selector.on_mouse_down(position);
            self.set_nearest_point_to_mouse(position);
        } else if !self.cameras.sync_ctrl_on_press(ctrl) {
            self.cursor = CursorStyle::Move;
        }

        let controls = self.cameras.controls();
        if controls.enabled && controls.gesture_for(button).is_some() {
            self.drag_button = Some(button);
            self.cameras.begin_user_interaction();
        }
    }

    pub fn on_mouse_move(&mut self, position: Vec2) {
        self.is_drag_sequence = self.mouse_is_down;
        let last = self.last_cursor.replace(position);

        if self.mouse_is_down {
            if self.rectangle_selector.is_active() {
                self.rectangle_selector.on_mouse_move(position);
                self.render();
            } else if let (Some(button), Some(last)) = (self.drag_button, last) {
                if self.cameras.drag(button, position - last) {
                    self.render();
                }
            }
        } else {
            self.set_nearest_point_to_mouse(position);
            self.event_context.notify_hover_over_point(self.nearest_point);
        }
    }

    pub fn on_mouse_up(&mut self) {
        self.cursor = if self.selecting {
            CursorStyle::Crosshair
        } else {
            CursorStyle::Default
        };
        self.mouse_is_down = false;
        self.drag_button = None;

        if self.rectangle_selector.is_active() {
            self.cameras.controls_mut().enabled = true;
            if let Some(bbox) = self.rectangle_selector.on_mouse_up() {
                self.select_bounding_box(&bbox);
            }
            self.render();
        }
    }

    pub fn on_double_click(&mut self) {
        self.on_click(true, true);
    }

    pub fn on_wheel(&mut self, delta_y: f32) {
        if self.cameras.wheel(delta_y) {
            self.render();
        }
    }

    /// `ctrl` is true while ctrl or meta is held.
    pub fn on_key_down(&mut self, key: KeyCode, ctrl: bool) {
        if is_ctrl_key(key) && self.scene_is_3d() {
            self.is_ctrling = true;
            self.cameras.set_ctrl_held(true);
        }

        if ctrl && key == KeyCode::KeyZ {
            self.cursor = if self.selecting {
                CursorStyle::Crosshair
            } else {
                CursorStyle::Default
            };
            self.undo_selection();
        }

        if is_shift_key(key) && self.selecting {
            self.is_shifting = true;
            self.cursor = CursorStyle::Crosshair;
        }
    }

    pub fn on_key_up(&mut self, key: KeyCode) {
        self.is_ctrling = false;
        self.is_shifting = false;
        self.cursor = if self.selecting {
            CursorStyle::Crosshair
        } else {
            CursorStyle::Default
        };

        if is_ctrl_key(key) && self.scene_is_3d() {
            self.cameras.set_ctrl_held(false);
        }

        if is_shift_key(key) {
            self.selecting = self.mouse_mode == MouseMode::AreaSelect;
            if !self.selecting {
                self.cursor = CursorStyle::Default;
            }
            self.render();
        }
    }

    pub fn is_area_selecting(&self) -> bool {
        self.selecting && self.is_shifting
    }

    pub fn rectangle_selection(&self) -> Option<ScatterBoundingBox> {
        self.rectangle_selector.current_box()
    }
}

fn is_ctrl_key(key: KeyCode) -> bool {
    matches!(key, KeyCode::ControlLeft | KeyCode::ControlRight)
}

fn is_shift_key(key: KeyCode) -> bool {
    matches!(key, KeyCode::ShiftLeft | KeyCode::ShiftRight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::{ProjectorEvent, QueuedEventContext};
    use crate::engine::render::SoftwareRenderer;
    use crate::engine::visualizers::PointsVisualizer;
    use pretty_assertions::assert_eq;

    fn plot() -> (ScatterPlot, QueuedEventContext) {
        let events = QueuedEventContext::new();
        let plot = ScatterPlot::new(
            200.0,
            100.0,
            1.0,
            Box::new(SoftwareRenderer::default()),
            Arc::new(events.clone()),
        );
        (plot, events)
    }

    #[test]
    fn axes_exist_only_in_3d() {
        let (mut plot, _) = plot();
        assert!(plot.scene().get_by_name(AXES_NODE_NAME).is_some());
        plot.set_dimensions(2).unwrap();
        assert!(plot.scene().get_by_name(AXES_NODE_NAME).is_none());
        plot.set_dimensions(3).unwrap();
        assert!(plot.scene().get_by_name(AXES_NODE_NAME).is_some());
    }

    #[test]
    fn invalid_dimensionality_keeps_the_axes() {
        let (mut plot, _) = plot();
        assert!(plot.set_dimensions(1).is_err());
        assert_eq!(plot.dimensionality(), 3);
        assert!(plot.scene().get_by_name(AXES_NODE_NAME).is_some());
    }

    #[test]
    fn render_restores_the_axes_after_picking() {
        let (mut plot, _) = plot();
        plot.render();
        assert!(plot.scene().get_by_name(AXES_NODE_NAME).is_some());
    }

    #[test]
    fn picking_without_positions_is_no_hit() {
        let (mut plot, events) = plot();
        plot.on_mouse_move(Vec2::new(100.0, 50.0));
        assert_eq!(plot.nearest_point(), None);
        assert_eq!(
            events.drain(),
            vec![ProjectorEvent::HoverChanged { index: None }]
        );
    }

    #[test]
    fn resize_replaces_the_picking_target() {
        let (mut plot, _) = plot();
        plot.set_device_pixel_ratio(2.0);
        plot.resize(300.0, 120.0, false);
        let texture = plot.picking_texture().unwrap();
        assert_eq!((texture.width(), texture.height()), (600, 240));
        assert_eq!(plot.frame_size(), UVec2::new(600, 240));
    }

    #[test]
    fn undo_without_history_warns() {
        let (mut plot, events) = plot();
        plot.on_key_down(KeyCode::KeyZ, true);
        assert_eq!(
            events.drain(),
            vec![ProjectorEvent::UserWarning {
                message: UNDO_LIMIT_WARNING.to_string()
            }]
        );
    }

    #[test]
    fn undo_restores_the_previous_selection_once() {
        let (mut plot, events) = plot();
        plot.set_point_positions(vec![0.0; 9], 3);
        plot.click_on_point(1);
        plot.nearest_point = Some(2);
        plot.on_double_click();
        plot.nearest_point = Some(0);
        plot.on_double_click();
        events.drain();

        plot.on_key_down(KeyCode::KeyZ, true);
        assert_eq!(plot.selection(), &[2]);
        plot.on_key_down(KeyCode::KeyZ, true);
        let drained = events.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[1], ProjectorEvent::UserWarning { .. }));
    }

    #[test]
    fn click_on_background_point_selects_nothing() {
        let (mut plot, events) = plot();
        plot.set_point_positions(vec![0.0; 9], 2);
        plot.nearest_point = Some(2);
        plot.on_double_click();
        assert_eq!(
            events.drain(),
            vec![ProjectorEvent::SelectionChanged {
                indices: vec![],
                from_user: false,
                cause: None
            }]
        );
    }

    #[test]
    fn double_click_is_ignored_while_area_selecting() {
        let (mut plot, events) = plot();
        plot.set_mouse_mode(MouseMode::AreaSelect);
        assert_eq!(plot.cursor(), CursorStyle::Crosshair);
        plot.on_double_click();
        assert!(events.drain().is_empty());
    }

    #[test]
    fn shift_arms_area_selection_only_in_area_mode() {
        let (mut plot, _) = plot();
        plot.on_key_down(KeyCode::ShiftLeft, false);
        assert!(!plot.is_area_selecting());

        plot.set_mouse_mode(MouseMode::AreaSelect);
        plot.on_key_down(KeyCode::ShiftLeft, false);
        assert!(plot.is_area_selecting());
        plot.on_key_up(KeyCode::ShiftLeft);
        assert!(!plot.is_area_selecting());
    }

    #[test]
    fn visualizers_are_disposed_on_removal() {
        let (mut plot, _) = plot();
        plot.set_point_positions(vec![0.0; 6], 2);
        let nodes_before = plot.scene().len();
        plot.add_visualizer(Box::new(PointsVisualizer::new()));
        assert_eq!(plot.scene().len(), nodes_before + 1);
        plot.remove_all_visualizers();
        assert_eq!(plot.scene().len(), nodes_before);
        assert_eq!(plot.visualizer_count(), 0);
    }

    #[test]
    fn night_mode_inverts_the_presented_frame() {
        let (mut plot, _) = plot();
        plot.set_dimensions(2).unwrap();
        plot.render();
        assert_eq!(&plot.frame()[0..3], &[255, 255, 255]);
        plot.set_day_night_mode(true);
        assert_eq!(&plot.frame()[0..3], &[0, 0, 0]);
    }

    #[test]
    fn sprite_sheet_reaches_both_passes_of_the_points_layer() {
        let (mut plot, _) = plot();
        plot.add_visualizer(Box::new(PointsVisualizer::new()));
        plot.set_point_positions(vec![0.0; 6], 2);
        let atlas = SpriteSheet::from_atlas(4, 2, vec![0; 4 * 2 * 4], [2, 2]).unwrap();
        plot.set_sprite_sheet(Some(atlas));
        plot.render();

        let sprites = plot.scene().nodes().find_map(|node| match node {
            SceneNode::Points(points) => Some((points.sprites.clone(), points.point_size)),
            _ => None,
        });
        let (sheet, size) = sprites.unwrap();
        assert_eq!(sheet.map(|sheet| sheet.sprites_per_row), Some(2.0));
        assert_eq!(size, constants::point_shader::IMAGE_SIZE);

        plot.set_sprite_sheet(None);
        plot.render();
        assert!(plot.scene().nodes().all(|node| match node {
            SceneNode::Points(points) => points.sprites.is_none(),
            _ => true,
        }));
    }
}
