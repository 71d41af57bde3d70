//! Pluggable scene layers.
//!
//! The scatter plot owns the [`Scene`]; visualizers own their nodes in it
//! and are driven through [`ScatterPlotVisualizer`] in registration order,
//! once for the picking pass and once for the visible pass of every frame.

pub mod points;

use std::sync::Arc;

use crate::engine::render::{RenderContext, Scene, SpriteSheet};

pub use points::PointsVisualizer;

pub trait ScatterPlotVisualizer: Send + Sync {
    /// Called once when the visualizer is registered.
    fn set_scene(&mut self, scene: &mut Scene);

    /// Viewport size in CSS pixels.
    fn on_resize(&mut self, width: f32, height: f32);

    /// Packed xyz positions replaced wholesale. `None` clears the layer.
    fn on_point_positions_changed(&mut self, scene: &mut Scene, positions: Option<&Arc<[f32]>>);

    /// Prepares the layer's nodes for the id-encoded picking pass.
    fn on_picking_render(&mut self, scene: &mut Scene, context: &RenderContext);

    /// Prepares the layer's nodes for the visible colour pass.
    fn on_render(&mut self, scene: &mut Scene, context: &RenderContext);

    /// Removes every node the visualizer added.
    fn dispose(&mut self, scene: &mut Scene);

    /// Sprite atlas for image mode. Layers without sprites ignore it.
    fn set_sprite_sheet(&mut self, _sprites: Option<Arc<SpriteSheet>>) {}
}
