//! Interaction modes, cursor styles and the rubber-band rectangle selector.

use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

/// Supported modes of interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseMode {
    AreaSelect,
    #[default]
    CameraAndClickSelect,
}

/// Cursor the host should display over the plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Default,
    Crosshair,
    Move,
}

/// Screen rectangle in CSS pixels with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScatterBoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScatterBoundingBox {
    /// Box of `size × size` centred on `center`.
    pub fn centered(center: Vec2, size: f32) -> Self {
        Self {
            x: center.x - size / 2.0,
            y: center.y - size / 2.0,
            width: size,
            height: size,
        }
    }

    /// Normalised box spanned by two corners.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }
}

/// Tracks a rectangle drag and yields the final box on release.
#[derive(Debug, Default, Clone)]
pub struct RectangleSelector {
    start: Option<Vec2>,
    current: Vec2,
}

impl RectangleSelector {
    pub fn on_mouse_down(&mut self, position: Vec2) {
        self.start = Some(position);
        self.current = position;
    }

    pub fn on_mouse_move(&mut self, position: Vec2) {
        if self.start.is_some() {
            self.current = position;
        }
    }

    /// Ends the drag. `None` when no drag was in progress.
    pub fn on_mouse_up(&mut self) -> Option<ScatterBoundingBox> {
        let start = self.start.take()?;
        Some(ScatterBoundingBox::from_corners(start, self.current))
    }

    pub fn is_active(&self) -> bool {
        self.start.is_some()
    }

    /// Rectangle currently being dragged, for drawing the overlay.
    pub fn current_box(&self) -> Option<ScatterBoundingBox> {
        self.start
            .map(|start| ScatterBoundingBox::from_corners(start, self.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drag_up_and_left_normalises_the_box() {
        let mut selector = RectangleSelector::default();
        selector.on_mouse_down(Vec2::new(50.0, 40.0));
        selector.on_mouse_move(Vec2::new(10.0, 20.0));
        assert!(selector.is_active());

        let bbox = selector.on_mouse_up();
        assert_eq!(
            bbox,
            Some(ScatterBoundingBox {
                x: 10.0,
                y: 20.0,
                width: 40.0,
                height: 20.0
            })
        );
        assert_eq!(selector.on_mouse_up(), None);
    }

    #[test]
    fn moves_without_a_press_are_ignored() {
        let mut selector = RectangleSelector::default();
        selector.on_mouse_move(Vec2::new(5.0, 5.0));
        assert_eq!(selector.current_box(), None);
    }
}
