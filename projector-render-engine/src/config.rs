//! Start-up configuration of the scatter plot host.

use std::path::Path;

use bevy::prelude::*;
use constants::render_settings::{BACKGROUND_COLOR, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH};
use serde::{Deserialize, Serialize};

use crate::engine::camera::CameraDef;
use crate::engine::interaction::MouseMode;
use crate::error::ProjectorError;

/// Projector settings, loadable as a JSON asset. Missing fields take their
/// defaults.
#[derive(Resource, Asset, TypePath, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    pub dimensionality: u32,
    pub mouse_mode: MouseMode,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_pixel_ratio: f32,
    /// 0xRRGGBB
    pub background_color: u32,
    pub night_mode: bool,
    pub camera: Option<CameraDef>,
    pub orbit_animation: bool,
    /// Neighbour count of the precomputed KNN graph.
    pub knn_neighbors: usize,
    /// Atlas drawn on the points instead of circles.
    pub sprite_sheet: Option<SpriteSheetConfig>,
}

/// Image asset holding one sprite per point, packed row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSheetConfig {
    pub path: String,
    /// Width and height of a single sprite in pixels.
    pub single_image_dim: [u32; 2],
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            dimensionality: 3,
            mouse_mode: MouseMode::default(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            device_pixel_ratio: 1.0,
            background_color: BACKGROUND_COLOR,
            night_mode: false,
            camera: None,
            orbit_animation: false,
            knn_neighbors: 100,
            sprite_sheet: None,
        }
    }
}

impl ProjectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ProjectorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProjectorError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ProjectorError> {
        if !matches!(self.dimensionality, 2 | 3) {
            return Err(ProjectorError::InvalidDimensionality(self.dimensionality));
        }
        if let Some(sheet) = &self.sprite_sheet {
            if sheet.single_image_dim.contains(&0) {
                let [tile_width, tile_height] = sheet.single_image_dim;
                return Err(ProjectorError::InvalidSpriteSheet {
                    width: 0,
                    height: 0,
                    tile_width,
                    tile_height,
                });
            }
        }
        Ok(())
    }

    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.viewport_width as f32, self.viewport_height as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_is_the_default() {
        assert_eq!(
            ProjectorConfig::from_json_str("{}").unwrap(),
            ProjectorConfig::default()
        );
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = ProjectorConfig::from_json_str(
            r#"{
                "dimensionality": 2,
                "mouse_mode": "area_select",
                "camera": { "orthographic": true, "position": [0, 0, 4], "target": [0, 0, 0] }
            }"#,
        )
        .unwrap();
        assert_eq!(config.dimensionality, 2);
        assert_eq!(config.mouse_mode, MouseMode::AreaSelect);
        assert_eq!(config.camera.unwrap().zoom, 1.0);
        assert_eq!(config.viewport_width, DEFAULT_VIEWPORT_WIDTH);
    }

    #[test]
    fn rejects_unsupported_dimensionality() {
        assert!(matches!(
            ProjectorConfig::from_json_str(r#"{ "dimensionality": 4 }"#),
            Err(ProjectorError::InvalidDimensionality(4))
        ));
        assert!(matches!(
            ProjectorConfig::from_json_str("{ not json"),
            Err(ProjectorError::Config(_))
        ));
    }

    #[test]
    fn sprite_sheet_needs_a_sprite_size() {
        let config = ProjectorConfig::from_json_str(
            r#"{ "sprite_sheet": { "path": "sprites.png", "single_image_dim": [16, 8] } }"#,
        )
        .unwrap();
        assert_eq!(
            config.sprite_sheet,
            Some(SpriteSheetConfig {
                path: "sprites.png".to_string(),
                single_image_dim: [16, 8],
            })
        );

        assert!(matches!(
            ProjectorConfig::from_json_str(
                r#"{ "sprite_sheet": { "path": "sprites.png", "single_image_dim": [0, 8] } }"#,
            ),
            Err(ProjectorError::InvalidSpriteSheet { tile_width: 0, .. })
        ));
    }
}
