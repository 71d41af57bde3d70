//! Bevy materials of the GPU renderer.
//!
//! Both programs take the plot's own view and projection matrices (GL clip
//! conventions) and remap depth to the reverse-Z range of Bevy's 3D pass.
//! Colours leave the fragment stage linearised so an sRGB target stores the
//! exact input bytes, which the picking ids depend on.

use bevy::pbr::{MaterialPipeline, MaterialPipelineKey};
use bevy::prelude::*;
use bevy::render::mesh::{MeshVertexAttribute, MeshVertexBufferLayoutRef};
use bevy::render::render_resource::{
    AsBindGroup, RenderPipelineDescriptor, ShaderRef, ShaderType, SpecializedMeshPipelineError,
    VertexFormat,
};
use constants::point_shader::MIN_POINT_SIZE;

use super::gpu::FrameSnapshot;
use super::scene::{PointMaterial, PointsNode};
use super::shaders::{hex_to_rgb, zoom_scale_2d};

pub const POINT_SPRITE_SHADER: &str = "shaders/point_sprite.wgsl";
pub const AXES_SHADER: &str = "shaders/axes.wgsl";

/// Per-vertex quad corner (xy in `-1..1`), size scale factor and point index.
pub const ATTRIBUTE_POINT_SPRITE: MeshVertexAttribute =
    MeshVertexAttribute::new("PointSprite", 988_540_917, VertexFormat::Float32x4);

pub const FLAG_SPRITES: u32 = 1;
pub const FLAG_PICKING: u32 = 1 << 1;
pub const FLAG_INVERT: u32 = 1 << 2;
pub const FLAG_FOG: u32 = 1 << 3;
pub const FLAG_SIZE_ATTENUATION: u32 = 1 << 4;

#[derive(Debug, Clone, Copy, PartialEq, ShaderType)]
pub struct PointUniform {
    pub view: Mat4,
    pub projection: Mat4,
    /// Device pixels.
    pub viewport: Vec2,
    pub point_size: f32,
    pub min_point_size: f32,
    /// 2D zoom curve, applied when sizes are not attenuated.
    pub zoom_scale: f32,
    pub fog_near: f32,
    pub fog_far: f32,
    pub flags: u32,
    pub fog_color: Vec4,
    /// Sprites per row and per column of the atlas.
    pub sprite_grid: Vec2,
}

impl PointUniform {
    pub fn new(frame: &FrameSnapshot, layer: &PointsNode) -> Self {
        let mut flags = 0;
        if layer.size_attenuation {
            flags |= FLAG_SIZE_ATTENUATION;
        }
        let mut fog_range = (0.0, 0.0);
        let mut fog_color = Vec4::ZERO;
        match layer.material {
            PointMaterial::Picking => flags |= FLAG_PICKING,
            PointMaterial::Visible { fog } => {
                if frame.night_mode {
                    flags |= FLAG_INVERT;
                }
                if let Some(fog) = fog {
                    flags |= FLAG_FOG;
                    fog_range = (fog.near, fog.far);
                    fog_color = fog.color.extend(1.0);
                }
            }
        }

        let mut sprite_grid = Vec2::ONE;
        if let Some(sheet) = &layer.sprites {
            flags |= FLAG_SPRITES;
            sprite_grid = Vec2::new(sheet.sprites_per_row, sheet.sprites_per_column);
        }

        Self {
            view: frame.view,
            projection: frame.projection,
            viewport: frame.viewport.as_vec2(),
            point_size: layer.point_size,
            min_point_size: MIN_POINT_SIZE,
            zoom_scale: zoom_scale_2d(frame.projection.x_axis.x),
            fog_near: fog_range.0,
            fog_far: fog_range.1,
            flags,
            fog_color,
            sprite_grid,
        }
    }
}

/// Point sprites of one layer, in either pass.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct PointSpriteMaterial {
    #[uniform(0)]
    pub params: PointUniform,

    #[texture(1)]
    #[sampler(2)]
    pub sprite_sheet: Option<Handle<Image>>,
}

impl Material for PointSpriteMaterial {
    fn vertex_shader() -> ShaderRef {
        POINT_SPRITE_SHADER.into()
    }

    fn fragment_shader() -> ShaderRef {
        POINT_SPRITE_SHADER.into()
    }

    fn specialize(
        _pipeline: &MaterialPipeline<Self>,
        descriptor: &mut RenderPipelineDescriptor,
        layout: &MeshVertexBufferLayoutRef,
        _key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let vertex_layout = layout.0.get_layout(&[
            Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
            Mesh::ATTRIBUTE_COLOR.at_shader_location(1),
            ATTRIBUTE_POINT_SPRITE.at_shader_location(2),
        ])?;
        descriptor.vertex.buffers = vec![vertex_layout];
        // Billboards face the camera.
        descriptor.primitive.cull_mode = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, ShaderType)]
pub struct AxesUniform {
    pub view_projection: Mat4,
    pub flags: u32,
}

impl AxesUniform {
    pub fn new(frame: &FrameSnapshot) -> Self {
        Self {
            view_projection: frame.projection * frame.view,
            flags: if frame.night_mode { FLAG_INVERT } else { 0 },
        }
    }
}

/// Axes helper lines, visible pass only.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct AxesMaterial {
    #[uniform(0)]
    pub params: AxesUniform,
}

impl Material for AxesMaterial {
    fn vertex_shader() -> ShaderRef {
        AXES_SHADER.into()
    }

    fn fragment_shader() -> ShaderRef {
        AXES_SHADER.into()
    }

    fn specialize(
        _pipeline: &MaterialPipeline<Self>,
        descriptor: &mut RenderPipelineDescriptor,
        layout: &MeshVertexBufferLayoutRef,
        _key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let vertex_layout = layout.0.get_layout(&[
            Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
            Mesh::ATTRIBUTE_COLOR.at_shader_location(1),
        ])?;
        descriptor.vertex.buffers = vec![vertex_layout];
        descriptor.primitive.cull_mode = None;
        Ok(())
    }
}

/// Clear colour of the visible camera, inverted at night like the points.
pub fn clear_color(frame: &FrameSnapshot) -> Color {
    let rgb = hex_to_rgb(frame.clear_color);
    let rgb = if frame.night_mode { Vec3::ONE - rgb } else { rgb };
    Color::srgb(rgb.x, rgb.y, rgb.z)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::render::SpriteSheet;
    use crate::engine::render::shaders::Fog;
    use pretty_assertions::assert_eq;

    impl PointUniform {
        fn has_flag(&self, flag: u32) -> bool {
            self.flags & flag != 0
        }
    }

    fn layer(material: PointMaterial) -> PointsNode {
        PointsNode {
            positions: Arc::from(vec![0.0; 3]),
            colors: Arc::from(vec![1.0; 3]),
            scale_factors: None,
            point_size: 12.0,
            size_attenuation: false,
            sprites: None,
            material,
        }
    }

    #[test]
    fn picking_pass_ignores_fog_and_night_mode() {
        let frame = FrameSnapshot {
            night_mode: true,
            ..default()
        };
        let params = PointUniform::new(&frame, &layer(PointMaterial::Picking));
        assert!(params.has_flag(FLAG_PICKING));
        assert!(!params.has_flag(FLAG_INVERT));
        assert!(!params.has_flag(FLAG_FOG));
        assert!(!params.has_flag(FLAG_SIZE_ATTENUATION));
    }

    #[test]
    fn visible_pass_carries_fog_and_sprites() {
        let frame = FrameSnapshot {
            viewport: UVec2::new(640, 480),
            ..default()
        };
        let mut visible = layer(PointMaterial::Visible {
            fog: Some(Fog::from_hex(0x000000, 1.0, 3.0)),
        });
        visible.size_attenuation = true;
        visible.sprites = Some(Arc::new(
            SpriteSheet::from_atlas(8, 4, vec![0; 8 * 4 * 4], [2, 2]).unwrap(),
        ));

        let params = PointUniform::new(&frame, &visible);
        assert!(params.has_flag(FLAG_FOG));
        assert!(params.has_flag(FLAG_SPRITES));
        assert!(params.has_flag(FLAG_SIZE_ATTENUATION));
        assert!(!params.has_flag(FLAG_PICKING));
        assert_eq!((params.fog_near, params.fog_far), (1.0, 3.0));
        assert_eq!(params.fog_color, Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(params.sprite_grid, Vec2::new(4.0, 2.0));
        assert_eq!(params.viewport, Vec2::new(640.0, 480.0));
        assert_eq!(params.min_point_size, MIN_POINT_SIZE);
    }

    #[test]
    fn night_clear_colour_is_inverted() {
        let mut frame = FrameSnapshot {
            clear_color: 0xFF_FFFF,
            ..default()
        };
        assert_eq!(clear_color(&frame), Color::srgb(1.0, 1.0, 1.0));
        frame.night_mode = true;
        assert_eq!(clear_color(&frame), Color::srgb(0.0, 0.0, 0.0));
        assert_eq!(AxesUniform::new(&frame).flags, FLAG_INVERT);
    }
}
