use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::mesh::PrimitiveTopology;

use super::point_material::ATTRIBUTE_POINT_SPRITE;
use super::scene::PointsNode;

/// Two triangles per point; the vertex shader pushes each corner out to the
/// point's size in screen space.
const QUAD_CORNERS: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

const AXIS_COLORS: [[f32; 4]; 3] = [
    [1.0, 0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
    [0.0, 0.0, 1.0, 1.0],
];

/// Quad mesh of a points layer. Every vertex of a point repeats its
/// position and colour.
pub fn create_point_sprite_mesh(layer: &PointsNode) -> Mesh {
    let point_count = layer.point_count();
    let vertex_count = point_count * QUAD_CORNERS.len();
    let mut positions = Vec::with_capacity(vertex_count);
    let mut colors = Vec::with_capacity(vertex_count);
    let mut sprites = Vec::with_capacity(vertex_count);

    for index in 0..point_count {
        let position = [
            layer.positions[index * 3],
            layer.positions[index * 3 + 1],
            layer.positions[index * 3 + 2],
        ];
        let color = layer
            .colors
            .get(index * 3..index * 3 + 3)
            .map_or([1.0; 4], |c| [c[0], c[1], c[2], 1.0]);
        let scale = layer
            .scale_factors
            .as_ref()
            .and_then(|s| s.get(index).copied())
            .unwrap_or(1.0);

        for [x, y] in QUAD_CORNERS {
            positions.push(position);
            colors.push(color);
            sprites.push([x, y, scale, index as f32]);
        }
    }

    Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::RENDER_WORLD)
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_COLOR, colors)
        .with_inserted_attribute(ATTRIBUTE_POINT_SPRITE, sprites)
}

/// Red, green and blue arms of `size` along +x, +y and +z.
pub fn create_axes_mesh(size: f32) -> Mesh {
    let mut positions = Vec::with_capacity(6);
    let mut colors = Vec::with_capacity(6);
    for (axis, color) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().zip(AXIS_COLORS) {
        positions.extend([[0.0; 3], (axis * size).to_array()]);
        colors.extend([color, color]);
    }
    Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::RENDER_WORLD)
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_COLOR, colors)
}
