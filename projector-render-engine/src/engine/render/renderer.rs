//! Scene rasterisation.
//!
//! [`SoftwareRenderer`] draws point sprites on the CPU with a depth buffer.
//! It honours the shader contract in [`super::shaders`] and serves headless
//! plots. The Bevy host draws with [`super::gpu::GpuSceneRenderer`] instead.

use bevy::math::{IVec2, Mat4, UVec2, Vec2, Vec3, Vec4Swizzles};
use constants::render_settings::BACKGROUND_COLOR;

use super::scene::{PointMaterial, PointsNode, Scene, SceneNode, SpriteSheet};
use super::shaders::{hex_to_rgb, point_in_unit_circle, point_size, sprite_tile};
use crate::engine::camera::ProjectorCamera;
use crate::engine::picking::PickingTexture;

const AXIS_COLORS: [[u8; 3]; 3] = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];

/// Draws a [`Scene`] either to its own canvas or into a picking target.
pub trait SceneRenderer: Send + Sync {
    fn set_pixel_ratio(&mut self, ratio: f32);
    fn pixel_ratio(&self) -> f32;

    /// Canvas size in CSS pixels.
    fn set_size(&mut self, width: f32, height: f32);
    fn size(&self) -> Vec2;

    fn set_clear_color(&mut self, color: u32);

    /// Night mode inverts the presented colours. Renderers that present
    /// [`SceneRenderer::frame`] as is leave the inversion to the caller.
    fn set_night_mode(&mut self, _is_night: bool) {}

    /// Renders to the canvas.
    fn render(&mut self, scene: &Scene, camera: &ProjectorCamera, target: Vec3);

    /// Renders into `texture` instead of the canvas. The canvas is untouched.
    fn render_to_picking(
        &mut self,
        scene: &Scene,
        camera: &ProjectorCamera,
        target: Vec3,
        texture: &mut PickingTexture,
    );

    /// Last canvas frame, RGBA8 in device pixels.
    fn frame(&self) -> &[u8];
    fn frame_size(&self) -> UVec2;
}

/// Destination of rasterised fragments.
trait FragmentSink {
    fn size(&self) -> UVec2;
    fn put(&mut self, x: i32, y: i32, rgb: [u8; 3]);
}

struct Canvas<'a> {
    pixels: &'a mut [u8],
    size: UVec2,
}

impl FragmentSink for Canvas<'_> {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn put(&mut self, x: i32, y: i32, rgb: [u8; 3]) {
        let offset = (y as usize * self.size.x as usize + x as usize) * 4;
        self.pixels[offset..offset + 3].copy_from_slice(&rgb);
        self.pixels[offset + 3] = 255;
    }
}

impl FragmentSink for PickingTexture {
    fn size(&self) -> UVec2 {
        UVec2::new(self.width(), self.height())
    }

    fn put(&mut self, x: i32, y: i32, rgb: [u8; 3]) {
        self.write_rgb(x, y, rgb);
    }
}

pub struct SoftwareRenderer {
    pixel_ratio: f32,
    size: Vec2,
    clear_color: u32,
    night_mode: bool,
    frame: Vec<u8>,
    frame_size: UVec2,
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl SoftwareRenderer {
    pub fn new(width: f32, height: f32) -> Self {
        let mut renderer = Self {
            pixel_ratio: 1.0,
            size: Vec2::ZERO,
            clear_color: BACKGROUND_COLOR,
            night_mode: false,
            frame: Vec::new(),
            frame_size: UVec2::ZERO,
        };
        renderer.set_size(width, height);
        renderer
    }

    fn resize_frame(&mut self) {
        self.frame_size = device_size(self.size, self.pixel_ratio);
        self.frame = vec![0; (self.frame_size.x * self.frame_size.y * 4) as usize];
    }

    fn clear_frame(&mut self) {
        let rgb = to_bytes(hex_to_rgb(self.clear_color));
        for pixel in self.frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
    }
}

impl SceneRenderer for SoftwareRenderer {
    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio.max(f32::EPSILON);
        self.resize_frame();
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn set_size(&mut self, width: f32, height: f32) {
        self.size = Vec2::new(width.max(1.0), height.max(1.0));
        self.resize_frame();
    }

    fn size(&self) -> Vec2 {
        self.size
    }

    fn set_clear_color(&mut self, color: u32) {
        self.clear_color = color;
    }

    fn set_night_mode(&mut self, is_night: bool) {
        if self.night_mode != is_night {
            invert_rgb(&mut self.frame);
        }
        self.night_mode = is_night;
    }

    fn render(&mut self, scene: &Scene, camera: &ProjectorCamera, target: Vec3) {
        self.clear_frame();
        let size = self.frame_size;
        let mut canvas = Canvas {
            pixels: &mut self.frame,
            size,
        };
        draw_scene(scene, camera, target, &mut canvas, false);
        if self.night_mode {
            invert_rgb(&mut self.frame);
        }
    }

    fn render_to_picking(
        &mut self,
        scene: &Scene,
        camera: &ProjectorCamera,
        target: Vec3,
        texture: &mut PickingTexture,
    ) {
        texture.clear();
        draw_scene(scene, camera, target, texture, true);
    }

    fn frame(&self) -> &[u8] {
        &self.frame
    }

    fn frame_size(&self) -> UVec2 {
        self.frame_size
    }
}

/// Canvas size in device pixels, at least one pixel each way.
pub fn device_size(size: Vec2, pixel_ratio: f32) -> UVec2 {
    (size * pixel_ratio).floor().max(Vec2::ONE).as_uvec2()
}

/// Inverts the RGB channels of an RGBA8 frame, as night mode presents it.
fn invert_rgb(frame: &mut [u8]) {
    for pixel in frame.chunks_exact_mut(4) {
        for channel in &mut pixel[..3] {
            *channel = 255 - *channel;
        }
    }
}

fn to_bytes(rgb: Vec3) -> [u8; 3] {
    let c = (rgb.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8]
}

struct Transform {
    view: Mat4,
    projection: Mat4,
    size: Vec2,
}

impl Transform {
    /// Screen position in device pixels, NDC depth and view-space z.
    fn project(&self, world: Vec3) -> Option<(Vec2, f32, f32)> {
        let view_pos = self.view.transform_point3(world);
        let clip = self.projection * view_pos.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        let screen = Vec2::new(
            (ndc.x * 0.5 + 0.5) * self.size.x,
            (0.5 - ndc.y * 0.5) * self.size.y,
        );
        Some((screen, ndc.z, view_pos.z))
    }
}

fn draw_scene(
    scene: &Scene,
    camera: &ProjectorCamera,
    target: Vec3,
    sink: &mut dyn FragmentSink,
    picking: bool,
) {
    let size = sink.size();
    let transform = Transform {
        view: camera.view_matrix(target),
        projection: camera.projection_matrix(),
        size: size.as_vec2(),
    };
    let mut depth = vec![f32::INFINITY; (size.x * size.y) as usize];

    for node in scene.nodes() {
        match node {
            SceneNode::Points(points) => draw_points(points, &transform, sink, &mut depth, picking),
            SceneNode::Axes { size } => draw_axes(*size, &transform, sink, &mut depth),
            SceneNode::Light { .. } => {}
        }
    }
}

fn depth_test(depth: &mut [f32], size: UVec2, x: i32, y: i32, z: f32) -> bool {
    if x < 0 || y < 0 || x as u32 >= size.x || y as u32 >= size.y {
        return false;
    }
    let index = y as usize * size.x as usize + x as usize;
    if z <= depth[index] {
        depth[index] = z;
        true
    } else {
        false
    }
}

fn draw_points(
    node: &PointsNode,
    transform: &Transform,
    sink: &mut dyn FragmentSink,
    depth: &mut [f32],
    picking: bool,
) {
    let size = sink.size();
    let fog = match node.material {
        PointMaterial::Visible { fog } if !picking => fog,
        _ => None,
    };
    let picking = picking || node.material == PointMaterial::Picking;

    for index in 0..node.point_count() {
        let p = &node.positions[index * 3..index * 3 + 3];
        let Some((center, ndc_z, view_z)) = transform.project(Vec3::new(p[0], p[1], p[2])) else {
            continue;
        };
        let scale = node
            .scale_factors
            .as_ref()
            .and_then(|s| s.get(index).copied())
            .unwrap_or(1.0);
        let sprite_size = point_size(
            node.point_size,
            scale,
            node.size_attenuation,
            view_z,
            &transform.projection,
        );
        let color = node
            .colors
            .get(index * 3..index * 3 + 3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .unwrap_or(Vec3::ONE);

        let origin = center - Vec2::splat(sprite_size / 2.0);
        let bounds = size.as_ivec2();
        let min = origin.floor().as_ivec2().clamp(IVec2::ZERO, bounds);
        let max = (origin + Vec2::splat(sprite_size))
            .ceil()
            .as_ivec2()
            .clamp(IVec2::ZERO, bounds);

        for y in min.y..max.y {
            for x in min.x..max.x {
                let coord = (Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - origin) / sprite_size;
                if coord.cmplt(Vec2::ZERO).any() || coord.cmpgt(Vec2::ONE).any() {
                    continue;
                }
                let rgb = match &node.sprites {
                    Some(sheet) if !picking => color * sample_sprite(sheet, index, coord),
                    Some(_) => color,
                    None => {
                        if !point_in_unit_circle(coord) {
                            continue;
                        }
                        color
                    }
                };
                let rgb = match fog {
                    Some(fog) => fog.apply(rgb, -view_z),
                    None => rgb,
                };
                if depth_test(depth, size, x, y, ndc_z) {
                    sink.put(x, y, to_bytes(rgb));
                }
            }
        }
    }
}

fn sample_sprite(sheet: &SpriteSheet, index: usize, coord: Vec2) -> Vec3 {
    let tile = sprite_tile(index as f32, sheet.sprites_per_row, sheet.sprites_per_column);
    let uv = (coord + tile) / Vec2::new(sheet.sprites_per_row, sheet.sprites_per_column);
    let x = ((uv.x * sheet.width as f32) as u32).min(sheet.width.saturating_sub(1));
    let y = ((uv.y * sheet.height as f32) as u32).min(sheet.height.saturating_sub(1));
    let offset = (y as usize * sheet.width as usize + x as usize) * 4;
    match sheet.pixels.get(offset..offset + 3) {
        Some(texel) => Vec3::new(texel[0] as f32, texel[1] as f32, texel[2] as f32) / 255.0,
        None => Vec3::ONE,
    }
}

fn draw_axes(length: f32, transform: &Transform, sink: &mut dyn FragmentSink, depth: &mut [f32]) {
    let size = sink.size();
    let Some((origin, origin_z, _)) = transform.project(Vec3::ZERO) else {
        return;
    };
    for (axis, rgb) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().zip(AXIS_COLORS) {
        let Some((end, end_z, _)) = transform.project(axis * length) else {
            continue;
        };
        let steps = (end - origin).abs().max_element().ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let p = origin.lerp(end, t).floor().as_ivec2();
            let z = origin_z + (end_z - origin_z) * t;
            if depth_test(depth, size, p.x, p.y, z) {
                sink.put(p.x, p.y, rgb);
            }
        }
    }
}
