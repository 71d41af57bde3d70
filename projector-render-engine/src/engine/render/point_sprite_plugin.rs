//! Bevy systems drawing the recorded [`FrameSnapshot`]s.
//!
//! The visible pass goes to the window through [`VisibleCamera`] on render
//! layer 0. The picking pass renders on layer 1 into the [`PickingTarget`]
//! image, which the host reads back into the plot's picking texture.

use std::collections::HashSet;
use std::sync::Arc;

use bevy::asset::RenderAssetUsages;
use bevy::core_pipeline::tonemapping::{DebandDither, Tonemapping};
use bevy::image::ImageSampler;
use bevy::prelude::*;
use bevy::render::camera::RenderTarget;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat, TextureUsages};
use bevy::render::view::{NoFrustumCulling, RenderLayers};
use bevy::ui::IsDefaultUiCamera;

use super::gpu::{FrameSnapshot, GpuFrames};
use super::point_material::{AxesMaterial, AxesUniform, PointSpriteMaterial, PointUniform, clear_color};
use super::point_sprite_mesh::{create_axes_mesh, create_point_sprite_mesh};
use super::scene::{PointsNode, SpriteSheet};

pub const VISIBLE_LAYER: usize = 0;
pub const PICKING_LAYER: usize = 1;

#[derive(Component)]
pub struct VisibleCamera;

#[derive(Component)]
pub struct PickingCamera;

/// Image the picking camera renders point ids into.
#[derive(Resource, Clone)]
pub struct PickingTarget(pub Handle<Image>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Visible,
    Picking,
}

impl Pass {
    fn render_layer(self) -> usize {
        match self {
            Pass::Visible => VISIBLE_LAYER,
            Pass::Picking => PICKING_LAYER,
        }
    }

    fn layers(self, frame: &FrameSnapshot) -> &[PointsNode] {
        match self {
            Pass::Visible => &frame.visible.layers,
            Pass::Picking => &frame.picking.layers,
        }
    }
}

/// Arrays the current mesh of a layer entity was built from.
struct MeshSource {
    positions: Arc<[f32]>,
    colors: Arc<[f32]>,
    scale_factors: Option<Arc<[f32]>>,
}

impl MeshSource {
    fn of(layer: &PointsNode) -> Self {
        Self {
            positions: layer.positions.clone(),
            colors: layer.colors.clone(),
            scale_factors: layer.scale_factors.clone(),
        }
    }

    fn matches(&self, layer: &PointsNode) -> bool {
        let scale_factors = match (&self.scale_factors, &layer.scale_factors) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        Arc::ptr_eq(&self.positions, &layer.positions)
            && Arc::ptr_eq(&self.colors, &layer.colors)
            && scale_factors
    }
}

/// One points layer of one pass.
#[derive(Component)]
pub struct SpriteLayer {
    pub pass: Pass,
    pub slot: usize,
    source: MeshSource,
}

#[derive(Component)]
pub struct AxesHelper {
    size: f32,
}

/// Sprite atlas uploaded for the visible pass.
#[derive(Resource, Default)]
struct SpriteSheetImage(Option<(Arc<SpriteSheet>, Handle<Image>)>);

impl SpriteSheetImage {
    fn handle_for(&mut self, layer: &PointsNode, images: &mut Assets<Image>) -> Option<Handle<Image>> {
        let sheet = layer.sprites.as_ref()?;
        if let Some((uploaded, handle)) = &self.0 {
            if Arc::ptr_eq(uploaded, sheet) {
                return Some(handle.clone());
            }
        }
        let handle = images.add(sprite_sheet_image(sheet));
        self.0 = Some((sheet.clone(), handle.clone()));
        Some(handle)
    }
}

pub struct PointSpriteRenderPlugin;

impl Plugin for PointSpriteRenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            MaterialPlugin::<PointSpriteMaterial> {
                prepass_enabled: false,
                shadows_enabled: false,
                ..default()
            },
            MaterialPlugin::<AxesMaterial> {
                prepass_enabled: false,
                shadows_enabled: false,
                ..default()
            },
        ))
        .init_resource::<GpuFrames>()
        .init_resource::<SpriteSheetImage>()
        .add_systems(Startup, spawn_render_cameras)
        .add_systems(PostUpdate, sync_frame_to_gpu);
    }
}

/// Off-screen RGBA8 target the id pass renders into and is read back from.
pub fn picking_target_image(size: UVec2) -> Image {
    let mut image = Image::new_fill(
        Extent3d {
            width: size.x.max(1),
            height: size.y.max(1),
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &[255, 255, 255, 255],
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    );
    image.texture_descriptor.usage = TextureUsages::TEXTURE_BINDING
        | TextureUsages::COPY_DST
        | TextureUsages::COPY_SRC
        | TextureUsages::RENDER_ATTACHMENT;
    image
}

/// Sprite atlas as a texture sampled with the raw byte values.
pub fn sprite_sheet_image(sheet: &SpriteSheet) -> Image {
    let mut image = Image::new(
        Extent3d {
            width: sheet.width,
            height: sheet.height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        sheet.pixels.clone(),
        TextureFormat::Rgba8Unorm,
        RenderAssetUsages::RENDER_WORLD,
    );
    image.sampler = ImageSampler::nearest();
    image
}

pub fn spawn_render_cameras(mut commands: Commands, mut images: ResMut<Assets<Image>>) {
    let target = images.add(picking_target_image(UVec2::ONE));

    commands.spawn((
        Camera3d::default(),
        Camera {
            clear_color: ClearColorConfig::Custom(Color::WHITE),
            ..default()
        },
        Tonemapping::None,
        RenderLayers::layer(VISIBLE_LAYER),
        IsDefaultUiCamera,
        VisibleCamera,
    ));

    commands.spawn((
        Camera3d::default(),
        Camera {
            order: -1,
            target: RenderTarget::Image(target.clone().into()),
            clear_color: ClearColorConfig::Custom(Color::WHITE),
            ..default()
        },
        Msaa::Off,
        Tonemapping::None,
        DebandDither::Disabled,
        RenderLayers::layer(PICKING_LAYER),
        PickingCamera,
    ));

    commands.insert_resource(PickingTarget(target));
}

fn sync_frame_to_gpu(
    frames: Res<GpuFrames>,
    mut generation: Local<u64>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut images: ResMut<Assets<Image>>,
    mut point_materials: ResMut<Assets<PointSpriteMaterial>>,
    mut axes_materials: ResMut<Assets<AxesMaterial>>,
    mut sprite_image: ResMut<SpriteSheetImage>,
    picking_target: Option<Res<PickingTarget>>,
    mut layers: Query<(
        Entity,
        &mut SpriteLayer,
        &Mesh3d,
        &MeshMaterial3d<PointSpriteMaterial>,
    )>,
    mut axes: Query<(Entity, &mut AxesHelper, &Mesh3d, &MeshMaterial3d<AxesMaterial>)>,
    mut cameras: Query<&mut Camera, With<VisibleCamera>>,
) {
    let Some(frame) = frames.newer_than(*generation) else {
        return;
    };
    *generation = frame.generation;

    for mut camera in &mut cameras {
        camera.clear_color = ClearColorConfig::Custom(clear_color(&frame));
    }
    if let Some(target) = picking_target {
        resize_picking_target(&mut images, &target.0, frame.viewport);
    }

    let mut present = HashSet::new();
    for (entity, mut sprite_layer, mesh, material) in &mut layers {
        let Some(layer) = drawable_layer(&frame, sprite_layer.pass, sprite_layer.slot) else {
            commands.entity(entity).despawn();
            continue;
        };
        present.insert((sprite_layer.pass, sprite_layer.slot));
        if !sprite_layer.source.matches(layer) {
            if let Some(mesh) = meshes.get_mut(&mesh.0) {
                *mesh = create_point_sprite_mesh(layer);
            }
            sprite_layer.source = MeshSource::of(layer);
        }
        if let Some(material) = point_materials.get_mut(&material.0) {
            material.params = PointUniform::new(&frame, layer);
            material.sprite_sheet = match sprite_layer.pass {
                Pass::Visible => sprite_image.handle_for(layer, &mut images),
                Pass::Picking => None,
            };
        }
    }

    for pass in [Pass::Visible, Pass::Picking] {
        for slot in 0..pass.layers(&frame).len() {
            if present.contains(&(pass, slot)) {
                continue;
            }
            let Some(layer) = drawable_layer(&frame, pass, slot) else {
                continue;
            };
            let sprite_sheet = match pass {
                Pass::Visible => sprite_image.handle_for(layer, &mut images),
                Pass::Picking => None,
            };
            commands.spawn((
                Mesh3d(meshes.add(create_point_sprite_mesh(layer))),
                MeshMaterial3d(point_materials.add(PointSpriteMaterial {
                    params: PointUniform::new(&frame, layer),
                    sprite_sheet,
                })),
                RenderLayers::layer(pass.render_layer()),
                NoFrustumCulling,
                SpriteLayer {
                    pass,
                    slot,
                    source: MeshSource::of(layer),
                },
            ));
        }
    }

    sync_axes(&frame, &mut commands, &mut meshes, &mut axes_materials, &mut axes);
}

/// Layer `slot` of `pass`, unless it has no points to draw.
fn drawable_layer(frame: &FrameSnapshot, pass: Pass, slot: usize) -> Option<&PointsNode> {
    pass.layers(frame)
        .get(slot)
        .filter(|layer| layer.point_count() > 0)
}

fn resize_picking_target(images: &mut Assets<Image>, target: &Handle<Image>, size: UVec2) {
    let Some(image) = images.get_mut(target) else {
        return;
    };
    if image.size() != size {
        *image = picking_target_image(size);
    }
}

fn sync_axes(
    frame: &FrameSnapshot,
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<AxesMaterial>,
    axes: &mut Query<(Entity, &mut AxesHelper, &Mesh3d, &MeshMaterial3d<AxesMaterial>)>,
) {
    let mut shown = false;
    for (entity, mut helper, mesh, material) in axes.iter_mut() {
        let Some(size) = frame.visible.axes.filter(|_| !shown) else {
            commands.entity(entity).despawn();
            continue;
        };
        shown = true;
        if helper.size != size {
            if let Some(mesh) = meshes.get_mut(&mesh.0) {
                *mesh = create_axes_mesh(size);
            }
            helper.size = size;
        }
        if let Some(material) = materials.get_mut(&material.0) {
            material.params = AxesUniform::new(frame);
        }
    }

    if let Some(size) = frame.visible.axes.filter(|_| !shown) {
        commands.spawn((
            Mesh3d(meshes.add(create_axes_mesh(size))),
            MeshMaterial3d(materials.add(AxesMaterial {
                params: AxesUniform::new(frame),
            })),
            RenderLayers::layer(VISIBLE_LAYER),
            NoFrustumCulling,
            AxesHelper { size },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::camera::{CameraDef, ProjectorCamera};
    use crate::engine::picking::PickingTexture;
    use crate::engine::render::gpu::GpuSceneRenderer;
    use crate::engine::render::{PointMaterial, Scene, SceneNode, SceneRenderer};
    use pretty_assertions::assert_eq;

    fn app() -> (App, GpuFrames) {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Mesh>()
            .init_asset::<Image>()
            .init_asset::<PointSpriteMaterial>()
            .init_asset::<AxesMaterial>()
            .init_resource::<GpuFrames>()
            .init_resource::<SpriteSheetImage>()
            .add_systems(Update, sync_frame_to_gpu);
        let target = app
            .world_mut()
            .resource_mut::<Assets<Image>>()
            .add(picking_target_image(UVec2::ONE));
        app.insert_resource(PickingTarget(target));
        let frames = app.world().resource::<GpuFrames>().clone();
        (app, frames)
    }

    fn points(count: usize, material: PointMaterial) -> SceneNode {
        SceneNode::Points(PointsNode {
            positions: Arc::from(vec![0.0; count * 3]),
            colors: Arc::from(vec![1.0; count * 3]),
            scale_factors: None,
            point_size: 8.0,
            size_attenuation: false,
            sprites: None,
            material,
        })
    }

    fn record(frames: &GpuFrames, picking: &Scene, visible: &Scene) {
        let mut renderer = GpuSceneRenderer::new(64.0, 32.0, frames.clone());
        let camera = ProjectorCamera::from_def(&CameraDef::default_for(2), 64.0, 32.0);
        let mut texture = PickingTexture::new(64, 32);
        renderer.render_to_picking(picking, &camera, Vec3::ZERO, &mut texture);
        renderer.render(visible, &camera, Vec3::ZERO);
    }

    fn layer_count(app: &mut App, pass: Pass) -> usize {
        app.world_mut()
            .query::<&SpriteLayer>()
            .iter(app.world())
            .filter(|layer| layer.pass == pass)
            .count()
    }

    #[test]
    fn layers_follow_the_recorded_passes() {
        let (mut app, frames) = app();

        let mut picking = Scene::new();
        picking.add(points(3, PointMaterial::Picking));
        let mut visible = Scene::new();
        visible.add(points(3, PointMaterial::Visible { fog: None }));
        visible.add(SceneNode::Axes { size: 1.0 });
        record(&frames, &picking, &visible);
        app.update();

        assert_eq!(layer_count(&mut app, Pass::Picking), 1);
        assert_eq!(layer_count(&mut app, Pass::Visible), 1);
        let axes = app
            .world_mut()
            .query::<&AxesHelper>()
            .iter(app.world())
            .count();
        assert_eq!(axes, 1);

        let target = app.world().resource::<PickingTarget>().0.clone();
        let size = app.world().resource::<Assets<Image>>().get(&target).map(Image::size);
        assert_eq!(size, Some(UVec2::new(64, 32)));

        // Empty layers are not drawn and the axes go away in 2D.
        let mut visible = Scene::new();
        visible.add(points(0, PointMaterial::Visible { fog: None }));
        record(&frames, &picking, &visible);
        app.update();

        assert_eq!(layer_count(&mut app, Pass::Picking), 1);
        assert_eq!(layer_count(&mut app, Pass::Visible), 0);
        let axes = app
            .world_mut()
            .query::<&AxesHelper>()
            .iter(app.world())
            .count();
        assert_eq!(axes, 0);
    }

    #[test]
    fn sprite_sheets_upload_once() {
        let sheet = Arc::new(SpriteSheet::from_atlas(4, 4, vec![9; 64], [2, 2]).unwrap());
        let mut layer = match points(1, PointMaterial::Visible { fog: None }) {
            SceneNode::Points(layer) => layer,
            _ => unreachable!(),
        };
        layer.sprites = Some(sheet);

        let mut images = Assets::<Image>::default();
        let mut uploaded = SpriteSheetImage::default();
        let first = uploaded.handle_for(&layer, &mut images).unwrap();
        let second = uploaded.handle_for(&layer, &mut images).unwrap();
        assert_eq!(first, second);
        assert_eq!(images.len(), 1);
        assert_eq!(images.get(&first).and_then(|image| image.data.clone()), Some(vec![9; 64]));

        layer.sprites = None;
        assert_eq!(uploaded.handle_for(&layer, &mut images), None);
    }
}
