//! Bevy host integration.
//!
//! [`ProjectorPlugin`] keeps a [`ScatterPlot`] as a resource sized to the
//! primary window, feeds it window input, advances the orbit animation
//! once per frame and draws it through [`PointSpriteRenderPlugin`]. The id
//! pass is read back from the GPU into the plot's picking texture, and a
//! drag in area select mode shows a selection rectangle over the plot.
//! Controller notifications are re-emitted as [`ProjectorEvent`]s and
//! forwarded to the frontend over JSON-RPC.

use std::sync::Arc;

use bevy::input::keyboard::KeyboardInput;
use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::input::ButtonState;
use bevy::prelude::*;
use bevy::render::gpu_readback::{Readback, ReadbackComplete};
use bevy::render::render_resource::TextureFormat;
use bevy::tasks::futures_lite::future;
use bevy::tasks::{AsyncComputeTaskPool, Task, block_on};
use bevy::window::{PrimaryWindow, SystemCursorIcon, WindowResized};
use bevy::winit::cursor::CursorIcon;
use bevy_common_assets::json::JsonAssetPlugin;
use constants::knn::{KNN_CPU_MSG_ID, KNN_GPU_MSG_ID};
use serde::Deserialize;

use crate::config::{ProjectorConfig, SpriteSheetConfig};
use crate::engine::events::{ProjectorEvent, QueuedEventContext};
use crate::engine::interaction::{CursorStyle, ScatterBoundingBox};
#[cfg(not(target_arch = "wasm32"))]
use crate::engine::knn::WgpuDotProduct;
use crate::engine::knn::{CpuDotProduct, Neighbors, find_knn_gpu_cosine};
use crate::engine::progress::{ModalMessages, ProgressReporter};
use crate::engine::render::point_sprite_plugin::spawn_render_cameras;
use crate::engine::render::{
    GpuFrames, GpuSceneRenderer, PickingTarget, PointSpriteRenderPlugin, SpriteSheet,
};
use crate::engine::scatter_plot::ScatterPlot;
use crate::engine::visualizers::PointsVisualizer;
use crate::error::ProjectorError;
use crate::rpc::web_rpc::{WebRpcInterface, WebRpcPlugin};

/// Two releases within this many seconds count as a double click.
const DOUBLE_CLICK_SECONDS: f32 = 0.3;

/// Pixels scrolled per wheel line.
const WHEEL_LINE_HEIGHT: f32 = 16.0;

/// The scatter plot and the queue its notifications land in.
#[derive(Resource)]
pub struct ScatterPlotHost {
    pub plot: ScatterPlot,
    pub events: QueuedEventContext,
}

/// Overlay of the rectangle being dragged in area select mode.
#[derive(Component)]
pub struct SelectionRectangle;

const SELECTION_FILL: Color = Color::srgba(0.667, 0.667, 0.667, 0.2);
const SELECTION_BORDER: Color = Color::srgb(0.667, 0.667, 0.667);
const SELECTION_BORDER_WIDTH: f32 = 2.0;

/// Status line showing the KNN progress message.
#[derive(Component)]
pub struct ModalMessageText;

/// Neighbour search over raw vectors, run off the main thread.
#[derive(Event, Debug, Clone, Deserialize)]
pub struct KnnRequest {
    pub vectors: Vec<Vec<f32>>,
    pub k: usize,
}

/// Result of a [`KnnRequest`].
#[derive(Event, Debug, Clone)]
pub struct KnnComputed {
    pub neighbors: Neighbors,
}

#[derive(Component)]
struct KnnTask(Task<Neighbors>);

#[derive(Resource, Default)]
struct ConfigLoader {
    handle: Option<Handle<ProjectorConfig>>,
    loaded: bool,
}

/// Hosts a scatter plot in the primary window.
///
/// With `config_path` set, the JSON asset at that path is applied once it
/// has loaded; until then the plot runs with [`ProjectorConfig::default`].
#[derive(Default)]
pub struct ProjectorPlugin {
    pub config_path: Option<String>,
}

impl ProjectorPlugin {
    pub fn with_config_path(path: impl Into<String>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }
}

#[derive(Resource)]
struct ConfigPath(String);

/// Sprite atlas requested by the config, until its image has loaded.
#[derive(Default)]
struct PendingSpriteSheet {
    config: Option<SpriteSheetConfig>,
    handle: Option<Handle<Image>>,
}

impl Plugin for ProjectorPlugin {
    fn build(&self, app: &mut App) {
        if !app.is_plugin_added::<WebRpcPlugin>() {
            app.add_plugins(WebRpcPlugin);
        }

        if !app.is_plugin_added::<PointSpriteRenderPlugin>() {
            app.add_plugins(PointSpriteRenderPlugin);
        }

        app.add_plugins(JsonAssetPlugin::<ProjectorConfig>::new(&["projector.json"]))
            .init_resource::<ProjectorConfig>()
            .init_resource::<ConfigLoader>()
            .init_resource::<ModalMessages>()
            .add_event::<ProjectorEvent>()
            .add_event::<KnnRequest>()
            .add_event::<KnnComputed>()
            .add_systems(
                Startup,
                (setup_scatter_plot, spawn_picking_readback.after(spawn_render_cameras)),
            )
            .add_systems(
                Update,
                (
                    load_config_system,
                    load_sprite_sheet,
                    handle_window_resize,
                    forward_pointer_input,
                    forward_keyboard_input,
                    tick_orbit_animation,
                    publish_projector_events,
                    update_cursor_icon,
                    draw_selection_rectangle,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (spawn_knn_tasks, collect_knn_results, update_modal_message_text),
            );

        if let Some(path) = &self.config_path {
            app.insert_resource(ConfigPath(path.clone()));
        }
    }
}

/// Applies a configuration to a running plot and renders.
pub fn apply_config(plot: &mut ScatterPlot, config: &ProjectorConfig) -> Result<(), ProjectorError> {
    config.validate()?;
    plot.set_camera_parameters_for_next_camera_creation(config.camera.clone(), config.orbit_animation);
    plot.set_dimensions(config.dimensionality)?;
    plot.set_mouse_mode(config.mouse_mode);
    plot.set_background_color(config.background_color);
    plot.set_day_night_mode(config.night_mode);
    plot.render();
    Ok(())
}

fn setup_scatter_plot(
    mut commands: Commands,
    config: Res<ProjectorConfig>,
    windows: Query<&Window, With<PrimaryWindow>>,
    frames: Res<GpuFrames>,
) {
    let (size, scale_factor) = match windows.single() {
        Ok(window) => (Vec2::new(window.width(), window.height()), window.scale_factor()),
        Err(_) => (config.viewport(), config.device_pixel_ratio),
    };

    let events = QueuedEventContext::new();
    let mut plot = ScatterPlot::new(
        size.x,
        size.y,
        scale_factor,
        Box::new(GpuSceneRenderer::new(size.x, size.y, frames.clone())),
        Arc::new(events.clone()),
    );
    plot.add_visualizer(Box::new(PointsVisualizer::new()));
    if let Err(err) = apply_config(&mut plot, &config) {
        error!("Ignoring invalid projector config: {}", err);
    }
    info!(
        "Scatter plot ready: {}x{} CSS px at {}x",
        size.x, size.y, scale_factor
    );

    commands.spawn((
        BackgroundColor(SELECTION_FILL),
        BorderColor(SELECTION_BORDER),
        Node {
            position_type: PositionType::Absolute,
            display: Display::None,
            border: UiRect::all(Val::Px(SELECTION_BORDER_WIDTH)),
            ..default()
        },
        SelectionRectangle,
    ));
    commands.spawn((
        Text::new(""),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(Color::srgb(0.2, 0.2, 0.2)),
        Node {
            position_type: PositionType::Absolute,
            bottom: Val::Px(12.0),
            left: Val::Px(12.0),
            ..default()
        },
        ModalMessageText,
    ));

    commands.insert_resource(ScatterPlotHost { plot, events });
}

fn load_config_system(
    path: Option<Res<ConfigPath>>,
    mut loader: ResMut<ConfigLoader>,
    asset_server: Res<AssetServer>,
    configs: Res<Assets<ProjectorConfig>>,
    mut host: ResMut<ScatterPlotHost>,
    mut commands: Commands,
) {
    let Some(path) = path else {
        return;
    };
    if loader.loaded {
        return;
    }

    let Some(handle) = loader.handle.clone() else {
        info!("Loading projector config from: {}", path.0);
        loader.handle = Some(asset_server.load(&path.0));
        return;
    };

    if let Some(config) = configs.get(&handle) {
        match apply_config(&mut host.plot, config) {
            Ok(()) => info!("Applied projector config"),
            Err(err) => error!("Ignoring invalid projector config: {}", err),
        }
        commands.insert_resource(config.clone());
        loader.loaded = true;
    }
}

fn handle_window_resize(
    mut resized: EventReader<WindowResized>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut host: ResMut<ScatterPlotHost>,
) {
    let Some(event) = resized.read().last() else {
        return;
    };
    if let Ok(window) = windows.single() {
        if window.scale_factor() != host.plot.device_pixel_ratio() {
            host.plot.set_device_pixel_ratio(window.scale_factor());
        }
    }
    host.plot.resize(event.width, event.height, true);
}

fn forward_pointer_input(
    mut host: ResMut<ScatterPlotHost>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    keys: Res<ButtonInput<KeyCode>>,
    mut cursor_moved: EventReader<CursorMoved>,
    mut wheel: EventReader<MouseWheel>,
    windows: Query<&Window, With<PrimaryWindow>>,
    time: Res<Time>,
    mut last_release: Local<Option<f32>>,
) {
    let ctrl = keys.any_pressed([
        KeyCode::ControlLeft,
        KeyCode::ControlRight,
        KeyCode::SuperLeft,
        KeyCode::SuperRight,
    ]);

    for event in cursor_moved.read() {
        host.plot.on_mouse_move(event.position);
    }

    let cursor = windows.single().ok().and_then(Window::cursor_position);
    if let Some(position) = cursor {
        for button in mouse_buttons.get_just_pressed() {
            host.plot.on_mouse_down(*button, position, ctrl);
        }
    }

    if mouse_buttons.get_just_released().next().is_some() {
        host.plot.on_mouse_up();
        let now = time.elapsed_secs();
        if last_release.is_some_and(|last| now - last <= DOUBLE_CLICK_SECONDS) {
            host.plot.on_double_click();
            *last_release = None;
        } else {
            *last_release = Some(now);
        }
    }

    for event in wheel.read() {
        let delta = match event.unit {
            MouseScrollUnit::Line => event.y * WHEEL_LINE_HEIGHT,
            MouseScrollUnit::Pixel => event.y,
        };
        // Wheel up zooms in, like a negative DOM deltaY.
        host.plot.on_wheel(-delta);
    }
}

fn forward_keyboard_input(
    mut host: ResMut<ScatterPlotHost>,
    mut keyboard: EventReader<KeyboardInput>,
    keys: Res<ButtonInput<KeyCode>>,
) {
    let ctrl = keys.any_pressed([
        KeyCode::ControlLeft,
        KeyCode::ControlRight,
        KeyCode::SuperLeft,
        KeyCode::SuperRight,
    ]);

    for event in keyboard.read() {
        match event.state {
            ButtonState::Pressed if !event.repeat => host.plot.on_key_down(event.key_code, ctrl),
            ButtonState::Released => host.plot.on_key_up(event.key_code),
            _ => {}
        }
    }
}

fn tick_orbit_animation(mut host: ResMut<ScatterPlotHost>) {
    if host.plot.is_orbit_animating() {
        host.plot.on_animation_frame();
    }
}

fn publish_projector_events(
    host: Res<ScatterPlotHost>,
    mut writer: EventWriter<ProjectorEvent>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for event in host.events.drain() {
        match serde_json::to_value(&event) {
            Ok(params) => rpc_interface.send_notification(event.method(), params),
            Err(err) => error!("Failed to serialize {}: {}", event.method(), err),
        }
        writer.write(event);
    }
}

fn update_cursor_icon(
    host: Res<ScatterPlotHost>,
    windows: Query<Entity, With<PrimaryWindow>>,
    mut commands: Commands,
    mut shown: Local<Option<CursorStyle>>,
) {
    let style = host.plot.cursor();
    if *shown == Some(style) {
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let icon = match style {
        CursorStyle::Default => SystemCursorIcon::Default,
        CursorStyle::Crosshair => SystemCursorIcon::Crosshair,
        CursorStyle::Move => SystemCursorIcon::Move,
    };
    commands.entity(window).insert(CursorIcon::from(icon));
    *shown = Some(style);
}

/// Streams the id pass back into the plot's picking texture every frame.
fn spawn_picking_readback(mut commands: Commands, target: Res<PickingTarget>) {
    commands
        .spawn(Readback::texture(target.0.clone()))
        .observe(apply_picking_readback);
}

fn apply_picking_readback(
    trigger: Trigger<ReadbackComplete>,
    host: Option<ResMut<ScatterPlotHost>>,
) {
    let Some(mut host) = host else {
        return;
    };
    if !host.plot.apply_picking_readback(&trigger.event().0) {
        debug!(
            "Dropped picking readback of {} bytes after a resize",
            trigger.event().0.len()
        );
    }
}

/// Overlay node layout for a selection box in window pixels.
fn selection_rectangle_node(node: &mut Node, selection: Option<ScatterBoundingBox>) {
    let Some(bbox) = selection else {
        node.display = Display::None;
        return;
    };
    node.display = Display::Flex;
    node.left = Val::Px(bbox.x);
    node.top = Val::Px(bbox.y);
    node.width = Val::Px(bbox.width);
    node.height = Val::Px(bbox.height);
}

fn draw_selection_rectangle(
    host: Res<ScatterPlotHost>,
    mut overlay: Query<&mut Node, With<SelectionRectangle>>,
) {
    let selection = host.plot.rectangle_selection();
    for mut node in &mut overlay {
        selection_rectangle_node(&mut node, selection);
    }
}

/// Converts a loaded image into an RGBA8 sprite atlas.
pub fn sprite_sheet_from_image(
    image: &Image,
    single_image_dim: [u32; 2],
) -> Result<SpriteSheet, ProjectorError> {
    let rgba = match image.texture_descriptor.format {
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => None,
        format => Some(
            image
                .convert(TextureFormat::Rgba8UnormSrgb)
                .ok_or(ProjectorError::SpriteSheetFormat(format))?,
        ),
    };
    let image = rgba.as_ref().unwrap_or(image);
    let pixels = image
        .data
        .clone()
        .ok_or(ProjectorError::SpriteSheetFormat(image.texture_descriptor.format))?;
    SpriteSheet::from_atlas(image.width(), image.height(), pixels, single_image_dim)
}

fn load_sprite_sheet(
    config: Res<ProjectorConfig>,
    asset_server: Res<AssetServer>,
    images: Res<Assets<Image>>,
    mut host: ResMut<ScatterPlotHost>,
    mut pending: Local<PendingSpriteSheet>,
) {
    if config.is_changed() && pending.config != config.sprite_sheet {
        pending.config = config.sprite_sheet.clone();
        pending.handle = pending.config.as_ref().map(|sheet| {
            info!("Loading sprite sheet from: {}", sheet.path);
            asset_server.load(&sheet.path)
        });
        if pending.handle.is_none() {
            host.plot.set_sprite_sheet(None);
            host.plot.render();
        }
    }

    let (Some(sheet), Some(handle)) = (&pending.config, &pending.handle) else {
        return;
    };
    let Some(image) = images.get(handle) else {
        return;
    };
    match sprite_sheet_from_image(image, sheet.single_image_dim) {
        Ok(atlas) => {
            info!(
                "Sprite sheet ready: {}x{} sprites",
                atlas.sprites_per_row, atlas.sprites_per_column
            );
            host.plot.set_sprite_sheet(Some(atlas));
            host.plot.render();
        }
        Err(err) => error!("Ignoring sprite sheet {}: {}", sheet.path, err),
    }
    pending.handle = None;
}

/// Runs a neighbour search, on the GPU when an adapter is available.
pub async fn compute_knn(request: &KnnRequest, progress: &mut dyn ProgressReporter) -> Neighbors {
    #[cfg(not(target_arch = "wasm32"))]
    match WgpuDotProduct::new().await {
        Ok(mut backend) => {
            return find_knn_gpu_cosine(&request.vectors, request.k, Vec::as_slice, &mut backend, progress)
                .await;
        }
        Err(err) => warn!("{}, using the CPU dot product backend", err),
    }

    let mut backend = CpuDotProduct::default();
    find_knn_gpu_cosine(&request.vectors, request.k, Vec::as_slice, &mut backend, progress).await
}

fn spawn_knn_tasks(
    mut commands: Commands,
    mut requests: EventReader<KnnRequest>,
    messages: Res<ModalMessages>,
) {
    let pool = AsyncComputeTaskPool::get();
    for request in requests.read() {
        let request = request.clone();
        let mut progress = messages.clone();
        info!(
            "Finding {} nearest neighbours of {} points",
            request.k,
            request.vectors.len()
        );
        let task = pool.spawn(async move { compute_knn(&request, &mut progress).await });
        commands.spawn(KnnTask(task));
    }
}

fn collect_knn_results(
    mut commands: Commands,
    mut tasks: Query<(Entity, &mut KnnTask)>,
    mut computed: EventWriter<KnnComputed>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for (entity, mut task) in &mut tasks {
        let Some(neighbors) = block_on(future::poll_once(&mut task.0)) else {
            continue;
        };
        rpc_interface.send_notification(
            "knn_computed",
            serde_json::json!({ "neighbors": neighbors }),
        );
        computed.write(KnnComputed { neighbors });
        commands.entity(entity).despawn();
    }
}

fn update_modal_message_text(
    messages: Res<ModalMessages>,
    mut query: Query<&mut Text, With<ModalMessageText>>,
) {
    let message = messages
        .get(KNN_GPU_MSG_ID)
        .or_else(|| messages.get(KNN_CPU_MSG_ID))
        .unwrap_or_default();
    for mut text in &mut query {
        if text.0 != message {
            text.0.clone_from(&message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::interaction::MouseMode;
    use crate::engine::progress::LogProgress;
    use crate::engine::render::SoftwareRenderer;
    use bevy::asset::RenderAssetUsages;
    use bevy::render::render_resource::{Extent3d, TextureDimension};
    use pretty_assertions::assert_eq;

    fn plot() -> ScatterPlot {
        ScatterPlot::new(
            100.0,
            100.0,
            1.0,
            Box::new(SoftwareRenderer::default()),
            Arc::new(QueuedEventContext::new()),
        )
    }

    #[test]
    fn config_is_applied_to_the_plot() {
        let mut plot = plot();
        let config = ProjectorConfig {
            dimensionality: 2,
            mouse_mode: MouseMode::AreaSelect,
            night_mode: true,
            ..default()
        };
        apply_config(&mut plot, &config).unwrap();
        assert_eq!(plot.dimensionality(), 2);
        assert_eq!(plot.mouse_mode(), MouseMode::AreaSelect);
        assert!(plot.is_night_mode());
    }

    #[test]
    fn invalid_config_leaves_the_plot_alone() {
        let mut plot = plot();
        let config = ProjectorConfig {
            dimensionality: 7,
            ..default()
        };
        assert!(apply_config(&mut plot, &config).is_err());
        assert_eq!(plot.dimensionality(), 3);
    }

    #[test]
    fn selection_overlay_follows_the_drag() {
        let mut node = Node::default();
        selection_rectangle_node(
            &mut node,
            Some(ScatterBoundingBox {
                x: 10.0,
                y: 20.0,
                width: 40.0,
                height: 30.0,
            }),
        );
        assert_eq!(node.display, Display::Flex);
        assert_eq!((node.left, node.top), (Val::Px(10.0), Val::Px(20.0)));
        assert_eq!((node.width, node.height), (Val::Px(40.0), Val::Px(30.0)));

        selection_rectangle_node(&mut node, None);
        assert_eq!(node.display, Display::None);
    }

    #[test]
    fn drag_in_area_select_shows_the_overlay() {
        let mut plot = plot();
        plot.set_mouse_mode(MouseMode::AreaSelect);
        plot.on_key_down(KeyCode::ShiftLeft, false);
        plot.on_mouse_down(MouseButton::Left, Vec2::new(60.0, 50.0), false);
        plot.on_mouse_move(Vec2::new(20.0, 10.0));

        let mut node = Node::default();
        selection_rectangle_node(&mut node, plot.rectangle_selection());
        assert_eq!(node.display, Display::Flex);
        assert_eq!((node.left, node.top), (Val::Px(20.0), Val::Px(10.0)));
        assert_eq!((node.width, node.height), (Val::Px(40.0), Val::Px(40.0)));

        plot.on_mouse_up();
        selection_rectangle_node(&mut node, plot.rectangle_selection());
        assert_eq!(node.display, Display::None);
    }

    fn atlas_image(width: u32, height: u32, format: TextureFormat, texel: &[u8]) -> Image {
        Image::new_fill(
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            TextureDimension::D2,
            texel,
            format,
            RenderAssetUsages::MAIN_WORLD,
        )
    }

    #[test]
    fn sprite_sheet_is_cut_from_an_rgba_image() {
        let image = atlas_image(8, 4, TextureFormat::Rgba8UnormSrgb, &[1, 2, 3, 4]);
        let sheet = sprite_sheet_from_image(&image, [4, 2]).unwrap();
        assert_eq!((sheet.sprites_per_row, sheet.sprites_per_column), (2.0, 2.0));
        assert_eq!(sheet.pixels.len(), 8 * 4 * 4);
        assert_eq!(&sheet.pixels[..4], &[1, 2, 3, 4]);

        assert!(matches!(
            sprite_sheet_from_image(&image, [16, 2]),
            Err(ProjectorError::InvalidSpriteSheet { tile_width: 16, .. })
        ));
    }

    #[test]
    fn bgra_sprite_sheets_are_converted() {
        let image = atlas_image(2, 2, TextureFormat::Bgra8UnormSrgb, &[3, 2, 1, 4]);
        let sheet = sprite_sheet_from_image(&image, [1, 1]).unwrap();
        assert_eq!(&sheet.pixels[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn knn_request_deserialises() {
        let request: KnnRequest =
            serde_json::from_str(r#"{ "vectors": [[1, 0], [0, 1], [1, 1]], "k": 1 }"#).unwrap();
        let neighbors = block_on(async {
            let mut backend = CpuDotProduct::default();
            find_knn_gpu_cosine(
                &request.vectors,
                request.k,
                Vec::as_slice,
                &mut backend,
                &mut LogProgress,
            )
            .await
        });
        assert_eq!(neighbors.len(), 3);
        assert_eq!(neighbors[0][0].index, 2);
    }
}
