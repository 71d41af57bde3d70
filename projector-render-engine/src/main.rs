use bevy::asset::AssetMetaCheck;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy::window::PresentMode;
use projector_render_engine::plugin::{ProjectorPlugin, ScatterPlotHost};
use projector_render_engine::rpc::web_rpc::WebRpcInterface;

const CONFIG_ASSET_PATH: &str = "default.projector.json";

/// Size of the demo cloud shown until the frontend sends real data.
const DEMO_POINT_COUNT: usize = 2000;
const DEMO_SPIRAL_TURNS: f32 = 6.0;

fn main() {
    let mut app = create_app();

    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async move {
            app.run();
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        app.run();
    }
}

fn create_app() -> App {
    let mut app = App::new();

    app.add_plugins(create_default_plugins())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(ProjectorPlugin::with_config_path(CONFIG_ASSET_PATH))
        .add_systems(Startup, spawn_ui)
        .add_systems(PostStartup, load_demo_points)
        .add_systems(Update, (fps_text_update_system, fps_notification_system));

    app
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}

fn create_window_config() -> Window {
    #[cfg(target_arch = "wasm32")]
    {
        Window {
            canvas: Some("#bevy".into()),
            fit_canvas_to_parent: true,
            prevent_default_event_handling: false,
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Window {
            title: "Embedding Projector".into(),
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }
}

/// Seeds the plot with a coloured spiral so the window is not empty.
fn load_demo_points(host: Option<ResMut<ScatterPlotHost>>) {
    let Some(mut host) = host else {
        warn!("Scatter plot not initialised, skipping demo points");
        return;
    };

    let mut positions = Vec::with_capacity(DEMO_POINT_COUNT * 3);
    let mut colors = Vec::with_capacity(DEMO_POINT_COUNT * 3);
    for i in 0..DEMO_POINT_COUNT {
        let t = i as f32 / DEMO_POINT_COUNT as f32;
        let angle = t * DEMO_SPIRAL_TURNS * std::f32::consts::TAU;
        positions.extend_from_slice(&[t * angle.cos(), t * 2.0 - 1.0, t * angle.sin()]);
        colors.extend_from_slice(&[t, 0.3, 1.0 - t]);
    }

    host.plot.set_point_positions(positions, DEMO_POINT_COUNT);
    host.plot.set_point_colors(colors);
    host.plot.render();
    info!("Loaded {} demo points", DEMO_POINT_COUNT);
}

#[derive(Component)]
struct FpsText;

fn spawn_ui(mut commands: Commands) {
    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                Text::new("FPS: "),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgb(1., 0., 0.)),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(12.0),
                    right: Val::Px(12.0),
                    ..default()
                },
                FpsText,
            ));
        });
}

fn fps_text_update_system(
    diagnostics: Res<DiagnosticsStore>,
    mut query: Query<&mut Text, With<FpsText>>,
) {
    for mut text in &mut query {
        if let Some(fps) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
            if let Some(value) = fps.smoothed() {
                text.0 = format!("FPS: {value:.1}");
            }
        }
    }
}

fn fps_notification_system(
    mut rpc_interface: ResMut<WebRpcInterface>,
    diagnostics: Res<DiagnosticsStore>,
    mut last_send_time: Local<f32>,
    time: Res<Time>,
) {
    let current_time = time.elapsed_secs();

    // Every 0.5 seconds.
    if current_time - *last_send_time >= 0.5 {
        if let Some(value) = diagnostics
            .get(&FrameTimeDiagnosticsPlugin::FPS)
            .and_then(|fps| fps.smoothed())
        {
            rpc_interface.send_notification("fps_update", serde_json::json!({ "fps": value as f32 }));
        }
        *last_send_time = current_time;
    }
}
