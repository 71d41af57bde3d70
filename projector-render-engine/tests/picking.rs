use std::sync::Arc;

use bevy::input::keyboard::KeyCode;
use bevy::input::mouse::MouseButton;
use bevy::math::{Vec2, Vec3};
use constants::camera::START_CAMERA_POS_3D;
use constants::picking::{BOUNDING_BOX_CAUSE, BOX_SELECTION_LIMIT_WARNING, NO_POINT_ID};
use pretty_assertions::assert_eq;
use projector_render_engine::ScatterPlot;
use projector_render_engine::engine::events::{ProjectorEvent, QueuedEventContext};
use projector_render_engine::engine::interaction::{MouseMode, ScatterBoundingBox};
use projector_render_engine::engine::picking::select_in_box;
use projector_render_engine::engine::render::SoftwareRenderer;
use projector_render_engine::engine::visualizers::PointsVisualizer;

const WIDTH: f32 = 400.0;
const HEIGHT: f32 = 300.0;

fn plot_2d(positions: Vec<f32>, real_data_number: usize) -> (ScatterPlot, QueuedEventContext) {
    let events = QueuedEventContext::new();
    let mut plot = ScatterPlot::new(
        WIDTH,
        HEIGHT,
        1.0,
        Box::new(SoftwareRenderer::new(WIDTH, HEIGHT)),
        Arc::new(events.clone()),
    );
    plot.set_dimensions(2).unwrap();
    plot.add_visualizer(Box::new(PointsVisualizer::new()));
    plot.set_point_positions(positions, real_data_number);
    plot.render();
    events.drain();
    (plot, events)
}

fn three_points() -> Vec<f32> {
    vec![-1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]
}

/// 15 × 10 grid, 25 px apart on screen.
fn grid() -> Vec<f32> {
    let mut positions = Vec::new();
    for j in 0..10 {
        for i in 0..15 {
            positions.extend_from_slice(&[-1.4 + i as f32 * 0.2, -1.0 + j as f32 * 0.2, 0.0]);
        }
    }
    positions
}

#[test]
fn picking_target_holds_point_ids() {
    let (plot, _) = plot_2d(three_points(), 3);
    let texture = plot.picking_texture().unwrap();

    assert_eq!(texture.id_at(200, 150), Some(1));
    // x = -1 lands at (0.5 - 1 / 1.6 / 2) * 400 = 75.
    assert_eq!(texture.id_at(75, 150), Some(0));
    assert_eq!(texture.id_at(325, 150), Some(2));
    assert_eq!(texture.id_at(200, 20), Some(NO_POINT_ID));
}

#[test]
fn hover_reports_the_point_under_the_cursor() {
    let (mut plot, events) = plot_2d(three_points(), 3);

    plot.on_mouse_move(Vec2::new(75.0, 150.0));
    plot.on_mouse_move(Vec2::new(200.0, 20.0));

    assert_eq!(
        events.drain(),
        vec![
            ProjectorEvent::HoverChanged { index: Some(0) },
            ProjectorEvent::HoverChanged { index: None },
        ]
    );
}

#[test]
fn hover_falls_back_to_background_points() {
    let (mut plot, _) = plot_2d(three_points(), 1);
    assert_eq!(plot.point_at(Vec2::new(200.0, 150.0)), Some(1));
    assert_eq!(plot.point_at(Vec2::new(75.0, 150.0)), Some(0));
}

#[test]
fn double_click_selects_only_real_points() {
    let (mut plot, events) = plot_2d(three_points(), 2);

    plot.on_mouse_move(Vec2::new(200.0, 150.0));
    plot.on_double_click();
    plot.on_mouse_move(Vec2::new(325.0, 150.0));
    plot.on_double_click();

    let selections: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|event| matches!(event, ProjectorEvent::SelectionChanged { .. }))
        .collect();
    assert_eq!(
        selections,
        vec![
            ProjectorEvent::SelectionChanged {
                indices: vec![1],
                from_user: false,
                cause: None,
            },
            ProjectorEvent::SelectionChanged {
                indices: vec![],
                from_user: false,
                cause: None,
            },
        ]
    );
}

#[test]
fn box_selection_is_capped_after_filtering() {
    let (mut plot, events) = plot_2d(grid(), 150);

    plot.select_bounding_box(&ScatterBoundingBox {
        x: 0.0,
        y: 0.0,
        width: WIDTH,
        height: HEIGHT,
    });

    let drained = events.drain();
    assert_eq!(
        drained[0],
        ProjectorEvent::UserWarning {
            message: BOX_SELECTION_LIMIT_WARNING.to_string()
        }
    );
    let ProjectorEvent::SelectionChanged {
        indices,
        from_user,
        cause,
    } = &drained[1]
    else {
        panic!("expected a selection, got {:?}", drained[1]);
    };
    assert_eq!(indices.len(), 100);
    assert_eq!(indices[..3], [0, 1, 2]);
    assert!(from_user);
    assert_eq!(cause.as_deref(), Some(BOUNDING_BOX_CAUSE));
}

#[test]
fn small_box_selection_keeps_every_real_point() {
    let (mut plot, events) = plot_2d(three_points(), 2);

    plot.select_bounding_box(&ScatterBoundingBox {
        x: 0.0,
        y: 100.0,
        width: WIDTH,
        height: 100.0,
    });

    assert_eq!(
        events.drain(),
        vec![ProjectorEvent::SelectionChanged {
            indices: vec![0, 1],
            from_user: true,
            cause: Some(BOUNDING_BOX_CAUSE.to_string()),
        }]
    );
}

#[test]
fn shift_drag_selects_a_rectangle() {
    let (mut plot, events) = plot_2d(three_points(), 3);
    plot.set_mouse_mode(MouseMode::AreaSelect);

    plot.on_key_down(KeyCode::ShiftLeft, false);
    plot.on_mouse_down(MouseButton::Left, Vec2::new(150.0, 100.0), false);
    assert!(!plot.camera_manager().controls().enabled);
    plot.on_mouse_move(Vec2::new(350.0, 200.0));
    assert!(plot.rectangle_selection().is_some());
    plot.on_mouse_up();

    assert!(plot.camera_manager().controls().enabled);
    assert_eq!(plot.selection(), &[1, 2]);
    assert!(events.drain().iter().any(|event| matches!(
        event,
        ProjectorEvent::SelectionChanged { from_user: true, .. }
    )));
}

#[test]
fn picking_follows_the_device_pixel_ratio() {
    let (mut plot, _) = plot_2d(three_points(), 3);
    plot.set_device_pixel_ratio(2.0);

    let texture = plot.picking_texture().unwrap();
    assert_eq!((texture.width(), texture.height()), (800, 600));
    assert_eq!(texture.id_at(400, 300), Some(1));
    assert_eq!(plot.point_at(Vec2::new(75.0, 150.0)), Some(0));
}

fn plot_3d(positions: Vec<f32>) -> (ScatterPlot, QueuedEventContext) {
    let events = QueuedEventContext::new();
    let mut plot = ScatterPlot::new(
        WIDTH,
        HEIGHT,
        1.0,
        Box::new(SoftwareRenderer::new(WIDTH, HEIGHT)),
        Arc::new(events.clone()),
    );
    plot.set_dimensions(3).unwrap();
    plot.add_visualizer(Box::new(PointsVisualizer::new()));
    let count = positions.len() / 3;
    plot.set_point_positions(positions, count);
    plot.render();
    events.drain();
    (plot, events)
}

/// CSS-pixel position of `world` through the plot's current camera.
fn screen_position(plot: &ScatterPlot, world: Vec3) -> Vec2 {
    let camera = plot.camera_manager().camera();
    let ndc = camera.view_projection(Vec3::ZERO).project_point3(world);
    Vec2::new(
        (ndc.x * 0.5 + 0.5) * WIDTH,
        (0.5 - ndc.y * 0.5) * HEIGHT,
    )
}

#[test]
fn perspective_picking_resolves_depth_and_attenuated_sizes() {
    let toward_camera = Vec3::from_array(START_CAMERA_POS_3D).normalize();
    let hidden = -toward_camera * 0.5;
    let side = Vec3::new(-0.6, 0.6, -0.6);
    let mut positions = vec![0.0, 0.0, 0.0];
    positions.extend_from_slice(&side.to_array());
    positions.extend_from_slice(&hidden.to_array());
    let (mut plot, events) = plot_3d(positions);

    let centre = screen_position(&plot, Vec3::ZERO);
    assert!((centre - Vec2::new(WIDTH / 2.0, HEIGHT / 2.0)).length() < 1.0);
    // The point behind the origin shares its screen position but loses the
    // depth test. Axis lines through the origin never reach the ids.
    assert_eq!(plot.point_at(centre), Some(0));
    assert_eq!(plot.point_at(screen_position(&plot, side)), Some(1));
    assert_eq!(plot.point_at(Vec2::new(5.0, 5.0)), None);

    // The nearer point is drawn larger than the one further back.
    let texture = plot.picking_texture().unwrap();
    let reach = |point: Vec2, id: u32| {
        (0..60)
            .take_while(|dx| texture.id_at(point.x as i32 + dx, point.y as i32) == Some(id))
            .count()
    };
    assert!(reach(centre, 0) > reach(screen_position(&plot, side), 1));

    plot.on_mouse_move(screen_position(&plot, side));
    assert_eq!(
        events.drain(),
        vec![ProjectorEvent::HoverChanged { index: Some(1) }]
    );
}

/// 16 × 12 grid covering the whole canvas where every third cell holds a
/// background point, so real and background ids alternate on screen.
fn interleaved_grid() -> (Vec<f32>, usize) {
    let cells: Vec<[f32; 3]> = (0..12)
        .flat_map(|j| (0..16).map(move |i| [-1.5 + i as f32 * 0.2, -1.1 + j as f32 * 0.2, 0.0]))
        .collect();
    let (background, real): (Vec<_>, Vec<_>) = cells
        .iter()
        .enumerate()
        .partition(|(index, _)| index % 3 == 2);
    let real_data_number = real.len();
    let positions = real
        .into_iter()
        .chain(background)
        .flat_map(|(_, cell)| *cell)
        .collect();
    (positions, real_data_number)
}

#[test]
fn box_selection_skips_background_points_before_the_cap() {
    let (positions, real_data_number) = interleaved_grid();
    assert_eq!(real_data_number, 128);
    let (mut plot, events) = plot_2d(positions, real_data_number);

    let texture = plot.picking_texture().unwrap();
    // Cells three apart on the bottom row: real, real, background.
    assert_eq!(texture.id_at(12, 287), Some(0));
    assert_eq!(texture.id_at(37, 287), Some(1));
    assert_eq!(texture.id_at(62, 287), Some(128));

    plot.select_bounding_box(&ScatterBoundingBox {
        x: 0.0,
        y: 0.0,
        width: WIDTH,
        height: HEIGHT,
    });

    let drained = events.drain();
    assert_eq!(
        drained[0],
        ProjectorEvent::UserWarning {
            message: BOX_SELECTION_LIMIT_WARNING.to_string()
        }
    );
    let ProjectorEvent::SelectionChanged { indices, .. } = &drained[1] else {
        panic!("expected a selection, got {:?}", drained[1]);
    };
    assert_eq!(*indices, (0..100).collect::<Vec<_>>());
}

#[test]
fn capped_selection_counts_only_real_ids() {
    // Real and background ids alternate, 120 of each.
    let indices: Vec<usize> = (0..120).flat_map(|i| [i, 1000 + i]).collect();
    let selection = select_in_box(&indices, 500);
    assert!(selection.over_capacity);
    assert_eq!(selection.indices, (0..100).collect::<Vec<_>>());

    let selection = select_in_box(&indices[..180], 500);
    assert!(!selection.over_capacity);
    assert_eq!(selection.indices, (0..90).collect::<Vec<_>>());
}
