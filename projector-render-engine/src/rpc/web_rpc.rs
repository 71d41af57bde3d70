use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::camera::CameraDef;
use crate::engine::interaction::MouseMode;
use crate::engine::knn::find_knn_of_point;
use crate::engine::math::vector::cos_dist;
use crate::engine::scatter_plot::ScatterPlot;
use crate::plugin::{KnnRequest, ScatterPlotHost};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

/// JSON-RPC 2.0 request structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Outgoing notifications and responses, flushed once per frame.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    /// Send notification to the frontend without expecting a response.
    pub fn send_notification(&mut self, method: &str, params: serde_json::Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }

    pub fn pending_notifications(&self) -> &[RpcNotification] {
        &self.outgoing_notifications
    }
}

/// Plugin establishing the RPC layer for iframe-based deployment.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .init_resource::<MessageQueue>()
            .add_event::<IncomingRpcMessage>()
            .add_event::<KnnRequest>()
            .add_systems(
                Update,
                (
                    process_incoming_messages,
                    handle_rpc_messages,
                    send_outgoing_messages,
                )
                    .chain(),
            );

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(queue: Res<MessageQueue>) {
    let queue_clone = queue.0.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message_str: String = data.into();

            if message_str.contains("jsonrpc") {
                if let Ok(mut queue) = queue_clone.lock() {
                    queue.push(message_str);
                }
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    let Some(window) = window() else {
        error!("Window object not available");
        return;
    };
    if let Err(e) =
        window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
    {
        error!("Failed to register message listener: {:?}", e);
        return;
    }

    // Ownership moves to JS so the listener outlives this system.
    closure.forget();
}

/// Raw messages received from the frontend, shared with the JS listener.
#[derive(Resource, Default, Clone)]
pub struct MessageQueue(pub std::sync::Arc<std::sync::Mutex<Vec<String>>>);

impl MessageQueue {
    pub fn push(&self, message: impl Into<String>) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push(message.into());
        }
    }
}

/// Event representing an incoming RPC message from the frontend.
#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
}

fn process_incoming_messages(
    message_queue: Res<MessageQueue>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    let messages = if let Ok(mut queue) = message_queue.0.lock() {
        std::mem::take(&mut *queue)
    } else {
        Vec::new()
    };

    for message_str in messages {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    diagnostics: Res<DiagnosticsStore>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    host: Option<ResMut<ScatterPlotHost>>,
    mut knn_events: EventWriter<KnnRequest>,
) {
    let Some(mut host) = host else {
        return;
    };
    let fps = current_fps(&diagnostics);

    for event in events.read() {
        match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => {
                debug!("Processing RPC method: {}", request.method);
                let mut knn_requests = Vec::new();
                if let Some(response) =
                    handle_rpc_request(&request, &mut host.plot, fps, &mut knn_requests)
                {
                    rpc_interface.queue_response(response);
                }
                knn_events.write_batch(knn_requests);
            }
            Err(parse_error) => {
                warn!("Failed to parse RPC message: {}", parse_error);
            }
        }
    }
}

fn current_fps(diagnostics: &DiagnosticsStore) -> f32 {
    diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|fps_diagnostic| fps_diagnostic.smoothed())
        .unwrap_or(0.0) as f32
}

/// Applies one request to the plot. Returns the response for requests
/// with an id; notifications are applied silently.
pub fn handle_rpc_request(
    request: &RpcRequest,
    plot: &mut ScatterPlot,
    fps: f32,
    knn_requests: &mut Vec<KnnRequest>,
) -> Option<RpcResponse> {
    let result = match request.method.as_str() {
        "set_mouse_mode" => handle_set_mouse_mode(&request.params, plot),
        "set_dimensions" => handle_set_dimensions(&request.params, plot),
        "reset_zoom" => {
            plot.reset_zoom();
            Ok(serde_json::json!({ "success": true }))
        }
        "set_day_night_mode" => handle_set_day_night_mode(&request.params, plot),
        "get_camera_def" => serde_json::to_value(plot.get_camera_def())
            .map_err(|e| RpcError::internal_error(&e.to_string())),
        "set_camera_def" => handle_set_camera_def(&request.params, plot),
        "start_orbit_animation" => {
            plot.start_orbit_animation();
            Ok(serde_json::json!({ "animating": plot.is_orbit_animating() }))
        }
        "stop_orbit_animation" => {
            plot.stop_orbit_animation();
            Ok(serde_json::json!({ "animating": false }))
        }
        "select_point" => handle_select_point(&request.params, plot),
        "find_knn" => handle_find_knn(&request.params, knn_requests),
        "find_knn_of_point" => handle_find_knn_of_point(&request.params),
        "get_fps" => Ok(serde_json::json!({ "fps": fps })),
        _ => {
            warn!("Unknown RPC method: {}", request.method);
            return request.id.clone().map(|id| {
                create_error_response(
                    id,
                    -32601,
                    "Method not found",
                    Some(serde_json::json!({"method": request.method})),
                )
            });
        }
    };

    // Only requests with IDs get a response.
    let id = request.id.clone()?;
    match result {
        Ok(result_value) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result_value),
            error: None,
            id: Some(id),
        }),
        Err(error) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        }),
    }
}

fn handle_set_mouse_mode(
    params: &serde_json::Value,
    plot: &mut ScatterPlot,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct MouseModeParams {
        mode: MouseMode,
    }

    let parsed = serde_json::from_value::<MouseModeParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'mode' parameter"))?;
    plot.set_mouse_mode(parsed.mode);

    Ok(serde_json::json!({
        "success": true,
        "mode": parsed.mode
    }))
}

fn handle_set_dimensions(
    params: &serde_json::Value,
    plot: &mut ScatterPlot,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct DimensionParams {
        dimensionality: u32,
    }

    let parsed = serde_json::from_value::<DimensionParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'dimensionality' parameter"))?;
    plot.set_dimensions(parsed.dimensionality)
        .map_err(|e| RpcError::invalid_params(&e.to_string()))?;
    plot.render();

    Ok(serde_json::json!({
        "success": true,
        "dimensionality": parsed.dimensionality
    }))
}

fn handle_set_day_night_mode(
    params: &serde_json::Value,
    plot: &mut ScatterPlot,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct DayNightParams {
        night: bool,
    }

    let parsed = serde_json::from_value::<DayNightParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'night' parameter"))?;
    plot.set_day_night_mode(parsed.night);

    Ok(serde_json::json!({ "night": parsed.night }))
}

fn handle_set_camera_def(
    params: &serde_json::Value,
    plot: &mut ScatterPlot,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct CameraParams {
        camera: CameraDef,
        #[serde(default)]
        orbit_animation: bool,
    }

    let parsed = serde_json::from_value::<CameraParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'camera' parameter"))?;
    let dimensionality = if parsed.camera.orthographic { 2 } else { 3 };
    plot.set_camera_parameters_for_next_camera_creation(
        Some(parsed.camera),
        parsed.orbit_animation,
    );
    plot.set_dimensions(dimensionality)
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;
    plot.render();

    serde_json::to_value(plot.get_camera_def()).map_err(|e| RpcError::internal_error(&e.to_string()))
}

fn handle_select_point(
    params: &serde_json::Value,
    plot: &mut ScatterPlot,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct SelectPointParams {
        index: usize,
    }

    let parsed = serde_json::from_value::<SelectPointParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'index' parameter"))?;
    if parsed.index >= plot.point_count() {
        return Err(RpcError::invalid_params(&format!(
            "Point index {} out of range ({} points)",
            parsed.index,
            plot.point_count()
        )));
    }
    plot.click_on_point(parsed.index);

    Ok(serde_json::json!({ "index": parsed.index }))
}

fn handle_find_knn(
    params: &serde_json::Value,
    knn_requests: &mut Vec<KnnRequest>,
) -> Result<serde_json::Value, RpcError> {
    let request = serde_json::from_value::<KnnRequest>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'vectors' and 'k' parameters"))?;
    if request.k == 0 {
        return Err(RpcError::invalid_params("'k' must be positive"));
    }
    check_vectors(&request.vectors)?;

    let points = request.vectors.len();
    knn_requests.push(request);
    Ok(serde_json::json!({
        "queued": true,
        "points": points
    }))
}

/// Neighbours of one vector, answered directly since the scan is linear.
fn handle_find_knn_of_point(params: &serde_json::Value) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct PointKnnParams {
        vectors: Vec<Vec<f32>>,
        point_index: usize,
        k: usize,
    }

    let params = serde_json::from_value::<PointKnnParams>(params.clone()).map_err(|_| {
        RpcError::invalid_params("Expected 'vectors', 'point_index' and 'k' parameters")
    })?;
    if params.k == 0 {
        return Err(RpcError::invalid_params("'k' must be positive"));
    }
    check_vectors(&params.vectors)?;
    if params.point_index >= params.vectors.len() {
        return Err(RpcError::invalid_params("'point_index' is out of range"));
    }

    let neighbors = find_knn_of_point(
        &params.vectors,
        params.point_index,
        params.k,
        Vec::as_slice,
        cos_dist,
    );
    Ok(serde_json::json!({ "neighbors": neighbors }))
}

fn check_vectors(vectors: &[Vec<f32>]) -> Result<(), RpcError> {
    let dim = vectors.first().map_or(0, Vec::len);
    if dim == 0 {
        return Err(RpcError::invalid_params("Vectors must not be empty"));
    }
    if vectors.iter().any(|v| v.len() != dim) {
        return Err(RpcError::invalid_params("All vectors must have the same length"));
    }
    Ok(())
}

/// Create standardized error response with optional data payload.
fn create_error_response(
    id: serde_json::Value,
    code: i32,
    message: &str,
    data: Option<serde_json::Value>,
) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(RpcError {
            code,
            message: message.to_string(),
            data,
        }),
        id: Some(id),
    }
}

/// Send queued notifications and responses to the frontend.
fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    // Notifications first, responses second.
    for notification in rpc_interface.outgoing_notifications.drain(..) {
        send_message_to_parent(&notification);
    }

    for response in rpc_interface.outgoing_responses.drain(..) {
        send_message_to_parent(&response);
    }
}

/// Send serialized message to the parent window.
fn send_message_to_parent<T: Serialize>(message: &T) {
    #[cfg(target_arch = "wasm32")]
    {
        match serde_json::to_string(message) {
            Ok(json) => {
                if let Some(window) = window() {
                    if let Some(parent) = window.parent().ok().flatten() {
                        if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                            error!("Failed to send message to parent: {:?}", e);
                        }
                    } else {
                        warn!("No parent window available for message transmission");
                    }
                } else {
                    error!("Window object not available");
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
    }
}

/// Standard RPC error codes and constructors.
impl RpcError {
    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }
}
