//! JSON-RPC 2.0 bridge between the scatter plot and the web frontend.
//!
//! The projector UI embeds the plot in an iframe and drives it through
//! `postMessage`. Requests carry an id and get exactly one response;
//! notifications flow one way, from the plot to the frontend.
//!
//! ## Message Flow
//!
//! ```text
//! Frontend (parent window)  <──postMessage──>  Scatter plot (iframe)
//!        │                                        │
//!        ├─ Request (with ID) ──────────────────> │
//!        │                                        ├─ Apply to the plot
//!        │ <───────────────── Response (with ID) ─┤
//!        │                                        │
//!        │ <────────── Notification (no ID) ─────┤
//! ```
//!
//! On native targets there is no parent window: incoming messages can only
//! be injected through [`web_rpc::MessageQueue`] and outgoing ones are
//! dropped.
//!
//! ## Error Handling
//!
//! Standard JSON-RPC 2.0 error codes:
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//!
//! ## Methods
//!
//! ### Interaction
//! - `set_mouse_mode`: `{ "mode": "area_select" | "camera_and_click_select" }`
//! - `select_point`: programmatic click on `{ "index": n }`
//!
//! ### Camera
//! - `set_dimensions`: `{ "dimensionality": 2 | 3 }`
//! - `reset_zoom`
//! - `get_camera_def`
//! - `set_camera_def`: `{ "camera": CameraDef, "orbit_animation": bool }`
//! - `start_orbit_animation` / `stop_orbit_animation`
//!
//! ### Appearance
//! - `set_day_night_mode`: `{ "night": bool }`
//!
//! ### Neighbours
//! - `find_knn`: `{ "vectors": [[f32]], "k": n }`, answered later by a
//!   `knn_computed` notification
//! - `find_knn_of_point`: `{ "vectors": [[f32]], "point_index": i, "k": n }`,
//!   answered directly with `{ "neighbors": [...] }` by cosine distance
//!
//! ### Diagnostics
//! - `get_fps`: Retrieve current frame rate
//!
//! ## Notifications
//!
//! `selection_changed`, `hover_changed`, `user_warning`, `knn_computed`.

/// JSON-RPC 2.0 transport and method dispatch.
pub mod web_rpc;
