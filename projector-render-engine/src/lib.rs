//! Interactive scatter-plot engine for the embedding projector.
//!
//! Renders large point clouds of projected embeddings, resolves mouse input
//! back to point indices through an off-screen picking pass and computes
//! K-nearest neighbours on the GPU with a CPU fallback.
//!
//! ## Layout
//!
//! ```text
//! engine::math         vector helpers
//! engine::knn          KMin selector, CPU/GPU neighbour search
//! engine::camera       perspective/orthographic camera, orbit controls
//! engine::picking      id-encoded picking target and box/hover queries
//! engine::render       scene, render context, point sprite materials, GPU and CPU renderers
//! engine::visualizers  pluggable scene layers (point sprites)
//! engine::scatter_plot render loop and interaction state machine
//! plugin               Bevy host integration
//! rpc                  JSON-RPC 2.0 bridge to the web frontend
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod plugin;
pub mod rpc;

pub use config::ProjectorConfig;
pub use engine::scatter_plot::ScatterPlot;
pub use error::{KnnError, ProjectorError};
