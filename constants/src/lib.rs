//! Shared numeric constants for the embedding projector scatter plot.
//!
//! Kept in a dependency-free crate so the render engine, the offline
//! neighbour tool and any future front-end bindings agree on the same values.

pub mod camera;
pub mod knn;
pub mod picking;
pub mod point_shader;
pub mod render_settings;
