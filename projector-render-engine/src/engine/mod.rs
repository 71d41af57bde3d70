pub mod camera;
pub mod events;
pub mod interaction;
pub mod knn;
pub mod math;
pub mod picking;
pub mod progress;
pub mod render;
pub mod scatter_plot;
pub mod visualizers;
