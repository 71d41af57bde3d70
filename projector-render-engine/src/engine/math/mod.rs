//! Vector arithmetic and screen-space helpers shared by the neighbour search,
//! the camera and the renderer.

pub mod vector;
