//! Scene graph, per-frame render context, the point shader contract and the
//! renderers that draw a scene into a canvas or a picking target: a CPU one
//! for headless plots and a Bevy material pipeline for the host.

pub mod context;
pub mod gpu;
pub mod point_material;
pub mod point_sprite_mesh;
pub mod point_sprite_plugin;
pub mod renderer;
pub mod scene;
pub mod shaders;

pub use context::{LabelRenderParams, RenderContext};
pub use gpu::{GpuFrames, GpuSceneRenderer};
pub use point_sprite_plugin::{PickingTarget, PointSpriteRenderPlugin};
pub use renderer::{SceneRenderer, SoftwareRenderer};
pub use scene::{NodeId, PointMaterial, PointsNode, Scene, SceneNode, SpriteSheet};
