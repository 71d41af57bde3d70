use std::sync::Arc;

use bevy::math::Vec3;

use super::shaders::Fog;
use crate::error::ProjectorError;

/// Stable handle of a node in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

/// Which fragment program a points node is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointMaterial {
    /// Visible colours, sprite or circle shading, optional fog.
    Visible { fog: Option<Fog> },
    /// Identity-encoded colours only. No texturing, no fog.
    Picking,
}

/// Sprite atlas for image mode, RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteSheet {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub sprites_per_row: f32,
    pub sprites_per_column: f32,
}

impl SpriteSheet {
    /// Atlas of `tile_size` sprites packed row by row into an RGBA8 image.
    pub fn from_atlas(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        tile_size: [u32; 2],
    ) -> Result<Self, ProjectorError> {
        let [tile_width, tile_height] = tile_size;
        let tiles = tile_width > 0
            && tile_height > 0
            && width >= tile_width
            && height >= tile_height
            && pixels.len() == width as usize * height as usize * 4;
        if !tiles {
            return Err(ProjectorError::InvalidSpriteSheet {
                width,
                height,
                tile_width,
                tile_height,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            sprites_per_row: (width / tile_width) as f32,
            sprites_per_column: (height / tile_height) as f32,
        })
    }
}

/// A point cloud layer. All per-point arrays are indexed by point id.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsNode {
    pub positions: Arc<[f32]>,
    /// RGB triplets in `0..=1`.
    pub colors: Arc<[f32]>,
    pub scale_factors: Option<Arc<[f32]>>,
    /// Base point size in device pixels before attenuation.
    pub point_size: f32,
    /// 3D distance attenuation instead of the 2D zoom curve.
    pub size_attenuation: bool,
    pub sprites: Option<Arc<SpriteSheet>>,
    pub material: PointMaterial,
}

impl PointsNode {
    pub fn point_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_image(&self) -> bool {
        self.sprites.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Points(PointsNode),
    /// Axes helper with arms of the given length along +x, +y and +z.
    Axes { size: f32 },
    Light { position: Vec3, color: u32 },
}

struct Entry {
    id: NodeId,
    name: Option<String>,
    node: SceneNode,
}

/// Ordered collection of scene nodes, drawn in insertion order.
#[derive(Default)]
pub struct Scene {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        self.insert(None, node)
    }

    pub fn add_named(&mut self, name: impl Into<String>, node: SceneNode) -> NodeId {
        self.insert(Some(name.into()), node)
    }

    fn insert(&mut self, name: Option<String>, node: SceneNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, name, node });
        id
    }

    /// Removes a node, returning it with its name so it can be re-added.
    pub fn remove(&mut self, id: NodeId) -> Option<(Option<String>, SceneNode)> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        let entry = self.entries.remove(index);
        Some((entry.name, entry.node))
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.node)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .map(|entry| &mut entry.node)
    }

    pub fn get_by_name(&self, name: &str) -> Option<NodeId> {
        self.entries
            .iter()
            .find(|entry| entry.name.as_deref() == Some(name))
            .map(|entry| entry.id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.entries.iter().map(|entry| &entry.node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_nodes_can_be_found_and_removed() {
        let mut scene = Scene::new();
        scene.add(SceneNode::Light {
            position: Vec3::ZERO,
            color: 0xFFFFFF,
        });
        let axes = scene.add_named("axes", SceneNode::Axes { size: 1.0 });

        assert_eq!(scene.get_by_name("axes"), Some(axes));
        let (name, node) = scene.remove(axes).unwrap();
        assert_eq!(name.as_deref(), Some("axes"));
        assert_eq!(node, SceneNode::Axes { size: 1.0 });
        assert_eq!(scene.get_by_name("axes"), None);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn atlas_counts_whole_tiles() {
        let sheet = SpriteSheet::from_atlas(64, 32, vec![0; 64 * 32 * 4], [16, 16]).unwrap();
        assert_eq!(sheet.sprites_per_row, 4.0);
        assert_eq!(sheet.sprites_per_column, 2.0);

        assert!(matches!(
            SpriteSheet::from_atlas(64, 32, vec![0; 64 * 32 * 4], [0, 16]),
            Err(ProjectorError::InvalidSpriteSheet { tile_width: 0, .. })
        ));
        assert!(SpriteSheet::from_atlas(64, 32, vec![0; 10], [16, 16]).is_err());
    }
}
