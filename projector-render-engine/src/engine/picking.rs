//! Id-encoded picking target and the queries resolving screen rectangles
//! back to point indices.
//!
//! Every point is drawn into the picking target with its index packed into
//! the colour: red holds bits 16-23, green bits 8-15 and blue bits 0-7.
//! [`NO_POINT_ID`] (white) marks the background.

use constants::picking::{MAX_BOX_SELECTION, NO_POINT_ID};
use wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

use crate::engine::interaction::ScatterBoundingBox;

pub fn encode_point_id(id: u32) -> [u8; 3] {
    [(id >> 16) as u8, (id >> 8) as u8, id as u8]
}

pub fn decode_point_id(rgb: [u8; 3]) -> u32 {
    (u32::from(rgb[0]) << 16) | (u32::from(rgb[1]) << 8) | u32::from(rgb[2])
}

/// RGBA8 off-screen target in device pixels, top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct PickingTexture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PickingTexture {
    /// A target cleared to the background id.
    pub fn new(width: u32, height: u32) -> Self {
        let mut texture = Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        };
        texture.clear();
        texture
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn clear(&mut self) {
        let [r, g, b] = encode_point_id(NO_POINT_ID);
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[r, g, b, 255]);
        }
    }

    /// Writes `id` at `(x, y)`. Out of range writes are dropped.
    pub fn write_id(&mut self, x: i32, y: i32, id: u32) {
        self.write_rgb(x, y, encode_point_id(id));
    }

    pub fn write_rgb(&mut self, x: i32, y: i32, rgb: [u8; 3]) {
        if let Some(offset) = self.offset(x, y) {
            let [r, g, b] = rgb;
            self.pixels[offset..offset + 4].copy_from_slice(&[r, g, b, 255]);
        }
    }

    pub fn id_at(&self, x: i32, y: i32) -> Option<u32> {
        let offset = self.offset(x, y)?;
        Some(decode_point_id([
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]))
    }

    /// Replaces the contents with an RGBA8 texture readback of the same size.
    /// Rows may be padded to the copy alignment. A readback of any other
    /// size leaves the target untouched and returns `false`.
    pub fn copy_from_readback(&mut self, bytes: &[u8]) -> bool {
        let row = self.width as usize * 4;
        let height = self.height as usize;
        if bytes.len() == self.pixels.len() {
            self.pixels.copy_from_slice(bytes);
            return true;
        }
        let padded = padded_bytes_per_row(self.width) as usize;
        if height == 0 || bytes.len() != padded * height {
            return false;
        }
        for (dst, src) in self.pixels.chunks_exact_mut(row).zip(bytes.chunks_exact(padded)) {
            dst.copy_from_slice(&src[..row]);
        }
        true
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    /// Ids of the `width × height` region at `(x, y)` in row-major order,
    /// top row first. Pixels outside the target read as background.
    pub fn read_ids(&self, x: i32, y: i32, width: u32, height: u32) -> Vec<u32> {
        let mut ids = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                ids.push(self.id_at(x + col, y + row).unwrap_or(NO_POINT_ID));
            }
        }
        ids
    }
}

/// Row pitch of a texture-to-buffer copy of an RGBA8 target.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    (width * 4).div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT) * COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Unique point ids visible in `bbox`, ascending.
///
/// The box is given in CSS pixels and scaled by `device_pixel_ratio`.
/// Decoded ids at or beyond `point_count` are ignored.
pub fn point_indices_in_box(
    texture: &PickingTexture,
    bbox: &ScatterBoundingBox,
    device_pixel_ratio: f32,
    point_count: usize,
) -> Vec<usize> {
    let x = (bbox.x * device_pixel_ratio).floor() as i32;
    let y = (bbox.y * device_pixel_ratio).floor() as i32;
    let width = (bbox.width * device_pixel_ratio).floor().max(0.0) as u32;
    let height = (bbox.height * device_pixel_ratio).floor().max(0.0) as u32;

    let mut present = vec![false; point_count];
    for id in texture.read_ids(x, y, width, height) {
        if id != NO_POINT_ID && (id as usize) < point_count {
            present[id as usize] = true;
        }
    }

    present
        .iter()
        .enumerate()
        .filter_map(|(index, &hit)| hit.then_some(index))
        .collect()
}

/// Hover target among `indices`: the first real point, else the first id.
pub fn nearest_point_in_box(indices: &[usize], real_data_number: usize) -> Option<usize> {
    indices
        .iter()
        .copied()
        .find(|&index| index < real_data_number)
        .or_else(|| indices.first().copied())
}

/// Result of a rectangle selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxSelection {
    pub indices: Vec<usize>,
    /// More real points were found than one selection may hold.
    pub over_capacity: bool,
}

/// Keeps the real points of `indices`, then the first
/// [`MAX_BOX_SELECTION`] of those.
pub fn select_in_box(indices: &[usize], real_data_number: usize) -> BoxSelection {
    let mut real: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&index| index < real_data_number)
        .collect();
    let over_capacity = real.len() > MAX_BOX_SELECTION;
    real.truncate(MAX_BOX_SELECTION);
    BoxSelection {
        indices: real,
        over_capacity,
    }
}
