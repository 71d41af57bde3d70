use thiserror::Error;

/// Errors raised by the scatter plot controller and its configuration layer.
#[derive(Debug, Error)]
pub enum ProjectorError {
    /// Programmer error: only 2D and 3D scenes exist.
    #[error("dimensionality must be 2 or 3, got {0}")]
    InvalidDimensionality(u32),

    #[error("invalid projector config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read projector config: {0}")]
    Io(#[from] std::io::Error),

    #[error("sprite sheet of {width}x{height} px does not tile into {tile_width}x{tile_height} px sprites")]
    InvalidSpriteSheet {
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
    },

    #[error("sprite sheet image in {0:?} cannot be read as RGBA8")]
    SpriteSheetFormat(bevy::render::render_resource::TextureFormat),

    #[error("line {line}: {message}")]
    InvalidVectors { line: usize, message: String },
}

/// Failures of the accelerated nearest neighbour path.
///
/// Every variant is recoverable: the caller falls back to the CPU search.
#[derive(Debug, Error)]
pub enum KnnError {
    #[error("no compatible GPU adapter available")]
    AdapterUnavailable,

    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),

    #[error("failed to map GPU readback buffer: {0}")]
    BufferMap(String),

    #[error("matrix shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("dot product backend has no uploaded matrix")]
    NotUploaded,

    #[error("GPU rejected the dot product workload: {0}")]
    Device(String),

    #[error("matrix of {bytes} bytes exceeds the device storage limit of {limit} bytes")]
    TooLarge { bytes: u64, limit: u64 },
}
