/// Optimal number of rows per block when computing pair-wise dot products on
/// the GPU.
///
/// Found experimentally. Also guarantees that for up to 10K vectors no more
/// than 40MB is allocated on the device at a time.
pub const OPTIMAL_GPU_BLOCK_SIZE: usize = 256;

/// Id of the message box used for the GPU nearest neighbour progress bar.
pub const KNN_GPU_MSG_ID: &str = "knn-gpu";

/// Id of the message box used while the CPU search runs.
pub const KNN_CPU_MSG_ID: &str = "knn-cpu";

pub const KNN_CPU_MSG: &str = "Finding nearest neighbors...";

/// Workgroup width of the dot product compute shader.
pub const DOT_PRODUCT_WORKGROUP_SIZE: u32 = 64;
