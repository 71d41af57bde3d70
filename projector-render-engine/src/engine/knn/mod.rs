//! K-nearest-neighbour search.
//!
//! Two all-pairs searches share one result contract: a list per point of at
//! most `k` [`NearestEntry`] values sorted by ascending distance, never
//! containing the point itself.
//!
//! - [`find_knn`] walks every unordered pair once on the CPU and feeds the
//!   distance into both points' [`KMin`].
//! - [`find_knn_gpu_cosine`] computes block-vs-all dot products on a
//!   [`DotProductBackend`] and falls back to [`find_knn`] when the backend
//!   fails.

pub mod gpu;
pub mod heap;

use bevy::prelude::*;
use bevy::tasks::futures_lite::future;
use constants::knn::{KNN_CPU_MSG, KNN_CPU_MSG_ID, KNN_GPU_MSG_ID, OPTIMAL_GPU_BLOCK_SIZE};
use serde::{Deserialize, Serialize};

use crate::engine::math::vector::{cos_dist, to_flat_array, unit};
use crate::engine::progress::ProgressReporter;
use crate::error::KnnError;

pub use gpu::{CpuDotProduct, DotProductBackend};
#[cfg(not(target_arch = "wasm32"))]
pub use gpu::WgpuDotProduct;
pub use heap::KMin;

/// One neighbour of a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestEntry {
    pub index: usize,
    pub dist: f32,
}

/// Neighbour lists indexed by point.
pub type Neighbors = Vec<Vec<NearestEntry>>;

/// Symmetric all-pairs search on the CPU.
///
/// `dist_fn(a, b, limit)` may return a negative value once the distance is
/// known to exceed `limit`; such pairs are skipped. The limit passed is the
/// larger of the two points' current eviction thresholds, or `f32::MAX`
/// while either list is still filling.
pub async fn find_knn<T, A, D>(
    points: &[T],
    k: usize,
    accessor: A,
    dist_fn: D,
    progress: &mut dyn ProgressReporter,
) -> Neighbors
where
    A: Fn(&T) -> &[f32],
    D: Fn(&[f32], &[f32], f32) -> f32,
{
    progress.set_modal_message(Some(KNN_CPU_MSG), KNN_CPU_MSG_ID);
    // Let the host repaint the message before the quadratic scan starts.
    future::yield_now().await;

    let result = find_knn_blocking(points, k, &accessor, &dist_fn);

    progress.set_modal_message(None, KNN_CPU_MSG_ID);
    result
}

/// Synchronous body of [`find_knn`].
pub fn find_knn_blocking<T, A, D>(points: &[T], k: usize, accessor: A, dist_fn: D) -> Neighbors
where
    A: Fn(&T) -> &[f32],
    D: Fn(&[f32], &[f32], f32) -> f32,
{
    let n = points.len();
    let mut nearest: Vec<KMin<NearestEntry>> = (0..n).map(|_| KMin::new(k)).collect();

    for i in 0..n {
        let a = accessor(&points[i]);
        for j in (i + 1)..n {
            let b = accessor(&points[j]);
            let limit = eviction_limit(&nearest[i]).max(eviction_limit(&nearest[j]));
            let dist = dist_fn(a, b, limit);
            if dist >= 0.0 {
                nearest[i].add(dist, NearestEntry { index: j, dist });
                nearest[j].add(dist, NearestEntry { index: i, dist });
            }
        }
    }

    nearest.iter().map(KMin::min_k_items).collect()
}

fn eviction_limit(kmin: &KMin<NearestEntry>) -> f32 {
    if kmin.is_full() {
        kmin.largest_key().unwrap_or(f32::MAX)
    } else {
        f32::MAX
    }
}

/// Neighbours of a single point by linear scan. An out of range index
/// yields an empty list.
pub fn find_knn_of_point<T, A, D>(
    points: &[T],
    point_index: usize,
    k: usize,
    accessor: A,
    dist_fn: D,
) -> Vec<NearestEntry>
where
    A: Fn(&T) -> &[f32],
    D: Fn(&[f32], &[f32]) -> f32,
{
    let Some(query) = points.get(point_index) else {
        return Vec::new();
    };
    let a = accessor(query);
    let mut kmin = KMin::new(k);
    for (index, point) in points.iter().enumerate() {
        if index == point_index {
            continue;
        }
        let dist = dist_fn(a, accessor(point));
        kmin.add(dist, NearestEntry { index, dist });
    }
    kmin.min_k_items()
}

/// Batched cosine search on an accelerated backend.
///
/// Rows are L2-normalised before upload, so `1 - dot` is the cosine
/// distance. Any backend failure is logged and answered by the CPU search
/// over the original rows, without limit pruning. Input whose rows are
/// empty or of differing lengths has no neighbours.
pub async fn find_knn_gpu_cosine<T, A, B>(
    points: &[T],
    k: usize,
    accessor: A,
    backend: &mut B,
    progress: &mut dyn ProgressReporter,
) -> Neighbors
where
    A: Fn(&T) -> &[f32],
    B: DotProductBackend,
{
    let n = points.len();
    let Some(dim) = uniform_dimension(points, &accessor) else {
        if n > 0 {
            warn!("Skipping nearest neighbour search: vectors are empty or ragged");
        }
        return vec![Vec::new(); n];
    };

    let mut matrix = to_flat_array(points, &accessor);
    for row in matrix.chunks_exact_mut(dim) {
        unit(row);
    }

    let outcome = run_gpu_blocks(&matrix, n, dim, k, backend, progress).await;
    backend.release();
    progress.set_modal_message(None, KNN_GPU_MSG_ID);

    match outcome {
        Ok(neighbors) => neighbors,
        Err(err) => {
            warn!("GPU nearest neighbour search failed, falling back to CPU: {}", err);
            find_knn(points, k, &accessor, |a, b, _limit| cos_dist(a, b), progress).await
        }
    }
}

/// Shared row length of `points`, or `None` when there are no points, the
/// rows are empty or their lengths differ.
fn uniform_dimension<T, A>(points: &[T], accessor: &A) -> Option<usize>
where
    A: Fn(&T) -> &[f32],
{
    let dim = accessor(points.first()?).len();
    if dim == 0 || points.iter().any(|point| accessor(point).len() != dim) {
        return None;
    }
    Some(dim)
}

/// Row ranges `(offset, len)` of the blocks an `n` point search is split into.
pub fn block_layout(n: usize) -> Vec<(usize, usize)> {
    if n == 0 {
        return Vec::new();
    }
    let num_pieces = n.div_ceil(OPTIMAL_GPU_BLOCK_SIZE);
    let base = n / num_pieces;
    let modulo = n % num_pieces;

    let mut offset = 0;
    (0..num_pieces)
        .map(|piece| {
            let len = if piece < modulo { base + 1 } else { base };
            let block = (offset, len);
            offset += len;
            block
        })
        .collect()
}

async fn run_gpu_blocks<B>(
    matrix: &[f32],
    n: usize,
    dim: usize,
    k: usize,
    backend: &mut B,
    progress: &mut dyn ProgressReporter,
) -> Result<Neighbors, KnnError>
where
    B: DotProductBackend,
{
    backend.upload(matrix, n, dim).await?;

    let blocks = block_layout(n);
    let progress_diff = 1.0 / (2.0 * blocks.len() as f32);
    let mut done = 0.0_f32;
    let mut nearest: Vec<KMin<NearestEntry>> = (0..n).map(|_| KMin::new(k)).collect();

    for (offset, len) in blocks {
        report_gpu_progress(progress, done);
        let dots = backend.block_dot_products(offset, len).await?;
        if dots.len() != n * len {
            return Err(KnnError::ShapeMismatch {
                expected: n * len,
                actual: dots.len(),
            });
        }
        done += progress_diff;
        report_gpu_progress(progress, done);

        for i in 0..len {
            let point = offset + i;
            let kmin = &mut nearest[point];
            for j in 0..n {
                if j == point {
                    continue;
                }
                let dist = 1.0 - dots[j * len + i];
                kmin.add(dist, NearestEntry { index: j, dist });
            }
        }
        done += progress_diff;
    }

    Ok(nearest.iter().map(KMin::min_k_items).collect())
}

fn report_gpu_progress(progress: &mut dyn ProgressReporter, done: f32) {
    let message = format!("Finding nearest neighbors: {}%", (done * 100.0).round() as u32);
    progress.set_modal_message(Some(&message), KNN_GPU_MSG_ID);
}
