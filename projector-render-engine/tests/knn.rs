use std::future::Future;

use bevy::tasks::block_on;
use pretty_assertions::assert_eq;
use projector_render_engine::KnnError;
use projector_render_engine::engine::knn::{
    CpuDotProduct, DotProductBackend, NearestEntry, find_knn, find_knn_gpu_cosine,
};
use projector_render_engine::engine::math::vector::{cos_dist, dist2_with_limit};
use projector_render_engine::engine::progress::{LogProgress, ModalMessages};

fn vectors() -> Vec<Vec<f32>> {
    vec![
        vec![1.0, 0.1, 0.0],
        vec![0.9, 0.3, 0.1],
        vec![0.0, 1.0, 0.2],
        vec![0.1, 0.8, 0.7],
        vec![-0.5, 0.2, 1.0],
    ]
}

fn indices(neighbors: &[Vec<NearestEntry>]) -> Vec<Vec<usize>> {
    neighbors
        .iter()
        .map(|list| list.iter().map(|entry| entry.index).collect())
        .collect()
}

/// Accepts the upload, then fails every block.
#[derive(Default)]
struct FailingBackend {
    released: bool,
}

impl DotProductBackend for FailingBackend {
    fn upload(
        &mut self,
        _matrix: &[f32],
        _rows: usize,
        _dim: usize,
    ) -> impl Future<Output = Result<(), KnnError>> + Send {
        async { Ok(()) }
    }

    fn block_dot_products(
        &mut self,
        _offset: usize,
        _len: usize,
    ) -> impl Future<Output = Result<Vec<f32>, KnnError>> + Send {
        async { Err(KnnError::Device("lost device".to_string())) }
    }

    fn release(&mut self) {
        self.released = true;
    }
}

fn cpu_cosine(points: &[Vec<f32>], k: usize) -> Vec<Vec<NearestEntry>> {
    block_on(find_knn(
        points,
        k,
        Vec::as_slice,
        |a, b, _limit| cos_dist(a, b),
        &mut LogProgress,
    ))
}

#[test]
fn accelerated_search_matches_the_cpu_search() {
    let points = vectors();
    let mut backend = CpuDotProduct::default();
    let gpu = block_on(find_knn_gpu_cosine(
        &points,
        2,
        Vec::as_slice,
        &mut backend,
        &mut LogProgress,
    ));
    let cpu = cpu_cosine(&points, 2);

    assert_eq!(indices(&gpu), indices(&cpu));
    for (g, c) in gpu.iter().flatten().zip(cpu.iter().flatten()) {
        assert!((g.dist - c.dist).abs() < 1e-5);
    }
}

#[test]
fn failing_backend_falls_back_to_the_cpu() {
    let points = vectors();
    let mut backend = FailingBackend::default();
    let mut messages = ModalMessages::default();
    let result = block_on(find_knn_gpu_cosine(
        &points,
        2,
        Vec::as_slice,
        &mut backend,
        &mut messages,
    ));

    assert!(backend.released);
    assert!(messages.is_empty());
    assert_eq!(indices(&result), indices(&cpu_cosine(&points, 2)));
}

#[test]
fn no_point_is_its_own_neighbour() {
    let points = vectors();
    let mut backend = CpuDotProduct::default();
    let result = block_on(find_knn_gpu_cosine(
        &points,
        4,
        Vec::as_slice,
        &mut backend,
        &mut LogProgress,
    ));

    for (i, list) in result.iter().enumerate() {
        assert_eq!(list.len(), 4);
        assert!(list.iter().all(|entry| entry.index != i));
        assert!(list.windows(2).all(|pair| pair[0].dist <= pair[1].dist));
    }
}

#[test]
fn pruned_euclidean_search_is_symmetric_when_k_covers_everyone() {
    let points = vectors();
    let result = block_on(find_knn(
        &points,
        points.len() - 1,
        Vec::as_slice,
        dist2_with_limit,
        &mut LogProgress,
    ));

    for (i, list) in result.iter().enumerate() {
        for entry in list {
            let back = result[entry.index]
                .iter()
                .find(|other| other.index == i)
                .expect("neighbour relation is symmetric");
            assert_eq!(back.dist, entry.dist);
        }
    }
}

#[test]
fn zero_length_vectors_have_no_neighbours() {
    let points: Vec<Vec<f32>> = vec![Vec::new(); 3];
    let mut backend = FailingBackend::default();
    let result = block_on(find_knn_gpu_cosine(
        &points,
        2,
        Vec::as_slice,
        &mut backend,
        &mut LogProgress,
    ));

    assert_eq!(result.len(), 3);
    assert!(result.iter().all(Vec::is_empty));
    assert!(!backend.released);
}

#[test]
fn ragged_vectors_keep_one_list_per_point() {
    let points = vec![vec![1.0, 0.0], vec![0.0, 1.0, 0.5], vec![1.0, 1.0]];
    let mut backend = CpuDotProduct::default();
    let result = block_on(find_knn_gpu_cosine(
        &points,
        1,
        Vec::as_slice,
        &mut backend,
        &mut LogProgress,
    ));

    assert_eq!(result.len(), points.len());
    assert!(result.iter().all(Vec::is_empty));
}
