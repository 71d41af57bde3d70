/// Offline nearest neighbour tool.
///
/// Reads one tab-separated vector per line and writes the K nearest
/// neighbours of every vector, by cosine distance, as JSON next to the input.
use std::env;

use bevy::tasks::block_on;
use projector_render_engine::engine::knn::{CpuDotProduct, Neighbors, find_knn_gpu_cosine};
#[cfg(not(target_arch = "wasm32"))]
use projector_render_engine::engine::knn::WgpuDotProduct;
use projector_render_engine::engine::progress::{IndicatifProgress, ProgressReporter};
use projector_render_engine::error::ProjectorError;

const DEFAULT_K: usize = 100;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <vectors.tsv> [k]", args[0]);
        std::process::exit(1);
    }

    let input_path = &args[1];
    let k = match args.get(2) {
        Some(k) => k.parse::<usize>()?,
        None => DEFAULT_K,
    };
    let output_path = format!("{}_knn.json", input_path.trim_end_matches(".tsv"));

    let vectors = parse_vectors(&std::fs::read_to_string(input_path)?)?;
    println!("Loaded {} vectors from {}", vectors.len(), input_path);

    let mut progress = IndicatifProgress::default();
    let neighbors = block_on(run(&vectors, k.max(1), &mut progress));

    std::fs::write(&output_path, serde_json::to_string(&neighbors)?)?;
    println!("Wrote {} neighbour lists to {}", neighbors.len(), output_path);
    Ok(())
}

async fn run(vectors: &[Vec<f32>], k: usize, progress: &mut dyn ProgressReporter) -> Neighbors {
    #[cfg(not(target_arch = "wasm32"))]
    match WgpuDotProduct::new().await {
        Ok(mut backend) => {
            return find_knn_gpu_cosine(vectors, k, Vec::as_slice, &mut backend, progress).await;
        }
        Err(err) => eprintln!("{err}, falling back to the CPU"),
    }

    let mut backend = CpuDotProduct::default();
    find_knn_gpu_cosine(vectors, k, Vec::as_slice, &mut backend, progress).await
}

/// Parses tab-separated rows of floats. Blank lines are skipped; every row
/// must have the width of the first.
fn parse_vectors(text: &str) -> Result<Vec<Vec<f32>>, ProjectorError> {
    let mut vectors: Vec<Vec<f32>> = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split('\t')
            .map(|value| value.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProjectorError::InvalidVectors {
                line: number + 1,
                message: e.to_string(),
            })?;
        if let Some(first) = vectors.first() {
            if first.len() != row.len() {
                return Err(ProjectorError::InvalidVectors {
                    line: number + 1,
                    message: format!("expected {} values, got {}", first.len(), row.len()),
                });
            }
        }
        vectors.push(row);
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_skips_blank_lines() {
        let vectors = parse_vectors("1\t0\n\n0.5\t-2\n").unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.5, -2.0]]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = parse_vectors("1\t2\n3\n").unwrap_err();
        assert!(matches!(err, ProjectorError::InvalidVectors { line: 2, .. }));
        assert!(parse_vectors("1\tx\n").is_err());
    }
}
