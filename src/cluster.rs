//! Greedy single-link identity clustering.
//!
//! An order-dependent approximation of single-link clustering: each cluster
//! grows from the first unassigned face in input order, absorbing every
//! not-yet-assigned face sufficiently similar to that anchor. Deterministic
//! for a fixed input order; reordering the input may change membership.
//! O(N²) comparisons, intended for a bounded per-batch working set.

use crate::similarity::{cosine, SimilarityError};
use crate::types::Embedding;

pub const DEFAULT_CLUSTER_THRESHOLD: f32 = 0.6;

/// Cluster `n` items through a pairwise similarity source.
///
/// Each item joins at most one cluster. Clusters are emitted in anchor
/// order, then sorted by descending size (stable, so equal-size clusters
/// keep anchor order).
pub fn cluster_greedy<F>(n: usize, threshold: f32, mut similarity: F) -> Vec<Vec<usize>>
where
    F: FnMut(usize, usize) -> f32,
{
    let mut assigned = vec![false; n];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for i in 0..n {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut cluster = vec![i];

        for j in (i + 1)..n {
            if !assigned[j] && similarity(i, j) >= threshold {
                assigned[j] = true;
                cluster.push(j);
            }
        }
        clusters.push(cluster);
    }

    clusters.sort_by(|a, b| b.len().cmp(&a.len()));
    clusters
}

/// Cluster embeddings by cosine similarity.
///
/// All embeddings must share one dimension; a mismatch is a caller defect
/// and fails the whole call before any comparison runs.
pub fn cluster_embeddings(
    embeddings: &[Embedding],
    threshold: f32,
) -> Result<Vec<Vec<usize>>, SimilarityError> {
    if let Some(first) = embeddings.first() {
        for e in &embeddings[1..] {
            if e.dim() != first.dim() {
                return Err(SimilarityError::DimensionMismatch {
                    left: first.dim(),
                    right: e.dim(),
                });
            }
        }
    }

    let clusters = cluster_greedy(embeddings.len(), threshold, |i, j| {
        // Dimensions verified above; treat any residual failure as no match.
        cosine(&embeddings[i], &embeddings[j]).unwrap_or(0.0)
    });
    Ok(clusters)
}
