use rayon::prelude::*;

use crate::error::ClusteringError;

/// Dense symmetric pairwise distance matrix, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// Build from explicit rows, validating shape and finiteness
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ClusteringError> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(ClusteringError::NotSquare { rows: n, row: i, len: row.len() });
            }
            if let Some(j) = row.iter().position(|d| !d.is_finite()) {
                return Err(ClusteringError::NonFinite { row: i, col: j });
            }
            data.extend(row);
        }
        Ok(Self { n, data })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }
}

/// Cosine distance `1 - cos(a, b)`, clamped to `[0, 2]`.
///
/// A zero vector has no direction, so its distance to anything else is 1.0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 2.0)
}

/// Pairwise cosine distances over the embeddings, rows computed in parallel.
///
/// # Errors
///
/// Returns [`ClusteringError::DimensionMismatch`] if the vectors differ in length
/// and [`ClusteringError::NonFinite`] if an embedding contains NaN or infinity.
pub fn cosine_distance_matrix(embeddings: &[Vec<f32>]) -> Result<DistanceMatrix, ClusteringError> {
    let n = embeddings.len();
    if let Some(first) = embeddings.first() {
        let expected = first.len();
        for (row, vector) in embeddings.iter().enumerate() {
            if vector.len() != expected {
                return Err(ClusteringError::DimensionMismatch {
                    expected,
                    found: vector.len(),
                    row,
                });
            }
            if let Some(col) = vector.iter().position(|v| !v.is_finite()) {
                return Err(ClusteringError::NonFinite { row, col });
            }
        }
    }

    let mut data = vec![0.0; n * n];
    data.par_chunks_mut(n.max(1)).enumerate().for_each(|(i, row)| {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = if i == j { 0.0 } else { cosine_distance(&embeddings[i], &embeddings[j]) };
        }
    });

    Ok(DistanceMatrix { n, data })
}
