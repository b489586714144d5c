//! 2D manifold projection in the style of UMAP.
//!
//! The projection works from the precomputed cosine distance matrix:
//!
//! 1. k-nearest-neighbour graph with `k = min(n_neighbors, n)` (self included)
//! 2. per-point smooth-kNN bandwidth (`rho`, `sigma`) by binary search
//! 3. fuzzy-union symmetrisation `w + wᵀ - w∘wᵀ`
//! 4. low-dimensional curve `1 / (1 + a·d^(2b))` fitted from `min_dist` and `spread`
//! 5. random initialisation and SGD with negative sampling
//!
//! All randomness comes from one `StdRng`, so a fixed seed gives identical
//! coordinates across runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::distance::DistanceMatrix;

pub const DEFAULT_SEED: u64 = 42;

const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const SMOOTH_K_ITERATIONS: usize = 64;
const MIN_K_DIST_SCALE: f64 = 1e-3;
const GRADIENT_CLIP: f64 = 4.0;
const REPULSION_STRENGTH: f64 = 1.0;
const INITIAL_ALPHA: f64 = 1.0;
const INIT_RANGE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParams {
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    pub n_epochs: usize,
    pub negative_sample_rate: usize,
    /// `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: 500,
            negative_sample_rate: 5,
            seed: Some(DEFAULT_SEED),
        }
    }
}

/// Weighted edge of the fuzzy neighbour graph
#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    head: usize,
    tail: usize,
    weight: f64,
}

/// Project points into 2D from their pairwise distances.
///
/// Zero points yield an empty vector and a single point sits at the origin.
pub fn project(distances: &DistanceMatrix, params: &ProjectionParams) -> Vec<[f64; 2]> {
    let n = distances.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![[0.0, 0.0]],
        _ => {}
    }

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let k = params.n_neighbors.clamp(2, n);
    let knn = nearest_neighbors(distances, k - 1);
    let edges = fuzzy_graph(&knn, k, n);
    let (a, b) = fit_curve(params.min_dist, params.spread);

    let mut embedding: Vec<[f64; 2]> = (0..n)
        .map(|_| [rng.gen_range(-INIT_RANGE..INIT_RANGE), rng.gen_range(-INIT_RANGE..INIT_RANGE)])
        .collect();

    optimize_layout(&mut embedding, &edges, a, b, params, &mut rng);
    embedding
}

/// The `count` nearest other points of every row, closest first. Ties keep index order.
fn nearest_neighbors(distances: &DistanceMatrix, count: usize) -> Vec<Vec<(usize, f64)>> {
    (0..distances.len())
        .map(|i| {
            let mut row: Vec<(usize, f64)> = distances
                .row(i)
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, &d)| (j, d))
                .collect();
            row.sort_by(|x, y| x.1.total_cmp(&y.1));
            row.truncate(count);
            row
        })
        .collect()
}

/// Distance to the nearest neighbour (`rho`) and the bandwidth (`sigma`) that
/// makes the neighbour memberships sum to `log2(k)`
fn smooth_knn(neighbors: &[(usize, f64)], k: usize, mean_all: f64) -> (f64, f64) {
    let target = (k as f64).log2();
    let rho = neighbors.iter().map(|&(_, d)| d).find(|&d| d > 0.0).unwrap_or(0.0);

    let (mut lo, mut hi, mut mid) = (0.0f64, f64::INFINITY, 1.0f64);
    for _ in 0..SMOOTH_K_ITERATIONS {
        let psum: f64 = neighbors
            .iter()
            .map(|&(_, d)| {
                let gap = d - rho;
                if gap > 0.0 { (-gap / mid).exp() } else { 1.0 }
            })
            .sum();

        if (psum - target).abs() < SMOOTH_K_TOLERANCE {
            break;
        }

        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    let mean_neighbors = if neighbors.is_empty() {
        0.0
    } else {
        neighbors.iter().map(|&(_, d)| d).sum::<f64>() / neighbors.len() as f64
    };
    let floor = if rho > 0.0 { MIN_K_DIST_SCALE * mean_neighbors } else { MIN_K_DIST_SCALE * mean_all };

    (rho, mid.max(floor))
}

/// Symmetrised fuzzy membership graph, both directions listed, sorted by (head, tail)
fn fuzzy_graph(knn: &[Vec<(usize, f64)>], k: usize, n: usize) -> Vec<Edge> {
    let mean_all = {
        let count = knn.iter().map(Vec::len).sum::<usize>().max(1);
        knn.iter().flatten().map(|&(_, d)| d).sum::<f64>() / count as f64
    };

    let mut directed = vec![0.0f64; n * n];
    for (i, neighbors) in knn.iter().enumerate() {
        let (rho, sigma) = smooth_knn(neighbors, k, mean_all);
        for &(j, d) in neighbors {
            let gap = d - rho;
            directed[i * n + j] = if gap <= 0.0 || sigma == 0.0 { 1.0 } else { (-gap / sigma).exp() };
        }
    }

    let mut edges = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let (w, wt) = (directed[i * n + j], directed[j * n + i]);
            let weight = w + wt - w * wt;
            if weight > 0.0 {
                edges.push(Edge { head: i, tail: j, weight });
            }
        }
    }
    edges
}

/// Fit `a` and `b` so that `1 / (1 + a·x^(2b))` approximates the target
/// membership curve (1 below `min_dist`, exponential decay past it) by least
/// squares over 300 samples on `[0, 3·spread]`.
pub fn fit_curve(min_dist: f64, spread: f64) -> (f64, f64) {
    let xs: Vec<f64> = (0..300).map(|i| i as f64 * 3.0 * spread / 299.0).collect();
    let ys: Vec<f64> =
        xs.iter().map(|&x| if x < min_dist { 1.0 } else { (-(x - min_dist) / spread).exp() }).collect();

    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let fit = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (fit - y).powi(2)
            })
            .sum()
    };

    // Coarse grid, then repeatedly zoom in around the best cell
    let (mut a_lo, mut a_hi, mut b_lo, mut b_hi) = (0.01, 5.0, 0.1, 2.0);
    let steps = 40;
    let (mut best_a, mut best_b, mut best_err) = (1.0, 1.0, f64::INFINITY);
    for _ in 0..8 {
        let a_step = (a_hi - a_lo) / steps as f64;
        let b_step = (b_hi - b_lo) / steps as f64;
        for ai in 0..=steps {
            let a = a_lo + ai as f64 * a_step;
            for bi in 0..=steps {
                let b = b_lo + bi as f64 * b_step;
                let err = sse(a, b);
                if err < best_err {
                    (best_a, best_b, best_err) = (a, b, err);
                }
            }
        }
        a_lo = (best_a - 2.0 * a_step).max(1e-4);
        a_hi = best_a + 2.0 * a_step;
        b_lo = (best_b - 2.0 * b_step).max(1e-4);
        b_hi = best_b + 2.0 * b_step;
    }

    (best_a, best_b)
}

fn clip(value: f64) -> f64 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn squared_distance(p: [f64; 2], q: [f64; 2]) -> f64 {
    (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)
}

fn optimize_layout(
    embedding: &mut [[f64; 2]],
    edges: &[Edge],
    a: f64,
    b: f64,
    params: &ProjectionParams,
    rng: &mut StdRng,
) {
    let n = embedding.len();
    let n_epochs = params.n_epochs.max(1);
    let max_weight = edges.iter().map(|e| e.weight).fold(0.0f64, f64::max);
    if max_weight <= 0.0 {
        return;
    }

    // Edges too weak to be sampled even once are dropped
    let edges: Vec<Edge> =
        edges.iter().copied().filter(|e| e.weight >= max_weight / n_epochs as f64).collect();
    let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_weight / e.weight).collect();
    let negative_rate = params.negative_sample_rate.max(1) as f64;
    let epochs_per_negative: Vec<f64> = epochs_per_sample.iter().map(|e| e / negative_rate).collect();

    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    for epoch in 0..n_epochs {
        let alpha = INITIAL_ALPHA * (1.0 - epoch as f64 / n_epochs as f64);
        let epoch_f = epoch as f64;

        for (idx, edge) in edges.iter().enumerate() {
            if next_sample[idx] > epoch_f {
                continue;
            }

            let (j, k) = (edge.head, edge.tail);
            let current = embedding[j];
            let other = embedding[k];
            let dist_sq = squared_distance(current, other);

            let attract = if dist_sq > 0.0 {
                (-2.0 * a * b * dist_sq.powf(b - 1.0)) / (a * dist_sq.powf(b) + 1.0)
            } else {
                0.0
            };
            for d in 0..2 {
                let grad = clip(attract * (current[d] - other[d]));
                embedding[j][d] += grad * alpha;
                embedding[k][d] -= grad * alpha;
            }
            next_sample[idx] += epochs_per_sample[idx];

            let pending = (epoch_f - next_negative[idx]) / epochs_per_negative[idx];
            let n_negative = pending.floor().max(0.0) as usize;
            for _ in 0..n_negative {
                let sampled = rng.gen_range(0..n);
                if sampled == j {
                    continue;
                }
                let current = embedding[j];
                let other = embedding[sampled];
                let dist_sq = squared_distance(current, other);

                let repel = if dist_sq > 0.0 {
                    (2.0 * REPULSION_STRENGTH * b) / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0))
                } else {
                    0.0
                };
                for d in 0..2 {
                    let grad = if repel > 0.0 { clip(repel * (current[d] - other[d])) } else { GRADIENT_CLIP };
                    embedding[j][d] += grad * alpha;
                }
            }
            next_negative[idx] += n_negative as f64 * epochs_per_negative[idx];
        }
    }
}
