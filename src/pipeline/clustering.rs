//! Density-based clustering (HDBSCAN) over a precomputed distance matrix.
//!
//! Stages:
//! - core distance of each point: distance to its `min_samples`-th nearest other point
//! - mutual reachability `max(core_i, core_j, d_ij)`
//! - minimum spanning tree (Prim, dense O(n²))
//! - single-linkage hierarchy via union-find
//! - condensed tree: splits smaller than `min_cluster_size` become points falling out
//! - cluster selection (`Leaf` or `Eom`), then `cluster_selection_epsilon` merging
//!
//! Points outside every selected cluster are labelled [`NOISE`]. The root of the
//! condensed tree is never selected, so a dataset with no internal split is all noise.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::distance::DistanceMatrix;
use crate::error::ClusteringError;

/// Label for points that belong to no cluster
pub const NOISE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSelection {
    Leaf,
    Eom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParams {
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub cluster_selection_epsilon: f64,
    pub selection: ClusterSelection,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 2,
            min_samples: 1,
            cluster_selection_epsilon: 0.3,
            selection: ClusterSelection::Leaf,
        }
    }
}

impl ClusteringParams {
    /// `min(configured, n - 1)`, never below 2: a single point cannot form a
    /// condensed cluster
    pub fn effective_min_cluster_size(&self, n: usize) -> usize {
        self.min_cluster_size.min(n.saturating_sub(1)).max(2)
    }
}

/// Row of the single-linkage hierarchy. Row `i` creates node `n + i`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

/// Edge of the condensed tree. Cluster ids start at `n` (the root).
#[derive(Debug, Clone, Copy, PartialEq)]
struct CondensedEdge {
    parent: usize,
    child: usize,
    lambda: f64,
    child_size: usize,
}

/// Cluster every point of `distances`. Labels are `0..k` in condensed-tree
/// order, or [`NOISE`].
///
/// # Errors
///
/// Returns [`ClusteringError::NonFinite`] if the matrix holds NaN or infinity.
pub fn cluster(distances: &DistanceMatrix, params: &ClusteringParams) -> Result<Vec<i32>, ClusteringError> {
    let n = distances.len();
    for i in 0..n {
        if let Some(j) = distances.row(i).iter().position(|d| !d.is_finite()) {
            return Err(ClusteringError::NonFinite { row: i, col: j });
        }
    }
    if n < 2 {
        return Ok(vec![NOISE; n]);
    }

    let core = core_distances(distances, params.min_samples);
    let mst = minimum_spanning_tree(distances, &core);
    let hierarchy = single_linkage(n, mst);
    let condensed = condense_tree(&hierarchy, n, params.effective_min_cluster_size(n));

    let selected = match params.selection {
        ClusterSelection::Leaf => select_leaves(&condensed),
        ClusterSelection::Eom => select_eom(&condensed, n),
    };
    let selected = if params.cluster_selection_epsilon > 0.0 {
        epsilon_merge(&selected, &condensed, n, params.cluster_selection_epsilon)
    } else {
        selected
    };

    Ok(assign_labels(&condensed, n, &selected))
}

fn core_distances(distances: &DistanceMatrix, min_samples: usize) -> Vec<f64> {
    let n = distances.len();
    // Index 0 of the sorted row is the point itself
    let rank = min_samples.max(1).min(n - 1);
    (0..n)
        .map(|i| {
            let mut row = distances.row(i).to_vec();
            row.sort_by(f64::total_cmp);
            row[rank]
        })
        .collect()
}

/// Prim's algorithm over the mutual reachability graph. Returns `(a, b, weight)`
/// edges sorted by weight; ties keep discovery order.
fn minimum_spanning_tree(distances: &DistanceMatrix, core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = distances.len();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut best_from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    let mut current = 0;
    in_tree[0] = true;
    for _ in 1..n {
        let mut next = None;
        let mut next_weight = f64::INFINITY;
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let reach = distances.get(current, j).max(core[current]).max(core[j]);
            if reach < best[j] {
                best[j] = reach;
                best_from[j] = current;
            }
            if next.is_none() || best[j] < next_weight {
                next = Some(j);
                next_weight = best[j];
            }
        }
        let Some(j) = next else { break };
        in_tree[j] = true;
        edges.push((best_from[j], j, next_weight));
        current = j;
    }

    edges.sort_by(|x, y| x.2.total_cmp(&y.2));
    edges
}

struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    next_label: usize,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        let total = 2 * n - 1;
        let mut size = vec![0; total];
        size[..n].fill(1);
        Self { parent: (0..total).collect(), size, next_label: n }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) -> usize {
        let label = self.next_label;
        self.parent[a] = label;
        self.parent[b] = label;
        self.size[label] = self.size[a] + self.size[b];
        self.next_label += 1;
        label
    }
}

fn single_linkage(n: usize, mst: Vec<(usize, usize, f64)>) -> Vec<Merge> {
    let mut sets = UnionFind::new(n);
    mst.into_iter()
        .map(|(a, b, distance)| {
            let (left, right) = (sets.find(a), sets.find(b));
            let node = sets.union(left, right);
            Merge { left, right, distance, size: sets.size[node] }
        })
        .collect()
}

fn node_size(hierarchy: &[Merge], n: usize, node: usize) -> usize {
    if node < n { 1 } else { hierarchy[node - n].size }
}

/// Every hierarchy node below (and including) `node`, breadth first
fn hierarchy_descendants(hierarchy: &[Merge], n: usize, node: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut queue = VecDeque::from([node]);
    while let Some(current) = queue.pop_front() {
        out.push(current);
        if current >= n {
            let merge = hierarchy[current - n];
            queue.push_back(merge.left);
            queue.push_back(merge.right);
        }
    }
    out
}

fn condense_tree(hierarchy: &[Merge], n: usize, min_cluster_size: usize) -> Vec<CondensedEdge> {
    let root = 2 * n - 2;
    let mut relabel = vec![0usize; root + 1];
    relabel[root] = n;
    let mut next_label = n + 1;
    let mut ignore = vec![false; root + 1];
    let mut condensed = Vec::new();

    for node in hierarchy_descendants(hierarchy, n, root) {
        if ignore[node] || node < n {
            continue;
        }

        let merge = hierarchy[node - n];
        let lambda = if merge.distance > 0.0 { 1.0 / merge.distance } else { f64::INFINITY };
        let parent = relabel[node];
        let left_size = node_size(hierarchy, n, merge.left);
        let right_size = node_size(hierarchy, n, merge.right);

        let left_big = left_size >= min_cluster_size;
        let right_big = right_size >= min_cluster_size;

        if left_big && right_big {
            for (child, child_size) in [(merge.left, left_size), (merge.right, right_size)] {
                relabel[child] = next_label;
                condensed.push(CondensedEdge { parent, child: next_label, lambda, child_size });
                next_label += 1;
            }
            continue;
        }

        // A side that is too small dissolves into points falling out of `parent`
        for (child, big) in [(merge.left, left_big), (merge.right, right_big)] {
            if big {
                relabel[child] = parent;
                continue;
            }
            for sub in hierarchy_descendants(hierarchy, n, child) {
                if sub < n {
                    condensed.push(CondensedEdge { parent, child: sub, lambda, child_size: 1 });
                }
                ignore[sub] = true;
            }
        }
    }

    condensed
}

/// Cluster-to-cluster edges of the condensed tree
fn cluster_edges(condensed: &[CondensedEdge]) -> impl Iterator<Item = &CondensedEdge> {
    condensed.iter().filter(|e| e.child_size > 1)
}

fn cluster_children(condensed: &[CondensedEdge]) -> BTreeMap<usize, Vec<usize>> {
    let mut children: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for edge in cluster_edges(condensed) {
        children.entry(edge.parent).or_default().push(edge.child);
    }
    children
}

fn birth_lambdas(condensed: &[CondensedEdge], root: usize) -> BTreeMap<usize, f64> {
    let mut births: BTreeMap<usize, f64> = cluster_edges(condensed).map(|e| (e.child, e.lambda)).collect();
    births.insert(root, 0.0);
    births
}

/// Clusters with no cluster children. The root is never a candidate.
fn select_leaves(condensed: &[CondensedEdge]) -> BTreeSet<usize> {
    let parents: BTreeSet<usize> = cluster_edges(condensed).map(|e| e.parent).collect();
    cluster_edges(condensed).map(|e| e.child).filter(|c| !parents.contains(c)).collect()
}

/// Excess-of-mass selection: keep a cluster unless its descendants are more
/// stable in total
fn select_eom(condensed: &[CondensedEdge], n: usize) -> BTreeSet<usize> {
    let births = birth_lambdas(condensed, n);
    let mut stability: BTreeMap<usize, f64> = births.keys().map(|&c| (c, 0.0)).collect();
    for edge in condensed {
        let birth = births.get(&edge.parent).copied().unwrap_or(0.0);
        // Equal infinities contribute nothing rather than NaN
        let persistence = if edge.lambda == birth { 0.0 } else { edge.lambda - birth };
        *stability.entry(edge.parent).or_default() += persistence * edge.child_size as f64;
    }

    let children = cluster_children(condensed);
    let mut selected: BTreeSet<usize> = stability.keys().copied().filter(|&c| c != n).collect();

    // Children always carry larger ids than their parent
    let bottom_up: Vec<usize> = stability.keys().rev().copied().filter(|&c| c != n).collect();
    for node in bottom_up {
        let child_total: f64 =
            children.get(&node).map(|cs| cs.iter().map(|c| stability[c]).sum()).unwrap_or(0.0);
        if child_total > stability[&node] {
            selected.remove(&node);
            stability.insert(node, child_total);
        } else {
            for descendant in cluster_descendants(&children, node) {
                if descendant != node {
                    selected.remove(&descendant);
                }
            }
        }
    }
    selected
}

fn cluster_descendants(children: &BTreeMap<usize, Vec<usize>>, node: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut queue = VecDeque::from([node]);
    while let Some(current) = queue.pop_front() {
        out.push(current);
        if let Some(cs) = children.get(&current) {
            queue.extend(cs.iter().copied());
        }
    }
    out
}

/// Replace every selected cluster born below `epsilon` with its closest
/// ancestor born above it. The root is never chosen.
fn epsilon_merge(
    selected: &BTreeSet<usize>,
    condensed: &[CondensedEdge],
    n: usize,
    epsilon: f64,
) -> BTreeSet<usize> {
    let births = birth_lambdas(condensed, n);
    let parent_of: BTreeMap<usize, usize> = cluster_edges(condensed).map(|e| (e.child, e.parent)).collect();
    let children = cluster_children(condensed);
    let birth_eps = |c: usize| 1.0 / births.get(&c).copied().unwrap_or(0.0);

    let mut merged = BTreeSet::new();
    let mut processed = BTreeSet::new();
    for &leaf in selected {
        if birth_eps(leaf) >= epsilon {
            merged.insert(leaf);
            continue;
        }
        if processed.contains(&leaf) {
            continue;
        }

        let mut current = leaf;
        let chosen = loop {
            let Some(&parent) = parent_of.get(&current) else { break current };
            if parent == n {
                break current;
            }
            if birth_eps(parent) > epsilon {
                break parent;
            }
            current = parent;
        };

        merged.insert(chosen);
        processed.extend(cluster_descendants(&children, chosen).into_iter().filter(|&c| c != chosen));
    }

    // Drop anything nested inside another selected cluster
    let nested: Vec<usize> = merged
        .iter()
        .copied()
        .filter(|&c| {
            let mut current = c;
            while let Some(&parent) = parent_of.get(&current) {
                if merged.contains(&parent) {
                    return true;
                }
                current = parent;
            }
            false
        })
        .collect();
    for c in nested {
        merged.remove(&c);
    }
    merged
}

fn assign_labels(condensed: &[CondensedEdge], n: usize, selected: &BTreeSet<usize>) -> Vec<i32> {
    let parent_of: BTreeMap<usize, usize> = condensed.iter().map(|e| (e.child, e.parent)).collect();
    let label_of: BTreeMap<usize, i32> =
        selected.iter().enumerate().map(|(label, &c)| (c, label as i32)).collect();

    (0..n)
        .map(|point| {
            let mut current = point;
            while let Some(&parent) = parent_of.get(&current) {
                if let Some(&label) = label_of.get(&parent) {
                    return label;
                }
                current = parent;
            }
            NOISE
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a symmetric matrix from a closure over index pairs
    fn matrix(n: usize, f: impl Fn(usize, usize) -> f64) -> DistanceMatrix {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0.0 } else { f(i.min(j), i.max(j)) }).collect())
            .collect();
        DistanceMatrix::from_rows(rows).unwrap()
    }

    fn group(i: usize, sizes: &[usize]) -> usize {
        let mut acc = 0;
        for (g, &size) in sizes.iter().enumerate() {
            acc += size;
            if i < acc {
                return g;
            }
        }
        sizes.len()
    }

    #[test]
    fn test_two_separated_groups() {
        let m = matrix(6, |i, j| if group(i, &[3, 3]) == group(j, &[3, 3]) { 0.05 } else { 0.9 });
        let labels = cluster(&m, &ClusteringParams::default()).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_epsilon_merges_close_leaves() {
        // Groups 0 and 1 split at 0.2, group 2 sits far away
        let sizes = [2, 2, 2];
        let m = matrix(6, |i, j| match (group(i, &sizes), group(j, &sizes)) {
            (a, b) if a == b => 0.01,
            (0, 1) => 0.2,
            _ => 0.9,
        });

        let merged = cluster(&m, &ClusteringParams::default()).unwrap();
        assert!(merged.iter().all(|&l| l != NOISE));
        assert_eq!(merged[0], merged[2]);
        assert_ne!(merged[0], merged[4]);

        let params = ClusteringParams { cluster_selection_epsilon: 0.0, ..Default::default() };
        let split = cluster(&m, &params).unwrap();
        assert_ne!(split[0], split[2]);
        assert_eq!(split[0], split[1]);
    }

    #[test]
    fn test_identical_pair_is_noise() {
        let m = matrix(2, |_, _| 0.0);
        assert_eq!(cluster(&m, &ClusteringParams::default()).unwrap(), vec![NOISE, NOISE]);
    }

    #[test]
    fn test_trivial_sizes() {
        let params = ClusteringParams::default();
        assert!(cluster(&matrix(0, |_, _| 0.0), &params).unwrap().is_empty());
        assert_eq!(cluster(&matrix(1, |_, _| 0.0), &params).unwrap(), vec![NOISE]);
    }

    #[test]
    fn test_eom_prefers_stable_parent() {
        let sizes = [2, 2, 2];
        let m = matrix(6, |i, j| match (group(i, &sizes), group(j, &sizes)) {
            (a, b) if a == b => 0.01,
            (0, 1) => 0.2,
            _ => 0.9,
        });
        let params = ClusteringParams {
            selection: ClusterSelection::Eom,
            cluster_selection_epsilon: 0.0,
            ..Default::default()
        };
        let labels = cluster(&m, &params).unwrap();
        assert!(labels.iter().all(|&l| l != NOISE));
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn test_effective_min_cluster_size() {
        let params = ClusteringParams::default();
        assert_eq!(params.effective_min_cluster_size(2), 2);
        assert_eq!(params.effective_min_cluster_size(50), 2);
        let large = ClusteringParams { min_cluster_size: 5, ..Default::default() };
        assert_eq!(large.effective_min_cluster_size(3), 2);
        assert_eq!(large.effective_min_cluster_size(10), 5);
    }

    #[test]
    fn test_core_distance_skips_self() {
        let m = matrix(3, |i, j| (i + j) as f64 / 10.0);
        assert_eq!(core_distances(&m, 1), vec![0.1, 0.1, 0.2]);
    }
}
