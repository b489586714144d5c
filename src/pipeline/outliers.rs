use std::collections::BTreeMap;

use tracing::debug;

use super::clustering::NOISE;
use super::distance::DistanceMatrix;
use crate::error::ClusteringError;

/// Fold every noise point into a real cluster.
///
/// Noise points are visited in index order. Each joins the cluster with the
/// smallest mean distance to it (ties go to the lowest id); if no cluster exists
/// yet it opens a new one with id `max + 1`, or 0. Assignments cascade: a point
/// placed earlier counts as a member for the points after it.
///
/// # Errors
///
/// Returns [`ClusteringError::LengthMismatch`] if `labels` and `distances`
/// disagree on the number of points.
pub fn reconcile_outliers(labels: &[i32], distances: &DistanceMatrix) -> Result<Vec<u32>, ClusteringError> {
    if labels.len() != distances.len() {
        return Err(ClusteringError::LengthMismatch { expected: distances.len(), found: labels.len() });
    }

    // Labels below NOISE are treated as noise too
    let mut assigned: Vec<Option<u32>> =
        labels.iter().map(|&l| if l > NOISE { u32::try_from(l).ok() } else { None }).collect();

    for idx in 0..assigned.len() {
        if assigned[idx].is_some() {
            continue;
        }

        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for (member, label) in assigned.iter().enumerate() {
            if let Some(cluster) = label {
                let entry = sums.entry(*cluster).or_insert((0.0, 0));
                entry.0 += distances.get(idx, member);
                entry.1 += 1;
            }
        }

        let mut best: Option<(u32, f64)> = None;
        for (&cluster, &(sum, count)) in &sums {
            let mean = sum / count as f64;
            if best.is_none_or(|(_, best_mean)| mean < best_mean) {
                best = Some((cluster, mean));
            }
        }

        let target = best.map_or(0, |(cluster, _)| cluster);
        debug!("Outlier {} assigned to cluster {}", idx, target);
        assigned[idx] = Some(target);
    }

    Ok(assigned.into_iter().map(|l| l.unwrap_or_default()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[f64]) -> DistanceMatrix {
        let rows = points.iter().map(|a| points.iter().map(|b| (a - b).abs()).collect()).collect();
        DistanceMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_no_noise_is_identity() {
        let m = line(&[0.0, 0.1, 0.9]);
        assert_eq!(reconcile_outliers(&[0, 0, 1], &m).unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn test_noise_joins_nearest_cluster_by_mean() {
        let m = line(&[0.0, 0.1, 0.9, 1.0, 0.3]);
        assert_eq!(reconcile_outliers(&[0, 0, 1, 1, NOISE], &m).unwrap(), vec![0, 0, 1, 1, 0]);
    }

    #[test]
    fn test_tie_goes_to_lowest_cluster_id() {
        let m = line(&[0.0, 1.0, 0.5]);
        assert_eq!(reconcile_outliers(&[1, 0, NOISE], &m).unwrap(), vec![1, 0, 0]);
    }

    #[test]
    fn test_all_noise_opens_cluster_zero_and_cascades() {
        let m = line(&[0.0, 0.0]);
        assert_eq!(reconcile_outliers(&[NOISE, NOISE], &m).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_cascade_uses_earlier_assignments() {
        // Point 3 is closer to cluster 0 alone, but point 2 pulls cluster 1 toward it first
        let m = line(&[0.0, 1.0, 0.7, 0.45]);
        let labels = reconcile_outliers(&[0, 1, NOISE, NOISE], &m).unwrap();
        assert_eq!(labels, vec![0, 1, 1, 1]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = reconcile_outliers(&[0], &line(&[0.0, 1.0])).unwrap_err();
        assert_eq!(err, ClusteringError::LengthMismatch { expected: 2, found: 1 });
    }
}
