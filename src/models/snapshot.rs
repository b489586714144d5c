use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Topic summary for one cluster in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    pub topic: String,
    pub size: usize,
    pub coherence: f64,
    #[serde(default)]
    pub reflection: String,
}

/// Point-in-time visualization state for one month boundary.
///
/// `points`, `clusters` and `titles` are index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub month_year: String,
    pub points: Vec<[f64; 2]>,
    pub clusters: Vec<u32>,
    pub titles: Vec<String>,
    pub topics: BTreeMap<u32, ClusterMetadata>,
    pub total_conversations: usize,
}

/// Timeline entry returned when listing stored snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub month_year: String,
    pub total_conversations: usize,
}

/// Contents of the mutable "latest" mirror files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestState {
    pub points: Vec<[f64; 2]>,
    pub clusters: Vec<u32>,
    pub topics: BTreeMap<u32, ClusterMetadata>,
    pub titles: Vec<String>,
}

impl From<&Snapshot> for LatestState {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            points: snapshot.points.clone(),
            clusters: snapshot.clusters.clone(),
            topics: snapshot.topics.clone(),
            titles: snapshot.titles.clone(),
        }
    }
}
