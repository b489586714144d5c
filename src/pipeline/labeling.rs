use std::collections::BTreeMap;

use tracing::warn;

use super::distance::DistanceMatrix;
use crate::models::ClusterMetadata;
use crate::providers::TopicGenerator;

pub const ERROR_TOPIC: &str = "Error";
pub const FALLBACK_TOPIC: &str = "Miscellaneous";

/// Phrases that mark a message where the user describes a difficulty.
/// Matched case-insensitively anywhere in the text.
pub const STRUGGLE_PHRASES: &[&str] = &[
    "I'm struggling with",
    "I don't understand",
    "This is confusing",
    "I'm stuck on",
    "Need help with",
    "This doesn't make sense",
    "Can't figure out",
    "Having trouble with",
    "Not sure how to",
    "Difficult to",
    "Problem with",
    "Issue with",
    "Error when",
    "Failing to",
];

pub fn is_struggle_message(text: &str) -> bool {
    let lowered = text.to_lowercase();
    STRUGGLE_PHRASES.iter().any(|phrase| lowered.contains(&phrase.to_lowercase()))
}

/// Mean pairwise similarity `1 - distance` over the members, clamped to [0, 1].
/// A single member is perfectly coherent.
pub fn coherence(members: &[usize], distances: &DistanceMatrix) -> f64 {
    if members.len() < 2 {
        return 1.0;
    }

    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, &a) in members.iter().enumerate() {
        for &b in &members[i + 1..] {
            total += 1.0 - distances.get(a, b);
            pairs += 1;
        }
    }
    (total / pairs as f64).clamp(0.0, 1.0)
}

/// Builds per-cluster metadata, degrading provider failures to placeholder labels
pub struct ClusterLabeler<'a> {
    generator: &'a dyn TopicGenerator,
    reflections: bool,
}

impl<'a> ClusterLabeler<'a> {
    pub fn new(generator: &'a dyn TopicGenerator, reflections: bool) -> Self {
        Self { generator, reflections }
    }

    /// Label every cluster present in `clusters`.
    ///
    /// `titles` and `human_texts` are index-aligned with `clusters`; the texts of
    /// a point are the human messages of that branch.
    pub fn label(
        &self,
        clusters: &[u32],
        titles: &[String],
        human_texts: &[Vec<String>],
        distances: &DistanceMatrix,
    ) -> BTreeMap<u32, ClusterMetadata> {
        let mut members: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (idx, &cluster) in clusters.iter().enumerate() {
            members.entry(cluster).or_default().push(idx);
        }

        members
            .into_iter()
            .map(|(cluster, indices)| {
                let cluster_titles: Vec<String> = indices.iter().map(|&i| titles[i].clone()).collect();
                let topic = self.topic(cluster, &cluster_titles);
                let reflection = if self.reflections {
                    let struggles: Vec<String> = indices
                        .iter()
                        .filter_map(|&i| human_texts.get(i))
                        .flatten()
                        .filter(|text| is_struggle_message(text))
                        .cloned()
                        .collect();
                    self.reflection(cluster, &struggles)
                } else {
                    String::new()
                };

                let metadata = ClusterMetadata {
                    topic,
                    size: indices.len(),
                    coherence: coherence(&indices, distances),
                    reflection,
                };
                (cluster, metadata)
            })
            .collect()
    }

    fn topic(&self, cluster: u32, titles: &[String]) -> String {
        match self.generator.generate_topic(titles) {
            Ok(topic) if topic.trim().is_empty() => FALLBACK_TOPIC.to_string(),
            Ok(topic) => topic,
            Err(e) => {
                warn!("Topic generation failed for cluster {}: {}", cluster, e);
                ERROR_TOPIC.to_string()
            }
        }
    }

    fn reflection(&self, cluster: u32, struggles: &[String]) -> String {
        if struggles.is_empty() {
            return String::new();
        }
        self.generator.generate_reflection(struggles).unwrap_or_else(|e| {
            warn!("Reflection generation failed for cluster {}: {}", cluster, e);
            String::new()
        })
    }
}
