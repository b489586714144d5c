use tracing::{debug, info, warn};

use super::clustering::{NOISE, cluster};
use super::distance::cosine_distance_matrix;
use super::labeling::ClusterLabeler;
use super::months::{MIN_TITLES_PER_MONTH, MonthWindow};
use super::outliers::reconcile_outliers;
use super::projection::project;
use crate::config::PipelineSettings;
use crate::error::{MonthError, ProviderError};
use crate::models::Snapshot;
use crate::providers::{Embedder, TopicGenerator};

/// Result of processing one month boundary
#[derive(Debug)]
pub enum MonthOutcome {
    Snapshot(Snapshot),
    /// Too little data to cluster; not an error
    Skipped { reason: String },
    /// A provider or clustering failure; later months still run
    Failed { error: MonthError },
}

/// Embeds, projects, clusters and labels one cumulative month window
pub struct MonthlyPipeline<'a> {
    embedder: &'a dyn Embedder,
    generator: &'a dyn TopicGenerator,
    settings: &'a PipelineSettings,
}

impl<'a> MonthlyPipeline<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        generator: &'a dyn TopicGenerator,
        settings: &'a PipelineSettings,
    ) -> Self {
        Self { embedder, generator, settings }
    }

    pub fn process_month(&self, window: &MonthWindow<'_>) -> MonthOutcome {
        let groups = window.groups();
        if groups.len() < MIN_TITLES_PER_MONTH {
            let reason = format!("only {} distinct branch title(s)", groups.len());
            warn!("Skipping month {}: {}", window.month, reason);
            return MonthOutcome::Skipped { reason };
        }

        let titles: Vec<String> = groups.iter().map(|g| g.title.clone()).collect();
        let human_texts: Vec<Vec<String>> = groups.into_iter().map(|g| g.human_texts).collect();

        match self.build_snapshot(window.month, titles, &human_texts) {
            Ok(snapshot) => {
                info!(
                    "Month {}: {} titles in {} clusters",
                    snapshot.month_year,
                    snapshot.total_conversations,
                    snapshot.topics.len()
                );
                MonthOutcome::Snapshot(snapshot)
            }
            Err(error) => {
                warn!("Month {} failed: {}", window.month, error);
                MonthOutcome::Failed { error }
            }
        }
    }

    fn build_snapshot(
        &self,
        month: &str,
        titles: Vec<String>,
        human_texts: &[Vec<String>],
    ) -> Result<Snapshot, MonthError> {
        let embeddings = self.embedder.embed(&titles)?;
        if embeddings.len() != titles.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, received {}",
                titles.len(),
                embeddings.len()
            ))
            .into());
        }

        let distances = cosine_distance_matrix(&embeddings)?;
        let points = project(&distances, &self.settings.projection);
        let raw_labels = cluster(&distances, &self.settings.clustering)?;
        debug!(
            "Month {}: {} of {} points labelled noise before reconciliation",
            month,
            raw_labels.iter().filter(|&&l| l == NOISE).count(),
            raw_labels.len()
        );
        let clusters = reconcile_outliers(&raw_labels, &distances)?;

        let labeler = ClusterLabeler::new(self.generator, self.settings.reflections);
        let topics = labeler.label(&clusters, &titles, human_texts, &distances);

        Ok(Snapshot {
            month_year: month.to_string(),
            points,
            clusters,
            total_conversations: titles.len(),
            titles,
            topics,
        })
    }
}
