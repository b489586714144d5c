//! Incremental monthly pipeline.
//!
//! Flat messages are bucketed by calendar month; each month boundary sees the
//! cumulative message set, which is embedded, projected to 2D, clustered,
//! reconciled so that no point stays noise, and labelled into a [`Snapshot`].
//!
//! [`Snapshot`]: crate::models::Snapshot

pub mod clustering;
pub mod distance;
pub mod labeling;
pub mod monthly;
pub mod months;
pub mod outliers;
pub mod projection;

pub use clustering::{ClusterSelection, ClusteringParams, NOISE, cluster};
pub use distance::{DistanceMatrix, cosine_distance, cosine_distance_matrix};
pub use labeling::{ClusterLabeler, coherence, is_struggle_message};
pub use monthly::{MonthOutcome, MonthlyPipeline};
pub use months::{BranchGroup, MIN_TITLES_PER_MONTH, MonthBuckets, MonthWindow};
pub use outliers::reconcile_outliers;
pub use projection::{ProjectionParams, project};
