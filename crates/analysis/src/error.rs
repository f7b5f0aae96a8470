use crate::aggregation::Metric;
use abtest_core::StatsError;
use abtest_data::DatasetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("{metric}: {source}")]
    Stats {
        metric: Metric,
        #[source]
        source: StatsError,
    },

    #[error("need two groups to compare, found {0}")]
    TooFewGroups(usize),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AnalysisError {
    /// Returns true for the degenerate-sample hard stop.
    #[must_use]
    pub fn is_insufficient_sample(&self) -> bool {
        matches!(
            self,
            Self::Stats {
                source: StatsError::InsufficientSample { .. },
                ..
            }
        )
    }
}
