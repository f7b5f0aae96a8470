pub mod config;
pub mod config_loader;
pub mod stats;
pub mod traits;

pub use config::{AnalysisConfig, AppConfig, DataConfig, OutlierSource, OutputConfig};
pub use config_loader::ConfigLoader;
pub use stats::{
    t_confidence_interval, two_sample_t_test, ConfidenceInterval, Quartiles, StatsError,
    TTestOutcome, VarianceAssumption,
};
pub use traits::{Level, MemorySink, ReportSink, SinkEvent, Tee, TracingSink};
