//! Vertical Affinity - batch scoring engine for product-vertical interest
//!
//! The engine turns per-domain behavioral frames into one comparable score per
//! vertical through a deterministic pipeline: merge → touchpoint filter →
//! imputation → percentile normalization → weighted scoring → assignment,
//! followed by a predicted-vs-rest backtest and distribution diagnostics.
//!
//! ## Modules
//!
//! - **Schema**: Typed feature columns and their polarity
//! - **Pipeline**: Stage orchestration over one cohort snapshot
//! - **Adapters / Encoder**: Tabular input and run report output

pub mod adapters;
pub mod config;
pub mod encoder;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod imputer;
pub mod merge;
pub mod monitor;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod scoring;
pub mod types;

pub use config::{AffinityConfig, ScoringConfig, TieBreak, WeightTemplate};
pub use encoder::{AffinityReport, ReportEncoder};
pub use error::AffinityError;
pub use evaluation::{EvaluationTable, Evaluator, RatioMetric};
pub use merge::{filter_members_with_touchpoints, FeatureMerger, Roster};
pub use pipeline::{AffinityPipeline, PipelineInputs, PipelineOutput};
pub use types::{Column, ComparisonResult, FeatureFrame, MemberId, Prediction, ScoredFrame};

// Schema exports
pub use schema::{
    ColumnKey, Dimension, FeatureSchema, Polarity, Vertical, NO_INTEREST, SCHEMA_VERSION,
};

/// Engine version embedded in run reports
pub const AFFINITY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for run reports
pub const PRODUCER_NAME: &str = "vertical-affinity";
