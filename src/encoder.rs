//! Run report encoding
//!
//! This module wraps the outcome of a pipeline run into a self-describing
//! JSON report: producer metadata, provenance of the run, the effective
//! configuration, and the diagnostic and evaluation tables.

use crate::config::AffinityConfig;
use crate::error::AffinityError;
use crate::evaluation::{EvaluationTable, RatioMetric};
use crate::monitor::DistributionReport;
use crate::pipeline::{PipelineOutput, RunSummary};
use crate::schema::SchemaReport;
use crate::{AFFINITY_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Current report format version
pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportProvenance {
    pub run_id: String,
    pub computed_at_utc: String,
    pub schema_version: String,
}

/// Output envelope of one scoring run
#[derive(Debug, Clone, Serialize)]
pub struct AffinityReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub config: AffinityConfig,
    pub summary: RunSummary,
    pub schema: SchemaReport,
    pub distribution: DistributionReport,
    pub evaluation: Option<EvaluationTable>,
    /// Verticals ordered by conversion-rate ratio, undefined last
    pub cvr_ranking: Vec<String>,
}

/// Report encoder carrying a stable instance identifier
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, config: &AffinityConfig, output: &PipelineOutput) -> AffinityReport {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: AFFINITY_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let provenance = ReportProvenance {
            run_id: Uuid::new_v4().to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            schema_version: output.schema_report.schema_version.clone(),
        };

        let cvr_ranking = output
            .evaluation
            .as_ref()
            .map(|table| {
                table
                    .sorted_by(RatioMetric::Cvr)
                    .into_iter()
                    .map(|row| row.vertical.to_string())
                    .collect()
            })
            .unwrap_or_default();

        AffinityReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            provenance,
            config: config.clone(),
            summary: output.summary,
            schema: output.schema_report.clone(),
            distribution: output.distribution.clone(),
            evaluation: output.evaluation.clone(),
            cvr_ranking,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        config: &AffinityConfig,
        output: &PipelineOutput,
    ) -> Result<String, AffinityError> {
        let report = self.encode(config, output);
        serde_json::to_string_pretty(&report).map_err(AffinityError::JsonError)
    }
}
