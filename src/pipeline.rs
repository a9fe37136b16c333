//! Pipeline orchestration
//!
//! This module provides the public API for scoring a cohort.
//! It runs the stages in order from per-domain frames to predictions,
//! evaluation and distribution diagnostics.

use crate::config::{AffinityConfig, ScoringConfig};
use crate::error::AffinityError;
use crate::evaluation::{EvaluationTable, Evaluator};
use crate::features::{complete_activity_columns, prepare_rfm_frame};
use crate::imputer::Imputer;
use crate::merge::{filter_members_with_touchpoints, FeatureMerger, Roster};
use crate::monitor::{Checkpoints, DistributionMonitor, DistributionReport};
use crate::normalizer::Normalizer;
use crate::schema::{FeatureSchema, SchemaReport};
use crate::scoring::Scorer;
use crate::types::{FeatureFrame, MemberId, ScoredFrame};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;

/// Per-domain frames handed over by the data producers
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub roster: Roster,
    /// Members removed from the roster before merging
    pub excluded: HashSet<MemberId>,
    /// Digital behavior, keyed by the digital join column
    pub digital: FeatureFrame,
    pub activity: FeatureFrame,
    pub rfm: FeatureFrame,
    /// Observed purchases over the validation window
    pub validation: Option<FeatureFrame>,
}

/// Headline counts of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_members: usize,
    pub members_with_touchpoints: usize,
    /// Members assigned to a vertical rather than `No_Interest`
    pub predicted_members: usize,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub schema_report: SchemaReport,
    /// Merged frame before the touchpoint filter, without join keys
    pub merged: FeatureFrame,
    pub normalized: FeatureFrame,
    pub scored: ScoredFrame,
    pub evaluation: Option<EvaluationTable>,
    pub distribution: DistributionReport,
    pub summary: RunSummary,
}

/// Batch scoring pipeline configured once, run per cohort snapshot
///
/// Pipeline stages:
/// 1. FeatureMerger - Left-join domain frames onto the roster
/// 2. Touchpoint filter - Drop members without any signal
/// 3. Imputer - Polarity-specific fills
/// 4. Normalizer - Percentile-rank scores
/// 5. Scorer - Weighted affinity per vertical and assignment
/// 6. Evaluator - Predicted-vs-rest comparison (with validation data)
/// 7. DistributionMonitor - Checkpoint diagnostics
pub struct AffinityPipeline {
    config: AffinityConfig,
    schema: FeatureSchema,
    imputer: Imputer,
}

impl AffinityPipeline {
    pub fn new(config: AffinityConfig) -> Result<Self, AffinityError> {
        config.validate()?;
        Ok(Self {
            schema: config.schema(),
            imputer: Imputer::new(config.recency_sentinel, config.positive_fill),
            config,
        })
    }

    pub fn config(&self) -> &AffinityConfig {
        &self.config
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Validate a frame against the schema, failing in strict mode
    pub fn check_schema(&self, frame: &FeatureFrame) -> Result<SchemaReport, AffinityError> {
        let report = self.schema.validate(frame);
        if !report.unclassified.is_empty() {
            warn!(
                "Ignoring {} columns outside schema {}: {}",
                report.unclassified.len(),
                report.schema_version,
                report.unclassified.join(", ")
            );
        }
        if !report.is_complete() {
            if self.config.strict_schema {
                return Err(AffinityError::MissingColumns(report.missing));
            }
            warn!(
                "{} schema columns absent from the merged frame: {}",
                report.missing.len(),
                report.missing.join(", ")
            );
        }
        Ok(report)
    }

    pub fn run(&self, inputs: &PipelineInputs) -> Result<PipelineOutput, AffinityError> {
        let targets = &self.config.target_verticals;
        let feature_verticals = &self.config.feature_verticals;

        let roster = if inputs.excluded.is_empty() {
            inputs.roster.clone()
        } else {
            inputs.roster.excluding(&inputs.excluded)
        };

        // Stage 1: shape and merge domain frames
        let rfm = prepare_rfm_frame(&inputs.rfm, feature_verticals, self.config.recency_sentinel)?;
        let activity = complete_activity_columns(&inputs.activity, feature_verticals)?;
        let merged = FeatureMerger::new(&roster)
            .join_keyed(&inputs.digital, self.config.digital_join_column.as_str())
            .join(&activity)
            .join(&rfm)
            .merge()?;
        info!(
            "Merged {} roster members with {} columns",
            merged.len(),
            merged.frame.columns().len()
        );

        let schema_report = self.check_schema(&merged.frame)?;

        // Stage 2: touchpoint filter
        let filtered = filter_members_with_touchpoints(&merged);

        // Stages 3-5
        let imputed = self.imputer.impute(&filtered, &self.schema)?;
        let normalized = Normalizer::normalize(&imputed, &self.schema)?;
        let scored = Scorer::score(&normalized, &self.config.scoring())?;

        // Stage 6
        let evaluation = inputs
            .validation
            .as_ref()
            .map(|validation| Evaluator::evaluate(&scored, validation, targets))
            .transpose()?;

        // Stage 7
        let distribution = DistributionMonitor::run(&Checkpoints {
            total_members: roster.len(),
            merged: &merged.frame,
            filtered: &filtered,
            normalized: &normalized,
            scored: &scored,
        });

        let summary = RunSummary {
            total_members: roster.len(),
            members_with_touchpoints: filtered.len(),
            predicted_members: scored.predicted_count(),
        };
        info!(
            "Analysed {} members, {} with a predicted vertical",
            summary.members_with_touchpoints, summary.predicted_members
        );

        Ok(PipelineOutput {
            schema_report,
            merged: merged.frame,
            normalized,
            scored,
            evaluation,
            distribution,
            summary,
        })
    }

    /// Score an already-merged frame (no roster, no touchpoint filter)
    pub fn score_frame(&self, features: &FeatureFrame) -> Result<ScoredFrame, AffinityError> {
        self.check_schema(features)?;
        let imputed = self.imputer.impute(features, &self.schema)?;
        let normalized = Normalizer::normalize(&imputed, &self.schema)?;
        Scorer::score(&normalized, &self.config.scoring())
    }

    /// Score a normalized frame under a different weight regime
    pub fn rescore(
        &self,
        normalized: &FeatureFrame,
        scoring: &ScoringConfig,
    ) -> Result<ScoredFrame, AffinityError> {
        Scorer::score(normalized, scoring)
    }
}
