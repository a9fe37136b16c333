//! Polarity-partitioned imputation
//!
//! Recency-type feature columns fill with the recency sentinel, positive-type
//! columns with the positive fill. Columns the schema does not classify pass
//! through untouched.

use crate::config::{DEFAULT_POSITIVE_FILL, DEFAULT_RECENCY_SENTINEL};
use crate::error::AffinityError;
use crate::schema::FeatureSchema;
use crate::types::FeatureFrame;
use log::debug;

/// Fills missing feature values per polarity partition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Imputer {
    recency_sentinel: f64,
    positive_fill: f64,
}

impl Default for Imputer {
    fn default() -> Self {
        Self::new(DEFAULT_RECENCY_SENTINEL, DEFAULT_POSITIVE_FILL)
    }
}

impl Imputer {
    pub fn new(recency_sentinel: f64, positive_fill: f64) -> Self {
        Self {
            recency_sentinel,
            positive_fill,
        }
    }

    pub fn impute(
        &self,
        frame: &FeatureFrame,
        schema: &FeatureSchema,
    ) -> Result<FeatureFrame, AffinityError> {
        let (recency, positive) = schema.partition(frame);
        debug!(
            "Imputing {} recency-type and {} positive-type columns",
            recency.len(),
            positive.len()
        );

        let columns = frame
            .columns()
            .iter()
            .map(|column| {
                if recency.contains(&column.name()) {
                    column.filled(self.recency_sentinel)
                } else if positive.contains(&column.name()) {
                    column.filled(self.positive_fill)
                } else {
                    column.clone()
                }
            })
            .collect();

        FeatureFrame::new(frame.member_ids().to_vec(), columns)
    }
}
