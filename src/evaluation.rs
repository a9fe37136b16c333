//! Backtest evaluation against observed purchases
//!
//! For each target vertical, members predicted into that vertical are
//! compared with everyone else on conversion rate, mean purchase count and
//! mean sales share over the validation window.

use crate::error::AffinityError;
use crate::schema::Vertical;
use crate::types::{Column, ComparisonResult, FeatureFrame, Prediction, ScoredFrame};
use log::{info, warn};
use serde::Serialize;
use std::cmp::Ordering;

/// Purchase count column for a vertical in the validation frame
pub fn purchase_column(vertical: &Vertical) -> String {
    format!("{vertical}_purchase")
}

/// Sales share column for a vertical in the validation frame
pub fn sales_share_column(vertical: &Vertical) -> String {
    format!("{vertical}_sales_share")
}

/// Ratio metric used to order evaluation rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioMetric {
    Cvr,
    Purchase,
    SalesShare,
}

impl RatioMetric {
    fn of(&self, row: &ComparisonResult) -> Option<f64> {
        match self {
            RatioMetric::Cvr => row.cvr_ratio,
            RatioMetric::Purchase => row.purchase_ratio,
            RatioMetric::SalesShare => row.sales_share_ratio,
        }
    }
}

/// One comparison row per evaluated vertical, in target order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvaluationTable {
    pub rows: Vec<ComparisonResult>,
}

impl EvaluationTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, vertical: &Vertical) -> Option<&ComparisonResult> {
        self.rows.iter().find(|r| &r.vertical == vertical)
    }

    /// Rows ordered by a ratio, descending, undefined ratios last
    pub fn sorted_by(&self, metric: RatioMetric) -> Vec<&ComparisonResult> {
        let mut rows: Vec<&ComparisonResult> = self.rows.iter().collect();
        rows.sort_by(|a, b| match (metric.of(a), metric.of(b)) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        rows
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn conversion_rate(purchases: &[f64]) -> f64 {
    if purchases.is_empty() {
        0.0
    } else {
        purchases.iter().filter(|p| **p > 0.0).count() as f64 / purchases.len() as f64
    }
}

/// Compares predicted and not-predicted groups per vertical
pub struct Evaluator;

impl Evaluator {
    /// Left-join validation columns onto the scored members, filling missing with 0
    pub fn join_validation(
        scored: &ScoredFrame,
        validation: &FeatureFrame,
    ) -> Result<FeatureFrame, AffinityError> {
        let index = validation.row_index();
        let rows: Vec<Option<usize>> = scored
            .member_ids()
            .iter()
            .map(|id| index.get(id).copied())
            .collect();
        let unmatched = rows.iter().filter(|r| r.is_none()).count();
        if unmatched > 0 {
            info!("{unmatched} scored members have no validation record, treating as no purchases");
        }

        let mut joined = FeatureFrame::from_members(scored.member_ids().to_vec())?;
        for column in validation.columns() {
            let values = rows
                .iter()
                .map(|row| Some(row.and_then(|r| column.values()[r]).unwrap_or(0.0)))
                .collect();
            joined.push_column(Column::new(column.name(), values))?;
        }
        Ok(joined)
    }

    /// Comparison for one vertical, `None` when validation columns are absent
    pub fn compare(
        predictions: &[Prediction],
        joined: &FeatureFrame,
        vertical: &Vertical,
    ) -> Option<ComparisonResult> {
        let purchase_name = purchase_column(vertical);
        let share_name = sales_share_column(vertical);
        let (Some(purchase), Some(share)) =
            (joined.column(&purchase_name), joined.column(&share_name))
        else {
            warn!("Validation data lacks {purchase_name} or {share_name}, skipping {vertical}");
            return None;
        };

        let mut predicted = (Vec::new(), Vec::new());
        let mut rest = (Vec::new(), Vec::new());
        for ((prediction, p), s) in predictions.iter().zip(purchase.values()).zip(share.values()) {
            let group = if prediction.is_vertical(vertical) {
                &mut predicted
            } else {
                &mut rest
            };
            group.0.push(p.unwrap_or(0.0));
            group.1.push(s.unwrap_or(0.0));
        }

        let cvr_predicted = conversion_rate(&predicted.0);
        let cvr_not_predicted = conversion_rate(&rest.0);
        let avg_purchase_predicted = mean(&predicted.0);
        let avg_purchase_not_predicted = mean(&rest.0);
        let avg_sales_share_predicted = mean(&predicted.1);
        let avg_sales_share_not_predicted = mean(&rest.1);

        Some(ComparisonResult {
            vertical: vertical.clone(),
            predicted_group_size: predicted.0.len(),
            not_predicted_group_size: rest.0.len(),
            cvr_predicted,
            cvr_not_predicted,
            cvr_ratio: ratio(cvr_predicted, cvr_not_predicted),
            avg_purchase_predicted,
            avg_purchase_not_predicted,
            purchase_ratio: ratio(avg_purchase_predicted, avg_purchase_not_predicted),
            avg_sales_share_predicted,
            avg_sales_share_not_predicted,
            sales_share_ratio: ratio(avg_sales_share_predicted, avg_sales_share_not_predicted),
        })
    }

    pub fn evaluate(
        scored: &ScoredFrame,
        validation: &FeatureFrame,
        verticals: &[Vertical],
    ) -> Result<EvaluationTable, AffinityError> {
        let joined = Self::join_validation(scored, validation)?;
        let rows = verticals
            .iter()
            .filter_map(|vertical| Self::compare(&scored.predictions, &joined, vertical))
            .collect();
        Ok(EvaluationTable { rows })
    }
}
