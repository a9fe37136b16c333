//! Percentile-rank normalization
//!
//! This module converts each schema feature column into a `[0, 1]` score.
//! - Fractional ranking with average rank for ties
//! - Inversion for recency-type columns
//! - Nulls in the result filled with 0
//!
//! The reference population is the frame being normalized, so scores are
//! only comparable within one run.

use crate::error::AffinityError;
use crate::schema::{FeatureSchema, Polarity};
use crate::types::{Column, FeatureFrame};
use log::debug;
use std::cmp::Ordering;

/// Fractional percentile rank of each value among the non-null values
///
/// Ranks are 1-based positions in ascending order; a tied run receives the
/// mean of its positions. The result is `rank / n` where `n` counts non-null
/// values, so it lies in `(0, 1]`. Null inputs stay null.
pub fn percentile_rank(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| v.filter(|x| !x.is_nan()).map(|x| (idx, x)))
        .collect();
    present.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let n = present.len() as f64;
    let mut ranks = vec![None; values.len()];
    let mut start = 0;
    while start < present.len() {
        let mut end = start + 1;
        while end < present.len()
            && present[end].1.partial_cmp(&present[start].1) == Some(Ordering::Equal)
        {
            end += 1;
        }
        // Positions start+1 ..= end share their mean
        let average = (start + 1 + end) as f64 / 2.0;
        for &(idx, _) in &present[start..end] {
            ranks[idx] = Some(average / n);
        }
        start = end;
    }
    ranks
}

/// Appends a `<column>_score` for every schema feature column
pub struct Normalizer;

impl Normalizer {
    pub fn normalize(
        frame: &FeatureFrame,
        schema: &FeatureSchema,
    ) -> Result<FeatureFrame, AffinityError> {
        let mut normalized = frame.clone();
        let mut scored = 0usize;

        for column in frame.columns() {
            let Some(key) = schema.classify(column.name()) else {
                continue;
            };

            let ranks = percentile_rank(column.values());
            let scores = ranks
                .into_iter()
                .map(|rank| {
                    let score = match key.polarity() {
                        Polarity::Recency => rank.map(|r| 1.0 - r),
                        Polarity::Positive => rank,
                    };
                    Some(score.unwrap_or(0.0))
                })
                .collect();

            normalized.push_column(Column::new(key.score_column_name(), scores))?;
            scored += 1;
        }

        debug!("Normalized {scored} feature columns over {} members", frame.len());
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Vertical;
    use crate::types::MemberId;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map_or(false, |a| (a - b).abs() < 1e-12)
    }

    fn make_test_frame(columns: Vec<Column>) -> FeatureFrame {
        let n = columns.first().map_or(0, Column::len);
        let ids = (0..n).map(|i| MemberId::new(format!("m{i}"))).collect();
        FeatureFrame::new(ids, columns).unwrap()
    }

    fn running_schema() -> FeatureSchema {
        FeatureSchema::for_verticals(&[Vertical::new("running").unwrap()])
    }

    #[test]
    fn test_percentile_rank_average_ties() {
        let ranks = percentile_rank(&[Some(3.0), Some(1.0), Some(3.0), Some(2.0)]);
        // Sorted: 1 (1), 2 (2), 3 3 (3.5 each)
        assert!(approx(ranks[0], 3.5 / 4.0));
        assert!(approx(ranks[1], 0.25));
        assert!(approx(ranks[2], 3.5 / 4.0));
        assert!(approx(ranks[3], 0.5));
    }

    #[test]
    fn test_percentile_rank_skips_nulls() {
        let ranks = percentile_rank(&[None, Some(5.0), Some(1.0)]);
        assert_eq!(ranks[0], None);
        assert!(approx(ranks[1], 1.0));
        assert!(approx(ranks[2], 0.5));

        assert!(percentile_rank(&[]).is_empty());
    }

    #[test]
    fn test_constant_column() {
        let ranks = percentile_rank(&[Some(7.0); 4]);
        // (n + 1) / 2n for n = 4
        assert!(ranks.iter().all(|r| approx(*r, 5.0 / 8.0)));
        assert!(approx(percentile_rank(&[Some(7.0)])[0], 1.0));
    }

    #[test]
    fn test_recency_inversion() {
        let frame = make_test_frame(vec![Column::dense("R_running", vec![10.0, 9999.0, 9999.0])]);
        let normalized = Normalizer::normalize(&frame, &running_schema()).unwrap();
        let scores = normalized.require("R_running_score").unwrap().values();

        // Ranks are 1/3, 5/6, 5/6; inverted to 2/3, 1/6, 1/6
        assert!(approx(scores[0], 2.0 / 3.0));
        assert!(approx(scores[1], 1.0 / 6.0));
        assert_eq!(scores[1], scores[2]);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_positive_direction_and_retained_columns() {
        let frame = make_test_frame(vec![
            Column::dense("M_4m_running", vec![0.0, 50.0, 200.0]),
            Column::dense("legacy_flag", vec![1.0, 1.0, 1.0]),
        ]);
        let normalized = Normalizer::normalize(&frame, &running_schema()).unwrap();

        assert!(normalized.has_column("M_4m_running"));
        assert!(normalized.has_column("legacy_flag"));
        assert!(!normalized.has_column("legacy_flag_score"));
        assert!(approx(normalized.value(2, "M_4m_running_score"), 1.0));
        assert!(approx(normalized.value(0, "M_4m_running_score"), 1.0 / 3.0));
    }

    #[test]
    fn test_null_scores_fill_zero() {
        let frame = make_test_frame(vec![
            Column::new("F_4m_running", vec![None, Some(2.0)]),
            Column::new("R_running", vec![None, Some(2.0)]),
        ]);
        let normalized = Normalizer::normalize(&frame, &running_schema()).unwrap();
        assert_eq!(normalized.value(0, "F_4m_running_score"), Some(0.0));
        assert_eq!(normalized.value(0, "R_running_score"), Some(0.0));
        // A single present recency value ranks 1 and inverts to 0
        assert_eq!(normalized.value(1, "R_running_score"), Some(0.0));
    }
}
