//! Distribution monitoring
//!
//! Summaries of each pipeline checkpoint for drift detection. Nothing here
//! affects scoring, and a statistic that cannot be computed is reported as
//! absent with a warning instead of failing the run.

use crate::error::AffinityError;
use crate::types::{FeatureFrame, ScoredFrame};
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// `describe`-style statistics of one column over its non-null values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation, absent below two values
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Count and share of one prediction label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionShare {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

/// Diagnostics collected across pipeline checkpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub total_members: usize,
    pub members_with_touchpoints: usize,
    pub touchpoint_pct: f64,
    /// Number of members per count of non-null feature columns
    pub valid_feature_counts: BTreeMap<usize, usize>,
    pub merged_stats: Option<Vec<ColumnStats>>,
    pub normalized_stats: Option<Vec<ColumnStats>>,
    pub predictions: Vec<PredictionShare>,
}

/// Frames observed at each pipeline checkpoint
#[derive(Debug, Clone, Copy)]
pub struct Checkpoints<'a> {
    /// Roster size after exclusions
    pub total_members: usize,
    /// Merged frame before the touchpoint filter
    pub merged: &'a FeatureFrame,
    pub filtered: &'a FeatureFrame,
    pub normalized: &'a FeatureFrame,
    pub scored: &'a ScoredFrame,
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Per-column statistics, failing on a frame without rows or columns
pub fn describe(frame: &FeatureFrame) -> Result<Vec<ColumnStats>, AffinityError> {
    if frame.columns().is_empty() {
        return Err(AffinityError::EmptyFrame("no columns".to_string()));
    }
    if frame.is_empty() {
        return Err(AffinityError::EmptyFrame("no rows".to_string()));
    }

    let stats = frame
        .columns()
        .iter()
        .map(|column| {
            let mut values: Vec<f64> = column.non_null().filter(|v| !v.is_nan()).collect();
            values.sort_by(f64::total_cmp);
            let count = values.len();

            let mean = (count > 0).then(|| values.iter().sum::<f64>() / count as f64);
            let std = mean.filter(|_| count > 1).map(|m| {
                let squares = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
                let variance = squares / (count - 1) as f64;
                variance.sqrt()
            });

            ColumnStats {
                column: column.name().to_string(),
                count,
                mean,
                std,
                min: values.first().copied(),
                p25: quantile(&values, 0.25),
                p50: quantile(&values, 0.5),
                p75: quantile(&values, 0.75),
                max: values.last().copied(),
            }
        })
        .collect();
    Ok(stats)
}

/// Count of non-null feature columns per row, as a histogram
pub fn valid_feature_counts(frame: &FeatureFrame) -> BTreeMap<usize, usize> {
    let mut histogram = BTreeMap::new();
    for count in frame.non_null_counts() {
        *histogram.entry(count).or_insert(0) += 1;
    }
    histogram
}

/// Prediction labels by descending count
pub fn prediction_breakdown(scored: &ScoredFrame) -> Vec<PredictionShare> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for prediction in &scored.predictions {
        *counts.entry(prediction.as_str()).or_insert(0) += 1;
    }

    let total = scored.predictions.len();
    let mut shares: Vec<PredictionShare> = counts
        .into_iter()
        .map(|(label, count)| PredictionShare {
            label: label.to_string(),
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    shares
}

pub struct DistributionMonitor;

impl DistributionMonitor {
    pub fn run(checkpoints: &Checkpoints<'_>) -> DistributionReport {
        let members_with_touchpoints = checkpoints.filtered.len();
        let touchpoint_pct = if checkpoints.total_members > 0 {
            members_with_touchpoints as f64 / checkpoints.total_members as f64 * 100.0
        } else {
            0.0
        };

        DistributionReport {
            total_members: checkpoints.total_members,
            members_with_touchpoints,
            touchpoint_pct,
            valid_feature_counts: valid_feature_counts(checkpoints.merged),
            merged_stats: Self::describe_or_warn("merged", checkpoints.merged),
            normalized_stats: Self::describe_or_warn("normalized", checkpoints.normalized),
            predictions: prediction_breakdown(checkpoints.scored),
        }
    }

    fn describe_or_warn(stage: &str, frame: &FeatureFrame) -> Option<Vec<ColumnStats>> {
        match describe(frame) {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!("Unable to describe {stage} frame: {err}");
                None
            }
        }
    }

    /// Write the report through the log facade
    pub fn log_report(report: &DistributionReport) {
        info!("Total members (post exclusion): {}", report.total_members);
        info!(
            "Members with touchpoints: {} ({:.2}%)",
            report.members_with_touchpoints, report.touchpoint_pct
        );
        for (columns, members) in &report.valid_feature_counts {
            info!("  {columns} non-null feature columns: {members} members");
        }
        let stages = [
            ("merged", &report.merged_stats),
            ("normalized", &report.normalized_stats),
        ];
        for (stage, stats) in stages {
            let Some(stats) = stats else { continue };
            for s in stats {
                info!(
                    "  [{stage}] {}: count={} mean={} std={} min={} 50%={} max={}",
                    s.column,
                    s.count,
                    fmt_stat(s.mean),
                    fmt_stat(s.std),
                    fmt_stat(s.min),
                    fmt_stat(s.p50),
                    fmt_stat(s.max)
                );
            }
        }
        for share in &report.predictions {
            info!("  {}: {} ({:.2}%)", share.label, share.count, share.percentage);
        }
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), |v| format!("{v:.4}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Vertical;
    use crate::types::{Column, MemberId, Prediction};
    use pretty_assertions::assert_eq;

    fn make_test_frame(columns: Vec<Column>) -> FeatureFrame {
        let n = columns.first().map_or(0, Column::len);
        let ids = (0..n).map(|i| MemberId::new(format!("m{i}"))).collect();
        FeatureFrame::new(ids, columns).unwrap()
    }

    #[test]
    fn test_describe_statistics() {
        let frame = make_test_frame(vec![Column::new(
            "F_4m_running",
            vec![Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)],
        )]);
        let stats = describe(&frame).unwrap().remove(0);

        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, Some(2.5));
        assert!((stats.std.unwrap() - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.p25, Some(1.75));
        assert_eq!(stats.p50, Some(2.5));
        assert_eq!(stats.p75, Some(3.25));
        assert_eq!(stats.max, Some(4.0));
    }

    #[test]
    fn test_describe_all_null_and_single_value() {
        let frame = make_test_frame(vec![
            Column::new("a", vec![None, None]),
            Column::new("b", vec![Some(7.0), None]),
        ]);
        let stats = describe(&frame).unwrap();
        assert_eq!(stats[0].count, 0);
        assert_eq!(stats[0].mean, None);
        assert_eq!(stats[1].std, None);
        assert_eq!(stats[1].p75, Some(7.0));
    }

    #[test]
    fn test_empty_frame_degrades_to_none() {
        let empty = FeatureFrame::from_members(Vec::new()).unwrap();
        assert!(describe(&empty).is_err());

        let scored = ScoredFrame {
            frame: empty.clone(),
            verticals: Vec::new(),
            predictions: Vec::new(),
        };
        let report = DistributionMonitor::run(&Checkpoints {
            total_members: 0,
            merged: &empty,
            filtered: &empty,
            normalized: &empty,
            scored: &scored,
        });
        assert_eq!(report.touchpoint_pct, 0.0);
        assert_eq!(report.merged_stats, None);
        assert_eq!(report.normalized_stats, None);
        assert!(report.predictions.is_empty());
    }

    #[test]
    fn test_report_counts() {
        let merged = make_test_frame(vec![
            Column::new("R_running", vec![Some(1.0), None, None, Some(2.0)]),
            Column::new("F_4m_running", vec![Some(1.0), None, Some(5.0), None]),
        ]);
        let filtered = merged.select_rows(&[0, 2, 3]);
        let running = Prediction::Vertical(Vertical::new("running").unwrap());
        let scored = ScoredFrame {
            frame: filtered.clone(),
            verticals: vec![Vertical::new("running").unwrap()],
            predictions: vec![running.clone(), Prediction::NoInterest, running],
        };

        let report = DistributionMonitor::run(&Checkpoints {
            total_members: 4,
            merged: &merged,
            filtered: &filtered,
            normalized: &filtered,
            scored: &scored,
        });

        assert_eq!(report.members_with_touchpoints, 3);
        assert_eq!(report.touchpoint_pct, 75.0);
        assert_eq!(
            report.valid_feature_counts,
            BTreeMap::from([(0, 1), (1, 2), (2, 1)])
        );
        assert_eq!(report.predictions[0].label, "running");
        assert_eq!(report.predictions[0].count, 2);
        assert_eq!(report.predictions[1].label, "No_Interest");
        assert!(report.merged_stats.is_some());
    }
}
