//! Weighted vertical scoring and assignment
//!
//! Each vertical's affinity is the weighted sum of its `_score` columns under
//! the shared weight template. Absent columns are skipped, so a vertical's
//! effective weight mass can be smaller than the template total; it is never
//! renormalized.

use crate::config::{ScoringConfig, TieBreak};
use crate::error::AffinityError;
use crate::schema::{ColumnKey, Vertical, AFFINITY_COLUMN_PREFIX};
use crate::types::{Column, FeatureFrame, Prediction, ScoredFrame, MAX_AFFINITY_COLUMN};
use log::{debug, info, warn};

/// Computes `Affinity_Score_<vertical>` columns
pub struct Scorer;

impl Scorer {
    /// Affinity scores for one vertical, one per row
    pub fn vertical_scores(
        frame: &FeatureFrame,
        vertical: &Vertical,
        config: &ScoringConfig,
    ) -> Vec<f64> {
        let mut scores = vec![0.0; frame.len()];
        let mut used = 0usize;

        for (dimension, weight) in config.weights.iter() {
            let key = ColumnKey::new(dimension, vertical.clone());
            let name = key.score_column_name();
            let Some(column) = frame.column(&name) else {
                warn!("Column {name} not found for vertical {vertical}, skipping");
                continue;
            };
            for (score, value) in scores.iter_mut().zip(column.values()) {
                *score += weight * value.unwrap_or(0.0);
            }
            used += 1;
        }

        debug!(
            "Scored vertical {vertical} from {used} of {} weighted dimensions",
            config.weights.len()
        );
        scores
    }

    /// Score every target vertical and assign predictions
    ///
    /// Affinity columns of verticals outside `config` are dropped, so a
    /// rescored table only carries the current regime's scores.
    pub fn score(
        normalized: &FeatureFrame,
        config: &ScoringConfig,
    ) -> Result<ScoredFrame, AffinityError> {
        config.validate()?;

        let current: Vec<String> = config.verticals.iter().map(Vertical::affinity_column).collect();
        let stale: Vec<&str> = normalized
            .column_names()
            .filter(|name| name.starts_with(AFFINITY_COLUMN_PREFIX))
            .filter(|name| !current.iter().any(|c| c == name))
            .collect();
        if !stale.is_empty() {
            debug!("Dropping stale affinity columns: {}", stale.join(", "));
        }
        let mut frame = normalized.without_columns(&stale);
        let mut per_vertical = Vec::with_capacity(config.verticals.len());

        for vertical in &config.verticals {
            let scores = Self::vertical_scores(normalized, vertical, config);
            frame.set_column(Column::dense(vertical.affinity_column(), scores.clone()))?;
            per_vertical.push(scores);
        }

        let (max_scores, predictions) =
            Assigner::new(config.tie_break).assign(&config.verticals, &per_vertical);
        frame.set_column(Column::dense(MAX_AFFINITY_COLUMN, max_scores))?;

        let scored = ScoredFrame {
            frame,
            verticals: config.verticals.clone(),
            predictions,
        };
        info!(
            "Assigned {} of {} members to a vertical",
            scored.predicted_count(),
            scored.len()
        );
        Ok(scored)
    }
}

/// Picks the maximum-scoring vertical per member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Assigner {
    tie_break: TieBreak,
}

impl Assigner {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// Returns the row-wise maximum and the prediction for each row
    ///
    /// `scores[i][row]` is the score of `verticals[i]`. A row whose maximum is
    /// exactly 0 is `No_Interest`.
    pub fn assign(
        &self,
        verticals: &[Vertical],
        scores: &[Vec<f64>],
    ) -> (Vec<f64>, Vec<Prediction>) {
        let rows = scores.first().map_or(0, Vec::len);
        let mut max_scores = Vec::with_capacity(rows);
        let mut predictions = Vec::with_capacity(rows);

        for row in 0..rows {
            let mut best: Option<(usize, f64)> = None;
            for (idx, column) in scores.iter().enumerate() {
                let value = column[row];
                best = match best {
                    None => Some((idx, value)),
                    Some((_, current)) if value > current => Some((idx, value)),
                    Some((current_idx, current))
                        if value == current && self.prefers(verticals, idx, current_idx) =>
                    {
                        Some((idx, value))
                    }
                    keep => keep,
                };
            }

            match best {
                Some((idx, max)) if max != 0.0 => {
                    max_scores.push(max);
                    predictions.push(Prediction::Vertical(verticals[idx].clone()));
                }
                Some((_, max)) => {
                    max_scores.push(max);
                    predictions.push(Prediction::NoInterest);
                }
                None => {
                    max_scores.push(0.0);
                    predictions.push(Prediction::NoInterest);
                }
            }
        }

        (max_scores, predictions)
    }

    /// Whether `candidate` beats `current` on an exact tie
    fn prefers(&self, verticals: &[Vertical], candidate: usize, current: usize) -> bool {
        match self.tie_break {
            TieBreak::ConfigOrder => false,
            TieBreak::Alphabetical => verticals[candidate].as_str() < verticals[current].as_str(),
        }
    }
}
