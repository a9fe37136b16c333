//! Property tests for the scoring laws

use proptest::prelude::*;
use std::collections::BTreeMap;
use vertical_affinity::imputer::Imputer;
use vertical_affinity::normalizer::{percentile_rank, Normalizer};
use vertical_affinity::scoring::Scorer;
use vertical_affinity::types::MAX_AFFINITY_COLUMN;
use vertical_affinity::{
    Column, Dimension, FeatureFrame, FeatureSchema, MemberId, Polarity, Prediction, ScoringConfig,
    Vertical, WeightTemplate,
};

fn verticals() -> Vec<Vertical> {
    vec![Vertical::new("running").unwrap(), Vertical::new("tennis").unwrap()]
}

fn cell() -> impl Strategy<Value = Option<f64>> {
    // Small integer grid so ties are frequent
    prop_oneof![1 => Just(None), 4 => (0u32..6).prop_map(|v| Some(f64::from(v)))]
}

/// Frame with the given rows over R, F_4m and M_4m of both verticals
fn frame_strategy() -> impl Strategy<Value = FeatureFrame> {
    (1usize..24).prop_flat_map(|rows| {
        prop::collection::vec(prop::collection::vec(cell(), rows), 6).prop_map(move |cols| {
            let names = [
                "R_running",
                "F_4m_running",
                "M_4m_running",
                "R_tennis",
                "F_4m_tennis",
                "M_4m_tennis",
            ];
            let ids = (0..rows).map(|i| MemberId::new(format!("m{i}"))).collect();
            let columns = names.iter().zip(cols).map(|(n, v)| Column::new(*n, v)).collect();
            FeatureFrame::new(ids, columns).unwrap()
        })
    })
}

fn weights() -> WeightTemplate {
    WeightTemplate::new(BTreeMap::new())
        .with_weight(Dimension::Recency, 0.1)
        .with_weight(Dimension::Frequency4m, 0.2)
        .with_weight(Dimension::Monetary4m, 0.2)
}

#[test]
fn test_polarity_partition_is_total() {
    let schema = FeatureSchema::for_verticals(&verticals());
    for key in schema.columns() {
        let expected = matches!(
            key.dimension,
            Dimension::Recency | Dimension::PdpViewDaysSince | Dimension::AtcDaysSince
        );
        assert_eq!(key.polarity() == Polarity::Recency, expected, "{}", key.column_name());
    }
}

proptest! {
    #[test]
    fn imputation_is_idempotent(frame in frame_strategy()) {
        let schema = FeatureSchema::for_verticals(&verticals());
        let imputer = Imputer::default();
        let once = imputer.impute(&frame, &schema).unwrap();
        let twice = imputer.impute(&once, &schema).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.columns().iter().all(|c| c.null_count() == 0));
    }

    #[test]
    fn scores_are_in_unit_range_and_tie_consistent(values in prop::collection::vec(cell(), 1..40)) {
        let ranks = percentile_rank(&values);
        for (i, a) in values.iter().enumerate() {
            if let Some(rank) = ranks[i] {
                prop_assert!(rank > 0.0 && rank <= 1.0);
            }
            for (j, b) in values.iter().enumerate() {
                if a.is_some() && a == b {
                    prop_assert_eq!(ranks[i], ranks[j]);
                }
            }
        }
    }

    #[test]
    fn normalized_scores_respect_polarity(frame in frame_strategy()) {
        let schema = FeatureSchema::for_verticals(&verticals());
        let imputed = Imputer::default().impute(&frame, &schema).unwrap();
        let normalized = Normalizer::normalize(&imputed, &schema).unwrap();

        let raw = imputed.require("R_running").unwrap().values();
        let scores = normalized.require("R_running_score").unwrap().values();
        for i in 0..raw.len() {
            let score = scores[i].unwrap();
            prop_assert!((0.0..=1.0).contains(&score));
            for j in 0..raw.len() {
                if raw[i] < raw[j] {
                    // Lower recency is better
                    prop_assert!(scores[i] > scores[j]);
                }
            }
        }
    }

    #[test]
    fn zero_floor_law(frame in frame_strategy()) {
        let schema = FeatureSchema::for_verticals(&verticals());
        let imputed = Imputer::default().impute(&frame, &schema).unwrap();
        let normalized = Normalizer::normalize(&imputed, &schema).unwrap();
        let config = ScoringConfig::new(verticals(), weights());
        let scored = Scorer::score(&normalized, &config).unwrap();

        let max = scored.frame.require(MAX_AFFINITY_COLUMN).unwrap().values();
        for (prediction, max) in scored.predictions.iter().zip(max) {
            prop_assert_eq!(*prediction == Prediction::NoInterest, *max == Some(0.0));
        }
    }

    #[test]
    fn absent_vertical_scores_zero(frame in frame_strategy()) {
        let schema = FeatureSchema::for_verticals(&verticals());
        let normalized = Normalizer::normalize(&frame, &schema).unwrap();
        let mut targets = verticals();
        targets.push(Vertical::new("outdoor").unwrap());

        let scored = Scorer::score(&normalized, &ScoringConfig::new(targets, weights())).unwrap();
        let outdoor = scored.affinity(&Vertical::new("outdoor").unwrap()).unwrap();
        prop_assert!(outdoor.values().iter().all(|v| *v == Some(0.0)));
    }
}
