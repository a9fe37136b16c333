//! Engine configuration
//!
//! Weights, target verticals and sentinels are plain values handed to the
//! pipeline at construction time. Nothing here is process-wide state, so the
//! same normalized cohort can be scored under several weight regimes.

use crate::error::AffinityError;
use crate::schema::{Dimension, FeatureSchema, Vertical};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Missing recency values mean "never happened"
pub const DEFAULT_RECENCY_SENTINEL: f64 = 9999.0;

/// Missing positive-type values mean "no activity"
pub const DEFAULT_POSITIVE_FILL: f64 = 0.0;

/// Abstract weight per dimension, shared by every vertical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct WeightTemplate {
    weights: BTreeMap<Dimension, f64>,
}

impl WeightTemplate {
    pub fn new(weights: BTreeMap<Dimension, f64>) -> Self {
        Self { weights }
    }

    /// Set one dimension's weight, consuming `self` for chaining
    pub fn with_weight(mut self, dimension: Dimension, weight: f64) -> Self {
        self.weights.insert(dimension, weight);
        self
    }

    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        self.weights.get(&dimension).copied()
    }

    /// Dimensions and weights in dimension order
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        self.weights.iter().map(|(d, w)| (*d, *w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Reject negative or non-finite weights
    pub fn validate(&self) -> Result<(), AffinityError> {
        for (dimension, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(AffinityError::InvalidConfig(format!(
                    "weight for {dimension} must be a non-negative finite number, got {weight}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for WeightTemplate {
    fn default() -> Self {
        Self::new(BTreeMap::new())
            .with_weight(Dimension::Recency, 0.1)
            .with_weight(Dimension::Frequency4m, 0.2)
            .with_weight(Dimension::Frequency1y, 0.1)
            .with_weight(Dimension::Monetary4m, 0.2)
            .with_weight(Dimension::Monetary1y, 0.15)
            .with_weight(Dimension::PdpViewCount, 0.05)
            .with_weight(Dimension::PdpViewDaysSince, 0.05)
            .with_weight(Dimension::AtcCount, 0.05)
            .with_weight(Dimension::AtcDaysSince, 0.05)
            .with_weight(Dimension::ActivityCount, 0.0)
            .with_weight(Dimension::NaviCount, 0.05)
    }
}

impl TryFrom<BTreeMap<String, f64>> for WeightTemplate {
    type Error = AffinityError;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let mut weights = BTreeMap::new();
        for (key, weight) in raw {
            let dimension = Dimension::from_key(&key).ok_or_else(|| {
                AffinityError::InvalidConfig(format!("unknown weight dimension {key:?}"))
            })?;
            weights.insert(dimension, weight);
        }
        Ok(Self { weights })
    }
}

impl From<WeightTemplate> for BTreeMap<String, f64> {
    fn from(template: WeightTemplate) -> Self {
        template
            .weights
            .into_iter()
            .map(|(d, w)| (d.key().to_string(), w))
            .collect()
    }
}

/// Rule for choosing between verticals that share the maximum score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First vertical in configured order wins
    #[default]
    ConfigOrder,
    /// Alphabetically smallest vertical name wins
    Alphabetical,
}

/// Inputs the scorer and assigner need, passed at call time
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub verticals: Vec<Vertical>,
    pub weights: WeightTemplate,
    pub tie_break: TieBreak,
}

impl ScoringConfig {
    pub fn new(verticals: Vec<Vertical>, weights: WeightTemplate) -> Self {
        Self {
            verticals,
            weights,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Reject an empty or repeated vertical list and invalid weights
    pub fn validate(&self) -> Result<(), AffinityError> {
        validate_verticals("verticals", &self.verticals)?;
        self.weights.validate()
    }
}

fn validate_verticals(field: &str, verticals: &[Vertical]) -> Result<(), AffinityError> {
    if verticals.is_empty() {
        return Err(AffinityError::InvalidConfig(format!("{field} must not be empty")));
    }
    for (idx, vertical) in verticals.iter().enumerate() {
        if verticals[..idx].contains(vertical) {
            return Err(AffinityError::InvalidConfig(format!(
                "vertical {vertical} is listed twice in {field}"
            )));
        }
    }
    Ok(())
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffinityConfig {
    /// Ordered verticals that are scored, assigned and evaluated
    pub target_verticals: Vec<Vertical>,
    /// Verticals whose feature columns are shaped, imputed and normalized
    ///
    /// Must contain every target vertical.
    pub feature_verticals: Vec<Vertical>,
    pub weights: WeightTemplate,
    pub recency_sentinel: f64,
    pub positive_fill: f64,
    pub tie_break: TieBreak,
    /// Fail instead of warning when schema columns are absent
    pub strict_schema: bool,
    /// Identifier column of the roster and most feature frames
    pub member_id_column: String,
    /// Identifier column of the digital-behavior frame
    pub digital_join_column: String,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        let verticals: Vec<Vertical> = ["tennis", "running", "outdoor", "training", "allday"]
            .into_iter()
            .filter_map(|name| Vertical::new(name).ok())
            .collect();
        Self {
            target_verticals: verticals.clone(),
            feature_verticals: verticals,
            weights: WeightTemplate::default(),
            recency_sentinel: DEFAULT_RECENCY_SENTINEL,
            positive_fill: DEFAULT_POSITIVE_FILL,
            tie_break: TieBreak::default(),
            strict_schema: false,
            member_id_column: "member_uid".to_string(),
            digital_join_column: "account_id".to_string(),
        }
    }
}

impl AffinityConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, AffinityError> {
        let config: AffinityConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(source: &str) -> Result<Self, AffinityError> {
        let config: AffinityConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn from_path(path: &Path) -> Result<Self, AffinityError> {
        let source = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&source),
            Some("json") => Self::from_json_str(&source),
            _ => Err(AffinityError::InvalidConfig(format!(
                "unsupported config file extension: {}",
                path.display()
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), AffinityError> {
        self.scoring().validate()?;
        validate_verticals("feature_verticals", &self.feature_verticals)?;
        if let Some(missing) = self
            .target_verticals
            .iter()
            .find(|v| !self.feature_verticals.contains(v))
        {
            return Err(AffinityError::InvalidConfig(format!(
                "target vertical {missing} is not listed in feature_verticals"
            )));
        }
        if !self.recency_sentinel.is_finite() || !self.positive_fill.is_finite() {
            return Err(AffinityError::InvalidConfig(
                "imputation sentinels must be finite".to_string(),
            ));
        }
        if self.member_id_column.is_empty() || self.digital_join_column.is_empty() {
            return Err(AffinityError::InvalidConfig(
                "identifier column names must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scoring(&self) -> ScoringConfig {
        ScoringConfig::new(self.target_verticals.clone(), self.weights.clone())
            .with_tie_break(self.tie_break)
    }

    /// Feature schema covering every dimension for the feature verticals
    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::for_verticals(&self.feature_verticals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = WeightTemplate::default();
        assert_eq!(weights.len(), Dimension::ALL.len());
        assert_eq!(weights.get(Dimension::Frequency4m), Some(0.2));
        assert_eq!(weights.get(Dimension::ActivityCount), Some(0.0));
        assert!((weights.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AffinityConfig::default();
        config.validate().unwrap();
        let names: Vec<&str> = config.target_verticals.iter().map(|v| v.as_str()).collect();
        assert_eq!(names, vec!["tennis", "running", "outdoor", "training", "allday"]);
        assert_eq!(config.feature_verticals, config.target_verticals);
    }

    #[test]
    fn test_targets_must_be_feature_verticals() {
        let subset = AffinityConfig::from_toml_str("target_verticals = [\"running\"]\n").unwrap();
        assert_eq!(subset.feature_verticals.len(), 5);
        assert_eq!(subset.schema().verticals().len(), 5);

        let outside = AffinityConfig::from_toml_str(
            "target_verticals = [\"golf\"]\nfeature_verticals = [\"running\"]\n",
        );
        assert!(matches!(outside, Err(AffinityError::InvalidConfig(_))));
    }

    #[test]
    fn test_scoring_config_validation() {
        let running = || vec![Vertical::new("running").unwrap()];
        let negative = ScoringConfig::new(
            running(),
            WeightTemplate::new(BTreeMap::new()).with_weight(Dimension::Recency, -1.0),
        );
        assert!(matches!(negative.validate(), Err(AffinityError::InvalidConfig(_))));

        let nan = ScoringConfig::new(
            running(),
            WeightTemplate::new(BTreeMap::new()).with_weight(Dimension::Recency, f64::NAN),
        );
        assert!(matches!(nan.validate(), Err(AffinityError::InvalidConfig(_))));

        let empty = ScoringConfig::new(Vec::new(), WeightTemplate::default());
        assert!(matches!(empty.validate(), Err(AffinityError::InvalidConfig(_))));

        let mut repeated = running();
        repeated.extend(running());
        assert!(ScoringConfig::new(repeated, WeightTemplate::default()).validate().is_err());

        assert!(ScoringConfig::new(running(), WeightTemplate::default()).validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = AffinityConfig::from_toml_str(
            r#"
            target_verticals = ["running", "tennis"]
            tie_break = "alphabetical"

            [weights]
            R = 0.5
            F_4m = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.target_verticals.len(), 2);
        assert_eq!(config.tie_break, TieBreak::Alphabetical);
        assert_eq!(config.weights.get(Dimension::Recency), Some(0.5));
        assert_eq!(config.weights.get(Dimension::Monetary4m), None);
        assert_eq!(config.recency_sentinel, DEFAULT_RECENCY_SENTINEL);
    }

    #[test]
    fn test_from_json_roundtrip() {
        let config = AffinityConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"PDP_View_6M_Count\":0.05"));
        let parsed = AffinityConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.target_verticals, config.target_verticals);
        assert_eq!(parsed.tie_break, config.tie_break);
        for (dimension, weight) in config.weights.iter() {
            let parsed_weight = parsed.weights.get(dimension).unwrap();
            assert!((parsed_weight - weight).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let unknown = AffinityConfig::from_toml_str("[weights]\nQ = 1.0\n");
        assert!(unknown.is_err());

        let negative = AffinityConfig::from_toml_str("[weights]\nR = -0.1\n");
        assert!(matches!(negative, Err(AffinityError::InvalidConfig(_))));

        let duplicate =
            AffinityConfig::from_toml_str("target_verticals = [\"running\", \"running\"]\n");
        assert!(matches!(duplicate, Err(AffinityError::InvalidConfig(_))));

        let empty = AffinityConfig::from_toml_str("target_verticals = []\n");
        assert!(matches!(empty, Err(AffinityError::InvalidConfig(_))));

        let sentinel = AffinityConfig::from_json_str("{\"target_verticals\": [\"No_Interest\"]}");
        assert!(sentinel.is_err());
    }
}
