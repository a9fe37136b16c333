//! Dimension keys, polarity classes and vertical names

use crate::error::AffinityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel label for members without any affinity signal
pub const NO_INTEREST: &str = "No_Interest";

/// Prefix of every per-vertical affinity score column
pub const AFFINITY_COLUMN_PREFIX: &str = "Affinity_Score_";

/// Direction in which a raw feature value expresses affinity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Smaller raw value is better (days since last purchase or view)
    Recency,
    /// Larger raw value is better (counts, revenue)
    Positive,
}

/// Behavioral domain a dimension is extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDomain {
    Purchase,
    Digital,
    Community,
}

/// Abstract feature dimension, shared across all verticals
///
/// The concrete column for a vertical is `<key>_<vertical>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    /// Days since the last purchase in the vertical
    Recency,
    /// Purchase count over the last 4 months
    Frequency4m,
    /// Purchase count over the last year
    Frequency1y,
    /// Revenue over the last 4 months
    Monetary4m,
    /// Revenue over the last year
    Monetary1y,
    /// Product detail page views over the digital window
    PdpViewCount,
    /// Days since the last product detail page view
    PdpViewDaysSince,
    /// Add-to-cart events over the digital window
    AtcCount,
    /// Days since the last add-to-cart event
    AtcDaysSince,
    /// Community activities attended in the vertical's category
    ActivityCount,
    /// Category navigation clicks over the digital window
    NaviCount,
}

impl Dimension {
    /// Every dimension, in weight-template order
    pub const ALL: [Dimension; 11] = [
        Dimension::Recency,
        Dimension::Frequency4m,
        Dimension::Frequency1y,
        Dimension::Monetary4m,
        Dimension::Monetary1y,
        Dimension::PdpViewCount,
        Dimension::PdpViewDaysSince,
        Dimension::AtcCount,
        Dimension::AtcDaysSince,
        Dimension::ActivityCount,
        Dimension::NaviCount,
    ];

    /// Column-name key of the dimension
    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Recency => "R",
            Dimension::Frequency4m => "F_4m",
            Dimension::Frequency1y => "F_1y",
            Dimension::Monetary4m => "M_4m",
            Dimension::Monetary1y => "M_1y",
            Dimension::PdpViewCount => "PDP_View_6M_Count",
            Dimension::PdpViewDaysSince => "PDP_View_Days_Since_Last",
            Dimension::AtcCount => "ATC_6M_Count",
            Dimension::AtcDaysSince => "ATC_Days_Since_Last",
            Dimension::ActivityCount => "activity_count",
            Dimension::NaviCount => "navi_6M_count",
        }
    }

    /// Look up a dimension by its column-name key
    pub fn from_key(key: &str) -> Option<Dimension> {
        Dimension::ALL.into_iter().find(|d| d.key() == key)
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            Dimension::Recency | Dimension::PdpViewDaysSince | Dimension::AtcDaysSince => {
                Polarity::Recency
            }
            Dimension::Frequency4m
            | Dimension::Frequency1y
            | Dimension::Monetary4m
            | Dimension::Monetary1y
            | Dimension::PdpViewCount
            | Dimension::AtcCount
            | Dimension::ActivityCount
            | Dimension::NaviCount => Polarity::Positive,
        }
    }

    pub fn domain(&self) -> SignalDomain {
        match self {
            Dimension::Recency
            | Dimension::Frequency4m
            | Dimension::Frequency1y
            | Dimension::Monetary4m
            | Dimension::Monetary1y => SignalDomain::Purchase,
            Dimension::PdpViewCount
            | Dimension::PdpViewDaysSince
            | Dimension::AtcCount
            | Dimension::AtcDaysSince
            | Dimension::NaviCount => SignalDomain::Digital,
            Dimension::ActivityCount => SignalDomain::Community,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Validated product vertical name (e.g. `running`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vertical(String);

impl Vertical {
    /// Create a vertical, rejecting empty names, non-identifier characters
    /// and the `No_Interest` sentinel
    pub fn new(name: impl Into<String>) -> Result<Self, AffinityError> {
        let name = name.into();
        let well_formed = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !well_formed || name == NO_INTEREST {
            return Err(AffinityError::InvalidVertical(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the affinity score column for this vertical
    pub fn affinity_column(&self) -> String {
        format!("{AFFINITY_COLUMN_PREFIX}{}", self.0)
    }
}

impl TryFrom<String> for Vertical {
    type Error = AffinityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Vertical::new(value)
    }
}

impl From<Vertical> for String {
    fn from(vertical: Vertical) -> Self {
        vertical.0
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed reference to one concrete feature column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub dimension: Dimension,
    pub vertical: Vertical,
}

impl ColumnKey {
    pub fn new(dimension: Dimension, vertical: Vertical) -> Self {
        Self {
            dimension,
            vertical,
        }
    }

    /// Raw feature column name, `<dimension>_<vertical>`
    pub fn column_name(&self) -> String {
        format!("{}_{}", self.dimension.key(), self.vertical)
    }

    /// Normalized score column name, `<dimension>_<vertical>_score`
    pub fn score_column_name(&self) -> String {
        format!("{}_{}_score", self.dimension.key(), self.vertical)
    }

    pub fn polarity(&self) -> Polarity {
        self.dimension.polarity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_dimension_has_one_polarity() {
        let recency: Vec<_> = Dimension::ALL
            .iter()
            .filter(|d| d.polarity() == Polarity::Recency)
            .map(|d| d.key())
            .collect();
        assert_eq!(
            recency,
            vec!["R", "PDP_View_Days_Since_Last", "ATC_Days_Since_Last"]
        );

        let positive = Dimension::ALL
            .iter()
            .filter(|d| d.polarity() == Polarity::Positive)
            .count();
        assert_eq!(recency.len() + positive, Dimension::ALL.len());
    }

    #[test]
    fn test_dimension_key_roundtrip() {
        for dimension in Dimension::ALL {
            assert_eq!(Dimension::from_key(dimension.key()), Some(dimension));
        }
        assert_eq!(Dimension::from_key("r"), None);
    }

    #[test]
    fn test_column_names() {
        let key = ColumnKey::new(Dimension::Frequency4m, Vertical::new("tennis").unwrap());
        assert_eq!(key.column_name(), "F_4m_tennis");
        assert_eq!(key.score_column_name(), "F_4m_tennis_score");
        assert_eq!(key.vertical.affinity_column(), "Affinity_Score_tennis");
    }

    #[test]
    fn test_vertical_rejects_bad_names() {
        assert!(Vertical::new("running").is_ok());
        assert!(Vertical::new("").is_err());
        assert!(Vertical::new("all day").is_err());
        assert!(Vertical::new(NO_INTEREST).is_err());
    }

    #[test]
    fn test_vertical_deserialize_validates() {
        let ok: Vertical = serde_json::from_str("\"outdoor\"").unwrap();
        assert_eq!(ok.as_str(), "outdoor");
        assert!(serde_json::from_str::<Vertical>("\"No_Interest\"").is_err());
    }
}
