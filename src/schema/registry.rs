//! Versioned registry of feature columns
//!
//! The registry enumerates every `(dimension, vertical)` column the engine
//! recognizes. Stages consult it instead of scanning column names for
//! substrings, so a column is a feature only if the schema lists it.

use crate::schema::dimension::{ColumnKey, Dimension, Polarity, Vertical};
use crate::types::FeatureFrame;
use serde::Serialize;
use std::collections::HashMap;

/// Feature schema version identifier
pub const SCHEMA_VERSION: &str = "vertical_affinity.features.v1";

/// Explicit enumeration of feature columns and their polarity
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    verticals: Vec<Vertical>,
    dimensions: Vec<Dimension>,
    index: HashMap<String, ColumnKey>,
}

impl FeatureSchema {
    /// Build a schema covering the given dimensions for each vertical
    pub fn new(verticals: &[Vertical], dimensions: &[Dimension]) -> Self {
        let mut index = HashMap::new();
        for vertical in verticals {
            for dimension in dimensions {
                let key = ColumnKey::new(*dimension, vertical.clone());
                index.insert(key.column_name(), key);
            }
        }
        Self {
            verticals: verticals.to_vec(),
            dimensions: dimensions.to_vec(),
            index,
        }
    }

    /// Schema with every known dimension for the given verticals
    pub fn for_verticals(verticals: &[Vertical]) -> Self {
        Self::new(verticals, &Dimension::ALL)
    }

    pub fn version(&self) -> &'static str {
        SCHEMA_VERSION
    }

    pub fn verticals(&self) -> &[Vertical] {
        &self.verticals
    }

    /// Classify a raw column name, `None` when it is not a feature
    pub fn classify(&self, column: &str) -> Option<&ColumnKey> {
        self.index.get(column)
    }

    /// Typed lookup of the column for a dimension and vertical
    pub fn column(&self, dimension: Dimension, vertical: &Vertical) -> Option<&ColumnKey> {
        self.index
            .get(&format!("{}_{}", dimension.key(), vertical))
    }

    /// All schema columns in vertical-major, dimension-minor order
    pub fn columns(&self) -> Vec<ColumnKey> {
        self.verticals
            .iter()
            .flat_map(|v| {
                self.dimensions
                    .iter()
                    .map(move |d| ColumnKey::new(*d, v.clone()))
            })
            .collect()
    }

    /// Frame columns the schema classifies, split by polarity, in frame order
    pub fn partition<'a>(&self, frame: &'a FeatureFrame) -> (Vec<&'a str>, Vec<&'a str>) {
        let mut recency = Vec::new();
        let mut positive = Vec::new();
        for name in frame.column_names() {
            match self.classify(name).map(ColumnKey::polarity) {
                Some(Polarity::Recency) => recency.push(name),
                Some(Polarity::Positive) => positive.push(name),
                None => {}
            }
        }
        (recency, positive)
    }

    /// Compare a frame's columns against the schema
    pub fn validate(&self, frame: &FeatureFrame) -> SchemaReport {
        let missing = self
            .columns()
            .into_iter()
            .map(|key| key.column_name())
            .filter(|name| !frame.has_column(name))
            .collect();
        let unclassified = frame
            .column_names()
            .filter(|name| self.classify(name).is_none())
            .map(str::to_string)
            .collect();

        SchemaReport {
            schema_version: SCHEMA_VERSION.to_string(),
            missing,
            unclassified,
        }
    }
}

/// Result of validating a frame against the schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaReport {
    pub schema_version: String,
    /// Expected feature columns absent from the frame
    pub missing: Vec<String>,
    /// Frame columns outside the schema (left untouched by every stage)
    pub unclassified: Vec<String>,
}

impl SchemaReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}
