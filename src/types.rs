//! Core types for the vertical affinity pipeline
//!
//! This module defines the data structures that flow between stages: the
//! columnar feature frame, predictions, the scored table, and per-vertical
//! comparison results. Every stage consumes one frame and returns a new one.

use crate::error::AffinityError;
use crate::schema::{Vertical, NO_INTEREST};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Canonical member identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One named, nullable numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Column with no missing values
    pub fn dense(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, values.into_iter().map(Some).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Present values, skipping nulls
    pub fn non_null(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(|v| *v)
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Replace nulls with `fill`
    pub fn filled(&self, fill: f64) -> Column {
        Column::new(
            self.name.clone(),
            self.values.iter().map(|v| Some(v.unwrap_or(fill))).collect(),
        )
    }
}

/// Columnar table keyed by member identifier, one row per member
///
/// Member identifiers are unique and column names are unique; every column
/// has exactly one value per row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    member_ids: Vec<MemberId>,
    columns: Vec<Column>,
}

impl FeatureFrame {
    /// Build a frame, validating row counts and uniqueness
    pub fn new(member_ids: Vec<MemberId>, columns: Vec<Column>) -> Result<Self, AffinityError> {
        let mut seen = HashSet::with_capacity(member_ids.len());
        for id in &member_ids {
            if !seen.insert(id) {
                return Err(AffinityError::DuplicateMember {
                    frame: "feature frame".to_string(),
                    member: id.to_string(),
                });
            }
        }

        let mut frame = Self {
            member_ids,
            columns: Vec::with_capacity(columns.len()),
        };
        for column in columns {
            frame.push_column(column)?;
        }
        Ok(frame)
    }

    /// Frame with identifiers only
    pub fn from_members(member_ids: Vec<MemberId>) -> Result<Self, AffinityError> {
        Self::new(member_ids, Vec::new())
    }

    /// Append a column, rejecting duplicate names and wrong lengths
    pub fn push_column(&mut self, column: Column) -> Result<(), AffinityError> {
        if column.len() != self.member_ids.len() {
            return Err(AffinityError::ColumnLengthMismatch {
                column: column.name.clone(),
                expected: self.member_ids.len(),
                actual: column.len(),
            });
        }
        if self.has_column(&column.name) {
            return Err(AffinityError::DuplicateColumn(column.name));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Append a column, replacing any existing column of the same name in place
    pub fn set_column(&mut self, column: Column) -> Result<(), AffinityError> {
        match self.columns.iter().position(|c| c.name == column.name) {
            Some(idx) if column.len() == self.member_ids.len() => {
                self.columns[idx] = column;
                Ok(())
            }
            Some(_) => Err(AffinityError::ColumnLengthMismatch {
                column: column.name.clone(),
                expected: self.member_ids.len(),
                actual: column.len(),
            }),
            None => self.push_column(column),
        }
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }

    pub fn member_ids(&self) -> &[MemberId] {
        &self.member_ids
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Look up a column, failing with `MissingColumn`
    pub fn require(&self, name: &str) -> Result<&Column, AffinityError> {
        self.column(name)
            .ok_or_else(|| AffinityError::MissingColumn(name.to_string()))
    }

    /// Single cell value
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        self.column(column)
            .and_then(|c| c.values.get(row).copied().flatten())
    }

    /// Map from member identifier to row position
    pub fn row_index(&self) -> HashMap<&MemberId, usize> {
        self.member_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id, idx))
            .collect()
    }

    /// Number of non-null cells in each row
    pub fn non_null_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.len()];
        for column in &self.columns {
            for (count, value) in counts.iter_mut().zip(&column.values) {
                if value.is_some() {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// New frame holding only the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> FeatureFrame {
        let member_ids = rows.iter().map(|&r| self.member_ids[r].clone()).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), rows.iter().map(|&r| c.values[r]).collect()))
            .collect();
        FeatureFrame {
            member_ids,
            columns,
        }
    }

    /// New frame without the named columns (absent names are ignored)
    pub fn without_columns(&self, names: &[&str]) -> FeatureFrame {
        FeatureFrame {
            member_ids: self.member_ids.clone(),
            columns: self
                .columns
                .iter()
                .filter(|c| !names.contains(&c.name.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Full outer join on member identifier; left rows keep their order,
    /// unmatched right rows are appended in their own order
    pub fn outer_join(&self, other: &FeatureFrame) -> Result<FeatureFrame, AffinityError> {
        let mut member_ids = self.member_ids.clone();
        let left_index = self.row_index();
        let appended: Vec<&MemberId> = other
            .member_ids
            .iter()
            .filter(|id| !left_index.contains_key(id))
            .collect();
        member_ids.extend(appended.iter().map(|id| (*id).clone()));

        let extra = appended.len();
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| {
                let mut values = c.values.clone();
                values.extend(std::iter::repeat(None).take(extra));
                Column::new(c.name.clone(), values)
            })
            .collect();

        let right_index = other.row_index();
        for column in &other.columns {
            let values = member_ids
                .iter()
                .map(|id| right_index.get(id).and_then(|&r| column.values[r]))
                .collect();
            columns.push(Column::new(column.name.clone(), values));
        }

        FeatureFrame::new(member_ids, columns)
    }
}

/// Predicted vertical for one member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prediction {
    Vertical(Vertical),
    NoInterest,
}

impl Prediction {
    pub fn as_str(&self) -> &str {
        match self {
            Prediction::Vertical(v) => v.as_str(),
            Prediction::NoInterest => NO_INTEREST,
        }
    }

    /// Parse a `Predicted_Vertical` label
    pub fn from_label(label: &str) -> Result<Self, AffinityError> {
        if label == NO_INTEREST {
            Ok(Prediction::NoInterest)
        } else {
            Vertical::new(label).map(Prediction::Vertical)
        }
    }

    pub fn is_vertical(&self, vertical: &Vertical) -> bool {
        matches!(self, Prediction::Vertical(v) if v == vertical)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Prediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Name of the row-wise maximum affinity column
pub const MAX_AFFINITY_COLUMN: &str = "Max_Affinity_Score";

/// Name of the prediction label column in written tables
pub const PREDICTED_VERTICAL_COLUMN: &str = "Predicted_Vertical";

/// Output of the scorer and assigner
///
/// `frame` holds every input feature, every `_score` column, one
/// `Affinity_Score_<vertical>` per target vertical and `Max_Affinity_Score`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFrame {
    pub frame: FeatureFrame,
    pub verticals: Vec<Vertical>,
    pub predictions: Vec<Prediction>,
}

impl ScoredFrame {
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    pub fn member_ids(&self) -> &[MemberId] {
        self.frame.member_ids()
    }

    /// Affinity score column for a vertical
    pub fn affinity(&self, vertical: &Vertical) -> Option<&Column> {
        self.frame.column(&vertical.affinity_column())
    }

    pub fn max_affinity(&self) -> Option<&Column> {
        self.frame.column(MAX_AFFINITY_COLUMN)
    }

    /// Members whose prediction is not `No_Interest`
    pub fn predicted_count(&self) -> usize {
        self.predictions
            .iter()
            .filter(|p| !matches!(p, Prediction::NoInterest))
            .count()
    }
}

/// Predicted-vs-rest comparison for one vertical
///
/// Ratios are `None` when the not-predicted denominator is not positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    #[serde(rename = "Vertical")]
    pub vertical: Vertical,
    #[serde(rename = "Predicted_Group_Size")]
    pub predicted_group_size: usize,
    #[serde(rename = "Not_Predicted_Group_Size")]
    pub not_predicted_group_size: usize,
    #[serde(rename = "CVR_Predicted")]
    pub cvr_predicted: f64,
    #[serde(rename = "CVR_Not_Predicted")]
    pub cvr_not_predicted: f64,
    #[serde(rename = "CVR_Ratio")]
    pub cvr_ratio: Option<f64>,
    #[serde(rename = "Avg_Purchase_Predicted")]
    pub avg_purchase_predicted: f64,
    #[serde(rename = "Avg_Purchase_Not_Predicted")]
    pub avg_purchase_not_predicted: f64,
    #[serde(rename = "Purchase_Ratio")]
    pub purchase_ratio: Option<f64>,
    #[serde(rename = "Avg_Sales_Share_Predicted")]
    pub avg_sales_share_predicted: f64,
    #[serde(rename = "Avg_Sales_Share_Not_Predicted")]
    pub avg_sales_share_not_predicted: f64,
    #[serde(rename = "Sales_Share_Ratio")]
    pub sales_share_ratio: Option<f64>,
}
