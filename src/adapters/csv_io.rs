//! CSV frame adapter
//!
//! Reads headered CSV with one identifier column; every other column is
//! parsed as `f64`, with empty cells and missing-value literals as nulls.

use crate::error::AffinityError;
use crate::evaluation::EvaluationTable;
use crate::schema::Vertical;
use crate::types::{
    Column, FeatureFrame, MemberId, Prediction, ScoredFrame, PREDICTED_VERTICAL_COLUMN,
};
use std::io::Write;

use super::{is_missing_literal, FrameAdapter};

/// CSV frame adapter
pub struct CsvAdapter;

impl FrameAdapter for CsvAdapter {
    fn parse(&self, raw: &str, id_column: &str) -> Result<FeatureFrame, AffinityError> {
        parse_csv(raw, id_column, None).map(|(frame, _)| frame)
    }
}

impl CsvAdapter {
    /// Parse a previously written scored table, restoring its predictions
    pub fn parse_scored(
        &self,
        raw: &str,
        id_column: &str,
        verticals: &[Vertical],
    ) -> Result<ScoredFrame, AffinityError> {
        let (frame, labels) = parse_csv(raw, id_column, Some(PREDICTED_VERTICAL_COLUMN))?;
        let predictions = labels
            .iter()
            .map(|label| Prediction::from_label(label))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScoredFrame {
            frame,
            verticals: verticals.to_vec(),
            predictions,
        })
    }
}

/// Parse numeric columns, keeping an optional text column aside
fn parse_csv(
    raw: &str,
    id_column: &str,
    label_column: Option<&str>,
) -> Result<(FeatureFrame, Vec<String>), AffinityError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AffinityError::MissingColumn(name.to_string()))
    };
    let id_index = find(id_column)?;
    let label_index = label_column.map(find).transpose()?;

    let mut member_ids = Vec::new();
    let mut labels = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for (col, cell) in record.iter().enumerate() {
            if col == id_index {
                member_ids.push(MemberId::new(cell));
            } else if Some(col) == label_index {
                labels.push(cell.to_string());
            } else if is_missing_literal(cell) {
                values[col].push(None);
            } else {
                let value = cell.parse::<f64>().map_err(|_| {
                    AffinityError::ParseError(format!(
                        "row {}, column {}: {cell:?} is not a number",
                        row + 1,
                        &headers[col]
                    ))
                })?;
                values[col].push(Some(value));
            }
        }
    }

    let columns = headers
        .iter()
        .zip(values)
        .enumerate()
        .filter(|(col, _)| *col != id_index && Some(*col) != label_index)
        .map(|(_, (name, values))| Column::new(name, values))
        .collect();
    Ok((FeatureFrame::new(member_ids, columns)?, labels))
}

fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn format_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), |v| v.to_string())
}

/// Write the scored table: identifier, frame columns, then `Predicted_Vertical`
pub fn write_scored_csv<W: Write>(
    scored: &ScoredFrame,
    id_column: &str,
    out: W,
) -> Result<(), AffinityError> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec![id_column.to_string()];
    header.extend(scored.frame.column_names().map(str::to_string));
    header.push(PREDICTED_VERTICAL_COLUMN.to_string());
    writer.write_record(&header)?;

    let columns = scored.frame.columns();
    for (row, (id, prediction)) in scored.member_ids().iter().zip(&scored.predictions).enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(id.to_string());
        record.extend(columns.iter().map(|c| format_cell(c.values()[row])));
        record.push(prediction.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write one row per vertical; undefined ratios are written as `NaN`
pub fn write_evaluation_csv<W: Write>(
    table: &EvaluationTable,
    out: W,
) -> Result<(), AffinityError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "Vertical",
        "Predicted_Group_Size",
        "Not_Predicted_Group_Size",
        "CVR_Predicted",
        "CVR_Not_Predicted",
        "CVR_Ratio",
        "Avg_Purchase_Predicted",
        "Avg_Purchase_Not_Predicted",
        "Purchase_Ratio",
        "Avg_Sales_Share_Predicted",
        "Avg_Sales_Share_Not_Predicted",
        "Sales_Share_Ratio",
    ])?;

    for row in &table.rows {
        writer.write_record([
            row.vertical.to_string(),
            row.predicted_group_size.to_string(),
            row.not_predicted_group_size.to_string(),
            row.cvr_predicted.to_string(),
            row.cvr_not_predicted.to_string(),
            format_ratio(row.cvr_ratio),
            row.avg_purchase_predicted.to_string(),
            row.avg_purchase_not_predicted.to_string(),
            format_ratio(row.purchase_ratio),
            row.avg_sales_share_predicted.to_string(),
            row.avg_sales_share_not_predicted.to_string(),
            format_ratio(row.sales_share_ratio),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
