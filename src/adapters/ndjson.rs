//! JSON frame adapter
//!
//! Accepts newline-delimited JSON objects or a single JSON array of flat
//! objects. Columns appear in key order across all rows.

use crate::error::AffinityError;
use crate::features::DigitalEvent;
use crate::types::{Column, FeatureFrame, MemberId, ScoredFrame, PREDICTED_VERTICAL_COLUMN};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::io::Write;

use super::{is_missing_literal, FrameAdapter};

/// NDJSON / JSON array frame adapter
pub struct NdjsonAdapter;

/// Records of a JSON array or of non-empty NDJSON lines
fn parse_records<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, AffinityError> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(AffinityError::from))
        .collect()
}

fn member_id(value: &Value, row: usize) -> Result<MemberId, AffinityError> {
    match value {
        Value::String(s) => Ok(MemberId::new(s.clone())),
        Value::Number(n) => Ok(MemberId::new(n.to_string())),
        other => Err(AffinityError::ParseError(format!(
            "row {}: identifier must be a string or number, got {other}",
            row + 1
        ))),
    }
}

fn cell(value: Option<&Value>, row: usize, column: &str) -> Result<Option<f64>, AffinityError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if is_missing_literal(s) => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            AffinityError::ParseError(format!(
                "row {}, column {column}: {s:?} is not a number",
                row + 1
            ))
        }),
        Some(other) => Err(AffinityError::ParseError(format!(
            "row {}, column {column}: unexpected value {other}",
            row + 1
        ))),
    }
}

impl FrameAdapter for NdjsonAdapter {
    fn parse(&self, raw: &str, id_column: &str) -> Result<FeatureFrame, AffinityError> {
        let objects: Vec<Map<String, Value>> = parse_records(raw)?;

        let names: BTreeSet<&str> = objects
            .iter()
            .flat_map(|o| o.keys().map(String::as_str))
            .filter(|k| *k != id_column)
            .collect();

        let member_ids = objects
            .iter()
            .enumerate()
            .map(|(row, object)| {
                let id = object
                    .get(id_column)
                    .ok_or_else(|| AffinityError::MissingColumn(id_column.to_string()))?;
                member_id(id, row)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let columns = names
            .into_iter()
            .map(|name| {
                let values = objects
                    .iter()
                    .enumerate()
                    .map(|(row, object)| cell(object.get(name), row, name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Column::new(name, values))
            })
            .collect::<Result<Vec<_>, AffinityError>>()?;

        FeatureFrame::new(member_ids, columns)
    }
}

/// Parse tracking events, one JSON object per line or a JSON array
pub fn parse_digital_events(raw: &str) -> Result<Vec<DigitalEvent>, AffinityError> {
    parse_records(raw)
}

/// Write one JSON object per scored member
pub fn write_scored_ndjson<W: Write>(
    scored: &ScoredFrame,
    id_column: &str,
    mut out: W,
) -> Result<(), AffinityError> {
    let columns = scored.frame.columns();
    for (row, (id, prediction)) in scored.member_ids().iter().zip(&scored.predictions).enumerate() {
        let mut object = Map::new();
        object.insert(id_column.to_string(), Value::String(id.to_string()));
        for column in columns {
            // Non-finite values have no JSON number form
            let value = column.values()[row]
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::Null, Value::Number);
            object.insert(column.name().to_string(), value);
        }
        object.insert(
            PREDICTED_VERTICAL_COLUMN.to_string(),
            Value::String(prediction.to_string()),
        );
        serde_json::to_writer(&mut out, &object)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::DigitalEventKind;
    use crate::schema::Vertical;
    use crate::types::Prediction;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ndjson() {
        let raw = r#"
{"account_id": "a1", "PDP_View_6M_Count_running": 3, "navi_6M_count_running": null}
{"account_id": 42, "PDP_View_6M_Count_running": "1.5"}
"#;
        let frame = NdjsonAdapter.parse(raw, "account_id").unwrap();
        assert_eq!(frame.member_ids(), &[MemberId::new("a1"), MemberId::new("42")]);
        assert_eq!(frame.value(0, "PDP_View_6M_Count_running"), Some(3.0));
        assert_eq!(frame.value(1, "PDP_View_6M_Count_running"), Some(1.5));
        assert_eq!(frame.require("navi_6M_count_running").unwrap().null_count(), 2);
    }

    #[test]
    fn test_parse_json_array_and_errors() {
        let frame = NdjsonAdapter
            .parse(r#"[{"member_uid": "m1", "R_running": 5}]"#, "member_uid")
            .unwrap();
        assert_eq!(frame.value(0, "R_running"), Some(5.0));

        let missing = NdjsonAdapter.parse(r#"{"R_running": 5}"#, "member_uid");
        assert!(matches!(missing, Err(AffinityError::MissingColumn(_))));

        let nested = NdjsonAdapter.parse(r#"{"member_uid": "m1", "R_running": [1]}"#, "member_uid");
        assert!(matches!(nested, Err(AffinityError::ParseError(_))));
    }

    #[test]
    fn test_parse_digital_events() {
        let raw = concat!(
            r#"{"account_id": "a1", "vertical": "running", "kind": "add_to_cart", "#,
            r#""event_time": "2024-01-15T08:00:00Z"}"#
        );
        let events = parse_digital_events(raw).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, DigitalEventKind::AddToCart);
        assert_eq!(events[0].account_id, MemberId::new("a1"));
    }

    #[test]
    fn test_write_scored_ndjson() {
        let frame = FeatureFrame::new(
            vec![MemberId::new("m1")],
            vec![Column::new("legacy_flag", vec![None])],
        )
        .unwrap();
        let scored = ScoredFrame {
            frame,
            verticals: vec![Vertical::new("running").unwrap()],
            predictions: vec![Prediction::NoInterest],
        };

        let mut out = Vec::new();
        write_scored_ndjson(&scored, "member_uid", &mut out).unwrap();
        let line: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["member_uid"], "m1");
        assert_eq!(line["legacy_flag"], Value::Null);
        assert_eq!(line["Predicted_Vertical"], "No_Interest");
    }
}
