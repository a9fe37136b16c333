//! Frame adapters
//!
//! This module provides adapters that parse tabular producer output into
//! feature frames, and writers for the scored and evaluation tables.

mod csv_io;
mod ndjson;

pub use csv_io::{write_evaluation_csv, write_scored_csv, CsvAdapter};
pub use ndjson::{parse_digital_events, write_scored_ndjson, NdjsonAdapter};

use crate::error::AffinityError;
use crate::types::FeatureFrame;
use std::fs;
use std::path::Path;

/// Trait for input format adapters
pub trait FrameAdapter {
    /// Parse raw text into a frame keyed by `id_column`
    fn parse(&self, raw: &str, id_column: &str) -> Result<FeatureFrame, AffinityError>;
}

/// Textual cell values treated as missing
pub(crate) fn is_missing_literal(cell: &str) -> bool {
    matches!(
        cell.trim(),
        "" | "NaN" | "nan" | "NAN" | "null" | "NULL" | "NA" | "N/A" | "None"
    )
}

/// Read a frame from a `.csv`, `.json` or `.ndjson`/`.jsonl` file
pub fn read_frame(path: &Path, id_column: &str) -> Result<FeatureFrame, AffinityError> {
    let raw = fs::read_to_string(path)?;
    let adapter: &dyn FrameAdapter = match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => &CsvAdapter,
        Some("json") | Some("ndjson") | Some("jsonl") => &NdjsonAdapter,
        _ => {
            return Err(AffinityError::ParseError(format!(
                "unsupported frame file extension: {}",
                path.display()
            )))
        }
    };
    adapter.parse(&raw, id_column)
}
