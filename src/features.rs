//! Per-domain feature shaping
//!
//! This module prepares the wide per-domain frames the merger consumes:
//! - RFM clipping and recency fill
//! - Digital event aggregation into per-vertical counts and days-since
//! - Community activity column completion

use crate::error::AffinityError;
use crate::schema::{ColumnKey, Dimension, Vertical};
use crate::types::{Column, FeatureFrame, MemberId};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Clip negative RFM values to 0 and fill missing recency with the sentinel
pub fn prepare_rfm_frame(
    rfm: &FeatureFrame,
    verticals: &[Vertical],
    recency_sentinel: f64,
) -> Result<FeatureFrame, AffinityError> {
    let recency_columns: Vec<String> = verticals
        .iter()
        .map(|v| ColumnKey::new(Dimension::Recency, v.clone()).column_name())
        .collect();

    let columns = rfm
        .columns()
        .iter()
        .map(|column| {
            let clipped: Vec<Option<f64>> = column
                .values()
                .iter()
                .map(|v| v.map(|x| x.max(0.0)))
                .collect();
            let clipped = Column::new(column.name(), clipped);
            if recency_columns.iter().any(|name| name == column.name()) {
                clipped.filled(recency_sentinel)
            } else {
                clipped
            }
        })
        .collect();

    FeatureFrame::new(rfm.member_ids().to_vec(), columns)
}

/// Add `activity_count_<vertical> = 0` for every vertical the frame lacks
pub fn complete_activity_columns(
    activity: &FeatureFrame,
    verticals: &[Vertical],
) -> Result<FeatureFrame, AffinityError> {
    let mut completed = activity.clone();
    for vertical in verticals {
        let name = ColumnKey::new(Dimension::ActivityCount, vertical.clone()).column_name();
        if !completed.has_column(&name) {
            debug!("Adding empty activity column {name}");
            completed.push_column(Column::dense(name, vec![0.0; activity.len()]))?;
        }
    }
    Ok(completed)
}

/// Digital tracking event kinds that feed affinity features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitalEventKind {
    PdpView,
    AddToCart,
}

impl DigitalEventKind {
    fn dimensions(&self) -> (Dimension, Dimension) {
        match self {
            DigitalEventKind::PdpView => (Dimension::PdpViewCount, Dimension::PdpViewDaysSince),
            DigitalEventKind::AddToCart => (Dimension::AtcCount, Dimension::AtcDaysSince),
        }
    }
}

/// One tracking event already mapped to a vertical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalEvent {
    pub account_id: MemberId,
    pub vertical: String,
    pub kind: DigitalEventKind,
    pub event_time: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy)]
struct EventStats {
    count: u64,
    latest: Option<DateTime<Utc>>,
}

impl EventStats {
    fn add(&mut self, at: DateTime<Utc>) {
        self.count += 1;
        self.latest = Some(self.latest.map_or(at, |latest| latest.max(at)));
    }
}

/// Aggregates tracking events into the wide digital-behavior frame
///
/// Every account that has at least one event in a required vertical gets a
/// row with all four PDP/ATC columns for every vertical.
pub struct DigitalEventAggregator {
    verticals: Vec<Vertical>,
    reference: DateTime<Utc>,
    recency_sentinel: f64,
}

impl DigitalEventAggregator {
    /// Days-since values are measured from midnight UTC of `reference_date`
    pub fn new(verticals: Vec<Vertical>, reference_date: NaiveDate, recency_sentinel: f64) -> Self {
        let midnight = reference_date.and_time(NaiveTime::default());
        Self {
            verticals,
            reference: Utc.from_utc_datetime(&midnight),
            recency_sentinel,
        }
    }

    pub fn aggregate(&self, events: &[DigitalEvent]) -> Result<FeatureFrame, AffinityError> {
        let mut stats: BTreeMap<&MemberId, HashMap<(&str, DigitalEventKind), EventStats>> =
            BTreeMap::new();
        let mut dropped = 0usize;

        for event in events {
            let Some(vertical) = self
                .verticals
                .iter()
                .find(|v| v.as_str() == event.vertical)
            else {
                dropped += 1;
                continue;
            };
            stats
                .entry(&event.account_id)
                .or_default()
                .entry((vertical.as_str(), event.kind))
                .or_default()
                .add(event.event_time);
        }

        if dropped > 0 {
            warn!("Dropped {dropped} digital events outside the required verticals");
        }

        let member_ids: Vec<MemberId> = stats.keys().map(|id| (*id).clone()).collect();
        let mut columns = Vec::new();
        for vertical in &self.verticals {
            for kind in [DigitalEventKind::PdpView, DigitalEventKind::AddToCart] {
                let (count_dim, days_dim) = kind.dimensions();
                let per_member: Vec<EventStats> = stats
                    .values()
                    .map(|m| m.get(&(vertical.as_str(), kind)).copied().unwrap_or_default())
                    .collect();

                let counts = per_member.iter().map(|s| s.count as f64).collect();
                let days = per_member
                    .iter()
                    .map(|s| match s.latest {
                        Some(latest) => days_between(latest, self.reference) as f64,
                        None => self.recency_sentinel,
                    })
                    .collect();

                columns.push(Column::dense(
                    ColumnKey::new(count_dim, vertical.clone()).column_name(),
                    counts,
                ));
                columns.push(Column::dense(
                    ColumnKey::new(days_dim, vertical.clone()).column_name(),
                    days,
                ));
            }
        }

        FeatureFrame::new(member_ids, columns)
    }
}

/// Whole days from `earlier` to `later`, floored (negative for future events)
fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(SECONDS_PER_DAY)
}

const SECONDS_PER_DAY: i64 = 86_400;

/// Outer-join navigation click counts onto the PDP/ATC frame by account
pub fn merge_digital_features(
    pdp_atc: &FeatureFrame,
    navigation: &FeatureFrame,
) -> Result<FeatureFrame, AffinityError> {
    pdp_atc.outer_join(navigation)
}
