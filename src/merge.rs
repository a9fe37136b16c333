//! Feature merging and touchpoint filtering
//!
//! The roster is the outer anchor: every roster member yields exactly one
//! merged row, and feature frames never contribute members of their own.
//! Members absent from a frame get nulls for that frame's columns.

use crate::error::AffinityError;
use crate::types::{Column, FeatureFrame, MemberId};
use log::{debug, info};
use std::collections::HashSet;

/// Ordered, duplicate-free list of members to score
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    member_ids: Vec<MemberId>,
}

impl Roster {
    pub fn new(member_ids: Vec<MemberId>) -> Result<Self, AffinityError> {
        let mut seen = HashSet::with_capacity(member_ids.len());
        for id in &member_ids {
            if !seen.insert(id) {
                return Err(AffinityError::DuplicateMember {
                    frame: "roster".to_string(),
                    member: id.to_string(),
                });
            }
        }
        Ok(Self { member_ids })
    }

    /// Roster from the identifiers of a frame (its columns are ignored)
    pub fn from_frame(frame: &FeatureFrame) -> Self {
        Self {
            member_ids: frame.member_ids().to_vec(),
        }
    }

    /// Roster without the given members (e.g. staff accounts)
    pub fn excluding(&self, excluded: &HashSet<MemberId>) -> Roster {
        let member_ids: Vec<MemberId> = self
            .member_ids
            .iter()
            .filter(|id| !excluded.contains(*id))
            .cloned()
            .collect();
        info!(
            "Excluded {} members from roster, {} remain",
            self.member_ids.len() - member_ids.len(),
            member_ids.len()
        );
        Roster { member_ids }
    }

    pub fn member_ids(&self) -> &[MemberId] {
        &self.member_ids
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}

/// Presence of a bookkeeping join key (e.g. `account_id`) per merged row
#[derive(Debug, Clone, PartialEq)]
pub struct JoinKeyPresence {
    pub name: String,
    pub matched: Vec<bool>,
}

/// Left-joined frame, still carrying bookkeeping join keys
///
/// Downstream stages only ever see the `FeatureFrame` produced by
/// [`filter_members_with_touchpoints`], which has no join keys.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFrame {
    pub frame: FeatureFrame,
    pub join_keys: Vec<JoinKeyPresence>,
}

impl MergedFrame {
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Whether each row carries at least one non-identifier value
    pub fn touchpoint_mask(&self) -> Vec<bool> {
        let mut mask: Vec<bool> = self
            .frame
            .non_null_counts()
            .into_iter()
            .map(|count| count > 0)
            .collect();
        for key in &self.join_keys {
            for (has, matched) in mask.iter_mut().zip(&key.matched) {
                *has |= *matched;
            }
        }
        mask
    }
}

/// Left-joins feature frames onto a roster
pub struct FeatureMerger<'a> {
    roster: &'a Roster,
    sources: Vec<(&'a FeatureFrame, Option<String>)>,
}

impl<'a> FeatureMerger<'a> {
    pub fn new(roster: &'a Roster) -> Self {
        Self {
            roster,
            sources: Vec::new(),
        }
    }

    /// Join a frame keyed by the canonical member identifier
    pub fn join(mut self, frame: &'a FeatureFrame) -> Self {
        self.sources.push((frame, None));
        self
    }

    /// Join a frame keyed by a differently-named identifier column
    ///
    /// Only the key's per-row presence is kept; it never becomes a column.
    pub fn join_keyed(mut self, frame: &'a FeatureFrame, join_key: impl Into<String>) -> Self {
        self.sources.push((frame, Some(join_key.into())));
        self
    }

    pub fn merge(self) -> Result<MergedFrame, AffinityError> {
        let roster_ids = self.roster.member_ids();
        let mut frame = FeatureFrame::from_members(roster_ids.to_vec())?;
        let mut join_keys = Vec::new();

        for (source, join_key) in self.sources {
            let index = source.row_index();
            let rows: Vec<Option<usize>> =
                roster_ids.iter().map(|id| index.get(id).copied()).collect();
            let matched = rows.iter().filter(|r| r.is_some()).count();
            debug!(
                "Joined frame with {} columns: {matched} of {} roster members matched",
                source.columns().len(),
                roster_ids.len()
            );

            for column in source.columns() {
                let values = rows
                    .iter()
                    .map(|row| row.and_then(|r| column.values()[r]))
                    .collect();
                frame.push_column(Column::new(column.name(), values))?;
            }

            if let Some(name) = join_key {
                join_keys.push(JoinKeyPresence {
                    name,
                    matched: rows.iter().map(Option::is_some).collect(),
                });
            }
        }

        Ok(MergedFrame { frame, join_keys })
    }
}

/// Drop members without any behavioral signal or matched join key
pub fn filter_members_with_touchpoints(merged: &MergedFrame) -> FeatureFrame {
    let rows: Vec<usize> = merged
        .touchpoint_mask()
        .into_iter()
        .enumerate()
        .filter_map(|(idx, has)| has.then_some(idx))
        .collect();
    info!("Filtered to {} members with touchpoints", rows.len());
    merged.frame.select_rows(&rows)
}
