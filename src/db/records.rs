//! Raw rows as they come out of SQLite, checked before they become core models.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::{Allocations, Ballot, Candidate, Round};

pub(crate) fn parse_instant(field: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Malformed(format!("Failed to parse {}: {}", field, e)))
}

pub(crate) struct BallotRecord {
    pub user_id: String,
    pub round_id: String,
    pub group_id: Option<String>,
    pub allocations: String,
    pub submitted_at: String,
}

impl BallotRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            round_id: row.try_get("round_id")?,
            group_id: row.try_get("group_id")?,
            allocations: row.try_get("allocations")?,
            submitted_at: row.try_get("submitted_at")?,
        })
    }

    /// Checks the row against the per-ballot budget: every value in `0..=budget` and a total
    /// that does not exceed it.
    pub fn into_ballot(self, budget: u32) -> Result<Ballot, StoreError> {
        let raw: HashMap<String, i64> = serde_json::from_str(&self.allocations).map_err(|e| {
            StoreError::Malformed(format!(
                "allocations of {}/{}: {}",
                self.user_id, self.round_id, e
            ))
        })?;

        let allocations = raw
            .into_iter()
            .map(|(candidate_id, points)| {
                match u32::try_from(points) {
                    Ok(points) if points <= budget => Ok((candidate_id, points)),
                    _ => Err(StoreError::Malformed(format!(
                        "{} points for {} in ballot {}/{}",
                        points, candidate_id, self.user_id, self.round_id
                    ))),
                }
            })
            .collect::<Result<Allocations, _>>()?;

        let total: u64 = allocations.values().map(|p| u64::from(*p)).sum();
        if total > u64::from(budget) {
            return Err(StoreError::Malformed(format!(
                "ballot {}/{} allocates {} of {} points",
                self.user_id, self.round_id, total, budget
            )));
        }

        Ok(Ballot {
            submitted_at: parse_instant("submitted_at", &self.submitted_at)?,
            user_id: self.user_id,
            round_id: self.round_id,
            group_id: self.group_id,
            allocations,
        })
    }
}

pub(crate) struct CandidateRecord {
    pub id: String,
    pub name: String,
    pub eliminated: bool,
}

impl CandidateRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            eliminated: row.try_get("eliminated")?,
        })
    }
}

pub(crate) struct RoundRecord {
    pub id: String,
    pub start_date: String,
    pub end_date: String,
    pub mol_revealed: bool,
    pub mol_candidate_id: Option<String>,
}

impl RoundRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.try_get("id")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            mol_revealed: row.try_get("mol_revealed")?,
            mol_candidate_id: row.try_get("mol_candidate_id")?,
        })
    }

    pub fn into_round(self, candidates: Vec<CandidateRecord>) -> Result<Round, StoreError> {
        let start_date = parse_instant("start_date", &self.start_date)?;
        let end_date = parse_instant("end_date", &self.end_date)?;
        if end_date < start_date {
            return Err(StoreError::Malformed(format!(
                "round {} ends before it starts",
                self.id
            )));
        }

        // A revealed mole has to be someone on the roster.
        if self.mol_revealed {
            let known = self
                .mol_candidate_id
                .as_deref()
                .is_some_and(|mol| candidates.iter().any(|c| c.id == mol));
            if !known {
                return Err(StoreError::Malformed(format!(
                    "round {} reveals a mole that is not on its roster",
                    self.id
                )));
            }
        }

        Ok(Round {
            id: self.id,
            start_date,
            end_date,
            candidates: candidates
                .into_iter()
                .map(|c| Candidate {
                    id: c.id,
                    name: c.name,
                    eliminated: c.eliminated,
                })
                .collect(),
            mol_revealed: self.mol_revealed,
            mol_candidate_id: self.mol_candidate_id,
        })
    }
}
