use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Points per candidate for one ballot, keyed by candidate id.
pub type Allocations = HashMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub eliminated: bool,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            eliminated: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub candidates: Vec<Candidate>,
    pub mol_revealed: bool,
    pub mol_candidate_id: Option<String>,
}

impl Round {
    /// Fresh round with generated ids, used when an admin seeds a new round into the store.
    pub fn new(
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        candidate_names: Vec<String>,
    ) -> Self {
        let candidates = candidate_names
            .into_iter()
            .map(|name| Candidate::new(Uuid::new_v4().to_string(), name))
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            start_date,
            end_date,
            candidates,
            mol_revealed: false,
            mol_candidate_id: None,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now < self.end_date
    }

    pub fn is_completed(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_date
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_date
    }

    /// Candidates still offered for allocation, in roster order.
    pub fn votable_candidates(&self) -> Vec<Candidate> {
        self.candidates
            .iter()
            .filter(|candidate| !candidate.eliminated)
            .cloned()
            .collect()
    }

    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    pub fn is_mol(&self, candidate_id: &str) -> bool {
        self.mol_revealed && self.mol_candidate_id.as_deref() == Some(candidate_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub user_id: String,
    pub round_id: String,
    pub group_id: Option<String>,
    pub allocations: Allocations,
    pub submitted_at: DateTime<Utc>,
}

impl Ballot {
    pub fn total_points(&self) -> u32 {
        crate::ledger::allocated(&self.allocations)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub member_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_round() -> Round {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let mut round = Round::new(
            start,
            start + Duration::days(7),
            vec!["Anna".to_string(), "Bram".to_string(), "Chris".to_string()],
        );
        round.candidates[2].eliminated = true;
        round
    }

    #[test]
    fn round_window_is_half_open() {
        let round = sample_round();

        assert!(!round.is_active(round.start_date - Duration::seconds(1)));
        assert!(round.is_active(round.start_date));
        assert!(round.is_active(round.end_date - Duration::seconds(1)));
        assert!(!round.is_active(round.end_date));
        assert!(round.is_completed(round.end_date));
        assert!(!round.is_completed(round.start_date));
    }

    #[test]
    fn eliminated_candidates_are_not_votable() {
        let round = sample_round();
        let names: Vec<_> = round.votable_candidates().into_iter().map(|c| c.name).collect();

        assert_eq!(names, vec!["Anna", "Bram"]);
    }

    #[test]
    fn mol_requires_reveal() {
        let mut round = sample_round();
        let first = round.candidates[0].id.clone();
        round.mol_candidate_id = Some(first.clone());

        assert!(!round.is_mol(&first));
        round.mol_revealed = true;
        assert!(round.is_mol(&first));
        assert!(!round.is_mol(&round.candidates[1].id));
    }
}
