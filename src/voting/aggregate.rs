use log::warn;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Ballot, Candidate, Round};

/// One candidate's line in a ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateStanding {
    pub candidate_id: String,
    pub candidate_name: String,
    pub total_points: u64,
    /// Average points per ballot, not a share of all points cast.
    pub percentage: f64,
    pub is_mol: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub ballot_count: usize,
    /// Allocations dropped because their candidate was not on the roster.
    pub ignored_entries: usize,
    pub standings: Vec<CandidateStanding>,
}

impl AggregateResult {
    pub fn leader(&self) -> Option<&CandidateStanding> {
        self.standings.first().filter(|s| s.total_points > 0)
    }

    pub fn standing(&self, candidate_id: &str) -> Option<&CandidateStanding> {
        self.standings.iter().find(|s| s.candidate_id == candidate_id)
    }

    /// Ranked plain-text rendering, leader in bold.
    pub fn summary(&self) -> String {
        if self.ballot_count == 0 {
            return "No votes were cast.".to_string();
        }

        let leader_id = self.leader().map(|s| s.candidate_id.as_str());
        let mut summary = String::new();

        for (i, standing) in self.standings.iter().enumerate() {
            let name = if Some(standing.candidate_id.as_str()) == leader_id {
                format!("**{}**", standing.candidate_name)
            } else {
                standing.candidate_name.clone()
            };
            let marker = if standing.is_mol { " (mole)" } else { "" };

            summary.push_str(&format!(
                "{}. {}{}: {} points ({:.1}%)\n",
                i + 1,
                name,
                marker,
                standing.total_points,
                standing.percentage
            ));
        }

        summary.push_str(&format!("\n{} ballots counted.", self.ballot_count));
        summary
    }
}

/// Sums one round's ballots per candidate and ranks the roster by points received.
pub fn aggregate(round: &Round, ballots: &[Ballot]) -> AggregateResult {
    let mut tally = Tally::new(&round.candidates);
    tally.add_round(round, ballots);
    tally.finish(|candidate_id| round.is_mol(candidate_id))
}

/// Running per-candidate totals over a fixed roster order.
pub(crate) struct Tally {
    roster: Vec<Candidate>,
    index: HashMap<String, usize>,
    totals: Vec<u64>,
    ballot_count: usize,
    ignored_entries: usize,
}

impl Tally {
    pub fn new(candidates: &[Candidate]) -> Self {
        let mut tally = Self {
            roster: Vec::new(),
            index: HashMap::new(),
            totals: Vec::new(),
            ballot_count: 0,
            ignored_entries: 0,
        };
        for candidate in candidates {
            tally.enroll(candidate);
        }
        tally
    }

    /// Adds a candidate at the end of the roster unless it is already there.
    pub fn enroll(&mut self, candidate: &Candidate) {
        if !self.index.contains_key(&candidate.id) {
            self.index.insert(candidate.id.clone(), self.roster.len());
            self.roster.push(candidate.clone());
            self.totals.push(0);
        }
    }

    /// Counts ballots against the given round's roster only.
    pub fn add_round(&mut self, round: &Round, ballots: &[Ballot]) {
        for ballot in ballots {
            self.ballot_count += 1;
            for (candidate_id, points) in &ballot.allocations {
                let slot = round
                    .candidate(candidate_id)
                    .and_then(|_| self.index.get(candidate_id).copied());

                match slot {
                    Some(slot) => self.totals[slot] += u64::from(*points),
                    None => {
                        self.ignored_entries += 1;
                        warn!(
                            "Ignoring {} points for unknown candidate {} in ballot {}/{}",
                            points, candidate_id, ballot.user_id, ballot.round_id
                        );
                    }
                }
            }
        }
    }

    pub fn finish<F>(self, is_mol: F) -> AggregateResult
    where
        F: Fn(&str) -> bool,
    {
        let ballot_count = self.ballot_count;

        let mut standings: Vec<CandidateStanding> = self
            .roster
            .into_iter()
            .zip(self.totals)
            .map(|(candidate, total_points)| CandidateStanding {
                percentage: if ballot_count > 0 {
                    total_points as f64 / ballot_count as f64
                } else {
                    0.0
                },
                is_mol: is_mol(&candidate.id),
                candidate_id: candidate.id,
                candidate_name: candidate.name,
                total_points,
            })
            .collect();

        // stable: roster order breaks ties
        standings.sort_by(|a, b| b.total_points.cmp(&a.total_points));

        AggregateResult {
            ballot_count,
            ignored_entries: self.ignored_entries,
            standings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn round(ids: &[&str]) -> Round {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        Round {
            id: "r1".to_string(),
            start_date: start,
            end_date: start + Duration::days(7),
            candidates: ids
                .iter()
                .map(|id| Candidate::new(*id, id.to_uppercase()))
                .collect(),
            mol_revealed: false,
            mol_candidate_id: None,
        }
    }

    fn ballot(user_id: &str, pairs: &[(&str, u32)]) -> Ballot {
        Ballot {
            user_id: user_id.to_string(),
            round_id: "r1".to_string(),
            group_id: None,
            allocations: pairs.iter().map(|(id, p)| (id.to_string(), *p)).collect(),
            submitted_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        }
    }

    fn order(result: &AggregateResult) -> Vec<&str> {
        result.standings.iter().map(|s| s.candidate_id.as_str()).collect()
    }

    #[test]
    fn totals_and_average_points() {
        let round = round(&["c1", "c2"]);
        let ballots = vec![
            ballot("alice", &[("c1", 60), ("c2", 40)]),
            ballot("bob", &[("c1", 30), ("c2", 70)]),
        ];
        let result = aggregate(&round, &ballots);

        assert_eq!(order(&result), vec!["c2", "c1"]);
        assert_eq!(result.standing("c1").unwrap().total_points, 90);
        assert_eq!(result.standing("c2").unwrap().total_points, 110);
        assert_eq!(result.standing("c1").unwrap().percentage, 45.0);
        assert_eq!(result.standing("c2").unwrap().percentage, 55.0);
        assert_eq!(result.ballot_count, 2);
    }

    #[test]
    fn no_ballots_keeps_roster_order() {
        let round = round(&["c1", "c2", "c3"]);
        let result = aggregate(&round, &[]);

        assert_eq!(order(&result), vec!["c1", "c2", "c3"]);
        assert!(result.standings.iter().all(|s| s.total_points == 0 && s.percentage == 0.0));
        assert!(result.leader().is_none());
        assert_eq!(result.summary(), "No votes were cast.");
    }

    #[test]
    fn empty_roster_is_empty_result() {
        let result = aggregate(&round(&[]), &[ballot("alice", &[("c1", 100)])]);

        assert!(result.standings.is_empty());
        assert_eq!(result.ignored_entries, 1);
    }

    #[test]
    fn ties_follow_roster_order() {
        let round = round(&["c1", "c2", "c3", "c4"]);
        let ballots = vec![ballot("alice", &[("c3", 40), ("c4", 20), ("c2", 40)])];

        assert_eq!(order(&aggregate(&round, &ballots)), vec!["c2", "c3", "c4", "c1"]);
    }

    #[test]
    fn stale_candidates_are_dropped() {
        let round = round(&["c1", "c2"]);
        let ballots = vec![
            ballot("alice", &[("c1", 50), ("gone", 50)]),
            ballot("bob", &[("c2", 100)]),
        ];
        let result = aggregate(&round, &ballots);

        assert_eq!(result.standings.len(), 2);
        assert_eq!(result.standing("c1").unwrap().total_points, 50);
        assert_eq!(result.ignored_entries, 1);
        assert_eq!(result.ballot_count, 2);
    }

    #[test]
    fn mol_flag_only_on_revealed_candidate() {
        let mut round = round(&["c1", "c2", "c3"]);
        round.mol_candidate_id = Some("c1".to_string());
        let ballots = vec![ballot("alice", &[("c2", 80), ("c3", 20)])];

        let hidden = aggregate(&round, &ballots);
        assert!(hidden.standings.iter().all(|s| !s.is_mol));

        round.mol_revealed = true;
        let revealed = aggregate(&round, &ballots);
        for standing in &revealed.standings {
            assert_eq!(standing.is_mol, standing.candidate_id == "c1");
        }
        assert_eq!(order(&revealed).last(), Some(&"c1"));
    }

    #[test]
    fn ballot_order_does_not_matter() {
        let round = round(&["c1", "c2", "c3"]);
        let mut ballots = vec![
            ballot("alice", &[("c1", 20), ("c2", 30), ("c3", 50)]),
            ballot("bob", &[("c1", 50), ("c2", 50)]),
            ballot("carol", &[("c3", 100)]),
        ];
        let forward = aggregate(&round, &ballots);
        ballots.reverse();

        assert_eq!(aggregate(&round, &ballots), forward);
    }

    #[test]
    fn summary_ranks_and_marks() {
        let mut round = round(&["c1", "c2"]);
        round.mol_revealed = true;
        round.mol_candidate_id = Some("c1".to_string());
        let result = aggregate(&round, &[ballot("alice", &[("c1", 25), ("c2", 75)])]);

        assert_eq!(
            result.summary(),
            "1. **C2**: 75 points (75.0%)\n2. C1 (mole): 25 points (25.0%)\n\n1 ballots counted."
        );
    }
}
