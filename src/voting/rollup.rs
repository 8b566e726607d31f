use serde::Serialize;
use std::collections::HashSet;

use super::aggregate::{AggregateResult, Tally};
use crate::models::{Ballot, Round};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundParticipation {
    pub round_id: String,
    pub voted_member_count: usize,
    pub total_member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundSelection {
    All,
    Round(String),
}

impl RoundSelection {
    /// `"all"` (any case) or an empty string selects every round; anything else is a round id.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            RoundSelection::All
        } else {
            RoundSelection::Round(raw.to_string())
        }
    }
}

/// Picks the rounds a view covers. An unknown round id selects nothing.
pub fn select_rounds<'a>(rounds: &'a [Round], selection: &RoundSelection) -> Vec<&'a Round> {
    match selection {
        RoundSelection::All => rounds.iter().collect(),
        RoundSelection::Round(id) => rounds.iter().filter(|r| &r.id == id).collect(),
    }
}

/// Adds up several rounds. Candidates are matched by id, listed in the order they first appear,
/// and only collect points in rounds whose roster includes them. Averages are taken over every
/// ballot from every round.
pub fn combined_across_rounds(per_round: &[(Round, Vec<Ballot>)]) -> AggregateResult {
    let mut tally = Tally::new(&[]);
    for (round, _) in per_round {
        for candidate in &round.candidates {
            tally.enroll(candidate);
        }
    }

    for (round, ballots) in per_round {
        tally.add_round(round, ballots);
    }

    tally.finish(|candidate_id| per_round.iter().any(|(round, _)| round.is_mol(candidate_id)))
}

pub fn participation(round: &Round, group_members: &[String], ballots: &[Ballot]) -> RoundParticipation {
    let members: HashSet<&str> = group_members.iter().map(String::as_str).collect();
    let voted: HashSet<&str> = ballots
        .iter()
        .filter(|b| b.round_id == round.id)
        .map(|b| b.user_id.as_str())
        .filter(|user_id| members.contains(user_id))
        .collect();

    RoundParticipation {
        round_id: round.id.clone(),
        voted_member_count: voted.len(),
        total_member_count: members.len(),
    }
}
