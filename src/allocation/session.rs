use chrono::{DateTime, Utc};
use log::{debug, info};

use super::{apply, reset, validate_submission, AllocationAction};
use crate::config::AllocationConfig;
use crate::db::BallotStore;
use crate::error::SubmitError;
use crate::ledger;
use crate::models::{Allocations, Ballot, Candidate, Round};

/// One user's editing state for one round: the latest allocations plus undo/redo history.
#[derive(Debug, Clone)]
pub struct VotingSession {
    user_id: String,
    round_id: String,
    group_id: Option<String>,
    candidates: Vec<Candidate>,
    config: AllocationConfig,
    history: Vec<Allocations>,
    cursor: usize,
}

impl VotingSession {
    pub fn open(round: &Round, user_id: &str, group_id: Option<&str>, config: AllocationConfig) -> Self {
        let candidates = round.votable_candidates();
        let initial = reset(&candidates);

        Self {
            user_id: user_id.to_string(),
            round_id: round.id.clone(),
            group_id: group_id.map(str::to_string),
            candidates,
            config,
            history: vec![initial],
            cursor: 0,
        }
    }

    /// Picks up where a previously saved ballot left off. Points for candidates that are no
    /// longer votable are dropped.
    pub fn resume(round: &Round, ballot: &Ballot, config: AllocationConfig) -> Self {
        let mut session = Self::open(round, &ballot.user_id, ballot.group_id.as_deref(), config);

        let mut seeded = session.history[0].clone();
        for (candidate_id, points) in &ballot.allocations {
            if seeded.contains_key(candidate_id) {
                seeded = ledger::set_candidate_points(&seeded, candidate_id, *points as i64, config.budget).0;
            } else {
                debug!(
                    "Dropping {} points for unavailable candidate {} from ballot {}/{}",
                    points, candidate_id, ballot.user_id, ballot.round_id
                );
            }
        }
        session.history[0] = seeded;
        session
    }

    /// Applies an action. A change discards anything that could have been redone.
    pub fn dispatch(&mut self, action: AllocationAction) -> &Allocations {
        let next = apply(&self.candidates, self.allocations(), &action, &self.config);
        if next != *self.allocations() {
            self.history.truncate(self.cursor + 1);
            self.history.push(next);
            self.cursor += 1;
        }
        self.allocations()
    }

    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 >= self.history.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn allocations(&self) -> &Allocations {
        &self.history[self.cursor]
    }

    pub fn points(&self, candidate_id: &str) -> u32 {
        self.allocations().get(candidate_id).copied().unwrap_or(0)
    }

    pub fn remaining(&self) -> u32 {
        ledger::remaining(self.allocations(), self.config.budget)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn round_id(&self) -> &str {
        &self.round_id
    }
}

/// Turns the session's current allocations into a ballot, provided the budget is spent exactly
/// and the round is open at `now`. The session itself is left alone.
pub fn finalize(session: &VotingSession, round: &Round, now: DateTime<Utc>) -> Result<Ballot, SubmitError> {
    if !round.has_started(now) {
        return Err(SubmitError::RoundNotOpen(round.id.clone()));
    }
    if round.is_completed(now) {
        return Err(SubmitError::RoundClosed(round.id.clone()));
    }
    validate_submission(session.allocations(), session.config.budget)?;

    Ok(Ballot {
        user_id: session.user_id.clone(),
        round_id: session.round_id.clone(),
        group_id: session.group_id.clone(),
        allocations: session.allocations().clone(),
        submitted_at: now,
    })
}

/// Finalizes and persists the ballot. On failure nothing in the session changes, so the same
/// allocations can be submitted again.
pub async fn submit_ballot<S>(
    store: &S,
    session: &VotingSession,
    round: &Round,
    now: DateTime<Utc>,
) -> Result<Ballot, SubmitError>
where
    S: BallotStore + ?Sized,
{
    let ballot = finalize(session, round, now)?;
    store.save_ballot(&ballot).await?;
    info!("Submitted ballot: user_id={}, round_id={}", ballot.user_id, ballot.round_id);
    Ok(ballot)
}
