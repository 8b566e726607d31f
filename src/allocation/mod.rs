pub mod session;

use crate::config::AllocationConfig;
use crate::error::ValidationError;
use crate::ledger;
use crate::models::{Allocations, Candidate};

pub use session::{finalize, submit_ballot, VotingSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Up,
    Down,
}

/// One edit a user can make on their ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationAction {
    Set { candidate_id: String, points: i64 },
    /// Raw text from a number field, parsed leniently.
    SetRaw { candidate_id: String, input: String },
    Step { candidate_id: String, direction: StepDirection },
    DistributeEvenly,
    Reset,
}

/// Applies one action and returns the resulting allocations. The input is left as it was.
pub fn apply(
    candidates: &[Candidate],
    allocations: &Allocations,
    action: &AllocationAction,
    config: &AllocationConfig,
) -> Allocations {
    match action {
        AllocationAction::Set { candidate_id, points } => {
            ledger::set_candidate_points(allocations, candidate_id, *points, config.budget).0
        }
        AllocationAction::SetRaw { candidate_id, input } => ledger::set_candidate_points(
            allocations,
            candidate_id,
            ledger::parse_points(input),
            config.budget,
        )
        .0,
        AllocationAction::Step { candidate_id, direction } => {
            step(allocations, candidate_id, *direction, config.step, config.budget)
        }
        AllocationAction::DistributeEvenly => {
            distribute_remaining_evenly(candidates, allocations, config.budget)
        }
        AllocationAction::Reset => reset(candidates),
    }
}

/// Spreads the free points over the candidates that have none yet, or over everyone when all
/// candidates already hold points. The remainder of the integer division goes one point at a
/// time to the earliest targets in roster order.
pub fn distribute_remaining_evenly(
    candidates: &[Candidate],
    allocations: &Allocations,
    budget: u32,
) -> Allocations {
    let remaining = ledger::remaining(allocations, budget);
    if remaining == 0 || candidates.is_empty() {
        return allocations.clone();
    }

    let points_of = |c: &Candidate| allocations.get(&c.id).copied().unwrap_or(0);

    let empty: Vec<&Candidate> = candidates.iter().filter(|c| points_of(c) == 0).collect();
    let targets: Vec<&Candidate> = if empty.is_empty() {
        candidates.iter().collect()
    } else {
        empty
    };

    let count = targets.len() as u32;
    let share = remaining / count;
    let extra = remaining % count;

    let mut updated = allocations.clone();
    for (i, candidate) in targets.into_iter().enumerate() {
        let bonus = if (i as u32) < extra { 1 } else { 0 };
        *updated.entry(candidate.id.clone()).or_insert(0) += share + bonus;
    }
    updated
}

pub fn reset(candidates: &[Candidate]) -> Allocations {
    candidates.iter().map(|c| (c.id.clone(), 0)).collect()
}

/// Moves one candidate by `step` points. Going down stops at zero, going up stops at whatever
/// the ledger still has free.
pub fn step(
    allocations: &Allocations,
    candidate_id: &str,
    direction: StepDirection,
    step: u32,
    budget: u32,
) -> Allocations {
    let current = allocations.get(candidate_id).copied().unwrap_or(0) as i64;
    let requested = match direction {
        StepDirection::Up => current + step as i64,
        StepDirection::Down => current - step as i64,
    };
    ledger::set_candidate_points(allocations, candidate_id, requested, budget).0
}

/// The only hard gate: a ballot is final only when the budget is spent exactly.
pub fn validate_submission(allocations: &Allocations, budget: u32) -> Result<(), ValidationError> {
    let total = ledger::allocated(allocations);
    if total < budget {
        Err(ValidationError::Shortfall { remaining: budget - total })
    } else if total > budget {
        Err(ValidationError::Excess { excess: total - budget })
    } else {
        Ok(())
    }
}
