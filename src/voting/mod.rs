pub mod aggregate;
pub mod rollup;

pub use aggregate::{aggregate, AggregateResult, CandidateStanding};
pub use rollup::{combined_across_rounds, participation, select_rounds, RoundParticipation, RoundSelection};

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::db::{BallotScope, BallotStore, RoundStore};
use crate::error::StoreError;

/// Everything a group's results page shows.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStandings {
    pub group_id: String,
    pub per_round: Vec<(String, AggregateResult)>,
    pub combined: AggregateResult,
    pub participation: Vec<RoundParticipation>,
}

/// Loads the group's ballots for every selected round that has started by `now` and builds
/// per-round, combined and participation views.
pub async fn load_group_standings<S>(
    store: &S,
    group_id: &str,
    selection: &RoundSelection,
    now: DateTime<Utc>,
) -> Result<GroupStandings, StoreError>
where
    S: BallotStore + RoundStore + ?Sized,
{
    let group = store.load_group(group_id).await?;
    let rounds: Vec<_> = store
        .list_rounds()
        .await?
        .into_iter()
        .filter(|round| round.has_started(now))
        .collect();

    let scope = BallotScope::Group(group.id.clone());
    let mut per_round_ballots = Vec::new();
    for round in select_rounds(&rounds, selection) {
        let ballots = store.list_ballots(&round.id, &scope).await?;
        per_round_ballots.push((round.clone(), ballots));
    }

    let per_round = per_round_ballots
        .iter()
        .map(|(round, ballots)| (round.id.clone(), aggregate(round, ballots)))
        .collect();
    let participation = per_round_ballots
        .iter()
        .map(|(round, ballots)| rollup::participation(round, &group.member_ids, ballots))
        .collect();
    let combined = combined_across_rounds(&per_round_ballots);

    info!(
        "Built standings for group {} over {} round(s), {} ballot(s)",
        group.id,
        per_round_ballots.len(),
        combined.ballot_count
    );

    Ok(GroupStandings {
        group_id: group.id,
        per_round,
        combined,
        participation,
    })
}
