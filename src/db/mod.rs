mod records;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions},
    Row, Sqlite,
};

use crate::config::DEFAULT_BUDGET;
use crate::error::StoreError;
use crate::ledger;
use crate::models::{Ballot, Group, Round};
use records::{BallotRecord, CandidateRecord, RoundRecord};

/// Which ballots of a round a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BallotScope {
    /// Ballots of every member of the group.
    Group(String),
    /// Only the requesting user's own ballot.
    Own(String),
}

#[async_trait]
pub trait BallotStore: Send + Sync {
    async fn load_ballot(&self, user_id: &str, round_id: &str) -> Result<Option<Ballot>, StoreError>;

    /// Upsert keyed by `(user_id, round_id)`.
    async fn save_ballot(&self, ballot: &Ballot) -> Result<(), StoreError>;

    async fn list_ballots(&self, round_id: &str, scope: &BallotScope) -> Result<Vec<Ballot>, StoreError>;
}

#[async_trait]
pub trait RoundStore: Send + Sync {
    async fn load_round(&self, round_id: &str) -> Result<Round, StoreError>;

    /// All rounds, oldest first.
    async fn list_rounds(&self) -> Result<Vec<Round>, StoreError>;

    async fn load_group(&self, group_id: &str) -> Result<Group, StoreError>;
}

pub struct Database {
    pool: SqlitePool,
    budget: u32,
    clock: fn() -> DateTime<Utc>,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self, StoreError> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;
        info!("Connected to {}", db_url);

        Ok(Self::with_pool(pool))
    }

    /// A private in-memory database. One connection that never expires, otherwise the data
    /// disappears with it.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self::with_pool(pool))
    }

    fn with_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            budget: DEFAULT_BUDGET,
            clock: Utc::now,
        }
    }

    /// Per-ballot budget that stored allocations are checked against.
    pub fn with_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    /// Clock used to decide whether a round is still open for writes.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rounds (
                id TEXT PRIMARY KEY,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                mol_revealed BOOLEAN NOT NULL DEFAULT FALSE,
                mol_candidate_id TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS round_candidates (
                id TEXT NOT NULL,
                round_id TEXT NOT NULL,
                name TEXT NOT NULL,
                eliminated BOOLEAN NOT NULL DEFAULT FALSE,
                position INTEGER NOT NULL,
                PRIMARY KEY (round_id, id),
                FOREIGN KEY (round_id) REFERENCES rounds(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voting_groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_members (
                group_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (group_id, user_id),
                FOREIGN KEY (group_id) REFERENCES voting_groups(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ballots (
                user_id TEXT NOT NULL,
                round_id TEXT NOT NULL,
                group_id TEXT,
                allocations TEXT NOT NULL,
                submitted_at TEXT NOT NULL,
                PRIMARY KEY (user_id, round_id),
                FOREIGN KEY (round_id) REFERENCES rounds(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn create_round(&self, round: &Round) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO rounds (id, start_date, end_date, mol_revealed, mol_candidate_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&round.id)
        .bind(round.start_date.to_rfc3339())
        .bind(round.end_date.to_rfc3339())
        .bind(round.mol_revealed)
        .bind(&round.mol_candidate_id)
        .execute(&mut *tx)
        .await?;

        for (i, candidate) in round.candidates.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO round_candidates (id, round_id, name, eliminated, position)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&candidate.id)
            .bind(&round.id)
            .bind(&candidate.name)
            .bind(candidate.eliminated)
            .bind(i as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Created round {} with {} candidates", round.id, round.candidates.len());
        Ok(())
    }

    pub async fn reveal_mol(&self, round_id: &str, candidate_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE rounds
            SET mol_revealed = TRUE, mol_candidate_id = ?
            WHERE id = ?
            "#,
        )
        .bind(candidate_id)
        .bind(round_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RoundNotFound(round_id.to_string()));
        }
        Ok(())
    }

    pub async fn create_group(&self, group: &Group) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO voting_groups (id, name) VALUES (?, ?)")
            .bind(&group.id)
            .bind(&group.name)
            .execute(&self.pool)
            .await?;

        for user_id in &group.member_ids {
            self.add_group_member(&group.id, user_id).await?;
        }
        Ok(())
    }

    pub async fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, position)
            VALUES (?, ?, (SELECT COUNT(*) FROM group_members WHERE group_id = ?))
            ON CONFLICT(group_id, user_id) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(group_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn round_end_date(&self, round_id: &str) -> Result<String, StoreError> {
        sqlx::query("SELECT end_date FROM rounds WHERE id = ?")
            .bind(round_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.try_get::<String, _>("end_date"))
            .transpose()?
            .ok_or_else(|| StoreError::RoundNotFound(round_id.to_string()))
    }

    async fn group_exists(&self, group_id: &str) -> Result<bool, StoreError> {
        Ok(sqlx::query("SELECT 1 FROM voting_groups WHERE id = ?")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some())
    }

    async fn load_candidates(&self, round_id: &str) -> Result<Vec<CandidateRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, eliminated
            FROM round_candidates
            WHERE round_id = ?
            ORDER BY position
            "#,
        )
        .bind(round_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(CandidateRecord::from_row).collect()
    }

    async fn assemble_round(&self, record: RoundRecord) -> Result<Round, StoreError> {
        let candidates = self.load_candidates(&record.id).await?;
        record.into_round(candidates)
    }
}

#[async_trait]
impl BallotStore for Database {
    async fn load_ballot(&self, user_id: &str, round_id: &str) -> Result<Option<Ballot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, round_id, group_id, allocations, submitted_at
            FROM ballots
            WHERE user_id = ? AND round_id = ?
            "#,
        )
        .bind(user_id)
        .bind(round_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| BallotRecord::from_row(&row)?.into_ballot(self.budget))
            .transpose()
    }

    async fn save_ballot(&self, ballot: &Ballot) -> Result<(), StoreError> {
        let end_date = records::parse_instant("end_date", &self.round_end_date(&ballot.round_id).await?)?;
        let now = (self.clock)();
        if now >= end_date || ballot.submitted_at >= end_date {
            warn!(
                "Rejected ballot for closed round: user_id={}, round_id={}",
                ballot.user_id, ballot.round_id
            );
            return Err(StoreError::RoundClosed(ballot.round_id.clone()));
        }

        let total = ledger::allocated(&ballot.allocations);
        if total > self.budget {
            return Err(StoreError::Malformed(format!(
                "ballot {}/{} allocates {} of {} points",
                ballot.user_id, ballot.round_id, total, self.budget
            )));
        }

        let allocations = serde_json::to_string(&ballot.allocations)
            .map_err(|e| StoreError::Malformed(format!("allocations: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO ballots (user_id, round_id, group_id, allocations, submitted_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id, round_id)
            DO UPDATE SET group_id = excluded.group_id,
                          allocations = excluded.allocations,
                          submitted_at = excluded.submitted_at
            "#,
        )
        .bind(&ballot.user_id)
        .bind(&ballot.round_id)
        .bind(&ballot.group_id)
        .bind(allocations)
        .bind(ballot.submitted_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!("Saved ballot: user_id={}, round_id={}", ballot.user_id, ballot.round_id);
        Ok(())
    }

    async fn list_ballots(&self, round_id: &str, scope: &BallotScope) -> Result<Vec<Ballot>, StoreError> {
        let rows = match scope {
            BallotScope::Group(group_id) => {
                if !self.group_exists(group_id).await? {
                    return Err(StoreError::GroupNotFound(group_id.clone()));
                }
                sqlx::query(
                    r#"
                    SELECT b.user_id, b.round_id, b.group_id, b.allocations, b.submitted_at
                    FROM ballots b
                    JOIN group_members m ON m.user_id = b.user_id
                    WHERE b.round_id = ? AND m.group_id = ?
                    ORDER BY m.position
                    "#,
                )
                .bind(round_id)
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?
            }
            BallotScope::Own(user_id) => {
                sqlx::query(
                    r#"
                    SELECT user_id, round_id, group_id, allocations, submitted_at
                    FROM ballots
                    WHERE round_id = ? AND user_id = ?
                    "#,
                )
                .bind(round_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        debug!("Listed {} ballot(s) for round {} ({:?})", rows.len(), round_id, scope);
        rows.iter()
            .map(|row| BallotRecord::from_row(row)?.into_ballot(self.budget))
            .collect()
    }
}

#[async_trait]
impl RoundStore for Database {
    async fn load_round(&self, round_id: &str) -> Result<Round, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, start_date, end_date, mol_revealed, mol_candidate_id
            FROM rounds
            WHERE id = ?
            "#,
        )
        .bind(round_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::RoundNotFound(round_id.to_string()))?;

        self.assemble_round(RoundRecord::from_row(&row)?).await
    }

    async fn list_rounds(&self) -> Result<Vec<Round>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, start_date, end_date, mol_revealed, mol_candidate_id
            FROM rounds
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut rounds = Vec::with_capacity(rows.len());
        for row in &rows {
            rounds.push(self.assemble_round(RoundRecord::from_row(row)?).await?);
        }
        rounds.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
        Ok(rounds)
    }

    async fn load_group(&self, group_id: &str) -> Result<Group, StoreError> {
        let name: String = sqlx::query("SELECT name FROM voting_groups WHERE id = ?")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::GroupNotFound(group_id.to_string()))?
            .try_get("name")?;

        let member_ids = sqlx::query(
            r#"
            SELECT user_id
            FROM group_members
            WHERE group_id = ?
            ORDER BY position
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| row.try_get::<String, _>("user_id"))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Group {
            id: group_id.to_string(),
            name,
            member_ids,
        })
    }
}
