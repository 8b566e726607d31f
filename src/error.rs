use thiserror::Error;

/// Raised only when a ballot is submitted, never while editing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{remaining} points remaining")]
    Shortfall { remaining: u32 },

    #[error("{excess} points over budget")]
    Excess { excess: u32 },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Round not found: {0}")]
    RoundNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Round {0} is closed")]
    RoundClosed(String),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Round {0} has not started yet")]
    RoundNotOpen(String),

    #[error("Round {0} is closed")]
    RoundClosed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
