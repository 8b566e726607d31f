pub mod allocation;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod voting;

pub use config::{AllocationConfig, Config};
pub use error::{StoreError, SubmitError, ValidationError};
pub use models::{Allocations, Ballot, Candidate, Group, Round};
