use log::{info, warn};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_BUDGET: u32 = 100;
pub const DEFAULT_STEP: u32 = 5;
const DEFAULT_DATABASE_URL: &str = "sqlite:mole_vote.db";

/// Budget and step size for one ballot's edit surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationConfig {
    pub budget: u32,
    pub step: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            step: DEFAULT_STEP,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub allocation: AllocationConfig,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            info!("DATABASE_URL not set, using default: {}", DEFAULT_DATABASE_URL);
            DEFAULT_DATABASE_URL.to_string()
        });

        let budget = try_load_nonzero(&lookup, "MOLE_BUDGET", DEFAULT_BUDGET);
        let step = try_load_nonzero(&lookup, "MOLE_STEP", DEFAULT_STEP);

        Self {
            database_url,
            allocation: AllocationConfig { budget, step },
        }
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {} value '{}': {}, using default: {}", key, raw, e, default);
            default
        }),
        None => {
            info!("{} not set, using default: {}", key, default);
            default
        }
    }
}

/// Zero makes no sense for a budget or a step size, so it is treated like an invalid value.
fn try_load_nonzero<F>(lookup: &F, key: &str, default: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    match try_load(lookup, key, default) {
        0 => {
            warn!("{} must be greater than zero, using default: {}", key, default);
            default
        }
        value => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[]));

        assert_eq!(config.database_url, "sqlite:mole_vote.db");
        assert_eq!(config.allocation, AllocationConfig::default());
        assert_eq!(config.allocation.budget, 100);
        assert_eq!(config.allocation.step, 5);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("MOLE_BUDGET", " 50 "),
            ("MOLE_STEP", "10"),
        ]));

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.allocation.budget, 50);
        assert_eq!(config.allocation.step, 10);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = Config::from_lookup(lookup_from(&[("MOLE_BUDGET", "lots"), ("MOLE_STEP", "-5")]));

        assert_eq!(config.allocation, AllocationConfig::default());
    }

    #[test]
    fn zero_budget_and_step_fall_back() {
        let config = Config::from_lookup(lookup_from(&[("MOLE_BUDGET", "0"), ("MOLE_STEP", " 0 ")]));

        assert_eq!(config.allocation.budget, DEFAULT_BUDGET);
        assert_eq!(config.allocation.step, DEFAULT_STEP);
    }
}
