use chrono::Utc;
use log::{error, info};
use std::env;
use std::process::ExitCode;

use mole_vote::db::Database;
use mole_vote::voting::{load_group_standings, RoundSelection};
use mole_vote::Config;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(group_id) = args.first() else {
        eprintln!("usage: mole-vote <group_id> [round_id|all]");
        return ExitCode::FAILURE;
    };
    let selection = RoundSelection::parse(args.get(1).map(String::as_str).unwrap_or("all"));

    let config = Config::load();

    let database = match Database::new(&config.database_url).await {
        Ok(db) => db.with_budget(config.allocation.budget),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Loading standings for group {} ({:?})", group_id, selection);
    let standings = match load_group_standings(&database, group_id, &selection, Utc::now()).await {
        Ok(standings) => standings,
        Err(e) => {
            error!("Failed to load standings for group {}: {}", group_id, e);
            return ExitCode::FAILURE;
        }
    };

    for ((round_id, result), participation) in standings.per_round.iter().zip(&standings.participation) {
        println!(
            "== Round {} ({}/{} members voted)",
            round_id, participation.voted_member_count, participation.total_member_count
        );
        println!("{}\n", result.summary());
    }

    if standings.per_round.len() > 1 {
        println!("== All rounds");
        println!("{}", standings.combined.summary());
    }

    ExitCode::SUCCESS
}
