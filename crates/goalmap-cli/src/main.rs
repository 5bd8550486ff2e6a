//! GoalMap: attribute work artifacts to the objectives of the people who produced them.

use std::path::PathBuf;
use std::sync::Arc;

use goalmap_core::{DataPaths, GoalMapConfig};
use goalmap_runtime::{BatchRunner, Providers, Sources, Stores};
use goalmap_store::{MemoryStore, SqliteStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod files;
mod report;

use files::FileSources;

#[derive(Debug, PartialEq)]
enum Command {
    Run {
        user: Option<String>,
        force: bool,
        dry_run: bool,
        json: bool,
    },
    Status,
    Reset {
        user: String,
        task_type: String,
    },
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };
    match command.as_str() {
        "run" => {
            let mut user = None;
            let mut force = false;
            let mut dry_run = false;
            let mut json = false;
            let mut rest = args[1..].iter();
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--user" => match rest.next() {
                        Some(u) => user = Some(u.clone()),
                        None => return Err("--user needs a value".into()),
                    },
                    "--force" => force = true,
                    "--dry-run" => dry_run = true,
                    "--json" => json = true,
                    other => return Err(format!("Unknown option for run: {}", other)),
                }
            }
            Ok(Command::Run {
                user,
                force,
                dry_run,
                json,
            })
        }
        "status" => Ok(Command::Status),
        "reset" => match (args.get(1), args.get(2)) {
            (Some(user), Some(task_type)) => Ok(Command::Reset {
                user: user.clone(),
                task_type: task_type.clone(),
            }),
            _ => Err("Usage: goalmap reset <user> <task_type>".into()),
        },
        "--help" | "-h" | "help" => Ok(Command::Help),
        other => Err(format!("Unknown command: {}. Use 'goalmap help' for usage.", other)),
    }
}

fn resolve_data_dir() -> PathBuf {
    std::env::var("GOALMAP_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("GoalMap: attribute pull requests to objectives");
    println!();
    println!("Usage: goalmap <command>");
    println!();
    println!("Commands:");
    println!("  run [--user U] [--force] [--dry-run] [--json]");
    println!("                           Classify pending documents, resuming from checkpoints");
    println!("  status                   Show checkpoints and stored results");
    println!("  reset <user> <task_type> Delete a checkpoint so the next run starts over");
    println!("  help                     Show this help message");
    println!();
    println!("Environment:");
    println!("  GOALMAP_DATA_DIR           Data directory (default: ./data)");
    println!("  OPENAI_API_KEY             Enables the embedding strategy");
    println!("  GOALMAP_FORCE_RECALCULATE  Reclassify documents that already have results");
    println!("  RUST_LOG                   Log filter (default: info)");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    };
    if command == Command::Help {
        print_help();
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());
    let paths = DataPaths::new(&data_dir)?;
    let mut config = GoalMapConfig::load(&paths.config_file)?;

    match command {
        Command::Run {
            user,
            force,
            dry_run,
            json,
        } => {
            if force {
                config.batch.force_recalculate = true;
            }
            let users = match user {
                Some(u) => vec![u],
                None => files::load_users(&paths.users_file)?,
            };
            if users.is_empty() {
                warn!("No users to process ({} is missing or empty)", paths.users_file.display());
                return Ok(());
            }

            let stores = if dry_run {
                info!("Dry run: results are kept in memory only");
                Stores::shared(Arc::new(MemoryStore::new()))
            } else {
                Stores::shared(Arc::new(SqliteStore::open(&paths.db_file)?))
            };
            let file_sources = Arc::new(FileSources::new(paths.clone()));
            let sources = Sources {
                documents: file_sources.clone(),
                objectives: file_sources,
            };
            let providers = Providers::from_config(&config)?;
            let runner = BatchRunner::new(&config, providers, stores, sources);

            let run = runner.run(&users);
            if json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                report::print_run_report(&run);
            }
        }
        Command::Status => {
            let store = SqliteStore::open(&paths.db_file)?;
            let checkpoints = goalmap_store::CheckpointStore::list_checkpoints(&store)?;
            let stats = store.stats()?;
            report::print_status(&checkpoints, &stats);
        }
        Command::Reset { user, task_type } => {
            let store = SqliteStore::open(&paths.db_file)?;
            if goalmap_store::CheckpointStore::delete_checkpoint(&store, &user, &task_type)? {
                println!("Reset {}/{}", user, task_type);
            } else {
                println!("No checkpoint for {}/{}", user, task_type);
            }
        }
        Command::Help => print_help(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_run_flags() {
        assert_eq!(
            parse_args(&args(&["run", "--user", "alice", "--force"])).unwrap(),
            Command::Run {
                user: Some("alice".into()),
                force: true,
                dry_run: false,
                json: false,
            }
        );
        assert_eq!(
            parse_args(&args(&["run", "--dry-run", "--json"])).unwrap(),
            Command::Run {
                user: None,
                force: false,
                dry_run: true,
                json: true,
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["run", "--user"])).is_err());
        assert!(parse_args(&args(&["run", "--bogus"])).is_err());
        assert!(parse_args(&args(&["reset", "alice"])).is_err());
        assert!(parse_args(&args(&["serve"])).is_err());
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(parse_args(&[]).unwrap(), Command::Help);
        assert_eq!(parse_args(&args(&["status"])).unwrap(), Command::Status);
        assert_eq!(
            parse_args(&args(&["reset", "alice", "reviewer"])).unwrap(),
            Command::Reset {
                user: "alice".into(),
                task_type: "reviewer".into(),
            }
        );
    }
}
