//! Command-line probe over the configured storage backends.
//!
//! # Responsibility
//! - Load a configuration file, start logging and connect the backends.
//! - Print collection counts and resolved association listings.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use skillmatrix_core::model::{self, MemberSkill, Review};
use skillmatrix_core::{
    connect_object_store, connect_primary, init_logging, AppConfig, DataAccess, JoinResolver,
    QueryOptions,
};

/// Skills directory storage probe
#[derive(Parser, Debug)]
#[command(name = "skillmatrix")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the core library links
    Ping,

    /// Print the record count of every collection
    Counts {
        /// Path to configuration file
        #[arg(long, default_value = "./skillmatrix.json")]
        config: PathBuf,
    },

    /// Print an association listing with both ends resolved
    Resolve {
        /// Path to configuration file
        #[arg(long, default_value = "./skillmatrix.json")]
        config: PathBuf,

        #[arg(value_enum)]
        association: AssociationArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AssociationArg {
    MemberSkills,
    Reviews,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_exit module=cli status=error error={}", message);
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Ping => {
            println!("skillmatrix_core ping={}", skillmatrix_core::ping());
            println!("skillmatrix_core version={}", skillmatrix_core::core_version());
            Ok(())
        }
        Command::Counts { config } => {
            let config = load(&config)?;
            let store = connect_primary(&config).map_err(|err| err.to_string())?;
            for collection in [
                model::SKILLS,
                model::MEMBERS,
                model::MEMBER_SKILLS,
                model::REVIEWS,
                model::LINKS,
            ] {
                print_count(store.as_ref(), collection);
            }
            if let Some(objects) = connect_object_store(&config).map_err(|err| err.to_string())? {
                print_count(&objects, model::SKILL_ICONS);
            }
            Ok(())
        }
        Command::Resolve {
            config,
            association,
        } => {
            let config = load(&config)?;
            let store = connect_primary(&config).map_err(|err| err.to_string())?;
            let resolver = JoinResolver::new(store.as_ref());
            let all = QueryOptions::none();
            let (rendered, skipped) = match association {
                AssociationArg::MemberSkills => {
                    let resolved = resolver
                        .resolve_list::<MemberSkill>(&all)
                        .map_err(|err| err.to_string())?;
                    (serde_json::to_string_pretty(&resolved.items), resolved.skipped.len())
                }
                AssociationArg::Reviews => {
                    let resolved = resolver
                        .resolve_list::<Review>(&all)
                        .map_err(|err| err.to_string())?;
                    (serde_json::to_string_pretty(&resolved.items), resolved.skipped.len())
                }
            };
            println!("{}", rendered.map_err(|err| err.to_string())?);
            if skipped > 0 {
                eprintln!("skipped {skipped} record(s) with dangling references");
            }
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<AppConfig, String> {
    let config = AppConfig::load(path).map_err(|err| err.to_string())?;
    init_logging(&config.log.level, &config.log.dir).map_err(|err| err.to_string())?;
    Ok(config)
}

fn print_count(store: &dyn DataAccess, collection: &str) {
    match store.read_all(collection) {
        Ok(records) => println!("{collection}={}", records.len()),
        Err(err) => println!("{collection}=unavailable ({})", err.kind().as_str()),
    }
}
