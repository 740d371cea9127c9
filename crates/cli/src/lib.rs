pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use haulrate_core::import::ImportMode;
use rust_decimal::Decimal;

use commands::calculate::{parse_date_arg, parse_tonnage_arg, CalculateRequest};

#[derive(Debug, Parser)]
#[command(
    name = "haulrate",
    about = "Haulrate fare engine operator CLI",
    long_about = "Manage the fare rate catalog, inspect configuration, and quote trip fares against the configured database.",
    after_help = "Examples:\n  haulrate migrate\n  haulrate seed\n  haulrate calculate --center 서울센터 --tonnage 5 --region 서울 --region 경기 --stops 3\n  haulrate import --file rates.csv --commit\n  haulrate doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo rate catalog and verify it")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, schema state and catalog contents")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Quote the fare for one trip")]
    Calculate {
        #[arg(long, help = "Dispatch center name")]
        center: String,
        #[arg(long, value_parser = parse_tonnage_arg, help = "Vehicle tonnage, e.g. 5 or 2.5t")]
        tonnage: Decimal,
        #[arg(long = "region", help = "Destination region; repeat for each stop")]
        regions: Vec<String>,
        #[arg(long, help = "Total stops including the final destination (default 1)")]
        stops: Option<u32>,
        #[arg(long, help = "Override the distinct region count derived from --region")]
        distinct_regions: Option<u32>,
        #[arg(long, value_parser = parse_date_arg, help = "Price as of this date (default now)")]
        date: Option<DateTime<Utc>>,
    },
    #[command(about = "List active centers and tonnages")]
    Suggest,
    #[command(about = "Validate a rate sheet and optionally write it to the catalog")]
    Import {
        #[arg(long, help = "CSV rate sheet")]
        file: PathBuf,
        #[arg(long, help = "Write accepted rates (default is a dry run)")]
        commit: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Calculate { center, tonnage, regions, stops, distinct_regions, date } => {
            commands::calculate::run(CalculateRequest {
                center,
                tonnage,
                regions,
                total_stops: stops,
                distinct_regions,
                as_of: date,
            })
        }
        Command::Suggest => commands::suggest::run(),
        Command::Import { file, commit } => {
            let mode = if commit { ImportMode::Commit } else { ImportMode::Simulate };
            commands::import::run(file, mode)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rust_decimal_macros::dec;

    use super::{Cli, Command};

    #[test]
    fn calculate_collects_repeated_regions() {
        let cli = Cli::try_parse_from([
            "haulrate",
            "calculate",
            "--center",
            "서울센터",
            "--tonnage",
            "5t",
            "--region",
            "서울",
            "--region",
            "경기",
            "--stops",
            "3",
        ])
        .expect("parse");

        match cli.command {
            Command::Calculate { center, tonnage, regions, stops, distinct_regions, date } => {
                assert_eq!(center, "서울센터");
                assert_eq!(tonnage, dec!(5));
                assert_eq!(regions, vec!["서울".to_string(), "경기".to_string()]);
                assert_eq!(stops, Some(3));
                assert_eq!(distinct_regions, None);
                assert!(date.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn import_defaults_to_dry_run() {
        let cli = Cli::try_parse_from(["haulrate", "import", "--file", "rates.csv"]).expect("parse");
        assert!(matches!(cli.command, Command::Import { commit: false, .. }));
    }

    #[test]
    fn calculate_rejects_malformed_date() {
        let parsed = Cli::try_parse_from([
            "haulrate",
            "calculate",
            "--center",
            "서울센터",
            "--tonnage",
            "5",
            "--date",
            "someday",
        ]);
        assert!(parsed.is_err());
    }
}
