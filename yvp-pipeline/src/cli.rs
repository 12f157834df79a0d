//! Command-line arguments for yvp-pipeline

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use yvp_common::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "yvp-pipeline")]
#[command(about = "Precinct reconciliation and scoring pipeline")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Debug-level logging (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute one full pipeline run
    Run(SourceOverrides),

    /// List recent runs from the ledger
    Runs {
        /// Number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Write scored precincts to a CSV file, highest score first
    Export {
        /// Output CSV path
        path: PathBuf,
    },

    /// Print per-district precinct aggregates as JSON
    Districts,

    /// Print the validated configuration snapshot as JSON
    Config,
}

/// Per-run source file overrides; each replaces the configured path
#[derive(Args, Debug, Default, Clone)]
pub struct SourceOverrides {
    #[arg(long, value_name = "FILE")]
    pub census_extract: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub census_api_response: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub block_group_boundaries: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub precinct_boundaries: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub district_boundaries: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub block_vtd_assignments: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub block_cd_assignments: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub election_wide: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub election_long: Option<PathBuf>,
}

impl SourceOverrides {
    pub fn apply(self, config: &mut PipelineConfig) {
        let sources = &mut config.sources;
        let pairs = [
            (self.census_extract, &mut sources.census_extract),
            (self.census_api_response, &mut sources.census_api_response),
            (self.block_group_boundaries, &mut sources.block_group_boundaries),
            (self.precinct_boundaries, &mut sources.precinct_boundaries),
            (self.district_boundaries, &mut sources.district_boundaries),
            (self.block_vtd_assignments, &mut sources.block_vtd_assignments),
            (self.block_cd_assignments, &mut sources.block_cd_assignments),
            (self.election_wide, &mut sources.election_wide),
            (self.election_long, &mut sources.election_long),
        ];
        for (value, slot) in pairs {
            if value.is_some() {
                *slot = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_only_given_paths() {
        let mut config = PipelineConfig::default();
        config.sources.election_long = Some(PathBuf::from("/data/long.csv"));
        config.sources.precinct_boundaries = Some(PathBuf::from("/data/old.csv"));

        let overrides = SourceOverrides {
            precinct_boundaries: Some(PathBuf::from("/data/new.csv")),
            ..SourceOverrides::default()
        };
        overrides.apply(&mut config);

        assert_eq!(config.sources.precinct_boundaries, Some(PathBuf::from("/data/new.csv")));
        assert_eq!(config.sources.election_long, Some(PathBuf::from("/data/long.csv")));
    }

    #[test]
    fn test_parse_run_with_global_flags() {
        let cli = Cli::parse_from([
            "yvp-pipeline",
            "run",
            "--database",
            "/tmp/x.db",
            "--election-wide",
            "/data/sov.csv",
        ]);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/x.db")));
        match cli.command {
            Command::Run(o) => assert_eq!(o.election_wide, Some(PathBuf::from("/data/sov.csv"))),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_districts() {
        let cli = Cli::parse_from(["yvp-pipeline", "districts"]);
        assert!(matches!(cli.command, Command::Districts));
    }
}
