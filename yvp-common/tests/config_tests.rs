//! Configuration loading, validation and path resolution
//!
//! Tests that touch YVP_CONFIG or YVP_DATABASE are marked #[serial] so that
//! they never observe each other's environment.

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};
use yvp_common::config::{
    resolve_config_path, resolve_database_path, PipelineConfig, TierThreshold, CONFIG_ENV_VAR,
    DATABASE_ENV_VAR,
};
use yvp_common::Error;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn assert_config_error(config: &PipelineConfig, needle: &str) {
    match config.validate() {
        Err(Error::Config(msg)) => assert!(msg.contains(needle), "unexpected message: {}", msg),
        other => panic!("expected config error containing '{}', got {:?}", needle, other),
    }
}

#[test]
fn test_weights_must_sum_to_one() {
    let mut config = PipelineConfig::default();
    config.scoring.weights.youth_share = 0.7;
    config.scoring.weights.dem_margin = 0.4;
    assert_config_error(&config, "sum to 1");
}

#[test]
fn test_weights_within_tolerance_accepted() {
    let mut config = PipelineConfig::default();
    config.scoring.weights.youth_share = 0.6 + 1e-9;
    config.scoring.weights.dem_margin = 0.4;
    assert!(config.validate().is_ok());
}

#[test]
fn test_negative_weight_rejected() {
    let mut config = PipelineConfig::default();
    config.scoring.weights.youth_share = 1.2;
    config.scoring.weights.dem_margin = -0.2;
    assert_config_error(&config, "non-negative");
}

#[test]
fn test_tier_table_requires_catch_all() {
    let mut config = PipelineConfig::default();
    config.scoring.tiers.retain(|t| t.score_min > 0.0);
    assert_config_error(&config, "catch-all");
}

#[test]
fn test_duplicate_tier_label_rejected() {
    let mut config = PipelineConfig::default();
    config.scoring.tiers.push(TierThreshold {
        label: "priority".to_string(),
        score_min: 0.9,
        color: None,
    });
    assert_config_error(&config, "duplicate");
}

#[test]
fn test_thresholds_out_of_range_rejected() {
    let mut config = PipelineConfig::default();
    config.scoring.youth_share_min = 1.5;
    assert_config_error(&config, "youth_share_min");

    let mut config = PipelineConfig::default();
    config.scoring.dem_margin_floor = -2.0;
    assert_config_error(&config, "dem_margin_floor");
}

#[test]
fn test_non_positive_tolerance_rejected() {
    let mut config = PipelineConfig::default();
    config.geometry.simplification_tolerance = 0.0;
    assert_config_error(&config, "simplification_tolerance");
}

#[test]
fn test_bad_election_date_rejected() {
    let mut config = PipelineConfig::default();
    config.election.date = "11/05/2024".to_string();
    assert_config_error(&config, "YYYY-MM-DD");
}

#[test]
fn test_snapshot_reflects_config() {
    let mut config = PipelineConfig::default();
    config.scoring.youth_share_min = 0.2;
    config.census.vintage = 2021;

    let snapshot = config.snapshot();
    assert_eq!(snapshot.youth_share_min, 0.2);
    assert_eq!(snapshot.acs_vintage, 2021);
    assert_eq!(snapshot.tiers[0].label, "priority");

    // The snapshot must survive a JSON round trip through the ledger
    let json = serde_json::to_string(&snapshot).unwrap();
    let back: yvp_common::ConfigSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snapshot);
}

#[test]
#[serial]
fn test_load_from_cli_path() {
    env::remove_var(CONFIG_ENV_VAR);
    let file = write_config(
        r#"
        [scoring]
        youth_share_min = 0.25

        [election]
        contest = "US HOUSE"
        "#,
    );

    let config = PipelineConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.scoring.youth_share_min, 0.25);
    assert_eq!(config.election.contest, "US HOUSE");
}

#[test]
#[serial]
fn test_load_rejects_invalid_file() {
    env::remove_var(CONFIG_ENV_VAR);
    let file = write_config(
        r#"
        [scoring.weights]
        youth_share = 0.9
        dem_margin = 0.9
        "#,
    );

    let result = PipelineConfig::load(Some(file.path()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_read_defers_validation_to_caller() {
    // Overrides are applied between read and validate
    env::remove_var(CONFIG_ENV_VAR);
    let file = write_config("[scoring]\nyouth_share_min = 1.5\n");

    let mut config = PipelineConfig::read(Some(file.path())).unwrap();
    assert_eq!(config.scoring.youth_share_min, 1.5);
    assert_config_error(&config, "youth_share_min");

    config.scoring.youth_share_min = 0.2;
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    let file = write_config("[census]\nvintage = 2020\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let resolved = resolve_config_path(None).unwrap();
    assert_eq!(resolved.as_deref(), Some(file.path()));

    let config = PipelineConfig::load(None).unwrap();
    assert_eq!(config.census.vintage, 2020);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    let env_file = write_config("[census]\nvintage = 2020\n");
    let cli_file = write_config("[census]\nvintage = 2019\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = PipelineConfig::load(Some(cli_file.path())).unwrap();
    assert_eq!(config.census.vintage, 2019);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_explicit_config_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let missing = PathBuf::from("/nonexistent/yvp/config.toml");
    assert!(resolve_config_path(Some(missing.as_path())).is_err());

    env::set_var(CONFIG_ENV_VAR, &missing);
    assert!(resolve_config_path(None).is_err());
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_database_path_priority() {
    let temp = TempDir::new().unwrap();
    let cli = temp.path().join("cli.db");
    let from_env = temp.path().join("env.db");
    let from_config = temp.path().join("config.db");

    let mut config = PipelineConfig::default();
    config.database_path = Some(from_config.clone());

    env::set_var(DATABASE_ENV_VAR, &from_env);
    assert_eq!(resolve_database_path(Some(cli.as_path()), &config), cli);
    assert_eq!(resolve_database_path(None, &config), from_env);

    env::remove_var(DATABASE_ENV_VAR);
    assert_eq!(resolve_database_path(None, &config), from_config);

    config.database_path = None;
    let fallback = resolve_database_path(None, &config);
    assert!(fallback.ends_with("yvp.db"));
}
