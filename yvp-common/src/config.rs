//! Pipeline configuration: loading, path resolution, validation and snapshots
//!
//! A [`PipelineConfig`] is built once at process start, validated eagerly and
//! then passed by reference into every stage. Nothing in the pipeline reads
//! configuration from ambient state.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `YVP_CONFIG` environment variable
//! 3. User config file (`<config_dir>/yvp/config.toml`)
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "YVP_CONFIG";

/// Environment variable naming the SQLite database file
pub const DATABASE_ENV_VAR: &str = "YVP_DATABASE";

/// Allowed deviation of `w_youth + w_margin` from 1.0
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Root configuration value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Database file (overridden by CLI / `YVP_DATABASE`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub election: ElectionConfig,

    #[serde(default)]
    pub census: CensusConfig,

    #[serde(default)]
    pub geometry: GeometryConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Scoring thresholds, weights and tier table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Minimum 18–29 share for a precinct to be scored
    #[serde(default = "default_youth_share_min")]
    pub youth_share_min: f64,

    /// Minimum Democratic margin for a precinct to be scored
    #[serde(default = "default_dem_margin_floor")]
    pub dem_margin_floor: f64,

    #[serde(default)]
    pub weights: ScoreWeights,

    /// Tier table; any order in the file, scanned highest `score_min` first
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierThreshold>,
}

/// Composite score weights (must sum to 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_youth_weight")]
    pub youth_share: f64,

    #[serde(default = "default_margin_weight")]
    pub dem_margin: f64,
}

/// One row of the tier table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub label: String,
    pub score_min: f64,
    /// Display colour for map renderers
    #[serde(default)]
    pub color: Option<String>,
}

/// The single contest merged per run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Election date, `YYYY-MM-DD`
    #[serde(default = "default_election_date")]
    pub date: String,

    #[serde(default = "default_election_contest")]
    pub contest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensusConfig {
    /// Source vintage tag stored on demographic units
    #[serde(default = "default_acs_vintage")]
    pub vintage: i32,

    /// Two-digit state FIPS used when composing keys
    #[serde(default = "default_state_fips")]
    pub state_fips: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Simplification tolerance in coordinate units (~50m at CA latitude)
    #[serde(default = "default_simplification_tolerance")]
    pub simplification_tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// A `running` row older than this is reported as a suspected orphan
    #[serde(default = "default_suspect_after_minutes")]
    pub suspect_after_minutes: i64,
}

/// Raw extract locations and their schema maps
///
/// Every path is optional; an absent source leaves previously loaded data in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// NHGIS-style demographic CSV extract (primary demographic backend)
    #[serde(default)]
    pub census_extract: Option<PathBuf>,

    /// Saved Census API JSON response (alternate demographic backend)
    #[serde(default)]
    pub census_api_response: Option<PathBuf>,

    #[serde(default)]
    pub nhgis_schema: NhgisSchema,

    #[serde(default)]
    pub census_api_schema: CensusApiSchema,

    #[serde(default)]
    pub block_group_boundaries: Option<PathBuf>,

    #[serde(default = "default_block_group_boundary_schema")]
    pub block_group_boundary_schema: BoundarySchema,

    #[serde(default)]
    pub precinct_boundaries: Option<PathBuf>,

    #[serde(default = "default_precinct_boundary_schema")]
    pub precinct_boundary_schema: BoundarySchema,

    #[serde(default)]
    pub district_boundaries: Option<PathBuf>,

    #[serde(default = "default_district_boundary_schema")]
    pub district_boundary_schema: BoundarySchema,

    /// Block → VTD assignment file (`BLOCKID|COUNTYFP|DISTRICT`)
    #[serde(default)]
    pub block_vtd_assignments: Option<PathBuf>,

    /// Block → congressional district assignment file (`BLOCKID|DISTRICT`)
    #[serde(default)]
    pub block_cd_assignments: Option<PathBuf>,

    /// One row per precinct, one column per party (primary election backend)
    #[serde(default)]
    pub election_wide: Option<PathBuf>,

    /// One row per candidate per precinct (alternate election backend)
    #[serde(default)]
    pub election_long: Option<PathBuf>,

    #[serde(default)]
    pub election_schema: ElectionSchema,
}

/// Column map for an NHGIS demographic extract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NhgisSchema {
    #[serde(default = "default_nhgis_geoid_column")]
    pub geoid_column: String,
    #[serde(default = "default_nhgis_total_var")]
    pub total_pop_var: String,
    #[serde(default = "default_nhgis_youth_vars")]
    pub youth_vars: Vec<String>,
}

/// Variable map for a Census API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensusApiSchema {
    #[serde(default = "default_api_total_var")]
    pub total_pop_var: String,
    #[serde(default = "default_api_youth_vars")]
    pub youth_vars: Vec<String>,
}

/// Column map for a CSV boundary file with a WKT geometry column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundarySchema {
    pub key_column: String,
    /// When absent, county FIPS is the first five characters of the key
    #[serde(default)]
    pub county_column: Option<String>,
    #[serde(default = "default_geometry_column")]
    pub geometry_column: String,
}

/// Column map for election extracts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSchema {
    #[serde(default = "default_precinct_id_column")]
    pub precinct_id_column: String,
    #[serde(default = "default_county_name_column")]
    pub county_name_column: String,
    #[serde(default = "default_county_fips_column")]
    pub county_fips_column: String,
    #[serde(default = "default_precinct_code_column")]
    pub precinct_code_column: String,
    #[serde(default = "default_dem_column")]
    pub dem_column: String,
    #[serde(default = "default_rep_column")]
    pub rep_column: String,
    #[serde(default = "default_total_column")]
    pub total_column: String,
}

/// Serializable view of the values that determine a score
///
/// Written into the run ledger so a score's provenance survives later config edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub youth_share_min: f64,
    pub dem_margin_floor: f64,
    pub score_weights: ScoreWeights,
    pub tiers: Vec<TierThreshold>,
    pub acs_vintage: i32,
    pub election_contest: String,
    pub election_date: String,
    pub simplification_tolerance: f64,
}

// Default value functions
fn default_youth_share_min() -> f64 {
    0.15
}

fn default_dem_margin_floor() -> f64 {
    -0.10
}

fn default_youth_weight() -> f64 {
    0.60
}

fn default_margin_weight() -> f64 {
    0.40
}

fn default_tiers() -> Vec<TierThreshold> {
    [
        ("priority", 0.70, "#1a237e"),
        ("target", 0.50, "#3949ab"),
        ("watchlist", 0.30, "#7986cb"),
        ("low", 0.0, "#c5cae9"),
    ]
    .into_iter()
    .map(|(label, score_min, color)| TierThreshold {
        label: label.to_string(),
        score_min,
        color: Some(color.to_string()),
    })
    .collect()
}

fn default_election_date() -> String {
    "2024-11-05".to_string()
}

fn default_election_contest() -> String {
    "PRESIDENT OF THE UNITED STATES".to_string()
}

fn default_acs_vintage() -> i32 {
    2022
}

fn default_state_fips() -> String {
    "06".to_string()
}

fn default_simplification_tolerance() -> f64 {
    0.0005
}

fn default_suspect_after_minutes() -> i64 {
    120
}

fn default_geometry_column() -> String {
    "WKT".to_string()
}

fn default_block_group_boundary_schema() -> BoundarySchema {
    BoundarySchema {
        key_column: "GEOID".to_string(),
        county_column: None,
        geometry_column: default_geometry_column(),
    }
}

fn default_precinct_boundary_schema() -> BoundarySchema {
    BoundarySchema {
        key_column: "GEOID20".to_string(),
        county_column: None,
        geometry_column: default_geometry_column(),
    }
}

fn default_district_boundary_schema() -> BoundarySchema {
    BoundarySchema {
        key_column: "CD118FP".to_string(),
        county_column: None,
        geometry_column: default_geometry_column(),
    }
}

fn default_nhgis_geoid_column() -> String {
    "GEOCODE".to_string()
}

fn default_nhgis_total_var() -> String {
    "U7S001".to_string()
}

fn default_nhgis_youth_vars() -> Vec<String> {
    // Male 18–29 then female 18–29
    ["U7S007", "U7S008", "U7S009", "U7S010", "U7S011", "U7S031", "U7S032", "U7S033", "U7S034", "U7S035"]
        .iter()
        .map(|v| v.to_string())
        .collect()
}

fn default_api_total_var() -> String {
    "B01001_001E".to_string()
}

fn default_api_youth_vars() -> Vec<String> {
    [
        "B01001_007E", "B01001_008E", "B01001_009E", "B01001_010E", "B01001_011E",
        "B01001_031E", "B01001_032E", "B01001_033E", "B01001_034E", "B01001_035E",
    ]
    .iter()
    .map(|v| v.to_string())
    .collect()
}

fn default_precinct_id_column() -> String {
    "UNIQUE_ID".to_string()
}

fn default_county_name_column() -> String {
    "COUNTY".to_string()
}

fn default_county_fips_column() -> String {
    "COUNTYFP".to_string()
}

fn default_precinct_code_column() -> String {
    "SRPREC".to_string()
}

fn default_dem_column() -> String {
    "G24PREDHAR".to_string()
}

fn default_rep_column() -> String {
    "G24PRERTRU".to_string()
}

fn default_total_column() -> String {
    "TOTVOTE".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            scoring: ScoringConfig::default(),
            election: ElectionConfig::default(),
            census: CensusConfig::default(),
            geometry: GeometryConfig::default(),
            ledger: LedgerConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            youth_share_min: default_youth_share_min(),
            dem_margin_floor: default_dem_margin_floor(),
            weights: ScoreWeights::default(),
            tiers: default_tiers(),
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            youth_share: default_youth_weight(),
            dem_margin: default_margin_weight(),
        }
    }
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            date: default_election_date(),
            contest: default_election_contest(),
        }
    }
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            vintage: default_acs_vintage(),
            state_fips: default_state_fips(),
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            simplification_tolerance: default_simplification_tolerance(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            suspect_after_minutes: default_suspect_after_minutes(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            census_extract: None,
            census_api_response: None,
            nhgis_schema: NhgisSchema::default(),
            census_api_schema: CensusApiSchema::default(),
            block_group_boundaries: None,
            block_group_boundary_schema: default_block_group_boundary_schema(),
            precinct_boundaries: None,
            precinct_boundary_schema: default_precinct_boundary_schema(),
            district_boundaries: None,
            district_boundary_schema: default_district_boundary_schema(),
            block_vtd_assignments: None,
            block_cd_assignments: None,
            election_wide: None,
            election_long: None,
            election_schema: ElectionSchema::default(),
        }
    }
}

impl Default for NhgisSchema {
    fn default() -> Self {
        Self {
            geoid_column: default_nhgis_geoid_column(),
            total_pop_var: default_nhgis_total_var(),
            youth_vars: default_nhgis_youth_vars(),
        }
    }
}

impl Default for CensusApiSchema {
    fn default() -> Self {
        Self {
            total_pop_var: default_api_total_var(),
            youth_vars: default_api_youth_vars(),
        }
    }
}

impl Default for ElectionSchema {
    fn default() -> Self {
        Self {
            precinct_id_column: default_precinct_id_column(),
            county_name_column: default_county_name_column(),
            county_fips_column: default_county_fips_column(),
            precinct_code_column: default_precinct_code_column(),
            dem_column: default_dem_column(),
            rep_column: default_rep_column(),
            total_column: default_total_column(),
        }
    }
}

impl PipelineConfig {
    /// Resolve, read, parse and validate the configuration
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        let config = Self::read(cli_arg)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve and parse the configuration without validating it
    ///
    /// An explicitly requested file (CLI or env) that cannot be read is an error;
    /// a missing user config file falls back to compiled defaults.
    pub fn read(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg)? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a TOML file without validating it
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML text without validating it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Check every invariant the stages rely on
    ///
    /// Runs before any stage so that a bad config surfaces as one upfront failure.
    pub fn validate(&self) -> Result<()> {
        let scoring = &self.scoring;

        if !(0.0..=1.0).contains(&scoring.youth_share_min) {
            return Err(Error::Config(format!(
                "youth_share_min must be within [0, 1], got {}",
                scoring.youth_share_min
            )));
        }
        if !(-1.0..=1.0).contains(&scoring.dem_margin_floor) {
            return Err(Error::Config(format!(
                "dem_margin_floor must be within [-1, 1], got {}",
                scoring.dem_margin_floor
            )));
        }

        let w = scoring.weights;
        if !w.youth_share.is_finite() || !w.dem_margin.is_finite() || w.youth_share < 0.0 || w.dem_margin < 0.0 {
            return Err(Error::Config(format!(
                "score weights must be finite and non-negative, got youth_share={} dem_margin={}",
                w.youth_share, w.dem_margin
            )));
        }
        let sum = w.youth_share + w.dem_margin;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Config(format!("score weights must sum to 1, got {}", sum)));
        }

        if scoring.tiers.is_empty() {
            return Err(Error::Config("tier table is empty".to_string()));
        }
        let mut labels = HashSet::new();
        for tier in &scoring.tiers {
            if tier.label.trim().is_empty() {
                return Err(Error::Config("tier label must not be empty".to_string()));
            }
            if !labels.insert(tier.label.as_str()) {
                return Err(Error::Config(format!("duplicate tier label '{}'", tier.label)));
            }
            if !(0.0..=1.0).contains(&tier.score_min) {
                return Err(Error::Config(format!(
                    "tier '{}' score_min must be within [0, 1], got {}",
                    tier.label, tier.score_min
                )));
            }
        }
        if !scoring.tiers.iter().any(|t| t.score_min == 0.0) {
            return Err(Error::Config(
                "tier table must include a catch-all tier with score_min = 0.0".to_string(),
            ));
        }

        if !(self.geometry.simplification_tolerance > 0.0) {
            return Err(Error::Config(format!(
                "simplification_tolerance must be positive, got {}",
                self.geometry.simplification_tolerance
            )));
        }

        if self.election.contest.trim().is_empty() {
            return Err(Error::Config("election contest must not be empty".to_string()));
        }
        chrono::NaiveDate::parse_from_str(&self.election.date, "%Y-%m-%d").map_err(|e| {
            Error::Config(format!("election date '{}' is not YYYY-MM-DD: {}", self.election.date, e))
        })?;

        if self.census.state_fips.len() != 2 || !self.census.state_fips.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Config(format!(
                "state_fips must be two digits, got '{}'",
                self.census.state_fips
            )));
        }

        if self.ledger.suspect_after_minutes <= 0 {
            return Err(Error::Config("suspect_after_minutes must be positive".to_string()));
        }

        Ok(())
    }

    /// Tier table ordered from highest to lowest `score_min`
    pub fn tiers_descending(&self) -> Vec<TierThreshold> {
        let mut tiers = self.scoring.tiers.clone();
        tiers.sort_by(|a, b| b.score_min.total_cmp(&a.score_min));
        tiers
    }

    /// Snapshot written to the run ledger and exposed to readers
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            youth_share_min: self.scoring.youth_share_min,
            dem_margin_floor: self.scoring.dem_margin_floor,
            score_weights: self.scoring.weights,
            tiers: self.tiers_descending(),
            acs_vintage: self.census.vintage,
            election_contest: self.election.contest.clone(),
            election_date: self.election.date.clone(),
            simplification_tolerance: self.geometry.simplification_tolerance,
        }
    }
}

/// Find the config file following the priority order in the module docs
///
/// Returns `Ok(None)` when nothing was requested and no user config exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_existing(path.to_path_buf(), "--config");
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return require_existing(PathBuf::from(path), CONFIG_ENV_VAR);
        }
    }

    // Priority 3: User config file
    if let Some(path) = dirs::config_dir().map(|d| d.join("yvp").join("config.toml")) {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // Priority 4: Compiled defaults
    Ok(None)
}

fn require_existing(path: PathBuf, origin: &str) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!(
            "Config file from {} not found: {}",
            origin,
            path.display()
        )))
    }
}

/// Resolve the database file: CLI → `YVP_DATABASE` → config → platform default
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &PipelineConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.database_path {
        return path.clone();
    }

    dirs::data_local_dir()
        .map(|d| d.join("yvp").join("yvp.db"))
        .unwrap_or_else(|| PathBuf::from("./yvp_data/yvp.db"))
}
