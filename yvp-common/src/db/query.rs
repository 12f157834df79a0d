//! Typed precinct query builder
//!
//! The read side filters the finished precinct table through [`PrecinctQuery`]
//! rather than composing SQL text. Every filter value is a bound parameter;
//! the only text appended to the statement is fixed column names.
//!
//! Results are always restricted to scored precincts and ordered by score,
//! highest first. The boundary returned is the simplified one when present,
//! otherwise the full-resolution one.
//!
//! [`DistrictSummary`] aggregates every district-assigned precinct, scored or not.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Default page size when the caller does not set a limit
pub const DEFAULT_LIMIT: i64 = 5000;

/// Hard ceiling on a single page
pub const MAX_LIMIT: i64 = 50_000;

/// Precinct as served to map clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PrecinctFeature {
    pub precinct_key: String,
    pub county_fips: String,
    pub cd_number: Option<i64>,
    pub total_pop: Option<i64>,
    pub pop_18_29: Option<i64>,
    pub youth_share: Option<f64>,
    pub dem_votes: Option<i64>,
    pub rep_votes: Option<i64>,
    pub total_votes: Option<i64>,
    pub dem_pct: Option<f64>,
    pub dem_margin: Option<f64>,
    pub score: f64,
    pub tier: String,
    pub pipeline_run_id: Option<i64>,
    /// Simplified boundary, or full resolution if simplification has not run
    pub geometry_wkt: Option<String>,
}

/// Filter builder over scored precincts
#[derive(Debug, Clone, PartialEq)]
pub struct PrecinctQuery {
    district: Option<i64>,
    youth_share_min: Option<f64>,
    dem_margin_floor: Option<f64>,
    tier: Option<String>,
    limit: Option<i64>,
}

impl Default for PrecinctQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl PrecinctQuery {
    pub fn new() -> Self {
        Self {
            district: None,
            youth_share_min: None,
            dem_margin_floor: None,
            tier: None,
            limit: Some(DEFAULT_LIMIT),
        }
    }

    /// Only precincts assigned to this congressional district
    pub fn district(mut self, district: i64) -> Self {
        self.district = Some(district);
        self
    }

    /// Only precincts whose youth share is at least `min`
    pub fn youth_share_at_least(mut self, min: f64) -> Self {
        self.youth_share_min = Some(min);
        self
    }

    /// Only precincts whose Democratic margin is at least `floor`
    pub fn dem_margin_at_least(mut self, floor: f64) -> Self {
        self.dem_margin_floor = Some(floor);
        self
    }

    /// Only precincts in the named tier
    pub fn tier(mut self, label: impl Into<String>) -> Self {
        self.tier = Some(label.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Drop the row limit (bulk export)
    pub fn unbounded(mut self) -> Self {
        self.limit = None;
        self
    }

    /// Check filter values before they reach the database
    pub fn validate(&self) -> Result<()> {
        if let Some(district) = self.district {
            if district < 1 {
                return Err(Error::InvalidInput(format!(
                    "district must be positive, got {}",
                    district
                )));
            }
        }
        for (name, value) in [
            ("youth_share_min", self.youth_share_min),
            ("dem_margin_floor", self.dem_margin_floor),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(Error::InvalidInput(format!("{} must be finite", name)));
                }
            }
        }
        if let Some(tier) = &self.tier {
            if tier.trim().is_empty() {
                return Err(Error::InvalidInput("tier label must not be empty".to_string()));
            }
        }
        if let Some(limit) = self.limit {
            if !(1..=MAX_LIMIT).contains(&limit) {
                return Err(Error::InvalidInput(format!(
                    "limit must be between 1 and {}, got {}",
                    MAX_LIMIT, limit
                )));
            }
        }
        Ok(())
    }

    /// Assemble the parameterised statement
    pub fn build(&self) -> QueryBuilder<'_, Sqlite> {
        let mut qb = QueryBuilder::new(
            r#"SELECT precinct_key, county_fips, cd_number, total_pop, pop_18_29, youth_share,
                   dem_votes, rep_votes, total_votes, dem_pct, dem_margin, score, tier,
                   pipeline_run_id,
                   COALESCE(geom_simplified_wkt, geom_wkt) AS geometry_wkt
            FROM precincts
            WHERE score IS NOT NULL"#,
        );

        if let Some(district) = self.district {
            qb.push(" AND cd_number = ").push_bind(district);
        }
        if let Some(min) = self.youth_share_min {
            qb.push(" AND youth_share >= ").push_bind(min);
        }
        if let Some(floor) = self.dem_margin_floor {
            qb.push(" AND dem_margin >= ").push_bind(floor);
        }
        if let Some(tier) = &self.tier {
            qb.push(" AND tier = ").push_bind(tier.as_str());
        }

        qb.push(" ORDER BY score DESC, precinct_key ASC");

        if let Some(limit) = self.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        qb
    }

    /// Validate, then run against the store
    pub async fn fetch(&self, pool: &SqlitePool) -> Result<Vec<PrecinctFeature>> {
        self.validate()?;
        let mut qb = self.build();
        let rows = qb.build_query_as::<PrecinctFeature>().fetch_all(pool).await?;
        Ok(rows)
    }
}

/// Per-district aggregate over precincts with an assigned district
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DistrictSummary {
    pub cd_number: i64,
    pub precinct_count: i64,
    pub avg_youth_share: Option<f64>,
    pub avg_dem_margin: Option<f64>,
    pub priority_count: i64,
    pub target_count: i64,
}

impl DistrictSummary {
    /// One row per district, ascending
    pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(
            r#"
            SELECT cd_number,
                   COUNT(*) AS precinct_count,
                   AVG(youth_share) AS avg_youth_share,
                   AVG(dem_margin) AS avg_dem_margin,
                   SUM(CASE WHEN tier = 'priority' THEN 1 ELSE 0 END) AS priority_count,
                   SUM(CASE WHEN tier = 'target' THEN 1 ELSE 0 END) AS target_count
            FROM precincts
            WHERE cd_number IS NOT NULL
            GROUP BY cd_number
            ORDER BY cd_number
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_query_is_scored_only_and_ordered() {
        let query = PrecinctQuery::new();
        let qb = query.build();
        let sql = qb.sql();
        assert!(sql.contains("WHERE score IS NOT NULL"));
        assert!(sql.contains("ORDER BY score DESC"));
        assert!(sql.contains("LIMIT ?"));
    }

    #[test]
    fn test_filters_are_bound_not_interpolated() {
        let query = PrecinctQuery::new()
            .district(12)
            .tier("priority'; DROP TABLE precincts; --")
            .youth_share_at_least(0.2);
        let qb = query.build();
        let sql = qb.sql();
        assert!(sql.contains("cd_number = ?"));
        assert!(sql.contains("tier = ?"));
        assert!(sql.contains("youth_share >= ?"));
        assert!(!sql.contains("DROP TABLE"));
        assert!(!sql.contains("12"));
    }

    #[test]
    fn test_unbounded_has_no_limit() {
        let query = PrecinctQuery::new().unbounded();
        let qb = query.build();
        assert!(!qb.sql().contains("LIMIT"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PrecinctQuery::new().limit(0).validate().is_err());
        assert!(PrecinctQuery::new().limit(MAX_LIMIT + 1).validate().is_err());
        assert!(PrecinctQuery::new().district(0).validate().is_err());
        assert!(PrecinctQuery::new().youth_share_at_least(f64::NAN).validate().is_err());
        assert!(PrecinctQuery::new().tier("  ").validate().is_err());
        assert!(PrecinctQuery::new().district(7).limit(10).validate().is_ok());
    }
}
