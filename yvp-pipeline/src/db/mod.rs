//! Database access for the pipeline stages

pub mod election;
pub mod loaders;
pub mod precincts;
pub mod runs;

use crate::error::Result;
use sqlx::SqlitePool;
use yvp_common::db::{DemographicUnit, DistrictBoundary};

/// Units with a boundary, for the area-weighted strategy
pub async fn load_demographic_units(pool: &SqlitePool) -> Result<Vec<DemographicUnit>> {
    let rows = sqlx::query_as::<_, DemographicUnit>(
        r#"
        SELECT geoid, county_fips, total_pop, pop_18_29, youth_share, geom_wkt, vintage
        FROM demographic_units
        ORDER BY geoid
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn load_district_boundaries(pool: &SqlitePool) -> Result<Vec<DistrictBoundary>> {
    let rows = sqlx::query_as::<_, DistrictBoundary>(
        "SELECT district, geom_wkt FROM district_boundaries ORDER BY district",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// `(precinct_key, district)` for every assigned block
pub async fn load_block_districts(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT precinct_key, district FROM block_assignments",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
