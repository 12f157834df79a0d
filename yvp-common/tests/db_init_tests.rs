//! Database initialization, schema constraints and the precinct query builder

use sqlx::SqlitePool;
use tempfile::TempDir;
use yvp_common::db::init::{init_database, CURRENT_SCHEMA_VERSION};
use yvp_common::db::query::{DistrictSummary, PrecinctQuery};

async fn fresh_pool() -> (SqlitePool, TempDir) {
    let temp = TempDir::new().unwrap();
    let pool = init_database(&temp.path().join("nested").join("yvp.db")).await.unwrap();
    (pool, temp)
}

async fn insert_precinct(
    pool: &SqlitePool,
    key: &str,
    district: i64,
    youth_share: f64,
    dem_margin: f64,
    score: Option<f64>,
    tier: Option<&str>,
) {
    sqlx::query(
        r#"
        INSERT INTO precincts (precinct_key, county_fips, cd_number, geom_wkt,
                               geom_simplified_wkt, youth_share, dem_margin, score, tier)
        VALUES (?, '06001', ?, 'POLYGON((0 0,1 0,1 1,0 1,0 0))', NULL, ?, ?, ?, ?)
        "#,
    )
    .bind(key)
    .bind(district)
    .bind(youth_share)
    .bind(dem_margin)
    .bind(score)
    .bind(tier)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_database_created_with_parent_directories() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("a").join("b").join("yvp.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_reinitialization_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("yvp.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO district_boundaries (district, geom_wkt) VALUES (1, 'POLYGON((0 0,1 0,1 1,0 0))')")
        .execute(&pool1)
        .await
        .unwrap();
    drop(pool1);

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM district_boundaries")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing rows must survive re-initialization");

    let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_score_and_tier_must_be_set_together() {
    let (pool, _temp) = fresh_pool().await;

    let result = sqlx::query(
        "INSERT INTO precincts (precinct_key, county_fips, score, tier) VALUES ('X', '06001', 0.5, NULL)",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "score without tier must be rejected");
}

#[tokio::test]
async fn test_finished_at_tracks_run_status() {
    let (pool, _temp) = fresh_pool().await;

    let running_with_finish = sqlx::query(
        "INSERT INTO pipeline_runs (status, config_snapshot, started_at, finished_at) VALUES ('running', '{}', 't0', 't1')",
    )
    .execute(&pool)
    .await;
    assert!(running_with_finish.is_err());

    let success_without_finish = sqlx::query(
        "INSERT INTO pipeline_runs (status, config_snapshot, started_at) VALUES ('success', '{}', 't0')",
    )
    .execute(&pool)
    .await;
    assert!(success_without_finish.is_err());

    let unknown_status = sqlx::query(
        "INSERT INTO pipeline_runs (status, config_snapshot, started_at, finished_at) VALUES ('aborted', '{}', 't0', 't1')",
    )
    .execute(&pool)
    .await;
    assert!(unknown_status.is_err());
}

#[tokio::test]
async fn test_foreign_keys_enforced_on_every_connection() {
    let (pool, _temp) = fresh_pool().await;

    // Acquire several connections so the insert is not necessarily on the first one
    let _a = pool.acquire().await.unwrap();
    let _b = pool.acquire().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO precincts (precinct_key, county_fips, pipeline_run_id) VALUES ('X', '06001', 999)",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "dangling pipeline_run_id must be rejected");
}

#[tokio::test]
async fn test_query_returns_scored_precincts_by_score() {
    let (pool, _temp) = fresh_pool().await;

    insert_precinct(&pool, "A", 1, 0.30, 0.10, Some(0.55), Some("target")).await;
    insert_precinct(&pool, "B", 1, 0.40, 0.20, Some(0.80), Some("priority")).await;
    insert_precinct(&pool, "C", 2, 0.35, 0.05, Some(0.60), Some("target")).await;
    insert_precinct(&pool, "D", 1, 0.10, 0.50, None, None).await;

    let rows = PrecinctQuery::new().fetch(&pool).await.unwrap();
    let keys: Vec<&str> = rows.iter().map(|r| r.precinct_key.as_str()).collect();
    assert_eq!(keys, vec!["B", "C", "A"], "unscored precinct must be excluded");
}

#[tokio::test]
async fn test_query_filters_combine() {
    let (pool, _temp) = fresh_pool().await;

    insert_precinct(&pool, "A", 1, 0.30, 0.10, Some(0.55), Some("target")).await;
    insert_precinct(&pool, "B", 1, 0.40, 0.20, Some(0.80), Some("priority")).await;
    insert_precinct(&pool, "C", 2, 0.35, 0.05, Some(0.60), Some("target")).await;

    let rows = PrecinctQuery::new().district(1).tier("target").fetch(&pool).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].precinct_key, "A");

    let rows = PrecinctQuery::new()
        .youth_share_at_least(0.33)
        .dem_margin_at_least(0.06)
        .fetch(&pool)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].precinct_key, "B");

    let rows = PrecinctQuery::new().limit(2).fetch(&pool).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_query_prefers_simplified_boundary() {
    let (pool, _temp) = fresh_pool().await;
    insert_precinct(&pool, "A", 1, 0.30, 0.10, Some(0.55), Some("target")).await;

    let rows = PrecinctQuery::new().fetch(&pool).await.unwrap();
    assert_eq!(rows[0].geometry_wkt.as_deref(), Some("POLYGON((0 0,1 0,1 1,0 1,0 0))"));

    sqlx::query("UPDATE precincts SET geom_simplified_wkt = 'SIMPLIFIED' WHERE precinct_key = 'A'")
        .execute(&pool)
        .await
        .unwrap();
    let rows = PrecinctQuery::new().fetch(&pool).await.unwrap();
    assert_eq!(rows[0].geometry_wkt.as_deref(), Some("SIMPLIFIED"));
}

#[tokio::test]
async fn test_query_rejects_invalid_filters() {
    let (pool, _temp) = fresh_pool().await;
    assert!(PrecinctQuery::new().limit(-5).fetch(&pool).await.is_err());
}

#[tokio::test]
async fn test_district_summary_aggregates_per_district() {
    let (pool, _temp) = fresh_pool().await;
    insert_precinct(&pool, "A", 3, 0.30, 0.20, Some(0.8), Some("priority")).await;
    insert_precinct(&pool, "B", 3, 0.10, 0.40, Some(0.55), Some("target")).await;
    insert_precinct(&pool, "C", 3, 0.20, 0.00, None, None).await;
    insert_precinct(&pool, "D", 1, 0.50, -0.10, Some(0.6), Some("target")).await;

    let summaries = DistrictSummary::fetch_all(&pool).await.unwrap();

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].cd_number, 1);
    assert_eq!(summaries[0].precinct_count, 1);
    assert_eq!(summaries[0].target_count, 1);
    assert_eq!(summaries[0].priority_count, 0);

    let third = &summaries[1];
    assert_eq!(third.cd_number, 3);
    assert_eq!(third.precinct_count, 3, "unscored precincts are counted");
    assert_eq!((third.priority_count, third.target_count), (1, 1));
    assert!((third.avg_youth_share.unwrap() - 0.20).abs() < 1e-9);
    assert!((third.avg_dem_margin.unwrap() - 0.20).abs() < 1e-9);
}

#[tokio::test]
async fn test_district_summary_empty_store() {
    let (pool, _temp) = fresh_pool().await;
    assert!(DistrictSummary::fetch_all(&pool).await.unwrap().is_empty());
}
