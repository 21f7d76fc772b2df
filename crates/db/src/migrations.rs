use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

pub async fn table_exists(pool: &DbPool, table: &str) -> Result<bool, sqlx::Error> {
    let found: i64 = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;
    Ok(found == 1)
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{run_pending, table_exists};
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "householder",
        "provider",
        "service",
        "service_request",
        "provider_bid",
        "review",
        "idx_service_request_householder_id",
        "idx_service_request_status",
        "idx_provider_bid_provider_id",
        "idx_review_provider_id",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        assert!(!table_exists(&pool, "review").await.expect("probe"));
        run_pending(&pool).await.expect("run migrations");

        for table in ["householder", "provider", "service", "service_request", "provider_bid"] {
            assert!(table_exists(&pool, table).await.expect("probe"), "table {table} should exist");
        }
    }

    #[tokio::test]
    async fn request_status_is_constrained() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query(
            "INSERT INTO householder (id, name, email, address, created_at)
             VALUES ('H1', 'Hana', 'hana@example.com', '12 Elm', '2026-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .expect("insert householder");
        sqlx::query(
            "INSERT INTO service (id, name, description, base_price, custom)
             VALUES ('SVC-1', 'Plumbing', 'Pipes', '80', 0)",
        )
        .execute(&pool)
        .await
        .expect("insert service");

        let result = sqlx::query(
            "INSERT INTO service_request (id, householder_id, householder_name,
                 householder_address, service_id, service_name, requested_time,
                 scheduled_time, status, approve_status, version)
             VALUES ('REQ-1', 'H1', 'Hana', '12 Elm', 'SVC-1', 'Plumbing',
                 '2026-01-01T00:00:00+00:00', '2026-01-02T00:00:00+00:00', 'completed', 0, 1)",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "unknown status must be rejected by the schema");
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
