use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_HOUSEHOLDER_IDS: &[&str] = &["H1", "H2", "H3"];

const SEED_PROVIDER_IDS: &[&str] = &["P1", "P2", "P3", "P4"];

const SEED_SERVICES: &[(&str, &str)] = &[
    ("SVC-plumbing", "Plumbing"),
    ("SVC-electrical", "Electrical"),
    ("SVC-gardening", "Gardening"),
    ("SVC-cleaning", "Cleaning"),
];

/// Demo householders, providers and a small service catalog for local runs and smoke tests.
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Loads the dataset. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(
            event_name = "db.demo_seeded",
            householders = SEED_HOUSEHOLDER_IDS.len(),
            providers = SEED_PROVIDER_IDS.len(),
            services = SEED_SERVICES.len(),
            "demo dataset loaded"
        );
        Ok(SeedResult {
            householder_ids: SEED_HOUSEHOLDER_IDS.to_vec(),
            provider_ids: SEED_PROVIDER_IDS.to_vec(),
            service_names: SEED_SERVICES.iter().map(|(_, name)| *name).collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for id in SEED_HOUSEHOLDER_IDS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM householder WHERE id = ?1)")
                    .bind(*id)
                    .fetch_one(pool)
                    .await?;
            checks.push((*id, exists == 1));
        }
        for id in SEED_PROVIDER_IDS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM provider WHERE id = ?1)")
                    .bind(*id)
                    .fetch_one(pool)
                    .await?;
            checks.push((*id, exists == 1));
        }
        for (id, name) in SEED_SERVICES {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM service WHERE id = ?1 AND name = ?2 AND custom = 0)",
            )
            .bind(*id)
            .bind(*name)
            .fetch_one(pool)
            .await?;
            checks.push((*id, exists == 1));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub householder_ids: Vec<&'static str>,
    pub provider_ids: Vec<&'static str>,
    pub service_names: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_covers_every_seeded_id() {
        for id in SEED_HOUSEHOLDER_IDS.iter().chain(SEED_PROVIDER_IDS) {
            assert!(DemoDataset::SQL.contains(&format!("'{id}'")), "{id} missing from fixture");
        }
        for (id, _) in SEED_SERVICES {
            assert!(DemoDataset::SQL.contains(id), "{id} missing from fixture");
        }
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifiable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        let before = DemoDataset::verify(&pool).await.expect("verify empty");
        assert!(!before.all_present);

        let first = DemoDataset::load(&pool).await.expect("load");
        let first_verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(first_verification.all_present);
        assert_eq!(first.householder_ids, vec!["H1", "H2", "H3"]);

        DemoDataset::load(&pool).await.expect("reload");
        let second_verification = DemoDataset::verify(&pool).await.expect("re-verify");
        assert_eq!(first_verification.checks, second_verification.checks);

        let providers: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM provider")
            .fetch_one(&pool)
            .await
            .expect("count providers");
        assert_eq!(providers, SEED_PROVIDER_IDS.len() as i64);
    }
}
