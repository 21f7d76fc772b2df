//! SQLite implementation of the entity-store capabilities.
//!
//! Timestamps are stored as RFC 3339 text, money as decimal text, flags as 0/1 integers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use homeserve_core::StoreError;

use crate::DbPool;

mod catalog;
mod householder;
mod provider;
mod request;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("version conflict on `{id}`: expected {expected:?}, found {found:?}")]
    VersionConflict { id: String, expected: Option<u64>, found: Option<u64> },
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(source) => StoreError::Unavailable(source.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
            RepositoryError::VersionConflict { id, expected, found } => {
                StoreError::VersionConflict { id, expected: expected.unwrap_or(0), found }
            }
        }
    }
}

/// Entity store backed by a SQLite pool.
#[derive(Clone)]
pub struct SqlEntityStore {
    pool: DbPool,
}

impl SqlEntityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(format!("column `{name}`: {e}")))
}

pub(crate) fn timestamp_column(
    row: &SqliteRow,
    name: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    let raw: String = column(row, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("column `{name}` is not RFC 3339: {e}")))
}

pub(crate) fn decimal_column(row: &SqliteRow, name: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = column(row, name)?;
    Decimal::from_str(&raw)
        .map_err(|e| RepositoryError::Decode(format!("column `{name}` is not a decimal: {e}")))
}

pub(crate) fn flag_column(row: &SqliteRow, name: &str) -> Result<bool, RepositoryError> {
    let raw: i64 = column(row, name)?;
    Ok(raw != 0)
}

pub(crate) fn version_to_sql(id: &str, version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("version {version} of `{id}` overflows")))
}

pub(crate) fn version_from_sql(id: &str, version: i64) -> Result<u64, RepositoryError> {
    u64::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("negative version {version} on `{id}`")))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use homeserve_core::store::{
        CatalogStore, HouseholderStore, ProviderStore, RequestStore, ReviewStore, StoreError,
    };
    use homeserve_core::{
        HouseholderId, ProviderBid, ProviderId, RequestStatus, Review, ReviewId, Service,
        ServiceId, ServiceRequest,
    };

    use super::{RepositoryError, SqlEntityStore};
    use crate::{connect_with_settings, migrations, DemoDataset};

    async fn seeded_store() -> SqlEntityStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoDataset::load(&pool).await.expect("seed");
        SqlEntityStore::new(pool)
    }

    async fn new_request(store: &SqlEntityStore) -> ServiceRequest {
        let householder = store
            .get_householder(&HouseholderId("H1".to_string()))
            .await
            .expect("read householder")
            .expect("seeded householder");
        let service = store
            .get_service_by_name("Plumbing")
            .await
            .expect("read service")
            .expect("seeded service");
        ServiceRequest::new(&householder, &service, Utc::now() + Duration::days(1))
    }

    async fn bid_from(store: &SqlEntityStore, provider: &str, price: i64) -> ProviderBid {
        let provider = store
            .get_provider(&ProviderId(provider.to_string()))
            .await
            .expect("read provider")
            .expect("seeded provider");
        ProviderBid::from_provider(&provider, Decimal::new(price, 2))
    }

    #[tokio::test]
    async fn request_with_bids_round_trips_in_order() {
        let store = seeded_store().await;
        let mut request = new_request(&store).await;
        store.put_request(&request, None).await.expect("insert");

        request.place_bid(bid_from(&store, "P3", 12_550).await).expect("first bid");
        request.place_bid(bid_from(&store, "P1", 9_900).await).expect("second bid");
        request.approve(&ProviderId("P1".to_string())).expect("approve");
        request.version += 1;
        store.put_request(&request, Some(1)).await.expect("update");

        let loaded = store.get_request(&request.id).await.expect("read").expect("stored");
        assert_eq!(loaded, request);
        assert_eq!(loaded.status, RequestStatus::Approved);
        let order: Vec<_> = loaded.bids.iter().map(|bid| bid.provider_id.0.as_str()).collect();
        assert_eq!(order, vec!["P3", "P1"]);
        assert_eq!(
            loaded.bids.approved().map(|bid| bid.estimated_price),
            Some(Decimal::new(9_900, 2))
        );

        let by_provider = store
            .list_requests_by_provider(&ProviderId("P3".to_string()))
            .await
            .expect("by provider");
        assert_eq!(by_provider.len(), 1);
        let by_other = store
            .list_requests_by_provider(&ProviderId("P2".to_string()))
            .await
            .expect("by provider");
        assert!(by_other.is_empty());
    }

    #[tokio::test]
    async fn stale_version_is_rejected_without_writing() {
        let store = seeded_store().await;
        let mut request = new_request(&store).await;
        store.put_request(&request, None).await.expect("insert");

        let duplicate = store.put_request(&request, None).await.expect_err("already exists");
        assert!(matches!(duplicate, StoreError::VersionConflict { found: Some(1), .. }));

        request.place_bid(bid_from(&store, "P2", 5_000).await).expect("bid");
        request.version = 3;
        let stale = store.put_request(&request, Some(2)).await.expect_err("stale token");
        assert!(matches!(stale, StoreError::VersionConflict { expected: 2, found: Some(1), .. }));

        let loaded = store.get_request(&request.id).await.expect("read").expect("stored");
        assert_eq!(loaded.status, RequestStatus::Pending);
        assert!(loaded.bids.is_empty());
    }

    #[tokio::test]
    async fn review_and_rating_commit_together() {
        let store = seeded_store().await;
        let mut provider = store
            .get_provider(&ProviderId("P1".to_string()))
            .await
            .expect("read")
            .expect("seeded");
        let review = Review {
            id: ReviewId::generate(),
            provider_id: provider.id.clone(),
            householder_id: HouseholderId("H2".to_string()),
            service_id: ServiceId("SVC-plumbing".to_string()),
            rating: 4.5,
            comments: "prompt and tidy".to_string(),
            created_at: Utc::now(),
        };
        provider.rating = 4.5;
        store.record_review(&review, &provider).await.expect("record");

        let stored = store.get_provider(&provider.id).await.expect("read").expect("P1");
        assert_eq!(stored.rating, 4.5);
        assert_eq!(stored.reviews, vec![review.id.clone()]);
        assert_eq!(
            store.list_reviews_by_provider(&provider.id).await.expect("reviews"),
            vec![review.clone()]
        );

        let orphan = Review {
            id: ReviewId::generate(),
            householder_id: HouseholderId("H404".to_string()),
            ..review
        };
        provider.rating = 1.0;
        store.record_review(&orphan, &provider).await.expect_err("unknown householder");
        let unchanged = store.get_provider(&provider.id).await.expect("read").expect("P1");
        assert_eq!(unchanged.rating, 4.5);
        assert_eq!(unchanged.reviews.len(), 1);
    }

    #[tokio::test]
    async fn custom_services_are_found_by_name() {
        let store = seeded_store().await;
        assert!(store.get_service_by_name("Roofing").await.expect("read").is_none());

        let roofing = Service::custom("Roofing", "Custom");
        store.put_service(&roofing).await.expect("insert");
        let loaded = store.get_service_by_name("Roofing").await.expect("read").expect("stored");
        assert_eq!(loaded, roofing);
        assert_eq!(loaded.base_price, Decimal::ZERO);
    }

    #[test]
    fn repository_errors_map_to_store_errors() {
        let decode: StoreError = RepositoryError::Decode("bad timestamp".to_string()).into();
        assert_eq!(decode, StoreError::Decode("bad timestamp".to_string()));

        let database: StoreError = RepositoryError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(database, StoreError::Unavailable(_)));

        let conflict: StoreError = RepositoryError::VersionConflict {
            id: "REQ-1".to_string(),
            expected: Some(4),
            found: Some(5),
        }
        .into();
        assert_eq!(
            conflict,
            StoreError::VersionConflict { id: "REQ-1".to_string(), expected: 4, found: Some(5) }
        );
    }
}
