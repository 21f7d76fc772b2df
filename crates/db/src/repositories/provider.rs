use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use homeserve_core::store::{ProviderStore, ReviewStore, StoreError};
use homeserve_core::{HouseholderId, Provider, ProviderId, Review, ReviewId, ServiceId};

use super::{column, timestamp_column, RepositoryError, SqlEntityStore};

fn row_to_review(row: &SqliteRow) -> Result<Review, RepositoryError> {
    Ok(Review {
        id: ReviewId(column(row, "id")?),
        provider_id: ProviderId(column(row, "provider_id")?),
        householder_id: HouseholderId(column(row, "householder_id")?),
        service_id: ServiceId(column(row, "service_id")?),
        rating: column(row, "rating")?,
        comments: column(row, "comments")?,
        created_at: timestamp_column(row, "created_at")?,
    })
}

impl SqlEntityStore {
    async fn fetch_provider(&self, id: &ProviderId) -> Result<Option<Provider>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, contact, address, rating, created_at FROM provider WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let reviews: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM review WHERE provider_id = ? ORDER BY created_at, rowid",
        )
        .bind(&id.0)
        .fetch_all(self.pool())
        .await?;

        Ok(Some(Provider {
            id: ProviderId(column(&row, "id")?),
            name: column(&row, "name")?,
            contact: column(&row, "contact")?,
            address: column(&row, "address")?,
            rating: column(&row, "rating")?,
            reviews: reviews.into_iter().map(ReviewId).collect(),
            created_at: timestamp_column(&row, "created_at")?,
        }))
    }

    async fn upsert_provider<'e, E>(executor: E, provider: &Provider) -> Result<(), RepositoryError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            "INSERT INTO provider (id, name, contact, address, rating, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 contact = excluded.contact,
                 address = excluded.address,
                 rating = excluded.rating",
        )
        .bind(&provider.id.0)
        .bind(&provider.name)
        .bind(&provider.contact)
        .bind(&provider.address)
        .bind(provider.rating)
        .bind(provider.created_at.to_rfc3339())
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProviderStore for SqlEntityStore {
    async fn get_provider(&self, id: &ProviderId) -> Result<Option<Provider>, StoreError> {
        Ok(self.fetch_provider(id).await?)
    }

    /// The review list is derived from the `review` table and is not written here.
    async fn put_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        Ok(Self::upsert_provider(self.pool(), provider).await?)
    }
}

#[async_trait]
impl ReviewStore for SqlEntityStore {
    async fn list_reviews_by_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<Review>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, provider_id, householder_id, service_id, rating, comments, created_at
             FROM review WHERE provider_id = ? ORDER BY created_at, rowid",
        )
        .bind(&provider_id.0)
        .fetch_all(self.pool())
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_review).collect::<Result<Vec<_>, _>>()?)
    }

    async fn record_review(&self, review: &Review, provider: &Provider) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await.map_err(RepositoryError::from)?;

        sqlx::query(
            "INSERT INTO review (id, provider_id, householder_id, service_id, rating, comments,
                                 created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&review.id.0)
        .bind(&review.provider_id.0)
        .bind(&review.householder_id.0)
        .bind(&review.service_id.0)
        .bind(review.rating)
        .bind(&review.comments)
        .bind(review.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        Self::upsert_provider(&mut *tx, provider).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::debug!(
            event_name = "db.review_recorded",
            review_id = %review.id,
            provider_id = %provider.id,
            "review and provider rating committed"
        );
        Ok(())
    }
}
