use async_trait::async_trait;

use homeserve_core::store::{HouseholderStore, StoreError};
use homeserve_core::{Householder, HouseholderId};

use super::{column, timestamp_column, RepositoryError, SqlEntityStore};

#[async_trait]
impl HouseholderStore for SqlEntityStore {
    async fn get_householder(
        &self,
        id: &HouseholderId,
    ) -> Result<Option<Householder>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, email, address, created_at FROM householder WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(self.pool())
        .await
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Householder {
            id: HouseholderId(column(&row, "id")?),
            name: column(&row, "name")?,
            email: column(&row, "email")?,
            address: column(&row, "address")?,
            created_at: timestamp_column(&row, "created_at")?,
        }))
    }

    async fn put_householder(&self, householder: &Householder) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO householder (id, name, email, address, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 address = excluded.address",
        )
        .bind(&householder.id.0)
        .bind(&householder.name)
        .bind(&householder.email)
        .bind(&householder.address)
        .bind(householder.created_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }
}
