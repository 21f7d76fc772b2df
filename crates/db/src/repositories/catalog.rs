use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use homeserve_core::store::{CatalogStore, StoreError};
use homeserve_core::{Service, ServiceId};

use super::{column, decimal_column, flag_column, RepositoryError, SqlEntityStore};

fn row_to_service(row: &SqliteRow) -> Result<Service, RepositoryError> {
    Ok(Service {
        id: ServiceId(column(row, "id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        base_price: decimal_column(row, "base_price")?,
        custom: flag_column(row, "custom")?,
    })
}

#[async_trait]
impl CatalogStore for SqlEntityStore {
    async fn get_service_by_name(&self, name: &str) -> Result<Option<Service>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, description, base_price, custom FROM service WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(ref row) => Ok(Some(row_to_service(row)?)),
            None => Ok(None),
        }
    }

    async fn put_service(&self, service: &Service) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO service (id, name, description, base_price, custom)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 base_price = excluded.base_price,
                 custom = excluded.custom",
        )
        .bind(&service.id.0)
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.base_price.to_string())
        .bind(service.custom)
        .execute(self.pool())
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }
}
