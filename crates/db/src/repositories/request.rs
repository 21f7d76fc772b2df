use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use homeserve_core::store::{sort_requests, RequestStore, StoreError};
use homeserve_core::{
    BidRegistry, HouseholderId, ProviderBid, ProviderId, RequestId, RequestStatus, ServiceId,
    ServiceRequest,
};

use super::{
    column, decimal_column, flag_column, timestamp_column, version_from_sql, version_to_sql,
    RepositoryError, SqlEntityStore,
};

const REQUEST_COLUMNS: &str = "id, householder_id, householder_name, householder_address,
    service_id, service_name, requested_time, scheduled_time, status, approve_status, version";

fn row_to_bid(row: &SqliteRow) -> Result<ProviderBid, RepositoryError> {
    Ok(ProviderBid {
        provider_id: ProviderId(column(row, "provider_id")?),
        name: column(row, "name")?,
        contact: column(row, "contact")?,
        address: column(row, "address")?,
        estimated_price: decimal_column(row, "estimated_price")?,
        rating: column(row, "rating")?,
        approved: flag_column(row, "approved")?,
        placed_at: timestamp_column(row, "placed_at")?,
    })
}

fn row_to_request(row: &SqliteRow, bids: BidRegistry) -> Result<ServiceRequest, RepositoryError> {
    let id: String = column(row, "id")?;
    let status: String = column(row, "status")?;
    let status = RequestStatus::from_str(&status)
        .map_err(|e| RepositoryError::Decode(format!("request `{id}`: {e}")))?;
    let version = version_from_sql(&id, column(row, "version")?)?;

    Ok(ServiceRequest {
        householder_id: HouseholderId(column(row, "householder_id")?),
        householder_name: column(row, "householder_name")?,
        householder_address: column(row, "householder_address")?,
        service_id: ServiceId(column(row, "service_id")?),
        service_name: column(row, "service_name")?,
        requested_time: timestamp_column(row, "requested_time")?,
        scheduled_time: timestamp_column(row, "scheduled_time")?,
        status,
        approve_status: flag_column(row, "approve_status")?,
        bids,
        version,
        id: RequestId(id),
    })
}

async fn load_bids(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<BidRegistry, RepositoryError> {
    let rows = sqlx::query(
        "SELECT provider_id, name, contact, address, estimated_price, rating, approved,
                placed_at
         FROM provider_bid WHERE request_id = ? ORDER BY position",
    )
    .bind(request_id)
    .fetch_all(&mut *conn)
    .await?;

    let bids = rows.iter().map(row_to_bid).collect::<Result<Vec<_>, _>>()?;
    Ok(BidRegistry::from_bids(bids))
}

impl SqlEntityStore {
    /// Reads the selected request rows and their bids from one snapshot, so a concurrent
    /// write never pairs a row with bids from another version.
    async fn select_requests(
        &self,
        filter: &str,
        key: Option<&str>,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let sql = format!("SELECT {REQUEST_COLUMNS} FROM service_request {filter}");
        let mut query = sqlx::query(&sql);
        if let Some(key) = key {
            query = query.bind(key);
        }
        let rows = query.fetch_all(&mut *tx).await?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = column(row, "id")?;
            let bids = load_bids(&mut *tx, &id).await?;
            requests.push(row_to_request(row, bids)?);
        }
        tx.commit().await?;

        sort_requests(&mut requests);
        Ok(requests)
    }

    async fn fetch_request(
        &self,
        id: &RequestId,
    ) -> Result<Option<ServiceRequest>, RepositoryError> {
        let mut requests = self.select_requests("WHERE id = ?", Some(&id.0)).await?;
        Ok(requests.pop())
    }

    /// Writes the request row and replaces its bids in one transaction, guarded by the
    /// stored version.
    async fn write_request(
        &self,
        request: &ServiceRequest,
        expected_version: Option<u64>,
    ) -> Result<(), RepositoryError> {
        let id = request.id.0.as_str();
        let version = version_to_sql(id, request.version)?;
        let mut tx = self.pool().begin().await?;

        let found: Option<i64> =
            sqlx::query_scalar("SELECT version FROM service_request WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let found = found.map(|stored| version_from_sql(id, stored)).transpose()?;
        if found != expected_version {
            return Err(RepositoryError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
                found,
            });
        }

        let written = match expected_version {
            None => sqlx::query(
                "INSERT INTO service_request (id, householder_id, householder_name,
                     householder_address, service_id, service_name, requested_time,
                     scheduled_time, status, approve_status, version)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&request.householder_id.0)
            .bind(&request.householder_name)
            .bind(&request.householder_address)
            .bind(&request.service_id.0)
            .bind(&request.service_name)
            .bind(request.requested_time.to_rfc3339())
            .bind(request.scheduled_time.to_rfc3339())
            .bind(request.status.as_str())
            .bind(request.approve_status)
            .bind(version)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
            Some(expected) => sqlx::query(
                "UPDATE service_request
                 SET scheduled_time = ?, status = ?, approve_status = ?, version = ?
                 WHERE id = ? AND version = ?",
            )
            .bind(request.scheduled_time.to_rfc3339())
            .bind(request.status.as_str())
            .bind(request.approve_status)
            .bind(version)
            .bind(id)
            .bind(version_to_sql(id, expected)?)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
        };
        if written != 1 {
            return Err(RepositoryError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
                found,
            });
        }

        sqlx::query("DELETE FROM provider_bid WHERE request_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for (position, bid) in request.bids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO provider_bid (request_id, position, provider_id, name, contact,
                     address, estimated_price, rating, approved, placed_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(&bid.provider_id.0)
            .bind(&bid.name)
            .bind(&bid.contact)
            .bind(&bid.address)
            .bind(bid.estimated_price.to_string())
            .bind(bid.rating)
            .bind(bid.approved)
            .bind(bid.placed_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RequestStore for SqlEntityStore {
    async fn get_request(&self, id: &RequestId) -> Result<Option<ServiceRequest>, StoreError> {
        Ok(self.fetch_request(id).await?)
    }

    async fn put_request(
        &self,
        request: &ServiceRequest,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        Ok(self.write_request(request, expected_version).await?)
    }

    async fn list_requests(&self) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(self.select_requests("", None).await?)
    }

    async fn list_requests_by_householder(
        &self,
        householder_id: &HouseholderId,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(self.select_requests("WHERE householder_id = ?", Some(&householder_id.0)).await?)
    }

    async fn list_requests_by_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        let filter = "WHERE id IN (SELECT request_id FROM provider_bid WHERE provider_id = ?)";
        Ok(self.select_requests(filter, Some(&provider_id.0)).await?)
    }
}
