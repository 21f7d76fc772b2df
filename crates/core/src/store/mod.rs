//! Entity-store capabilities consumed by the lifecycle engine.
//!
//! Implementations are expected to make `put_request` atomic per request id and
//! `record_review` atomic across the review and the provider it rates.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::householder::{Householder, HouseholderId};
use crate::domain::provider::{Provider, ProviderId};
use crate::domain::request::{RequestId, ServiceRequest};
use crate::domain::review::Review;
use crate::domain::service::Service;

pub mod memory;

pub use memory::InMemoryEntityStore;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("entity store unavailable: {0}")]
    Unavailable(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("version conflict on `{id}`: expected {expected}, found {found:?}")]
    VersionConflict { id: String, expected: u64, found: Option<u64> },
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get_request(&self, id: &RequestId) -> Result<Option<ServiceRequest>, StoreError>;

    /// Persists `request` together with its bids.
    ///
    /// `expected_version` is `None` for a new request, which must not exist yet. Otherwise the
    /// stored version must equal it, or the write fails with `VersionConflict`.
    async fn put_request(
        &self,
        request: &ServiceRequest,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError>;

    async fn list_requests(&self) -> Result<Vec<ServiceRequest>, StoreError>;

    async fn list_requests_by_householder(
        &self,
        householder_id: &HouseholderId,
    ) -> Result<Vec<ServiceRequest>, StoreError>;

    /// Requests carrying a bid from `provider_id`.
    async fn list_requests_by_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<ServiceRequest>, StoreError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_service_by_name(&self, name: &str) -> Result<Option<Service>, StoreError>;
    async fn put_service(&self, service: &Service) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn get_provider(&self, id: &ProviderId) -> Result<Option<Provider>, StoreError>;
    async fn put_provider(&self, provider: &Provider) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn list_reviews_by_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<Review>, StoreError>;

    /// Appends `review` and writes `provider` (carrying the recomputed rating) as one unit.
    async fn record_review(&self, review: &Review, provider: &Provider) -> Result<(), StoreError>;
}

#[async_trait]
pub trait HouseholderStore: Send + Sync {
    async fn get_householder(&self, id: &HouseholderId)
        -> Result<Option<Householder>, StoreError>;
    async fn put_householder(&self, householder: &Householder) -> Result<(), StoreError>;
}

pub trait EntityStore:
    RequestStore + CatalogStore + ProviderStore + ReviewStore + HouseholderStore
{
}

impl<T> EntityStore for T where
    T: RequestStore + CatalogStore + ProviderStore + ReviewStore + HouseholderStore
{
}

/// Stable listing order shared by every store: oldest request first.
pub fn sort_requests(requests: &mut [ServiceRequest]) {
    requests.sort_by(|left, right| {
        left.requested_time.cmp(&right.requested_time).then_with(|| left.id.0.cmp(&right.id.0))
    });
}
