use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::householder::{Householder, HouseholderId};
use crate::domain::provider::{Provider, ProviderId};
use crate::domain::request::{RequestId, ServiceRequest};
use crate::domain::review::Review;
use crate::domain::service::Service;

use super::{
    sort_requests, CatalogStore, HouseholderStore, ProviderStore, RequestStore, ReviewStore,
    StoreError,
};

#[derive(Default)]
pub struct InMemoryEntityStore {
    requests: RwLock<HashMap<String, ServiceRequest>>,
    services: RwLock<HashMap<String, Service>>,
    providers: RwLock<HashMap<String, Provider>>,
    reviews: RwLock<Vec<Review>>,
    householders: RwLock<HashMap<String, Householder>>,
    unavailable: AtomicBool,
}

impl InMemoryEntityStore {
    /// Simulates a collaborator outage: while set, every write fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    async fn collect_requests<F>(&self, filter: F) -> Vec<ServiceRequest>
    where
        F: Fn(&ServiceRequest) -> bool,
    {
        let requests = self.requests.read().await;
        let mut matching: Vec<_> =
            requests.values().filter(|request| filter(request)).cloned().collect();
        sort_requests(&mut matching);
        matching
    }
}

#[async_trait]
impl RequestStore for InMemoryEntityStore {
    async fn get_request(&self, id: &RequestId) -> Result<Option<ServiceRequest>, StoreError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn put_request(
        &self,
        request: &ServiceRequest,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut requests = self.requests.write().await;
        let found = requests.get(&request.id.0).map(|stored| stored.version);
        if found != expected_version {
            return Err(StoreError::VersionConflict {
                id: request.id.0.clone(),
                expected: expected_version.unwrap_or(0),
                found,
            });
        }
        requests.insert(request.id.0.clone(), request.clone());
        Ok(())
    }

    async fn list_requests(&self) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(self.collect_requests(|_| true).await)
    }

    async fn list_requests_by_householder(
        &self,
        householder_id: &HouseholderId,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(self.collect_requests(|request| &request.householder_id == householder_id).await)
    }

    async fn list_requests_by_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(self.collect_requests(|request| request.bids.contains(provider_id)).await)
    }
}

#[async_trait]
impl CatalogStore for InMemoryEntityStore {
    async fn get_service_by_name(&self, name: &str) -> Result<Option<Service>, StoreError> {
        let services = self.services.read().await;
        Ok(services.values().find(|service| service.name == name).cloned())
    }

    async fn put_service(&self, service: &Service) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut services = self.services.write().await;
        services.insert(service.id.0.clone(), service.clone());
        Ok(())
    }
}

#[async_trait]
impl ProviderStore for InMemoryEntityStore {
    async fn get_provider(&self, id: &ProviderId) -> Result<Option<Provider>, StoreError> {
        let providers = self.providers.read().await;
        Ok(providers.get(&id.0).cloned())
    }

    async fn put_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut providers = self.providers.write().await;
        providers.insert(provider.id.0.clone(), provider.clone());
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for InMemoryEntityStore {
    async fn list_reviews_by_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<Review>, StoreError> {
        let reviews = self.reviews.read().await;
        Ok(reviews.iter().filter(|review| &review.provider_id == provider_id).cloned().collect())
    }

    async fn record_review(&self, review: &Review, provider: &Provider) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut reviews = self.reviews.write().await;
        let mut providers = self.providers.write().await;
        reviews.push(review.clone());
        providers.insert(provider.id.0.clone(), provider.clone());
        Ok(())
    }
}

#[async_trait]
impl HouseholderStore for InMemoryEntityStore {
    async fn get_householder(
        &self,
        id: &HouseholderId,
    ) -> Result<Option<Householder>, StoreError> {
        let householders = self.householders.read().await;
        Ok(householders.get(&id.0).cloned())
    }

    async fn put_householder(&self, householder: &Householder) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut householders = self.householders.write().await;
        householders.insert(householder.id.0.clone(), householder.clone());
        Ok(())
    }
}
