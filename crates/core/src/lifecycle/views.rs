use crate::authz::{ActorRole, AuthorizationGuard};
use crate::domain::householder::HouseholderId;
use crate::domain::provider::ProviderId;
use crate::domain::request::{RequestId, RequestStatus, ServiceRequest};
use crate::errors::LifecycleError;
use crate::lifecycle::engine::LifecycleEngine;
use crate::store::EntityStore;

impl<S> LifecycleEngine<S>
where
    S: EntityStore,
{
    pub async fn view_request(
        &self,
        request_id: &RequestId,
    ) -> Result<ServiceRequest, LifecycleError> {
        self.store
            .get_request(request_id)
            .await
            .map_err(|error| LifecycleError::store("view_request", error))?
            .ok_or_else(|| LifecycleError::not_found("request", request_id))
    }

    /// Every request the householder has made, oldest first.
    pub async fn view_status(
        &self,
        householder_id: &HouseholderId,
    ) -> Result<Vec<ServiceRequest>, LifecycleError> {
        self.householder_requests("view_status", householder_id).await
    }

    pub async fn view_approved_requests(
        &self,
        householder_id: &HouseholderId,
    ) -> Result<Vec<ServiceRequest>, LifecycleError> {
        let mut requests =
            self.householder_requests("view_approved_requests", householder_id).await?;
        requests.retain(|request| request.status == RequestStatus::Approved);
        Ok(requests)
    }

    /// Every request `provider_id` has bid on, oldest first.
    pub async fn view_provider_requests(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<ServiceRequest>, LifecycleError> {
        self.provider_requests("view_provider_requests", provider_id).await
    }

    /// Approved requests whose selected bid belongs to `provider_id`.
    pub async fn view_approved_requests_by_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<ServiceRequest>, LifecycleError> {
        let mut requests =
            self.provider_requests("view_approved_requests_by_provider", provider_id).await?;
        requests.retain(|request| {
            request.status == RequestStatus::Approved
                && request.bids.approved().is_some_and(|bid| &bid.provider_id == provider_id)
        });
        Ok(requests)
    }

    /// Requests still open for bidding that `provider_id` has not bid on and is eligible for.
    pub async fn view_open_requests(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<ServiceRequest>, LifecycleError> {
        const OPERATION: &str = "view_open_requests";

        let provider = self.load_provider(OPERATION, provider_id).await?;
        let mut requests = self
            .store
            .list_requests()
            .await
            .map_err(|error| LifecycleError::store(OPERATION, error))?;
        requests.retain(|request| {
            request.status.is_open()
                && !request.bids.contains(provider_id)
                && self.matcher.is_eligible(&provider, request)
        });
        Ok(requests)
    }

    pub async fn get_all_service_requests(&self) -> Result<Vec<ServiceRequest>, LifecycleError> {
        self.store
            .list_requests()
            .await
            .map_err(|error| LifecycleError::store("get_all_service_requests", error))
    }

    async fn householder_requests(
        &self,
        operation: &'static str,
        householder_id: &HouseholderId,
    ) -> Result<Vec<ServiceRequest>, LifecycleError> {
        self.store
            .get_householder(householder_id)
            .await
            .map_err(|error| LifecycleError::store(operation, error))?
            .ok_or_else(|| LifecycleError::not_found("householder", householder_id))?;

        self.store
            .list_requests_by_householder(householder_id)
            .await
            .map_err(|error| LifecycleError::store(operation, error))
    }

    async fn provider_requests(
        &self,
        operation: &'static str,
        provider_id: &ProviderId,
    ) -> Result<Vec<ServiceRequest>, LifecycleError> {
        self.load_provider(operation, provider_id).await?;
        let mut requests = self
            .store
            .list_requests_by_provider(provider_id)
            .await
            .map_err(|error| LifecycleError::store(operation, error))?;
        requests.retain(|request| {
            AuthorizationGuard::provider(provider_id, request, ActorRole::BidOwner, operation)
                .is_ok()
        });
        Ok(requests)
    }
}
