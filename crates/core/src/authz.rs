//! Ownership checks applied before any lifecycle transition.

use crate::domain::householder::HouseholderId;
use crate::domain::provider::ProviderId;
use crate::domain::request::ServiceRequest;
use crate::errors::LifecycleError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorRole {
    /// Must own the request.
    Householder,
    /// Any provider may act (bidding, declining).
    Provider,
    /// Must own a bid on the request.
    BidOwner,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    pub fn authorize(
        actor_id: &str,
        request: &ServiceRequest,
        role: ActorRole,
        operation: &'static str,
    ) -> Result<(), LifecycleError> {
        let allowed = match role {
            ActorRole::Householder => request.householder_id.0 == actor_id,
            ActorRole::Provider => true,
            ActorRole::BidOwner => request.bids.iter().any(|bid| bid.provider_id.0 == actor_id),
        };

        if allowed {
            return Ok(());
        }

        Err(LifecycleError::Forbidden {
            actor: actor_id.to_string(),
            operation,
            request_id: request.id.0.clone(),
        })
    }

    pub fn householder(
        actor: &HouseholderId,
        request: &ServiceRequest,
        operation: &'static str,
    ) -> Result<(), LifecycleError> {
        Self::authorize(&actor.0, request, ActorRole::Householder, operation)
    }

    pub fn provider(
        actor: &ProviderId,
        request: &ServiceRequest,
        role: ActorRole,
        operation: &'static str,
    ) -> Result<(), LifecycleError> {
        Self::authorize(&actor.0, request, role, operation)
    }
}
