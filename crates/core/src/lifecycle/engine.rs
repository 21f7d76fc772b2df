use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::authz::{ActorRole, AuthorizationGuard};
use crate::bids::ProviderBid;
use crate::config::LifecycleConfig;
use crate::domain::householder::HouseholderId;
use crate::domain::provider::{Provider, ProviderId};
use crate::domain::request::{RequestId, ServiceRequest};
use crate::domain::review::Review;
use crate::domain::service::Service;
use crate::errors::LifecycleError;
use crate::lifecycle::transitions::TransitionOutcome;
use crate::locks::KeyedLocks;
use crate::matching::{AnyProvider, ProviderMatcher};
use crate::rating::{NewReview, RatingAggregator};
use crate::store::EntityStore;

/// What a successful mutation did, for logging and audit.
struct Applied {
    outcome: TransitionOutcome,
    details: Vec<(&'static str, String)>,
}

impl Applied {
    fn new(outcome: TransitionOutcome) -> Self {
        Self { outcome, details: Vec::new() }
    }

    fn with_detail(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.details.push((key, value.into()));
        self
    }
}

/// Drives a service request from creation through bidding, approval and cancellation.
///
/// Every mutation of a request runs inside that request's exclusive section: load, authorize,
/// apply the transition to a copy, check invariants, then write back with the version the copy
/// was read at. A rejected operation never writes.
pub struct LifecycleEngine<S> {
    pub(crate) store: Arc<S>,
    request_locks: KeyedLocks,
    catalog_locks: KeyedLocks,
    ratings: RatingAggregator<S>,
    pub(crate) matcher: Arc<dyn ProviderMatcher>,
    audit: Arc<dyn AuditSink>,
    config: LifecycleConfig,
}

impl<S> LifecycleEngine<S>
where
    S: EntityStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            ratings: RatingAggregator::new(Arc::clone(&store)),
            store,
            request_locks: KeyedLocks::new(),
            catalog_locks: KeyedLocks::new(),
            matcher: Arc::new(AnyProvider),
            audit: Arc::new(TracingAuditSink),
            config: LifecycleConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn ProviderMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Creates a `Pending` request for `service_name`, synthesizing a custom catalog entry
    /// when none matches.
    pub async fn request_service(
        &self,
        householder_id: &HouseholderId,
        service_name: &str,
        scheduled_time: DateTime<Utc>,
    ) -> Result<RequestId, LifecycleError> {
        const OPERATION: &str = "request_service";

        let service_name = service_name.trim();
        if service_name.is_empty() {
            return Err(LifecycleError::InvalidArgument("service name must not be empty".into()));
        }

        let householder = self
            .store
            .get_householder(householder_id)
            .await
            .map_err(|error| LifecycleError::store(OPERATION, error))?
            .ok_or_else(|| LifecycleError::not_found("householder", householder_id))?;

        let service = self.resolve_service(service_name).await?;
        let request = ServiceRequest::new(&householder, &service, scheduled_time);

        self.store
            .put_request(&request, None)
            .await
            .map_err(|error| LifecycleError::store(OPERATION, error))?;

        info!(
            event_name = "lifecycle.request_created",
            request_id = %request.id,
            actor_id = %householder_id,
            service_id = %service.id,
            custom_service = service.custom,
            "service request created"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(request.id.clone()),
                Uuid::new_v4().to_string(),
                "lifecycle.request_created",
                AuditCategory::Lifecycle,
                householder_id.0.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("service_name", service.name.clone())
            .with_metadata("scheduled_time", scheduled_time.to_rfc3339()),
        );

        Ok(request.id)
    }

    /// Appends a bid from `provider_id`. The first bid moves the request to `Accepted`.
    pub async fn accept(
        &self,
        provider_id: &ProviderId,
        request_id: &RequestId,
        estimated_price: Decimal,
    ) -> Result<ServiceRequest, LifecycleError> {
        const OPERATION: &str = "accept";

        if estimated_price < Decimal::ZERO {
            return Err(LifecycleError::InvalidArgument(format!(
                "estimated price {estimated_price} must not be negative"
            )));
        }
        let provider = self.load_provider(OPERATION, provider_id).await?;
        let matcher = Arc::clone(&self.matcher);

        self.mutate(OPERATION, request_id, &provider_id.0, move |request| {
            AuthorizationGuard::provider(&provider.id, request, ActorRole::Provider, OPERATION)?;
            if !matcher.is_eligible(&provider, request) {
                return Err(LifecycleError::Forbidden {
                    actor: provider.id.0.clone(),
                    operation: OPERATION,
                    request_id: request.id.0.clone(),
                });
            }

            let bid = ProviderBid::from_provider(&provider, estimated_price);
            let outcome = request
                .place_bid(bid)
                .map_err(|error| LifecycleError::from_domain(OPERATION, &request.id, error))?;
            Ok(Applied::new(outcome)
                .with_detail("provider_id", provider.id.0.clone())
                .with_detail("estimated_price", estimated_price.to_string())
                .with_detail("bid_count", request.bids.len().to_string()))
        })
        .await
    }

    /// Declines a request that has no bids yet. Competing bids are never removed.
    pub async fn decline(
        &self,
        provider_id: &ProviderId,
        request_id: &RequestId,
    ) -> Result<ServiceRequest, LifecycleError> {
        const OPERATION: &str = "decline";

        let provider = self.load_provider(OPERATION, provider_id).await?;
        self.mutate(OPERATION, request_id, &provider_id.0, move |request| {
            AuthorizationGuard::provider(&provider.id, request, ActorRole::Provider, OPERATION)?;
            let outcome = request
                .decline()
                .map_err(|error| LifecycleError::from_domain(OPERATION, &request.id, error))?;
            Ok(Applied::new(outcome).with_detail("provider_id", provider.id.0.clone()))
        })
        .await
    }

    /// Selects the bid of `provider_id`, closing the bidding phase.
    pub async fn approve(
        &self,
        householder_id: &HouseholderId,
        request_id: &RequestId,
        provider_id: &ProviderId,
    ) -> Result<ServiceRequest, LifecycleError> {
        const OPERATION: &str = "approve";

        self.mutate(OPERATION, request_id, &householder_id.0, |request| {
            AuthorizationGuard::householder(householder_id, request, OPERATION)?;
            let outcome = request
                .approve(provider_id)
                .map_err(|error| LifecycleError::from_domain(OPERATION, &request.id, error))?;
            Ok(Applied::new(outcome).with_detail("provider_id", provider_id.0.clone()))
        })
        .await
    }

    /// Cancels a request that has bids but no approval yet.
    pub async fn cancel(
        &self,
        householder_id: &HouseholderId,
        request_id: &RequestId,
    ) -> Result<ServiceRequest, LifecycleError> {
        const OPERATION: &str = "cancel";

        self.mutate(OPERATION, request_id, &householder_id.0, |request| {
            AuthorizationGuard::householder(householder_id, request, OPERATION)?;
            let outcome = request
                .cancel()
                .map_err(|error| LifecycleError::from_domain(OPERATION, &request.id, error))?;
            Ok(Applied::new(outcome))
        })
        .await
    }

    /// Aborts an already approved engagement.
    pub async fn cancel_approved(
        &self,
        householder_id: &HouseholderId,
        request_id: &RequestId,
    ) -> Result<ServiceRequest, LifecycleError> {
        const OPERATION: &str = "cancel_approved";

        self.mutate(OPERATION, request_id, &householder_id.0, |request| {
            AuthorizationGuard::householder(householder_id, request, OPERATION)?;
            let (outcome, previous) = request
                .cancel_approved()
                .map_err(|error| LifecycleError::from_domain(OPERATION, &request.id, error))?;
            let applied = Applied::new(outcome);
            Ok(match previous {
                Some(provider_id) => applied.with_detail("withdrawn_provider_id", provider_id.0),
                None => applied,
            })
        })
        .await
    }

    /// Moves the scheduled time of a request that is still open for bids.
    pub async fn reschedule(
        &self,
        householder_id: &HouseholderId,
        request_id: &RequestId,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ServiceRequest, LifecycleError> {
        const OPERATION: &str = "reschedule";

        self.mutate(OPERATION, request_id, &householder_id.0, |request| {
            AuthorizationGuard::householder(householder_id, request, OPERATION)?;
            let previous = request.scheduled_time;
            let outcome = request
                .reschedule(scheduled_time)
                .map_err(|error| LifecycleError::from_domain(OPERATION, &request.id, error))?;
            Ok(Applied::new(outcome)
                .with_detail("previous_time", previous.to_rfc3339())
                .with_detail("scheduled_time", scheduled_time.to_rfc3339()))
        })
        .await
    }

    /// Records a review and recomputes the provider's aggregate rating.
    pub async fn add_review(&self, input: NewReview) -> Result<Review, LifecycleError> {
        let actor = input.householder_id.0.clone();
        let provider_id = input.provider_id.0.clone();
        let result = self.ratings.add_review(input).await;

        let outcome = match &result {
            Ok(_) => AuditOutcome::Success,
            Err(error) => {
                warn!(
                    event_name = "rating.review_rejected",
                    provider_id = %provider_id,
                    actor_id = %actor,
                    error_kind = ?error.kind(),
                    error = %error,
                    "review rejected"
                );
                AuditOutcome::Rejected
            }
        };
        let mut event = AuditEvent::new(
            None,
            Uuid::new_v4().to_string(),
            "rating.review_added",
            AuditCategory::Rating,
            actor,
            outcome,
        )
        .with_metadata("provider_id", provider_id);
        match &result {
            Ok(review) => event = event.with_metadata("review_id", review.id.0.clone()),
            Err(error) => event = event.with_metadata("error", error.to_string()),
        }
        self.audit.emit(event);

        result
    }

    async fn resolve_service(&self, service_name: &str) -> Result<Service, LifecycleError> {
        const OPERATION: &str = "request_service";

        let _guard = self.catalog_locks.lock(service_name).await;
        let existing = self
            .store
            .get_service_by_name(service_name)
            .await
            .map_err(|error| LifecycleError::store(OPERATION, error))?;
        if let Some(service) = existing {
            return Ok(service);
        }

        if !self.config.allow_custom_services {
            return Err(LifecycleError::not_found("service", service_name));
        }

        let service = Service::custom(service_name, &self.config.custom_service_label);
        self.store
            .put_service(&service)
            .await
            .map_err(|error| LifecycleError::store(OPERATION, error))?;
        info!(
            event_name = "catalog.custom_service_created",
            service_id = %service.id,
            service_name = %service.name,
            "custom service synthesized"
        );
        self.audit.emit(
            AuditEvent::new(
                None,
                Uuid::new_v4().to_string(),
                "catalog.custom_service_created",
                AuditCategory::Catalog,
                "lifecycle-engine",
                AuditOutcome::Success,
            )
            .with_metadata("service_id", service.id.0.clone())
            .with_metadata("service_name", service.name.clone()),
        );
        Ok(service)
    }

    pub(crate) async fn load_provider(
        &self,
        operation: &'static str,
        provider_id: &ProviderId,
    ) -> Result<Provider, LifecycleError> {
        self.store
            .get_provider(provider_id)
            .await
            .map_err(|error| LifecycleError::store(operation, error))?
            .ok_or_else(|| LifecycleError::not_found("provider", provider_id))
    }

    async fn mutate<F>(
        &self,
        operation: &'static str,
        request_id: &RequestId,
        actor: &str,
        change: F,
    ) -> Result<ServiceRequest, LifecycleError>
    where
        F: FnOnce(&mut ServiceRequest) -> Result<Applied, LifecycleError> + Send,
    {
        let correlation_id = Uuid::new_v4().to_string();
        let result = self.apply_locked(operation, request_id, change).await;

        match &result {
            Ok((request, applied)) => {
                info!(
                    event_name = "lifecycle.transition_applied",
                    operation,
                    request_id = %request_id,
                    actor_id = %actor,
                    correlation_id = %correlation_id,
                    from = ?applied.outcome.from,
                    to = ?applied.outcome.to,
                    version = request.version,
                    "request transition applied"
                );
                let mut event = AuditEvent::new(
                    Some(request_id.clone()),
                    correlation_id,
                    format!("lifecycle.{operation}"),
                    AuditCategory::Lifecycle,
                    actor,
                    AuditOutcome::Success,
                )
                .with_metadata("from", format!("{:?}", applied.outcome.from))
                .with_metadata("to", format!("{:?}", applied.outcome.to))
                .with_metadata("event", applied.outcome.event.as_str());
                for (key, value) in &applied.details {
                    event = event.with_metadata(*key, value.clone());
                }
                self.audit.emit(event);
            }
            Err(error) => {
                warn!(
                    event_name = "lifecycle.transition_rejected",
                    operation,
                    request_id = %request_id,
                    actor_id = %actor,
                    correlation_id = %correlation_id,
                    error_kind = ?error.kind(),
                    error = %error,
                    "request transition rejected"
                );
                let outcome = match error {
                    LifecycleError::Store { .. } => AuditOutcome::Failed,
                    _ => AuditOutcome::Rejected,
                };
                self.audit.emit(
                    AuditEvent::new(
                        Some(request_id.clone()),
                        correlation_id,
                        format!("lifecycle.{operation}"),
                        AuditCategory::Lifecycle,
                        actor,
                        outcome,
                    )
                    .with_metadata("error_kind", format!("{:?}", error.kind()))
                    .with_metadata("error", error.to_string()),
                );
            }
        }

        result.map(|(request, _)| request)
    }

    async fn apply_locked<F>(
        &self,
        operation: &'static str,
        request_id: &RequestId,
        change: F,
    ) -> Result<(ServiceRequest, Applied), LifecycleError>
    where
        F: FnOnce(&mut ServiceRequest) -> Result<Applied, LifecycleError> + Send,
    {
        let _guard = self.request_locks.lock(&request_id.0).await;

        let current = self
            .store
            .get_request(request_id)
            .await
            .map_err(|error| LifecycleError::store(operation, error))?
            .ok_or_else(|| LifecycleError::not_found("request", request_id))?;

        let mut next = current.clone();
        let applied = change(&mut next)?;
        next.check_invariants()
            .map_err(|error| LifecycleError::from_domain(operation, request_id, error))?;

        next.version = current.version + 1;
        self.store
            .put_request(&next, Some(current.version))
            .await
            .map_err(|error| LifecycleError::store(operation, error))?;

        Ok((next, applied))
    }
}
