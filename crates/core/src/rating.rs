//! Provider rating aggregation.
//!
//! The rating is recomputed from the complete review set inside a per-provider critical
//! section; it is never updated incrementally.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::householder::HouseholderId;
use crate::domain::provider::ProviderId;
use crate::domain::review::{rating_in_range, Review, ReviewId, MAX_RATING, MIN_RATING};
use crate::domain::service::ServiceId;
use crate::errors::LifecycleError;
use crate::locks::KeyedLocks;
use crate::store::{HouseholderStore, ProviderStore, ReviewStore};

/// Input for a single review submission.
#[derive(Clone, Debug, PartialEq)]
pub struct NewReview {
    pub provider_id: ProviderId,
    pub householder_id: HouseholderId,
    pub service_id: ServiceId,
    pub comments: String,
    pub rating: f64,
}

pub struct RatingAggregator<S> {
    store: Arc<S>,
    provider_locks: KeyedLocks,
}

impl<S> RatingAggregator<S>
where
    S: ProviderStore + ReviewStore + HouseholderStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store, provider_locks: KeyedLocks::new() }
    }

    pub async fn add_review(&self, input: NewReview) -> Result<Review, LifecycleError> {
        const OPERATION: &str = "add_review";

        if !rating_in_range(input.rating) {
            return Err(LifecycleError::InvalidArgument(format!(
                "rating {} is outside {MIN_RATING}..={MAX_RATING}",
                input.rating
            )));
        }

        self.store
            .get_householder(&input.householder_id)
            .await
            .map_err(|error| LifecycleError::store(OPERATION, error))?
            .ok_or_else(|| LifecycleError::not_found("householder", &input.householder_id))?;

        let _guard = self.provider_locks.lock(&input.provider_id.0).await;

        let mut provider = self
            .store
            .get_provider(&input.provider_id)
            .await
            .map_err(|error| LifecycleError::store(OPERATION, error))?
            .ok_or_else(|| LifecycleError::not_found("provider", &input.provider_id))?;

        let mut reviews = self
            .store
            .list_reviews_by_provider(&provider.id)
            .await
            .map_err(|error| LifecycleError::store(OPERATION, error))?;

        let review = Review {
            id: ReviewId::generate(),
            provider_id: provider.id.clone(),
            householder_id: input.householder_id,
            service_id: input.service_id,
            rating: input.rating,
            comments: input.comments,
            created_at: Utc::now(),
        };
        reviews.push(review.clone());

        // Non-empty after the push, so the mean always exists.
        provider.rating = mean_rating(&reviews).unwrap_or(review.rating);
        provider.reviews = reviews.iter().map(|review| review.id.clone()).collect();

        self.store
            .record_review(&review, &provider)
            .await
            .map_err(|error| LifecycleError::store(OPERATION, error))?;

        info!(
            event_name = "rating.recomputed",
            provider_id = %provider.id,
            review_id = %review.id,
            review_count = reviews.len(),
            rating = provider.rating,
            "provider rating recomputed"
        );

        Ok(review)
    }
}

/// Arithmetic mean of the given reviews, `None` for an empty set.
pub fn mean_rating(reviews: &[Review]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let total: f64 = reviews.iter().map(|review| review.rating).sum();
    Some(total / reviews.len() as f64)
}
