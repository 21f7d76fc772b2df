use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::householder::HouseholderId;
use crate::domain::provider::ProviderId;
use crate::domain::service::ServiceId;

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewId(pub String);

impl ReviewId {
    pub fn generate() -> Self {
        Self(format!("REV-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub provider_id: ProviderId,
    pub householder_id: HouseholderId,
    pub service_id: ServiceId,
    pub rating: f64,
    pub comments: String,
    pub created_at: DateTime<Utc>,
}

pub fn rating_in_range(rating: f64) -> bool {
    rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating)
}

#[cfg(test)]
mod tests {
    use super::rating_in_range;

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(rating_in_range(1.0));
        assert!(rating_in_range(3.5));
        assert!(rating_in_range(5.0));
        assert!(!rating_in_range(0.99));
        assert!(!rating_in_range(6.0));
        assert!(!rating_in_range(f64::NAN));
    }
}
