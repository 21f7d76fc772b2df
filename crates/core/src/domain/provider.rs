use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::review::ReviewId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A service provider that bids on requests and collects reviews.
///
/// `rating` is owned by the rating aggregator: it is always the mean of the full review set
/// attributed to this provider, or `0.0` before the first review. `reviews` is a
/// back-reference list and is never used to recompute the rating on its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub contact: String,
    pub address: String,
    pub rating: f64,
    pub reviews: Vec<ReviewId>,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    pub fn new(
        id: ProviderId,
        name: impl Into<String>,
        contact: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            contact: contact.into(),
            address: address.into(),
            rating: 0.0,
            reviews: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
