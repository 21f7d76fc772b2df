use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HouseholderId(pub String);

impl fmt::Display for HouseholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Householder {
    pub id: HouseholderId,
    pub name: String,
    pub email: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}
