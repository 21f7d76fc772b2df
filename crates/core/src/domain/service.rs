use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub String);

impl ServiceId {
    pub fn generate() -> Self {
        Self(format!("SVC-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog entry a request refers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub description: String,
    pub base_price: Decimal,
    /// Set for entries synthesized on demand because the catalog had no match.
    pub custom: bool,
}

impl Service {
    /// Zero-priced catalog entry created when a householder asks for an unknown service.
    pub fn custom(name: impl Into<String>, label: &str) -> Self {
        Self {
            id: ServiceId::generate(),
            name: name.into(),
            description: label.to_string(),
            base_price: Decimal::ZERO,
            custom: true,
        }
    }
}
