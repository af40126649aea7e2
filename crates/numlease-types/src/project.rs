//! Catalog entries: what a verification code is for, and what it costs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ProjectId;

/// A project in the price catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Amount reserved per lease. Never negative.
    pub unit_price: Decimal,
}

impl Project {
    #[must_use]
    pub fn new(id: impl Into<ProjectId>, name: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
        }
    }
}
