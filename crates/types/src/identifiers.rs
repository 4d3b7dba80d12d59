//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a consensus node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ValidatorId(pub u64);

impl ValidatorId {
    /// Raw numeric identity.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ValidatorId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validator-{}", self.0)
    }
}
