use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Zero-based, contiguous identifier of a training client.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl ClientId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for ClientId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ClientId> for u32 {
    fn from(value: ClientId) -> Self {
        value.0
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
