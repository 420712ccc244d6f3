//! Matchmaking port used to break ties between equally qualified translators.

use crate::bridge::domain::ServiceInstance;
use serde_json::{Map, Value};

/// Picks one service instance out of equally qualified candidates.
#[cfg_attr(test, mockall::automock)]
pub trait Matchmaker: Send + Sync {
    /// Returns one element of `candidates`, or `None` when it is empty.
    fn select(
        &self,
        candidates: &[ServiceInstance],
        context: &Map<String, Value>,
    ) -> Option<ServiceInstance>;
}
