//! Bridge header aggregate root.

use super::{BridgeDomainError, BridgeEventState, BridgeId, BridgeStatus, SystemName};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Lifecycle report sent by the interface translator serving a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReport {
    /// System that sent the report.
    pub requester: SystemName,
    /// Reported bridge.
    pub bridge_id: BridgeId,
    /// When the reported event happened.
    pub timestamp: DateTime<Utc>,
    /// Reported event.
    pub state: BridgeEventState,
    /// Error description accompanying the event, if any.
    pub error_message: Option<String>,
}

/// Root of the bridge aggregate; one per bridge attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeHeader {
    id: i64,
    bridge_id: BridgeId,
    created_by: SystemName,
    status: BridgeStatus,
    message: Option<String>,
    usage_report_count: u64,
    alive_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted bridge header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedBridgeHeaderData {
    /// Persisted surrogate key.
    pub id: i64,
    /// Persisted bridge identifier.
    pub bridge_id: BridgeId,
    /// Persisted creator.
    pub created_by: SystemName,
    /// Persisted status.
    pub status: BridgeStatus,
    /// Persisted message.
    pub message: Option<String>,
    /// Persisted usage counter.
    pub usage_report_count: u64,
    /// Persisted liveness timestamp.
    pub alive_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl BridgeHeader {
    /// Creates a header in [`BridgeStatus::New`].
    ///
    /// The surrogate key stays `0` until the store assigns one with
    /// [`BridgeHeader::with_id`].
    #[must_use]
    pub fn new(bridge_id: BridgeId, created_by: SystemName, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: 0,
            bridge_id,
            created_by,
            status: BridgeStatus::New,
            message: None,
            usage_report_count: 0,
            alive_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a header from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedBridgeHeaderData) -> Self {
        Self {
            id: data.id,
            bridge_id: data.bridge_id,
            created_by: data.created_by,
            status: data.status,
            message: data.message,
            usage_report_count: data.usage_report_count,
            alive_at: data.alive_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Sets the store-assigned surrogate key.
    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Returns the surrogate key; it grows with creation order.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Returns the bridge identifier.
    #[must_use]
    pub const fn bridge_id(&self) -> BridgeId {
        self.bridge_id
    }

    /// Returns the system that created the bridge.
    #[must_use]
    pub const fn created_by(&self) -> &SystemName {
        &self.created_by
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> BridgeStatus {
        self.status
    }

    /// Returns the last error or closure reason.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns how many usage reports were accepted.
    #[must_use]
    pub const fn usage_report_count(&self) -> u64 {
        self.usage_report_count
    }

    /// Returns the last liveness timestamp.
    #[must_use]
    pub const fn alive_at(&self) -> Option<DateTime<Utc>> {
        self.alive_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Checks that the header may move to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidTransition`] when it may not.
    pub const fn ensure_transition(&self, target: BridgeStatus) -> Result<(), BridgeDomainError> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(BridgeDomainError::InvalidTransition {
                from: self.status,
                to: target,
            })
        }
    }

    /// Moves the header to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidTransition`] and leaves the header
    /// unchanged when the transition is not permitted.
    pub fn transition_to(
        &mut self,
        target: BridgeStatus,
        clock: &impl Clock,
    ) -> Result<(), BridgeDomainError> {
        self.ensure_transition(target)?;
        self.status = target;
        self.touch(clock);
        Ok(())
    }

    /// Moves the header to `target` and records `message`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidTransition`] when the transition is
    /// not permitted.
    pub fn transition_with_message(
        &mut self,
        target: BridgeStatus,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), BridgeDomainError> {
        self.transition_to(target, clock)?;
        self.message = Some(message.into());
        Ok(())
    }

    /// Applies a translator report.
    ///
    /// Only active bridges accept reports. A `USED` report increments the usage
    /// counter; every accepted report refreshes the liveness timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidTransition`] when the bridge is not
    /// active or the reported state is not reachable from the current one.
    pub fn apply_report(
        &mut self,
        report: &BridgeReport,
        clock: &impl Clock,
    ) -> Result<(), BridgeDomainError> {
        let target = report.state.bridge_status();
        if !self.status.is_active() {
            return Err(BridgeDomainError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.transition_to(target, clock)?;
        self.alive_at = Some(report.timestamp);
        if target == BridgeStatus::Used {
            self.usage_report_count = self.usage_report_count.saturating_add(1);
        }
        if let Some(message) = &report.error_message {
            self.message = Some(message.clone());
        }
        Ok(())
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
