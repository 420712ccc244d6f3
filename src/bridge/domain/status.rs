//! Bridge lifecycle statuses and report event states.

use super::{BridgeDomainError, ParseBridgeStatusError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a translation bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeStatus {
    /// Header created, discovery rows not yet attached.
    New,
    /// Discovery candidates are stored and waiting for negotiation.
    Discovered,
    /// A candidate was selected and the translator is being initialized.
    Pending,
    /// The interface translator accepted the bridge.
    Initialized,
    /// The translator reported at least one use of the bridge.
    Used,
    /// The bridge failed.
    Error,
    /// The bridge was aborted by its creator or an operator.
    Aborted,
    /// The bridge was closed by its translator or by the cleaner.
    Closed,
}

impl BridgeStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::New,
        Self::Discovered,
        Self::Pending,
        Self::Initialized,
        Self::Used,
        Self::Error,
        Self::Aborted,
        Self::Closed,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Discovered => "DISCOVERED",
            Self::Pending => "PENDING",
            Self::Initialized => "INITIALIZED",
            Self::Used => "USED",
            Self::Error => "ERROR",
            Self::Aborted => "ABORTED",
            Self::Closed => "CLOSED",
        }
    }

    /// Returns whether the bridge may receive liveness and usage reports.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Initialized | Self::Used)
    }

    /// Returns whether the status is terminal.
    #[must_use]
    pub const fn is_end(self) -> bool {
        matches!(self, Self::Error | Self::Aborted | Self::Closed)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::New, Self::Discovered | Self::Aborted | Self::Closed)
                | (Self::Discovered, Self::Pending | Self::Aborted | Self::Closed)
                | (Self::Pending, Self::Initialized | Self::Error | Self::Aborted)
                | (
                    Self::Initialized | Self::Used,
                    Self::Used | Self::Error | Self::Aborted | Self::Closed
                )
        )
    }
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for BridgeStatus {
    type Error = ParseBridgeStatusError;

    fn try_from(value: &str) -> Result<Self, ParseBridgeStatusError> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseBridgeStatusError(value.to_owned()))
    }
}

/// State reported by an interface translator about a bridge it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeEventState {
    /// The bridge carried traffic.
    Used,
    /// The bridge failed on the translator side.
    Error,
    /// The translator closed the bridge.
    Closed,
}

impl BridgeEventState {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Used => "USED",
            Self::Error => "ERROR",
            Self::Closed => "CLOSED",
        }
    }

    /// Returns the bridge status this event moves the bridge to.
    #[must_use]
    pub const fn bridge_status(self) -> BridgeStatus {
        match self {
            Self::Used => BridgeStatus::Used,
            Self::Error => BridgeStatus::Error,
            Self::Closed => BridgeStatus::Closed,
        }
    }
}

impl fmt::Display for BridgeEventState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for BridgeEventState {
    type Error = BridgeDomainError;

    fn try_from(value: &str) -> Result<Self, BridgeDomainError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USED" => Ok(Self::Used),
            "ERROR" => Ok(Self::Error),
            "CLOSED" => Ok(Self::Closed),
            _ => Err(BridgeDomainError::UnknownEventState(value.to_owned())),
        }
    }
}
