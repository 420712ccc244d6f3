//! Per-discovery security check switches.

use serde::{Deserialize, Serialize};

/// Which blacklist and authorization checks a discovery runs.
///
/// Missing flags deserialize as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DiscoveryFlags {
    /// Reject blacklisted consumers.
    pub consumer_blacklist_check: bool,
    /// Drop blacklisted target providers.
    pub candidates_blacklist_check: bool,
    /// Drop target providers the consumer may not call.
    pub candidates_auth_check: bool,
    /// Drop blacklisted translators.
    pub translators_blacklist_check: bool,
    /// Drop data model translators the interface translator may not call.
    pub translators_auth_check: bool,
}

impl DiscoveryFlags {
    /// Flags derived solely from the system-wide settings.
    #[must_use]
    pub const fn system_defaults(blacklist_enabled: bool, authorization_enabled: bool) -> Self {
        Self {
            consumer_blacklist_check: blacklist_enabled,
            candidates_blacklist_check: blacklist_enabled,
            candidates_auth_check: authorization_enabled,
            translators_blacklist_check: blacklist_enabled,
            translators_auth_check: authorization_enabled,
        }
    }

    /// Requested flags, each capped by the corresponding system-wide setting.
    #[must_use]
    pub const fn restricted_to(self, blacklist_enabled: bool, authorization_enabled: bool) -> Self {
        Self {
            consumer_blacklist_check: self.consumer_blacklist_check && blacklist_enabled,
            candidates_blacklist_check: self.candidates_blacklist_check && blacklist_enabled,
            candidates_auth_check: self.candidates_auth_check && authorization_enabled,
            translators_blacklist_check: self.translators_blacklist_check && blacklist_enabled,
            translators_auth_check: self.translators_auth_check && authorization_enabled,
        }
    }
}
