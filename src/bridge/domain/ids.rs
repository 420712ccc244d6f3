//! Identifier and validated name types for the bridge domain.
//!
//! Names arrive from remote systems in loosely formatted shapes. Each type
//! here trims and canonicalizes its input and rejects values that do not
//! follow the naming convention of the local cloud.

use super::BridgeDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const MAX_NAME_LENGTH: usize = 63;
const INSTANCE_ID_SEPARATOR: char = '|';

/// Public identifier of a translation bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BridgeId(Uuid);

impl BridgeId {
    /// Creates a new random bridge identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a bridge identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a bridge identifier from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidBridgeId`] when the value is not a
    /// UUID.
    pub fn parse(value: &str) -> Result<Self, BridgeDomainError> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| BridgeDomainError::InvalidBridgeId(value.to_owned()))
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for BridgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Uuid> for BridgeId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Returns the canonical string form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = BridgeDomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = BridgeDomainError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

validated_name!(
    /// Name of a system registered in the local cloud (`PascalCase`).
    SystemName
);

validated_name!(
    /// Name of a service definition (`camelCase`).
    ServiceDefinitionName
);

validated_name!(
    /// Name of a service operation (`kebab-case`).
    OperationName
);

validated_name!(
    /// Name of an interface template (`snake_case`).
    InterfaceTemplateName
);

validated_name!(
    /// Identifier of a payload data model.
    DataModelId
);

validated_name!(
    /// Registry identifier of a service instance, `Provider|serviceDefinition|version`.
    ServiceInstanceId
);

impl SystemName {
    /// Default name of the broker system.
    #[must_use]
    pub fn translation_manager() -> Self {
        Self("TranslationManager".to_owned())
    }

    /// Creates a validated system name.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidSystemName`] when the trimmed value
    /// is empty, too long, or contains anything but ASCII letters and digits
    /// after a leading letter.
    pub fn new(value: impl AsRef<str>) -> Result<Self, BridgeDomainError> {
        let raw = value.as_ref();
        let trimmed = raw.trim();
        let valid = trimmed.len() <= MAX_NAME_LENGTH
            && starts_with(trimmed, |ch| ch.is_ascii_alphabetic())
            && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !valid {
            return Err(BridgeDomainError::InvalidSystemName(raw.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl ServiceDefinitionName {
    /// Creates a validated service definition name.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidServiceDefinition`] when the value
    /// does not start with a lowercase letter or contains non-alphanumeric
    /// characters.
    pub fn new(value: impl AsRef<str>) -> Result<Self, BridgeDomainError> {
        let raw = value.as_ref();
        let trimmed = raw.trim();
        let valid = trimmed.len() <= MAX_NAME_LENGTH
            && starts_with(trimmed, |ch| ch.is_ascii_lowercase())
            && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !valid {
            return Err(BridgeDomainError::InvalidServiceDefinition(raw.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl OperationName {
    /// Creates a validated, lowercased operation name.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidOperation`] when the value is not
    /// kebab-case.
    pub fn new(value: impl AsRef<str>) -> Result<Self, BridgeDomainError> {
        let raw = value.as_ref();
        let normalized = raw.trim().to_ascii_lowercase();
        if !is_separated_lowercase(&normalized, '-') {
            return Err(BridgeDomainError::InvalidOperation(raw.to_owned()));
        }
        Ok(Self(normalized))
    }
}

impl InterfaceTemplateName {
    /// Creates a validated, lowercased interface template name.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidInterfaceTemplate`] when the value
    /// is not snake_case.
    pub fn new(value: impl AsRef<str>) -> Result<Self, BridgeDomainError> {
        let raw = value.as_ref();
        let normalized = raw.trim().to_ascii_lowercase();
        if !is_separated_lowercase(&normalized, '_') {
            return Err(BridgeDomainError::InvalidInterfaceTemplate(raw.to_owned()));
        }
        Ok(Self(normalized))
    }
}

impl DataModelId {
    /// Creates a validated data model identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidDataModelId`] when the value is
    /// empty, too long, or contains characters other than ASCII letters,
    /// digits, `_`, `-` and `.`.
    pub fn new(value: impl AsRef<str>) -> Result<Self, BridgeDomainError> {
        let raw = value.as_ref();
        let trimmed = raw.trim();
        let valid = trimmed.len() <= MAX_NAME_LENGTH
            && starts_with(trimmed, |ch| ch.is_ascii_alphanumeric())
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
        if !valid {
            return Err(BridgeDomainError::InvalidDataModelId(raw.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl ServiceInstanceId {
    /// Creates a validated service instance identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidInstanceId`] when the value does
    /// not consist of a valid system name, a valid service definition and a
    /// non-empty version separated by `|`.
    pub fn new(value: impl AsRef<str>) -> Result<Self, BridgeDomainError> {
        let raw = value.as_ref();
        let invalid = || BridgeDomainError::InvalidInstanceId(raw.to_owned());
        let parts: Vec<&str> = raw.trim().split(INSTANCE_ID_SEPARATOR).collect();
        let [provider, service_definition, version] = parts.as_slice() else {
            return Err(invalid());
        };
        let provider_name = SystemName::new(provider).map_err(|_| invalid())?;
        let definition = ServiceDefinitionName::new(service_definition).map_err(|_| invalid())?;
        let trimmed_version = version.trim();
        if trimmed_version.is_empty() {
            return Err(invalid());
        }
        Ok(Self(format!(
            "{provider_name}{INSTANCE_ID_SEPARATOR}{definition}{INSTANCE_ID_SEPARATOR}{trimmed_version}"
        )))
    }

    /// Returns the provider system name encoded in the identifier.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.0.split(INSTANCE_ID_SEPARATOR).next().unwrap_or_default()
    }
}

fn starts_with(value: &str, predicate: impl Fn(char) -> bool) -> bool {
    value.chars().next().is_some_and(predicate)
}

/// Checks lowercase words separated by single `separator` characters.
fn is_separated_lowercase(value: &str, separator: char) -> bool {
    starts_with(value, |ch| ch.is_ascii_lowercase())
        && value.len() <= MAX_NAME_LENGTH
        && value.split(separator).all(|word| {
            !word.is_empty()
                && word
                    .chars()
                    .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit())
        })
}
