//! Strongly-typed identifiers used across the domain.
//!
//! Storage assigns identifiers as opaque strings. They end up as path
//! segments of storage endpoints (`/po_line/{id}`), so parsing rejects values
//! that would change the shape of the path.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a tenant (multi-tenant boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

/// Identifier of a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

/// Identifier of a purchase order line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

/// Check that `raw` can be appended to an endpoint prefix as a single path segment.
pub fn ensure_path_segment(name: &str, raw: &str) -> Result<(), DomainError> {
    if raw.trim().is_empty() {
        return Err(DomainError::invalid_id(format!("{name}: empty")));
    }
    if raw.contains(['/', '?', '#', '&']) || raw.chars().any(char::is_whitespace) {
        return Err(DomainError::invalid_id(format!(
            "{name}: '{raw}' is not a valid path segment"
        )));
    }
    Ok(())
}

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Parse and validate an identifier.
            pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
                let raw = raw.into();
                ensure_path_segment($name, &raw)?;
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

impl_string_newtype!(TenantId, "TenantId");
impl_string_newtype!(OrderId, "OrderId");
impl_string_newtype!(LineId, "LineId");
