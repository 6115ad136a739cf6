//! Strongly-typed ID types for registry entities.
//!
//! Records owned by this system (identities, profiles, applications,
//! windows) use ULIDs. Hierarchy nodes (states, districts, clubs,
//! students) are owned by the directory tables and keep their numeric keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the prefix used for display formatting.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let ulid_str = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);

                Ulid::from_str(ulid_str)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }
    };
}

/// Macro to generate a numeric hierarchy node key.
macro_rules! define_node_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw directory key.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw directory key.
            #[must_use]
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<i64>().map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    reason: e.to_string(),
                })
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a login-capable identity.
    IdentityId,
    "idn"
);

define_id!(
    /// Unique identifier for a role profile.
    ProfileId,
    "prof"
);

define_id!(
    /// Unique identifier for an application record.
    ApplicationId,
    "app"
);

define_id!(
    /// Unique identifier for a registration window.
    WindowId,
    "win"
);

define_node_id!(
    /// Directory key of a state.
    StateId
);

define_node_id!(
    /// Directory key of a district.
    DistrictId
);

define_node_id!(
    /// Directory key of a club.
    ClubId
);

define_node_id!(
    /// Directory key of a student record.
    StudentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_id_display_format() {
        let id = IdentityId::new();
        assert!(id.to_string().starts_with("idn_"));
    }

    #[test]
    fn parse_with_prefix() {
        let id = ApplicationId::new();
        let parsed: ApplicationId = id.to_string().parse().expect("should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_without_prefix() {
        let ulid = Ulid::new();
        let id: WindowId = ulid.to_string().parse().expect("should parse");
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn parse_invalid_ulid() {
        let err = "not_a_ulid".parse::<ProfileId>().unwrap_err();
        assert_eq!(err.id_type, "ProfileId");
    }

    #[test]
    fn node_ids_parse_and_display() {
        let district: DistrictId = "7".parse().expect("should parse");
        assert_eq!(district, DistrictId::new(7));
        assert_eq!(district.to_string(), "7");
        assert!("seven".parse::<ClubId>().is_err());
    }

    #[test]
    fn node_ids_serialize_as_numbers() {
        let json = serde_json::to_string(&StateId::new(29)).expect("serialize");
        assert_eq!(json, "29");
    }
}
