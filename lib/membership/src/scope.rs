//! Hierarchy codes and the per-role allocation scope.

use crate::error::IdentifierError;
use serde::{Deserialize, Serialize};
use ssfi_core::Role;
use std::fmt;
use std::str::FromStr;

/// Placeholder written for hierarchy levels a role does not use.
pub const SENTINEL: &str = "00";

/// A 2–3 character alphanumeric code naming a state, district, or club
/// (e.g. `KA`, `MYS`).
///
/// Codes are stored uppercase and may never equal [`SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeCode(String);

impl ScopeCode {
    /// Validates and normalizes a code.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidCode`] for wrong length, non
    /// alphanumeric characters, or the sentinel value.
    pub fn new(raw: &str) -> Result<Self, IdentifierError> {
        let value = raw.trim().to_ascii_uppercase();
        let invalid = |reason| IdentifierError::InvalidCode {
            value: raw.to_string(),
            reason,
        };

        if !(2..=3).contains(&value.len()) {
            return Err(invalid("must be 2 or 3 characters"));
        }
        if !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(invalid("must be alphanumeric"));
        }
        if value == SENTINEL {
            return Err(invalid("reserved for unused levels"));
        }
        Ok(Self(value))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ScopeCode {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ScopeCode {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ScopeCode> for String {
    fn from(code: ScopeCode) -> Self {
        code.0
    }
}

/// Hierarchy codes supplied for an allocation; any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeCodes {
    pub state: Option<ScopeCode>,
    pub district: Option<ScopeCode>,
    pub club: Option<ScopeCode>,
}

impl ScopeCodes {
    /// Codes for a state-level scope.
    #[must_use]
    pub fn state(state: ScopeCode) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// Codes for a district-level scope.
    #[must_use]
    pub fn district(state: ScopeCode, district: ScopeCode) -> Self {
        Self {
            state: Some(state),
            district: Some(district),
            club: None,
        }
    }

    /// Codes for a club-level scope.
    #[must_use]
    pub fn club(state: ScopeCode, district: ScopeCode, club: ScopeCode) -> Self {
        Self {
            state: Some(state),
            district: Some(district),
            club: Some(club),
        }
    }
}

/// The `(role, state, district, club)` tuple a sequence counter is keyed by.
///
/// Built only through [`ScopeKey::for_role`], so a key always carries
/// exactly the levels its role needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    role: Role,
    state: Option<ScopeCode>,
    district: Option<ScopeCode>,
    club: Option<ScopeCode>,
}

impl ScopeKey {
    /// Selects the codes `role` requires from `codes`, ignoring deeper ones.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidScope`] naming the first missing level.
    pub fn for_role(role: Role, codes: &ScopeCodes) -> Result<Self, IdentifierError> {
        let depth = role.scope_depth();
        let pick = |level: usize, code: &Option<ScopeCode>, name: &'static str| {
            if level > depth {
                return Ok(None);
            }
            code.clone()
                .map(Some)
                .ok_or(IdentifierError::InvalidScope {
                    role,
                    missing: name,
                })
        };

        Ok(Self {
            role,
            state: pick(1, &codes.state, "state")?,
            district: pick(2, &codes.district, "district")?,
            club: pick(3, &codes.club, "club")?,
        })
    }

    /// Returns the role the counter belongs to.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// State code, or the sentinel.
    #[must_use]
    pub fn state_code(&self) -> &str {
        self.state.as_ref().map_or(SENTINEL, ScopeCode::as_str)
    }

    /// District code, or the sentinel.
    #[must_use]
    pub fn district_code(&self) -> &str {
        self.district.as_ref().map_or(SENTINEL, ScopeCode::as_str)
    }

    /// Club code, or the sentinel.
    #[must_use]
    pub fn club_code(&self) -> &str {
        self.club.as_ref().map_or(SENTINEL, ScopeCode::as_str)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}-{}-{}",
            self.role,
            self.state_code(),
            self.district_code(),
            self.club_code()
        )
    }
}
