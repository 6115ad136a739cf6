//! Membership identifiers: `PREFIX-{state}-{district}-{club}-{NNNN}`.
//!
//! Levels a role does not use hold the sentinel `00`, and `NNNN` is a
//! zero-padded per-scope sequence starting at `0001`. Formatting needs a
//! sequence number handed out by the store's per-scope counter; nothing in
//! this module allocates.

use crate::error::IdentifierError;
use crate::scope::{SENTINEL, ScopeCode, ScopeKey};
use serde::{Deserialize, Serialize};
use ssfi_core::Role;
use std::fmt;
use std::str::FromStr;

/// Largest sequence a four-digit identifier can carry.
pub const MAX_SEQUENCE: u32 = 9999;

/// A validated membership identifier ("UID").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MembershipId(String);

impl MembershipId {
    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MembershipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MembershipId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_well_formed(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(IdentifierError::Malformed {
                value: s.to_string(),
            })
        }
    }
}

impl TryFrom<String> for MembershipId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MembershipId> for String {
    fn from(id: MembershipId) -> Self {
        id.0
    }
}

/// Scope components recovered from an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIdentifier {
    pub prefix: String,
    pub state: Option<ScopeCode>,
    pub district: Option<ScopeCode>,
    pub club: Option<ScopeCode>,
    pub sequence: u32,
}

/// Structural check of an identifier string. Side-effect free.
#[must_use]
pub fn is_well_formed(value: &str) -> bool {
    parse_identifier(value).is_some()
}

/// Parses an identifier back into its scope components.
///
/// Returns `None` for anything that is not exactly
/// `PREFIX-XX-XXX-XXX-NNNN` with sentinels only in trailing levels.
#[must_use]
pub fn parse_identifier(value: &str) -> Option<ParsedIdentifier> {
    let parts: Vec<&str> = value.split('-').collect();
    let [prefix, state, district, club, sequence] = parts.as_slice() else {
        return None;
    };

    if !is_prefix(prefix) {
        return None;
    }

    let level = |raw: &str| -> Option<Option<ScopeCode>> {
        if raw == SENTINEL {
            return Some(None);
        }
        ScopeCode::new(raw).ok().filter(|c| c.as_str() == raw).map(Some)
    };
    let state = level(*state)?;
    let district = level(*district)?;
    let club = level(*club)?;

    // A used level below an unused one cannot come from any role.
    if (state.is_none() && district.is_some()) || (district.is_none() && club.is_some()) {
        return None;
    }

    if sequence.len() != 4 || !sequence.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sequence: u32 = sequence.parse().ok()?;
    if sequence == 0 {
        return None;
    }

    Some(ParsedIdentifier {
        prefix: (*prefix).to_string(),
        state,
        district,
        club,
        sequence,
    })
}

fn is_prefix(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Prefix selection for formatted identifiers.
///
/// Club owners and students share all three scope codes, so they must use
/// different prefixes for identifiers to stay globally unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPolicy {
    prefix: String,
    student_prefix: String,
}

impl IdentifierPolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns an error for non-alphanumeric prefixes or when both prefixes
    /// are equal.
    pub fn new(
        prefix: impl Into<String>,
        student_prefix: impl Into<String>,
    ) -> Result<Self, IdentifierError> {
        let prefix = prefix.into();
        let student_prefix = student_prefix.into();
        for value in [&prefix, &student_prefix] {
            if !is_prefix(value) {
                return Err(IdentifierError::InvalidPrefix {
                    value: value.clone(),
                });
            }
        }
        if prefix == student_prefix {
            return Err(IdentifierError::AmbiguousPrefixes { prefix });
        }
        Ok(Self {
            prefix,
            student_prefix,
        })
    }

    /// Returns the prefix used for `role`.
    #[must_use]
    pub fn prefix_for(&self, role: Role) -> &str {
        match role {
            Role::Student => &self.student_prefix,
            _ => &self.prefix,
        }
    }

    /// Formats the identifier for `sequence` within `key`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::SequenceExhausted`] when `sequence` is zero
    /// or does not fit four digits; identifiers are never truncated.
    pub fn format(&self, key: &ScopeKey, sequence: u32) -> Result<MembershipId, IdentifierError> {
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(IdentifierError::SequenceExhausted {
                scope: key.to_string(),
            });
        }
        Ok(MembershipId(format!(
            "{}-{}-{}-{}-{:04}",
            self.prefix_for(key.role()),
            key.state_code(),
            key.district_code(),
            key.club_code(),
            sequence
        )))
    }
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self {
            prefix: "SSFI".to_string(),
            student_prefix: "SSFS".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeCodes;

    fn code(raw: &str) -> ScopeCode {
        ScopeCode::new(raw).expect("valid code")
    }

    fn club_key(role: Role) -> ScopeKey {
        ScopeKey::for_role(role, &ScopeCodes::club(code("KA"), code("MYS"), code("XX")))
            .expect("key")
    }

    #[test]
    fn formats_first_club_in_district() {
        let uid = IdentifierPolicy::default()
            .format(&club_key(Role::ClubOwner), 1)
            .expect("format");
        assert_eq!(uid.as_str(), "SSFI-KA-MYS-XX-0001");
    }

    #[test]
    fn fills_unused_levels_with_sentinel() {
        let key = ScopeKey::for_role(Role::StateSecretary, &ScopeCodes::state(code("KA")))
            .expect("key");
        let uid = IdentifierPolicy::default().format(&key, 12).expect("format");
        assert_eq!(uid.as_str(), "SSFI-KA-00-00-0012");

        let admin = ScopeKey::for_role(Role::GlobalAdmin, &ScopeCodes::default()).expect("key");
        let uid = IdentifierPolicy::default().format(&admin, 1).expect("format");
        assert_eq!(uid.as_str(), "SSFI-00-00-00-0001");
    }

    #[test]
    fn students_and_club_owners_never_collide() {
        let policy = IdentifierPolicy::default();
        let owner = policy.format(&club_key(Role::ClubOwner), 1).expect("format");
        let student = policy.format(&club_key(Role::Student), 1).expect("format");
        assert_ne!(owner, student);
        assert_eq!(student.as_str(), "SSFS-KA-MYS-XX-0001");
    }

    #[test]
    fn sequence_overflow_is_an_error_not_truncation() {
        let policy = IdentifierPolicy::default();
        assert!(policy.format(&club_key(Role::ClubOwner), 9999).is_ok());
        let err = policy
            .format(&club_key(Role::ClubOwner), 10_000)
            .unwrap_err();
        assert!(matches!(err, IdentifierError::SequenceExhausted { .. }));
        assert!(policy.format(&club_key(Role::ClubOwner), 0).is_err());
    }

    #[test]
    fn policy_rejects_shared_or_bad_prefixes() {
        assert!(matches!(
            IdentifierPolicy::new("SSFI", "SSFI"),
            Err(IdentifierError::AmbiguousPrefixes { .. })
        ));
        assert!(matches!(
            IdentifierPolicy::new("ss-fi", "SSFS"),
            Err(IdentifierError::InvalidPrefix { .. })
        ));
        assert!(IdentifierPolicy::new("KSF", "KSS").is_ok());
    }

    #[test]
    fn parse_recovers_scope() {
        let parsed = parse_identifier("SSFI-KA-MYS-00-0042").expect("parse");
        assert_eq!(parsed.prefix, "SSFI");
        assert_eq!(parsed.state, Some(code("KA")));
        assert_eq!(parsed.district, Some(code("MYS")));
        assert_eq!(parsed.club, None);
        assert_eq!(parsed.sequence, 42);
    }

    #[test]
    fn parse_rejects_malformed_values() {
        for bad in [
            "",
            "SSFI-KA-MYS-XX",
            "SSFI-KA-MYS-XX-001",
            "SSFI-KA-MYS-XX-00001",
            "SSFI-KA-MYS-XX-0000",
            "SSFI-ka-MYS-XX-0001",
            "ssfi-KA-MYS-XX-0001",
            "SSFI-00-MYS-00-0001",
            "SSFI-KA-00-XX-0001",
            "SSFI-KARN-MYS-XX-0001",
            "SSFI-KA-MYS-XX-12a4",
            "SSFI-KA-MYS-XX-0001-1",
        ] {
            assert!(parse_identifier(bad).is_none(), "accepted {bad:?}");
            assert!(!is_well_formed(bad));
        }
    }

    #[test]
    fn membership_id_from_str_validates() {
        let uid: MembershipId = "SSFI-KA-00-00-0001".parse().expect("parse");
        assert_eq!(parse_identifier(uid.as_str()).map(|p| p.sequence), Some(1));
        assert!("garbage".parse::<MembershipId>().is_err());
    }

    #[test]
    fn membership_id_serializes_as_string() {
        let uid: MembershipId = "SSFI-KA-MYS-XX-0003".parse().expect("parse");
        let json = serde_json::to_string(&uid).expect("serialize");
        assert_eq!(json, "\"SSFI-KA-MYS-XX-0003\"");
        assert!(serde_json::from_str::<MembershipId>("\"bad\"").is_err());
    }
}
