//! Membership roles.
//!
//! Every identity holds exactly one role. The role decides which hierarchy
//! levels its membership identifier encodes and which profile links it into
//! the State → District → Club → Student tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of an identity within the federation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Top-level administrator with unrestricted scope.
    GlobalAdmin,
    /// Secretary of a state association.
    StateSecretary,
    /// Secretary of a district association.
    DistrictSecretary,
    /// Owner of a registered club.
    ClubOwner,
    /// Student enrolled in a club.
    Student,
}

impl Role {
    /// All roles, ordered from the top of the hierarchy down.
    pub const ALL: [Role; 5] = [
        Self::GlobalAdmin,
        Self::StateSecretary,
        Self::DistrictSecretary,
        Self::ClubOwner,
        Self::Student,
    ];

    /// Returns true if this role has admin privileges.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::GlobalAdmin)
    }

    /// Number of hierarchy codes (state, district, club) the role's
    /// identifier must carry.
    #[must_use]
    pub const fn scope_depth(&self) -> usize {
        match self {
            Self::GlobalAdmin => 0,
            Self::StateSecretary => 1,
            Self::DistrictSecretary => 2,
            Self::ClubOwner | Self::Student => 3,
        }
    }

    /// Returns the storage/wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GlobalAdmin => "GLOBAL_ADMIN",
            Self::StateSecretary => "STATE_SECRETARY",
            Self::DistrictSecretary => "DISTRICT_SECRETARY",
            Self::ClubOwner => "CLUB_OWNER",
            Self::Student => "STUDENT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_global_admin_is_admin() {
        assert!(Role::GlobalAdmin.is_admin());
        assert!(Role::ALL.iter().filter(|r| r.is_admin()).count() == 1);
    }

    #[test]
    fn scope_depth_follows_hierarchy() {
        assert_eq!(Role::GlobalAdmin.scope_depth(), 0);
        assert_eq!(Role::StateSecretary.scope_depth(), 1);
        assert_eq!(Role::DistrictSecretary.scope_depth(), 2);
        assert_eq!(Role::ClubOwner.scope_depth(), 3);
        assert_eq!(Role::Student.scope_depth(), 3);
    }

    #[test]
    fn parse_round_trips_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn role_serialization_format() {
        let json = serde_json::to_string(&Role::DistrictSecretary).expect("serialize");
        assert_eq!(json, "\"DISTRICT_SECRETARY\"");
    }
}
