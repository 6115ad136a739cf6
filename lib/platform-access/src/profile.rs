//! Role profiles linking an identity into the hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ssfi_core::{ClubId, DistrictId, IdentityId, ProfileId, Role, StateId, StudentId};

/// The hierarchy node a profile is attached to.
///
/// Only the direct node is stored; ancestors are walked through the
/// directory when scope is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum ProfileLink {
    State { state_id: StateId },
    District { district_id: DistrictId },
    Club { club_id: ClubId },
    Student { student_id: StudentId },
}

impl ProfileLink {
    /// Returns the role a profile with this link belongs to.
    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::State { .. } => Role::StateSecretary,
            Self::District { .. } => Role::DistrictSecretary,
            Self::Club { .. } => Role::ClubOwner,
            Self::Student { .. } => Role::Student,
        }
    }
}

/// Role-specific attributes captured from the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub contact_address: Option<String>,
    pub identity_document: Option<String>,
    pub club_name: Option<String>,
}

/// One per non-admin identity; created when the identity is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProfile {
    pub id: ProfileId,
    pub identity_id: IdentityId,
    pub link: ProfileLink,
    pub details: ProfileDetails,
    pub created_at: DateTime<Utc>,
}

impl RoleProfile {
    /// Creates a profile for `identity_id`.
    #[must_use]
    pub fn new(
        identity_id: IdentityId,
        link: ProfileLink,
        details: ProfileDetails,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProfileId::new(),
            identity_id,
            link,
            details,
            created_at: now,
        }
    }
}
