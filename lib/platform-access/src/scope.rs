//! Hierarchical access resolution.
//!
//! A caller's scope is the set of hierarchy filters its role profile pins
//! down. A target is inside the scope when every filter the scope sets
//! matches the target's lineage (the target plus its ancestors).

use crate::error::{AuthorizationError, StoreError};
use crate::identity::Identity;
use crate::profile::ProfileLink;
use crate::store::IdentityStore;
use async_trait::async_trait;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use ssfi_core::{ClubId, DistrictId, Role, StateId, StudentId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Filters a caller may act within; `None` means unfiltered at that level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<StateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_id: Option<DistrictId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub club_id: Option<ClubId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
}

impl AccessScope {
    /// No filters at all.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true when every filter set here matches `lineage`.
    #[must_use]
    pub fn contains(&self, lineage: &Lineage) -> bool {
        fn matches<T: PartialEq>(filter: Option<T>, actual: Option<T>) -> bool {
            filter.is_none_or(|wanted| actual == Some(wanted))
        }
        matches(self.state_id, lineage.state_id)
            && matches(self.district_id, lineage.district_id)
            && matches(self.club_id, lineage.club_id)
            && matches(self.student_id, lineage.student_id)
    }
}

/// Every grant a caller holds, one per distinct role profile.
///
/// A target is in scope when any grant contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerScope {
    grants: Vec<AccessScope>,
}

impl CallerScope {
    #[must_use]
    pub fn unrestricted() -> Self {
        AccessScope::unrestricted().into()
    }

    #[must_use]
    pub fn grants(&self) -> &[AccessScope] {
        &self.grants
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.grants.iter().any(AccessScope::is_unrestricted)
    }

    #[must_use]
    pub fn contains(&self, lineage: &Lineage) -> bool {
        self.grants.iter().any(|grant| grant.contains(lineage))
    }
}

impl From<AccessScope> for CallerScope {
    fn from(grant: AccessScope) -> Self {
        Self {
            grants: vec![grant],
        }
    }
}

/// A hierarchy node a request wants to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScopeTarget {
    State(StateId),
    District(DistrictId),
    Club(ClubId),
    Student(StudentId),
}

impl ScopeTarget {
    /// Builds a target from a level name (`state`, `district`, `club`,
    /// `student`) and a raw key.
    #[must_use]
    pub fn from_parts(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "state" => Some(Self::State(StateId::new(id))),
            "district" => Some(Self::District(DistrictId::new(id))),
            "club" => Some(Self::Club(ClubId::new(id))),
            "student" => Some(Self::Student(StudentId::new(id))),
            _ => None,
        }
    }
}

impl fmt::Display for ScopeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(id) => write!(f, "state {id}"),
            Self::District(id) => write!(f, "district {id}"),
            Self::Club(id) => write!(f, "club {id}"),
            Self::Student(id) => write!(f, "student {id}"),
        }
    }
}

/// A target node together with its known ancestors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lineage {
    pub state_id: Option<StateId>,
    pub district_id: Option<DistrictId>,
    pub club_id: Option<ClubId>,
    pub student_id: Option<StudentId>,
}

/// Parent lookups over the state → district → club → student tree.
#[async_trait]
pub trait HierarchyDirectory: Send + Sync {
    async fn state_of_district(&self, id: DistrictId) -> Result<Option<StateId>, StoreError>;

    async fn district_of_club(&self, id: ClubId) -> Result<Option<DistrictId>, StoreError>;

    async fn club_of_student(&self, id: StudentId) -> Result<Option<ClubId>, StoreError>;
}

type AccessResult<T> = Result<T, Report<AuthorizationError>>;

/// Static allow-list check on the caller's role.
///
/// # Errors
///
/// `RoleNotAllowed` when `role` is not in `allowed`.
pub fn require_role(role: Role, allowed: &[Role]) -> AccessResult<()> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthorizationError::RoleNotAllowed {
            role,
            allowed: allowed.to_vec(),
        }
        .into())
    }
}

/// Computes caller scopes and checks targets against them.
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn IdentityStore>,
    directory: Arc<dyn HierarchyDirectory>,
}

impl AccessResolver {
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, directory: Arc<dyn HierarchyDirectory>) -> Self {
        Self { store, directory }
    }

    /// Derives the caller's scope from every role profile it holds.
    ///
    /// A profile for the identity's current role must exist; profiles from
    /// further approvals widen the scope.
    ///
    /// # Errors
    ///
    /// `ProfileMissing` for a non-admin without a profile for its role,
    /// `LookupFailed` when the store or directory fails or a club has no
    /// district.
    #[instrument(skip(self, identity), fields(identity_id = %identity.id, role = %identity.role))]
    pub async fn resolve_scope(&self, identity: &Identity) -> AccessResult<CallerScope> {
        if identity.role.is_admin() {
            return Ok(CallerScope::unrestricted());
        }

        let profiles = self
            .store
            .profiles_of(identity.id)
            .await
            .map_err(AuthorizationError::from)?;
        if !profiles.iter().any(|p| p.link.role() == identity.role) {
            warn!("no role profile for identity");
            return Err(AuthorizationError::ProfileMissing {
                identity_id: identity.id,
            }
            .into());
        }

        let mut grants = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            let grant = self.grant_for(profile.link).await?;
            if !grants.contains(&grant) {
                grants.push(grant);
            }
        }
        let scope = CallerScope { grants };
        debug!(?scope, "scope resolved");
        Ok(scope)
    }

    async fn grant_for(&self, link: ProfileLink) -> AccessResult<AccessScope> {
        Ok(match link {
            ProfileLink::State { state_id } => AccessScope {
                state_id: Some(state_id),
                ..AccessScope::default()
            },
            ProfileLink::District { district_id } => AccessScope {
                district_id: Some(district_id),
                ..AccessScope::default()
            },
            ProfileLink::Club { club_id } => {
                let district_id = self
                    .directory
                    .district_of_club(club_id)
                    .await
                    .map_err(AuthorizationError::from)?
                    .ok_or_else(|| AuthorizationError::LookupFailed {
                        details: format!("club {club_id} has no district"),
                    })?;
                AccessScope {
                    district_id: Some(district_id),
                    club_id: Some(club_id),
                    ..AccessScope::default()
                }
            }
            ProfileLink::Student { student_id } => AccessScope {
                student_id: Some(student_id),
                ..AccessScope::default()
            },
        })
    }

    /// Walks the directory upwards from `target`.
    ///
    /// # Errors
    ///
    /// `LookupFailed` when the directory fails.
    pub async fn lineage(&self, target: ScopeTarget) -> AccessResult<Lineage> {
        let mut lineage = Lineage::default();
        let mut club = None;
        let mut district = None;

        match target {
            ScopeTarget::State(id) => lineage.state_id = Some(id),
            ScopeTarget::District(id) => district = Some(id),
            ScopeTarget::Club(id) => club = Some(id),
            ScopeTarget::Student(id) => {
                lineage.student_id = Some(id);
                club = self
                    .directory
                    .club_of_student(id)
                    .await
                    .map_err(AuthorizationError::from)?;
            }
        }
        if let Some(club_id) = club {
            lineage.club_id = Some(club_id);
            district = self
                .directory
                .district_of_club(club_id)
                .await
                .map_err(AuthorizationError::from)?;
        }
        if let Some(district_id) = district {
            lineage.district_id = Some(district_id);
            lineage.state_id = self
                .directory
                .state_of_district(district_id)
                .await
                .map_err(AuthorizationError::from)?;
        }
        Ok(lineage)
    }

    /// Rejects targets outside `scope`.
    ///
    /// # Errors
    ///
    /// `OutOfScope` when no grant of `scope` matches the target's lineage.
    pub async fn require_own_scope(
        &self,
        identity: &Identity,
        scope: &CallerScope,
        target: ScopeTarget,
    ) -> AccessResult<()> {
        if scope.is_unrestricted() {
            return Ok(());
        }
        let lineage = self.lineage(target).await?;
        if scope.contains(&lineage) {
            return Ok(());
        }
        warn!(identity_id = %identity.id, %target, "target outside caller scope");
        Err(AuthorizationError::OutOfScope {
            identity_id: identity.id,
            target: target.to_string(),
        }
        .into())
    }
}
