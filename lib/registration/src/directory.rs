//! Hierarchy nodes as the registry sees them.
//!
//! States and districts are maintained outside this crate; clubs and
//! students are created here when their applications are approved.

use crate::error::RegistrationError;
use crate::store::RegistryStore;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use ssfi_core::{ClubId, DistrictId, StateId, StudentId};
use ssfi_membership::{ScopeCode, ScopeCodes};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateNode {
    pub id: StateId,
    pub code: ScopeCode,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictNode {
    pub id: DistrictId,
    pub state_id: StateId,
    pub code: ScopeCode,
    pub name: String,
}

/// Club codes are not unique within a district; the club id is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubNode {
    pub id: ClubId,
    pub district_id: DistrictId,
    pub code: ScopeCode,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentNode {
    pub id: StudentId,
    pub club_id: ClubId,
    pub full_name: String,
}

/// Lookups that turn missing nodes into `NotFound`.
pub(crate) struct HierarchyNodes<'a> {
    store: &'a dyn RegistryStore,
}

type NodeResult<T> = Result<T, Report<RegistrationError>>;

impl<'a> HierarchyNodes<'a> {
    pub(crate) fn new(store: &'a dyn RegistryStore) -> Self {
        Self { store }
    }

    pub(crate) async fn state_by_code(&self, code: &ScopeCode) -> NodeResult<StateNode> {
        let state = self
            .store
            .find_state_by_code(code)
            .await
            .map_err(RegistrationError::from)?
            .ok_or_else(|| RegistrationError::not_found("state", code))?;
        Ok(state)
    }

    pub(crate) async fn district_by_code(
        &self,
        state_id: StateId,
        code: &ScopeCode,
    ) -> NodeResult<DistrictNode> {
        let district = self
            .store
            .find_district_by_code(state_id, code)
            .await
            .map_err(RegistrationError::from)?
            .ok_or_else(|| RegistrationError::not_found("district", code))?;
        Ok(district)
    }

    /// State, district and club codes of an existing club.
    pub(crate) async fn codes_of_club(&self, club_id: ClubId) -> NodeResult<ScopeCodes> {
        let club = self
            .store
            .find_club(club_id)
            .await
            .map_err(RegistrationError::from)?
            .ok_or_else(|| RegistrationError::not_found("club", club_id))?;
        let district = self
            .store
            .find_district(club.district_id)
            .await
            .map_err(RegistrationError::from)?
            .ok_or_else(|| RegistrationError::not_found("district", club.district_id))?;
        let state = self
            .store
            .find_state(district.state_id)
            .await
            .map_err(RegistrationError::from)?
            .ok_or_else(|| RegistrationError::not_found("state", district.state_id))?;
        Ok(ScopeCodes::club(state.code, district.code, club.code))
    }
}
