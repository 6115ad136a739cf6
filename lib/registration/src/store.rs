//! Storage contracts for applications and the approval transaction.

use crate::application::ApplicationRecord;
use crate::directory::{ClubNode, DistrictNode, StateNode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssfi_core::{ApplicationId, ClubId, DistrictId, StateId, StudentId};
use ssfi_membership::{MembershipId, ScopeCode, ScopeKey};
use ssfi_platform_access::{Identity, RoleProfile, StoreError};

/// Applications, directory lookups, and the entry point for approval
/// transactions.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Starts a transaction. Dropping it without [`ApprovalTx::commit`]
    /// discards every write made through it.
    async fn begin(&self) -> Result<Box<dyn ApprovalTx>, StoreError>;

    /// Returns `StoreError::Duplicate` when the phone already has a pending
    /// application in the same category.
    async fn insert_application(&self, record: &ApplicationRecord) -> Result<(), StoreError>;

    async fn find_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError>;

    async fn find_state(&self, id: StateId) -> Result<Option<StateNode>, StoreError>;

    async fn find_state_by_code(&self, code: &ScopeCode) -> Result<Option<StateNode>, StoreError>;

    async fn find_district(&self, id: DistrictId) -> Result<Option<DistrictNode>, StoreError>;

    async fn find_district_by_code(
        &self,
        state_id: StateId,
        code: &ScopeCode,
    ) -> Result<Option<DistrictNode>, StoreError>;

    async fn find_club(&self, id: ClubId) -> Result<Option<ClubNode>, StoreError>;
}

/// Writes that must commit or fail together with an approval.
///
/// Implementations serialize concurrent transactions on the same
/// application (`lock_application`) and on the same identifier scope
/// (`next_sequence`).
#[async_trait]
pub trait ApprovalTx: Send {
    /// Loads the application and holds it until commit or rollback.
    async fn lock_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError>;

    async fn save_application(&mut self, record: &ApplicationRecord) -> Result<(), StoreError>;

    /// Finds an identity by phone, falling back to email.
    async fn find_identity_by_contact(
        &mut self,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Option<Identity>, StoreError>;

    /// Atomically increments and returns the counter for `key`, starting
    /// at 1.
    async fn next_sequence(&mut self, key: &ScopeKey) -> Result<u32, StoreError>;

    async fn uid_exists(&mut self, uid: &MembershipId) -> Result<bool, StoreError>;

    async fn insert_identity(&mut self, identity: &Identity) -> Result<(), StoreError>;

    async fn update_identity(&mut self, identity: &Identity) -> Result<(), StoreError>;

    async fn create_club(
        &mut self,
        district_id: DistrictId,
        code: &ScopeCode,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<ClubId, StoreError>;

    async fn create_student(
        &mut self,
        club_id: ClubId,
        full_name: &str,
        at: DateTime<Utc>,
    ) -> Result<StudentId, StoreError>;

    async fn insert_profile(&mut self, profile: &RoleProfile) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
