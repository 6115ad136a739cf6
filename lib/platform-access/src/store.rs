//! Storage contract for identities and their role profiles.

use crate::error::StoreError;
use crate::identity::{Identity, OneTimeCode};
use crate::profile::RoleProfile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssfi_core::IdentityId;

/// What a successfully consumed one-time code authorizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeConsumption {
    /// Mark the identity verified.
    Verify,
    /// Replace the password hash and revoke the refresh token.
    ResetPassword { password_hash: String },
}

/// Persistence operations the session manager and resolver rely on.
///
/// Code updates are compare-and-swap on `issued_at` so concurrent resend or
/// verify calls for one identity cannot both win.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Inserts a new identity.
    ///
    /// Returns `StoreError::Duplicate` when phone, email or uid is taken.
    async fn insert(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Replaces the stored code if the current one was issued at `expected`
    /// (`None` meaning no code is stored). Returns false when another writer
    /// got there first.
    async fn swap_one_time_code(
        &self,
        id: IdentityId,
        expected: Option<DateTime<Utc>>,
        code: Option<&OneTimeCode>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Clears the code issued at `issued_at` and applies `consumption` in the
    /// same write. Returns false when the code was already replaced or used.
    async fn consume_one_time_code(
        &self,
        id: IdentityId,
        issued_at: DateTime<Utc>,
        consumption: CodeConsumption,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Stores the refresh token fingerprint and the login time.
    async fn record_login(
        &self,
        id: IdentityId,
        refresh_fingerprint: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn set_refresh_token(
        &self,
        id: IdentityId,
        refresh_fingerprint: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn set_password(
        &self,
        id: IdentityId,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// All role profiles owned by the identity.
    async fn profiles_of(&self, identity_id: IdentityId) -> Result<Vec<RoleProfile>, StoreError>;
}
