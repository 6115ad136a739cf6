//! The login-capable identity record.
//!
//! An identity moves through UNVERIFIED → VERIFIED → APPROVED. Self
//! registration creates it unverified; the approval workflow either creates
//! it already verified and approved or promotes an existing one. The global
//! admin is created approved and never expires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ssfi_core::{IdentityId, Role};
use ssfi_membership::MembershipId;

/// A one-time code stored against an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeCode {
    /// The numeric code.
    pub code: String,
    /// When the code was issued; doubles as its version for compare-and-swap.
    pub issued_at: DateTime<Utc>,
    /// When the code stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl OneTimeCode {
    /// Returns true once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Coarse lifecycle position of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Unverified,
    Verified,
    Approved,
}

/// A login-capable account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Internal primary key.
    pub id: IdentityId,
    /// Public membership identifier; assigned at approval.
    pub uid: Option<MembershipId>,
    /// Display name.
    pub full_name: String,
    /// Normalized phone number, unique across identities.
    pub phone: String,
    /// Normalized email, unique across identities when present.
    pub email: Option<String>,
    /// Encoded password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Role held by this identity.
    pub role: Role,
    /// Phone ownership confirmed by one-time code.
    pub verified: bool,
    /// Approved by a hierarchy authority.
    pub approved: bool,
    /// Deactivated identities cannot log in.
    pub active: bool,
    /// Membership expiry; `None` never expires.
    pub membership_expires_at: Option<DateTime<Utc>>,
    /// Outstanding one-time code, if any.
    #[serde(skip_serializing)]
    pub one_time_code: Option<OneTimeCode>,
    /// Fingerprint of the single active refresh token.
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Creates a self-registered identity awaiting verification.
    #[must_use]
    pub fn registered(
        full_name: String,
        phone: String,
        email: Option<String>,
        role: Role,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: IdentityId::new(),
            uid: None,
            full_name,
            phone,
            email,
            password_hash,
            role,
            verified: false,
            approved: false,
            active: true,
            membership_expires_at: None,
            one_time_code: None,
            refresh_token: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an identity provisioned by approval: verified, approved, active.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn provisioned(
        uid: MembershipId,
        full_name: String,
        phone: String,
        email: Option<String>,
        role: Role,
        password_hash: String,
        membership_expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uid: Some(uid),
            verified: true,
            approved: true,
            membership_expires_at,
            ..Self::registered(full_name, phone, email, role, password_hash, now)
        }
    }

    /// Returns where the identity is in its lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        match (self.verified, self.is_approved()) {
            (_, true) => LifecycleState::Approved,
            (true, false) => LifecycleState::Verified,
            (false, false) => LifecycleState::Unverified,
        }
    }

    /// The global admin is approved by definition.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.approved || self.role.is_admin()
    }

    /// Returns true when the membership expired before `now`.
    ///
    /// The global admin never expires.
    #[must_use]
    pub fn is_membership_expired(&self, now: DateTime<Utc>) -> bool {
        if self.role.is_admin() {
            return false;
        }
        self.membership_expires_at.is_some_and(|at| at < now)
    }
}
