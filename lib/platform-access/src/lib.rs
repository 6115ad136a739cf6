//! Authentication, sessions and hierarchical access control for the SSFI
//! registry.
//!
//! This crate provides:
//! - The login-capable [`Identity`] and its [`RoleProfile`]
//! - Password hashing, one-time codes and HS256 tokens
//! - [`SessionManager`]: registration, verification, login, refresh,
//!   logout and password changes
//! - [`AccessResolver`]: scope resolution and the `require_role` /
//!   `require_own_scope` guards
//! - Storage, notification and directory traits implemented by the server
//!
//! # Example
//!
//! ```
//! use ssfi_platform_access::{AccessScope, Lineage};
//! use ssfi_core::{DistrictId, StateId};
//!
//! let scope = AccessScope {
//!     district_id: Some(DistrictId::new(7)),
//!     ..AccessScope::default()
//! };
//! let club_in_seven = Lineage {
//!     state_id: Some(StateId::new(1)),
//!     district_id: Some(DistrictId::new(7)),
//!     ..Lineage::default()
//! };
//! assert!(scope.contains(&club_in_seven));
//! assert!(!scope.contains(&Lineage {
//!     district_id: Some(DistrictId::new(9)),
//!     ..Lineage::default()
//! }));
//! ```

pub mod auth;
pub mod error;
pub mod identity;
pub mod notify;
pub mod otp;
pub mod password;
pub mod profile;
pub mod scope;
pub mod session;
pub mod store;
pub mod token;
pub mod validate;

#[cfg(test)]
mod testing;

pub use auth::AuthenticatedIdentity;
pub use error::{AuthenticationError, AuthorizationError, DeliveryError, StoreError};
pub use identity::{Identity, LifecycleState, OneTimeCode};
pub use notify::NotificationSender;
pub use otp::OtpPolicy;
pub use password::{PasswordHasher, generate_temporary_password};
pub use profile::{ProfileDetails, ProfileLink, RoleProfile};
pub use scope::{
    AccessResolver, AccessScope, CallerScope, HierarchyDirectory, Lineage, ScopeTarget,
    require_role,
};
pub use session::{AccessToken, CodeReceipt, Registration, SessionManager};
pub use store::{CodeConsumption, IdentityStore};
pub use token::{AccessClaims, RefreshClaims, TokenError, TokenIssuer, TokenPair, TokenType};
