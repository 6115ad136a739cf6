//! Hierarchy-encoded membership identifiers.
//!
//! An identifier names the role-holder's place in the
//! State → District → Club tree plus a per-scope sequence:
//!
//! ```
//! use ssfi_core::Role;
//! use ssfi_membership::{IdentifierPolicy, ScopeCode, ScopeCodes, ScopeKey, parse_identifier};
//!
//! let codes = ScopeCodes::district(ScopeCode::new("KA")?, ScopeCode::new("MYS")?);
//! let key = ScopeKey::for_role(Role::DistrictSecretary, &codes)?;
//! let uid = IdentifierPolicy::default().format(&key, 3)?;
//! assert_eq!(uid.as_str(), "SSFI-KA-MYS-00-0003");
//!
//! let parsed = parse_identifier(uid.as_str()).expect("well formed");
//! assert_eq!(parsed.sequence, 3);
//! # Ok::<(), ssfi_membership::IdentifierError>(())
//! ```
//!
//! Allocation of the sequence itself is a storage concern: the store keeps
//! one atomically incremented counter per [`ScopeKey`] and increments it in
//! the same transaction that inserts the owning identity.

pub mod error;
pub mod scope;
pub mod uid;

pub use error::IdentifierError;
pub use scope::{SENTINEL, ScopeCode, ScopeCodes, ScopeKey};
pub use uid::{
    IdentifierPolicy, MAX_SEQUENCE, MembershipId, ParsedIdentifier, is_well_formed,
    parse_identifier,
};
