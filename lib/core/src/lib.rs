//! Core domain types and utilities for the SSFI membership registry.
//!
//! This crate provides the foundational types shared by every layer:
//! typed ids, roles, the clock abstraction, and the error taxonomy.

pub mod clock;
pub mod error;
pub mod id;
pub mod role;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorKind, Result};
pub use id::{
    ApplicationId, ClubId, DistrictId, IdentityId, ParseIdError, ProfileId, StateId, StudentId,
    WindowId,
};
pub use role::{Role, UnknownRole};
