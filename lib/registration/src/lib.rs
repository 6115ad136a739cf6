//! Registration windows, applications and approval for the SSFI registry.
//!
//! Applicants submit through an [`ApplicationService`], which refuses
//! submissions while the category's [`RegistrationGate`] is closed. The
//! [`ApprovalWorkflow`] decides pending applications; approving one
//! allocates a membership identifier, provisions or promotes the identity
//! and links a role profile, all inside a single [`ApprovalTx`].
//!
//! [`InMemoryRegistry`] implements every store contract for tests and local
//! development; the server ships a Postgres implementation.

pub mod application;
pub mod approval;
pub mod bootstrap;
pub mod directory;
pub mod error;
pub mod memory;
pub mod store;
pub mod window;

pub use application::{
    Applicant, ApplicationRecord, ApplicationService, ApplicationStatus, Placement,
    RegistrationCategory, Submission,
};
pub use approval::{Action, ApprovalOutcome, ApprovalWorkflow, Decision, allocate_identifier};
pub use bootstrap::{AdminSeed, BootstrapOutcome, bootstrap_admin};
pub use directory::{ClubNode, DistrictNode, StateNode, StudentNode};
pub use error::RegistrationError;
pub use memory::InMemoryRegistry;
pub use store::{ApprovalTx, RegistryStore};
pub use window::{NewWindow, RegistrationGate, RegistrationWindow, WindowStore, WindowUpdate};
