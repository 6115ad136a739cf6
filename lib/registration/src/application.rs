//! Applications for a role, and their submission.

use crate::directory::HierarchyNodes;
use crate::error::RegistrationError;
use crate::store::RegistryStore;
use crate::window::RegistrationGate;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use ssfi_core::{ApplicationId, ClubId, Clock, DistrictId, IdentityId, Role, StateId};
use ssfi_membership::{MembershipId, ScopeCode, ScopeCodes, ScopeKey};
use ssfi_platform_access::validate::{normalize_optional_email, normalize_phone, validate_name};
use ssfi_platform_access::{ProfileDetails, ScopeTarget};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};

/// What an application asks to become.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationCategory {
    StateSecretary,
    DistrictSecretary,
    Club,
    Student,
}

impl RegistrationCategory {
    pub const ALL: [Self; 4] = [
        Self::StateSecretary,
        Self::DistrictSecretary,
        Self::Club,
        Self::Student,
    ];

    /// Role granted on approval.
    #[must_use]
    pub fn role(self) -> Role {
        match self {
            Self::StateSecretary => Role::StateSecretary,
            Self::DistrictSecretary => Role::DistrictSecretary,
            Self::Club => Role::ClubOwner,
            Self::Student => Role::Student,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StateSecretary => "STATE_SECRETARY",
            Self::DistrictSecretary => "DISTRICT_SECRETARY",
            Self::Club => "CLUB",
            Self::Student => "STUDENT",
        }
    }
}

impl fmt::Display for RegistrationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationCategory {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == upper)
            .ok_or_else(|| RegistrationError::Validation {
                field: "category",
                reason: format!("unknown category {s}"),
            })
    }
}

/// PENDING is the only non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(RegistrationError::Validation {
                field: "status",
                reason: format!("unknown status {other}"),
            }),
        }
    }
}

/// Who is applying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub full_name: String,
    /// Normalized phone.
    pub phone: String,
    /// Normalized email.
    pub email: Option<String>,
}

/// Where in the hierarchy the approved role will sit.
///
/// Resolved against the directory at submission so approval never has to
/// guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Placement {
    State {
        state_id: StateId,
    },
    District {
        district_id: DistrictId,
    },
    /// The club node is created on approval.
    Club {
        district_id: DistrictId,
        club_code: ScopeCode,
        club_name: String,
    },
    /// The student node is created on approval.
    Student {
        club_id: ClubId,
    },
}

impl Placement {
    /// The node an approver's scope must contain.
    #[must_use]
    pub fn target(&self) -> ScopeTarget {
        match self {
            Self::State { state_id } => ScopeTarget::State(*state_id),
            Self::District { district_id } | Self::Club { district_id, .. } => {
                ScopeTarget::District(*district_id)
            }
            Self::Student { club_id } => ScopeTarget::Club(*club_id),
        }
    }
}

/// A submission and its decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub category: RegistrationCategory,
    pub applicant: Applicant,
    /// Hierarchy codes the membership identifier is built from.
    pub codes: ScopeCodes,
    pub placement: Placement,
    pub details: ProfileDetails,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<IdentityId>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<IdentityId>,
    pub rejection_remarks: Option<String>,
    /// Identity provisioned or reused on approval.
    pub identity_id: Option<IdentityId>,
    pub uid: Option<MembershipId>,
}

impl ApplicationRecord {
    /// Builds a new pending record.
    #[must_use]
    pub fn pending(
        category: RegistrationCategory,
        applicant: Applicant,
        codes: ScopeCodes,
        placement: Placement,
        details: ProfileDetails,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId::new(),
            category,
            applicant,
            codes,
            placement,
            details,
            status: ApplicationStatus::Pending,
            submitted_at: now,
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
            rejection_remarks: None,
            identity_id: None,
            uid: None,
        }
    }

    /// Returns the node an approver must have in scope.
    #[must_use]
    pub fn target(&self) -> ScopeTarget {
        self.placement.target()
    }
}

/// The typed submission DTO; raw strings are validated by
/// [`ApplicationService::submit`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    pub category: Option<RegistrationCategory>,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub state_code: Option<String>,
    pub district_code: Option<String>,
    pub club_code: Option<String>,
    pub club_name: Option<String>,
    /// Club a student joins.
    pub club_id: Option<ClubId>,
    pub contact_address: Option<String>,
    pub identity_document: Option<String>,
}

type ApplicationResult<T> = Result<T, Report<RegistrationError>>;

/// Accepts and reads applications.
#[derive(Clone)]
pub struct ApplicationService {
    store: Arc<dyn RegistryStore>,
    gate: RegistrationGate,
    clock: Arc<dyn Clock>,
}

impl ApplicationService {
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistryStore>,
        gate: RegistrationGate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, gate, clock }
    }

    /// Validates and stores a PENDING application.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed fields, `InvalidScope` when a code the
    /// role needs is missing, `WindowClosed` when the category is closed,
    /// `NotFound` for unknown hierarchy nodes, `DuplicateEntry` when the
    /// phone already has a pending application in this category.
    #[instrument(skip(self, submission), fields(category = ?submission.category))]
    pub async fn submit(&self, submission: Submission) -> ApplicationResult<ApplicationRecord> {
        let category = submission.category.ok_or(RegistrationError::Validation {
            field: "category",
            reason: "is required".to_string(),
        })?;
        let applicant = Applicant {
            full_name: validate_name(&submission.full_name).map_err(RegistrationError::from)?,
            phone: normalize_phone(&submission.phone).map_err(RegistrationError::from)?,
            email: normalize_optional_email(submission.email.as_deref())
                .map_err(RegistrationError::from)?,
        };
        let codes = ScopeCodes {
            state: parse_code(submission.state_code.as_deref())?,
            district: parse_code(submission.district_code.as_deref())?,
            club: parse_code(submission.club_code.as_deref())?,
        };

        if !self.gate.is_open(category).await? {
            return Err(RegistrationError::WindowClosed { category }.into());
        }

        let (codes, placement) = self.place(category, codes, &submission).await?;
        let details = ProfileDetails {
            contact_address: trimmed(submission.contact_address),
            identity_document: trimmed(submission.identity_document),
            club_name: match &placement {
                Placement::Club { club_name, .. } => Some(club_name.clone()),
                _ => None,
            },
        };

        let record = ApplicationRecord::pending(
            category,
            applicant,
            codes,
            placement,
            details,
            self.clock.now(),
        );
        self.store
            .insert_application(&record)
            .await
            .map_err(RegistrationError::from)?;
        info!(application_id = %record.id, "application submitted");
        Ok(record)
    }

    /// Loads an application.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    pub async fn get(&self, id: ApplicationId) -> ApplicationResult<ApplicationRecord> {
        let record = self
            .store
            .find_application(id)
            .await
            .map_err(RegistrationError::from)?
            .ok_or_else(|| RegistrationError::not_found("application", id))?;
        Ok(record)
    }

    /// Checks the codes the role needs and resolves them to directory nodes.
    ///
    /// Returns only the code levels the role uses.
    async fn place(
        &self,
        category: RegistrationCategory,
        codes: ScopeCodes,
        submission: &Submission,
    ) -> ApplicationResult<(ScopeCodes, Placement)> {
        let nodes = HierarchyNodes::new(self.store.as_ref());

        if category == RegistrationCategory::Student {
            // Students join an existing club; its codes come from the directory.
            let club_id = submission.club_id.ok_or(RegistrationError::Validation {
                field: "club_id",
                reason: "is required for students".to_string(),
            })?;
            let codes = nodes.codes_of_club(club_id).await?;
            return Ok((codes, Placement::Student { club_id }));
        }

        ScopeKey::for_role(category.role(), &codes).map_err(RegistrationError::from)?;

        let state_code = required(&codes.state)?;
        let state = nodes.state_by_code(state_code).await?;
        if category == RegistrationCategory::StateSecretary {
            return Ok((
                ScopeCodes::state(state_code.clone()),
                Placement::State { state_id: state.id },
            ));
        }

        let district_code = required(&codes.district)?;
        let district = nodes.district_by_code(state.id, district_code).await?;
        if category == RegistrationCategory::DistrictSecretary {
            return Ok((
                ScopeCodes::district(state_code.clone(), district_code.clone()),
                Placement::District {
                    district_id: district.id,
                },
            ));
        }

        let club_code = required(&codes.club)?;
        let club_name = trimmed(submission.club_name.clone()).ok_or(
            RegistrationError::Validation {
                field: "club_name",
                reason: "is required for clubs".to_string(),
            },
        )?;
        Ok((
            ScopeCodes::club(state_code.clone(), district_code.clone(), club_code.clone()),
            Placement::Club {
                district_id: district.id,
                club_code: club_code.clone(),
                club_name,
            },
        ))
    }
}

fn parse_code(raw: Option<&str>) -> Result<Option<ScopeCode>, RegistrationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(Some(ScopeCode::new(raw)?)),
        None => Ok(None),
    }
}

fn required(code: &Option<ScopeCode>) -> Result<&ScopeCode, RegistrationError> {
    code.as_ref().ok_or(RegistrationError::Validation {
        field: "scope code",
        reason: "is required".to_string(),
    })
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
