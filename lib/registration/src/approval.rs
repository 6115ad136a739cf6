//! The approval workflow.
//!
//! Approving an application provisions a login identity, a membership
//! identifier and a role profile. Everything happens inside one
//! [`ApprovalTx`]; if any step fails the transaction is dropped and the
//! application stays PENDING.

use crate::application::{ApplicationRecord, ApplicationStatus, Placement};
use crate::error::RegistrationError;
use crate::store::{ApprovalTx, RegistryStore};
use chrono::{DateTime, Duration, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use ssfi_core::{ApplicationId, Clock, IdentityId};
use ssfi_membership::{IdentifierPolicy, MembershipId, ScopeKey};
use ssfi_platform_access::notify::temporary_password_message;
use ssfi_platform_access::{
    Identity, NotificationSender, PasswordHasher, ProfileLink, RoleProfile,
    generate_temporary_password,
};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

type ApprovalResult<T> = Result<T, Report<RegistrationError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Approve,
    Reject,
}

/// A transition request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub remarks: Option<String>,
}

/// Result of a transition.
#[derive(Clone, Serialize)]
pub struct ApprovalOutcome {
    pub application: ApplicationRecord,
    /// Set when a new identity was created; the applicant must change it.
    pub temporary_password: Option<String>,
    /// True when an existing identity was reused rather than created.
    pub reused_identity: bool,
}

impl fmt::Debug for ApprovalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalOutcome")
            .field("application", &self.application.id)
            .field("status", &self.application.status)
            .field("reused_identity", &self.reused_identity)
            .finish_non_exhaustive()
    }
}

struct Provisioned {
    identity: Identity,
    temporary_password: Option<String>,
    reused: bool,
}

/// Draws the next free identifier for `key`.
///
/// Sequence numbers already held by imported identities are skipped.
///
/// # Errors
///
/// `Identifier` once the scope's four-digit sequence is exhausted, or a
/// storage error.
pub async fn allocate_identifier(
    tx: &mut dyn ApprovalTx,
    policy: &IdentifierPolicy,
    key: &ScopeKey,
) -> ApprovalResult<MembershipId> {
    loop {
        let sequence = tx
            .next_sequence(key)
            .await
            .map_err(RegistrationError::from)?;
        let uid = policy
            .format(key, sequence)
            .map_err(RegistrationError::from)?;
        if !tx.uid_exists(&uid).await.map_err(RegistrationError::from)? {
            return Ok(uid);
        }
        warn!(%uid, scope = %key, "identifier already held, skipping");
    }
}

/// Moves applications out of PENDING.
#[derive(Clone)]
pub struct ApprovalWorkflow {
    store: Arc<dyn RegistryStore>,
    sender: Arc<dyn NotificationSender>,
    hasher: PasswordHasher,
    policy: IdentifierPolicy,
    term: Duration,
    clock: Arc<dyn Clock>,
}

impl ApprovalWorkflow {
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistryStore>,
        sender: Arc<dyn NotificationSender>,
        hasher: PasswordHasher,
        policy: IdentifierPolicy,
        term: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sender,
            hasher,
            policy,
            term,
            clock,
        }
    }

    /// Approves or rejects a pending application.
    ///
    /// Callers must already have checked the actor's role and scope against
    /// the application's target.
    ///
    /// # Errors
    ///
    /// `NotFound`, `AlreadyDecided` for terminal applications, or whatever
    /// provisioning failed with (the application then stays PENDING).
    #[instrument(skip(self, decision), fields(action = ?decision.action))]
    pub async fn transition(
        &self,
        id: ApplicationId,
        decision: Decision,
        actor: IdentityId,
    ) -> ApprovalResult<ApprovalOutcome> {
        let mut tx = self.store.begin().await.map_err(RegistrationError::from)?;
        let mut record = tx
            .lock_application(id)
            .await
            .map_err(RegistrationError::from)?
            .ok_or_else(|| RegistrationError::not_found("application", id))?;
        if record.status.is_terminal() {
            return Err(RegistrationError::AlreadyDecided {
                id,
                status: record.status,
            }
            .into());
        }

        let now = self.clock.now();
        let remarks = decision
            .remarks
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        match decision.action {
            Action::Reject => {
                record.status = ApplicationStatus::Rejected;
                record.rejected_at = Some(now);
                record.rejected_by = Some(actor);
                record.rejection_remarks = remarks;
                tx.save_application(&record)
                    .await
                    .map_err(RegistrationError::from)?;
                tx.commit().await.map_err(RegistrationError::from)?;
                info!(application_id = %id, "application rejected");
                Ok(ApprovalOutcome {
                    application: record,
                    temporary_password: None,
                    reused_identity: false,
                })
            }
            Action::Approve => {
                record.status = ApplicationStatus::Approved;
                record.approved_at = Some(now);
                record.approved_by = Some(actor);
                tx.save_application(&record)
                    .await
                    .map_err(RegistrationError::from)?;

                let provisioned = match self.provision(tx.as_mut(), &record, now).await {
                    Ok(provisioned) => provisioned,
                    Err(err) => {
                        warn!(application_id = %id, error = %err, "approval rolled back");
                        return Err(err);
                    }
                };
                record.identity_id = Some(provisioned.identity.id);
                record.uid = provisioned.identity.uid.clone();
                tx.save_application(&record)
                    .await
                    .map_err(RegistrationError::from)?;
                tx.commit().await.map_err(RegistrationError::from)?;
                info!(
                    application_id = %id,
                    identity_id = %provisioned.identity.id,
                    uid = ?record.uid,
                    "application approved"
                );

                if let Some(password) = &provisioned.temporary_password {
                    self.notify_approved(&provisioned.identity, password).await;
                }
                Ok(ApprovalOutcome {
                    application: record,
                    temporary_password: provisioned.temporary_password,
                    reused_identity: provisioned.reused,
                })
            }
        }
    }

    async fn provision(
        &self,
        tx: &mut dyn ApprovalTx,
        record: &ApplicationRecord,
        now: DateTime<Utc>,
    ) -> ApprovalResult<Provisioned> {
        let role = record.category.role();
        let key = ScopeKey::for_role(role, &record.codes).map_err(RegistrationError::from)?;
        let applicant = &record.applicant;
        let existing = tx
            .find_identity_by_contact(&applicant.phone, applicant.email.as_deref())
            .await
            .map_err(RegistrationError::from)?;

        let provisioned = match existing {
            Some(mut identity) if !identity.is_approved() => {
                warn!(
                    identity_id = %identity.id,
                    application_id = %record.id,
                    "promoting existing unapproved identity"
                );
                identity.role = role;
                identity.uid = Some(allocate_identifier(tx, &self.policy, &key).await?);
                identity.verified = true;
                identity.approved = true;
                identity.active = true;
                identity.membership_expires_at = Some(now + self.term);
                identity.updated_at = now;
                tx.update_identity(&identity)
                    .await
                    .map_err(RegistrationError::from)?;
                Provisioned {
                    identity,
                    temporary_password: None,
                    reused: true,
                }
            }
            Some(identity) => {
                warn!(
                    identity_id = %identity.id,
                    application_id = %record.id,
                    "reusing existing identity for approval"
                );
                Provisioned {
                    identity,
                    temporary_password: None,
                    reused: true,
                }
            }
            None => {
                let uid = allocate_identifier(tx, &self.policy, &key).await?;
                let password = generate_temporary_password();
                let identity = Identity::provisioned(
                    uid,
                    applicant.full_name.clone(),
                    applicant.phone.clone(),
                    applicant.email.clone(),
                    role,
                    self.hasher.hash(&password),
                    Some(now + self.term),
                    now,
                );
                tx.insert_identity(&identity)
                    .await
                    .map_err(RegistrationError::from)?;
                Provisioned {
                    identity,
                    temporary_password: Some(password),
                    reused: false,
                }
            }
        };

        let link = match &record.placement {
            Placement::State { state_id } => ProfileLink::State {
                state_id: *state_id,
            },
            Placement::District { district_id } => ProfileLink::District {
                district_id: *district_id,
            },
            Placement::Club {
                district_id,
                club_code,
                club_name,
            } => ProfileLink::Club {
                club_id: tx
                    .create_club(*district_id, club_code, club_name, now)
                    .await
                    .map_err(RegistrationError::from)?,
            },
            Placement::Student { club_id } => ProfileLink::Student {
                student_id: tx
                    .create_student(*club_id, &applicant.full_name, now)
                    .await
                    .map_err(RegistrationError::from)?,
            },
        };
        let profile = RoleProfile::new(
            provisioned.identity.id,
            link,
            record.details.clone(),
            now,
        );
        tx.insert_profile(&profile)
            .await
            .map_err(RegistrationError::from)?;

        Ok(provisioned)
    }

    async fn notify_approved(&self, identity: &Identity, password: &str) {
        let uid = identity.uid.as_ref().map_or("", MembershipId::as_str);
        let message = temporary_password_message(uid, password);
        if let Err(err) = self.sender.send(&identity.phone, &message).await {
            warn!(identity_id = %identity.id, reason = %err.reason, "temporary password not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{ApplicationService, RegistrationCategory, Submission};
    use crate::memory::InMemoryRegistry;
    use crate::window::{NewWindow, RegistrationGate};
    use ssfi_core::{ErrorKind, FixedClock, Role};
    use ssfi_membership::parse_identifier;
    use ssfi_platform_access::{DeliveryError, IdentityStore};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String)>>);

    #[async_trait::async_trait]
    impl NotificationSender for Outbox {
        async fn send(&self, phone: &str, message: &str) -> Result<(), DeliveryError> {
            self.0
                .lock()
                .unwrap()
                .push((phone.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct Harness {
        registry: InMemoryRegistry,
        applications: ApplicationService,
        workflow: ApprovalWorkflow,
        outbox: Arc<Outbox>,
        clock: FixedClock,
        admin: IdentityId,
    }

    async fn harness() -> Harness {
        let registry = InMemoryRegistry::new();
        let ka = registry.seed_state("KA", "Karnataka").await;
        registry.seed_district(ka, "MYS", "Mysuru").await;
        registry.seed_district(ka, "BLR", "Bengaluru").await;

        let clock = FixedClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp"),
        );
        let store: Arc<dyn RegistryStore> = Arc::new(registry.clone());
        let gate = RegistrationGate::new(Arc::new(registry.clone()), Arc::new(clock.clone()));
        let admin = IdentityId::new();
        for category in RegistrationCategory::ALL {
            gate.create(
                NewWindow {
                    category,
                    title: format!("{category} intake"),
                    starts_at: clock.now() - Duration::days(1),
                    ends_at: clock.now() + Duration::days(30),
                    fee: 0,
                },
                admin,
            )
            .await
            .unwrap();
        }

        let outbox = Arc::new(Outbox::default());
        Harness {
            applications: ApplicationService::new(store.clone(), gate, Arc::new(clock.clone())),
            workflow: ApprovalWorkflow::new(
                store,
                outbox.clone(),
                PasswordHasher::new(1_000),
                IdentifierPolicy::default(),
                Duration::days(365),
                Arc::new(clock.clone()),
            ),
            registry,
            outbox,
            clock,
            admin,
        }
    }

    fn club(phone: &str, club_code: &str) -> Submission {
        Submission {
            category: Some(RegistrationCategory::Club),
            full_name: format!("Owner {phone}"),
            phone: phone.to_string(),
            state_code: Some("KA".to_string()),
            district_code: Some("MYS".to_string()),
            club_code: Some(club_code.to_string()),
            club_name: Some("Mysuru Skaters".to_string()),
            ..Submission::default()
        }
    }

    fn approve() -> Decision {
        Decision {
            action: Action::Approve,
            remarks: None,
        }
    }

    #[tokio::test]
    async fn club_approval_provisions_identity_and_profile() {
        let h = harness().await;
        let record = h.applications.submit(club("9876500001", "XX")).await.unwrap();
        assert_eq!(record.status, ApplicationStatus::Pending);

        let outcome = h
            .workflow
            .transition(record.id, approve(), h.admin)
            .await
            .unwrap();
        let application = &outcome.application;
        assert_eq!(application.status, ApplicationStatus::Approved);
        assert_eq!(application.approved_by, Some(h.admin));
        assert_eq!(application.approved_at, Some(h.clock.now()));
        assert_eq!(
            application.uid.as_ref().map(MembershipId::as_str),
            Some("SSFI-KA-MYS-XX-0001")
        );

        let identity = h
            .registry
            .find_by_phone("9876500001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.role, Role::ClubOwner);
        assert!(identity.verified && identity.approved && identity.active);
        assert_eq!(
            identity.membership_expires_at,
            Some(h.clock.now() + Duration::days(365))
        );

        let password = outcome.temporary_password.clone().unwrap();
        assert!(PasswordHasher::new(1_000).verify(&password, &identity.password_hash));
        let sent = h.outbox.0.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("SSFI-KA-MYS-XX-0001"));

        let profiles = h.registry.profiles_of(identity.id).await.unwrap();
        assert_eq!(profiles.len(), 1);
        let ProfileLink::Club { club_id } = profiles[0].link else {
            panic!("expected club profile, got {:?}", profiles[0].link);
        };
        let node = h.registry.find_club(club_id).await.unwrap().unwrap();
        assert_eq!(node.name, "Mysuru Skaters");
    }

    #[tokio::test]
    async fn second_club_in_scope_gets_next_sequence() {
        let h = harness().await;
        let first = h.applications.submit(club("9876500001", "XX")).await.unwrap();
        let second = h.applications.submit(club("9876500002", "XX")).await.unwrap();
        let other = h.applications.submit(club("9876500003", "YY")).await.unwrap();

        let uid = |outcome: ApprovalOutcome| outcome.application.uid.unwrap().to_string();
        assert_eq!(
            uid(h.workflow.transition(first.id, approve(), h.admin).await.unwrap()),
            "SSFI-KA-MYS-XX-0001"
        );
        assert_eq!(
            uid(h.workflow.transition(second.id, approve(), h.admin).await.unwrap()),
            "SSFI-KA-MYS-XX-0002"
        );
        assert_eq!(
            uid(h.workflow.transition(other.id, approve(), h.admin).await.unwrap()),
            "SSFI-KA-MYS-YY-0001"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_approvals_get_distinct_identifiers() {
        let h = harness().await;
        let mut ids = Vec::new();
        for n in 0..20 {
            let record = h
                .applications
                .submit(club(&format!("98765000{n:02}"), "XX"))
                .await
                .unwrap();
            ids.push(record.id);
        }

        let tasks = ids.into_iter().map(|id| {
            let workflow = h.workflow.clone();
            let admin = h.admin;
            tokio::spawn(async move { workflow.transition(id, approve(), admin).await })
        });
        let sequences: BTreeSet<u32> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| {
                let outcome = joined.unwrap().unwrap();
                let uid = outcome.application.uid.unwrap();
                parse_identifier(uid.as_str()).unwrap().sequence
            })
            .collect();

        assert_eq!(sequences, (1..=20).collect::<BTreeSet<u32>>());
    }

    #[tokio::test]
    async fn failed_provisioning_leaves_application_pending() {
        let h = harness().await;
        let record = h.applications.submit(club("9876500001", "XX")).await.unwrap();

        h.registry.fail_identity_writes(true);
        let err = h
            .workflow
            .transition(record.id, approve(), h.admin)
            .await
            .unwrap_err();
        assert_eq!(err.current_context().kind(), ErrorKind::Internal);

        let stored = h.applications.get(record.id).await.unwrap();
        assert_eq!(stored.status, ApplicationStatus::Pending);
        assert!(stored.approved_at.is_none());
        assert!(h.registry.find_by_phone("9876500001").await.unwrap().is_none());
        assert!(h.outbox.0.lock().unwrap().is_empty());

        // The failed attempt consumed no sequence number.
        h.registry.fail_identity_writes(false);
        let outcome = h
            .workflow
            .transition(record.id, approve(), h.admin)
            .await
            .unwrap();
        assert_eq!(
            outcome.application.uid.unwrap().as_str(),
            "SSFI-KA-MYS-XX-0001"
        );
    }

    #[tokio::test]
    async fn reject_records_remarks_and_provisions_nothing() {
        let h = harness().await;
        let record = h.applications.submit(club("9876500001", "XX")).await.unwrap();
        let outcome = h
            .workflow
            .transition(
                record.id,
                Decision {
                    action: Action::Reject,
                    remarks: Some("  incomplete documents ".to_string()),
                },
                h.admin,
            )
            .await
            .unwrap();

        assert_eq!(outcome.application.status, ApplicationStatus::Rejected);
        assert_eq!(
            outcome.application.rejection_remarks.as_deref(),
            Some("incomplete documents")
        );
        assert!(h.registry.find_by_phone("9876500001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminal_applications_cannot_transition() {
        let h = harness().await;
        let record = h.applications.submit(club("9876500001", "XX")).await.unwrap();
        h.workflow
            .transition(record.id, approve(), h.admin)
            .await
            .unwrap();

        for action in [Action::Approve, Action::Reject] {
            let err = h
                .workflow
                .transition(
                    record.id,
                    Decision {
                        action,
                        remarks: None,
                    },
                    h.admin,
                )
                .await
                .unwrap_err();
            assert_eq!(err.current_context().kind(), ErrorKind::Conflict);
        }
    }

    #[tokio::test]
    async fn unknown_application_is_not_found() {
        let h = harness().await;
        let err = h
            .workflow
            .transition(ApplicationId::new(), approve(), h.admin)
            .await
            .unwrap_err();
        assert_eq!(err.current_context().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn unapproved_identity_is_promoted() {
        let h = harness().await;
        let existing = Identity::registered(
            "Self Registered".to_string(),
            "9876500001".to_string(),
            None,
            Role::Student,
            "hash".to_string(),
            h.clock.now(),
        );
        h.registry.insert(&existing).await.unwrap();

        let record = h.applications.submit(club("9876500001", "XX")).await.unwrap();
        let outcome = h
            .workflow
            .transition(record.id, approve(), h.admin)
            .await
            .unwrap();
        assert!(outcome.reused_identity);
        assert!(outcome.temporary_password.is_none());
        assert_eq!(outcome.application.identity_id, Some(existing.id));

        let promoted = h.registry.find_by_id(existing.id).await.unwrap().unwrap();
        assert_eq!(promoted.role, Role::ClubOwner);
        assert!(promoted.approved && promoted.verified);
        assert_eq!(
            promoted.uid.as_ref().map(MembershipId::as_str),
            Some("SSFI-KA-MYS-XX-0001")
        );
        assert_eq!(promoted.password_hash, "hash");
    }

    #[tokio::test]
    async fn approved_identity_is_reused_and_linked() {
        let h = harness().await;
        let first = h.applications.submit(club("9876500001", "XX")).await.unwrap();
        let first = h
            .workflow
            .transition(first.id, approve(), h.admin)
            .await
            .unwrap();

        let mut again = club("9876500001", "ZZ");
        again.club_name = Some("Second Club".to_string());
        let second = h.applications.submit(again).await.unwrap();
        let second = h
            .workflow
            .transition(second.id, approve(), h.admin)
            .await
            .unwrap();

        assert!(second.reused_identity);
        assert_eq!(second.application.identity_id, first.application.identity_id);
        assert_eq!(second.application.uid, first.application.uid);
        let identity_id = second.application.identity_id.unwrap();
        assert_eq!(h.registry.profiles_of(identity_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reused_identity_reaches_every_club() {
        use ssfi_platform_access::{AccessResolver, ScopeTarget};

        let h = harness().await;
        for (code, name) in [("XX", "First Club"), ("ZZ", "Second Club")] {
            let mut submission = club("9876500001", code);
            submission.club_name = Some(name.to_string());
            let record = h.applications.submit(submission).await.unwrap();
            h.workflow
                .transition(record.id, approve(), h.admin)
                .await
                .unwrap();
        }

        let identity = h
            .registry
            .find_by_phone("9876500001")
            .await
            .unwrap()
            .unwrap();
        let clubs: Vec<_> = h
            .registry
            .profiles_of(identity.id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|profile| match profile.link {
                ProfileLink::Club { club_id } => Some(club_id),
                _ => None,
            })
            .collect();
        assert_eq!(clubs.len(), 2);

        let resolver = AccessResolver::new(
            Arc::new(h.registry.clone()),
            Arc::new(h.registry.clone()),
        );
        let scope = resolver.resolve_scope(&identity).await.unwrap();
        assert_eq!(scope.grants().len(), 2);
        for club_id in clubs {
            resolver
                .require_own_scope(&identity, &scope, ScopeTarget::Club(club_id))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn student_approval_creates_student_under_club() {
        let h = harness().await;
        let owner = h.applications.submit(club("9876500001", "XX")).await.unwrap();
        let owner = h
            .workflow
            .transition(owner.id, approve(), h.admin)
            .await
            .unwrap();
        let owner_profiles = h
            .registry
            .profiles_of(owner.application.identity_id.unwrap())
            .await
            .unwrap();
        let ProfileLink::Club { club_id } = owner_profiles[0].link else {
            panic!("expected club profile");
        };

        let student = h
            .applications
            .submit(Submission {
                category: Some(RegistrationCategory::Student),
                full_name: "Kiran".to_string(),
                phone: "9876500099".to_string(),
                club_id: Some(club_id),
                ..Submission::default()
            })
            .await
            .unwrap();
        let outcome = h
            .workflow
            .transition(student.id, approve(), h.admin)
            .await
            .unwrap();
        assert_eq!(
            outcome.application.uid.unwrap().as_str(),
            "SSFS-KA-MYS-XX-0001"
        );
    }

    #[tokio::test]
    async fn state_secretary_identifier_uses_sentinels() {
        let h = harness().await;
        let record = h
            .applications
            .submit(Submission {
                category: Some(RegistrationCategory::StateSecretary),
                full_name: "Meera".to_string(),
                phone: "9876500050".to_string(),
                state_code: Some("ka".to_string()),
                district_code: Some("MYS".to_string()),
                ..Submission::default()
            })
            .await
            .unwrap();
        let outcome = h
            .workflow
            .transition(record.id, approve(), h.admin)
            .await
            .unwrap();
        assert_eq!(
            outcome.application.uid.unwrap().as_str(),
            "SSFI-KA-00-00-0001"
        );
    }
}
