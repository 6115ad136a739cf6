//! An in-memory registry implementing every store contract.
//!
//! Transactions take the whole registry lock and work on a copy that is
//! written back on commit, so they are fully serialized and a dropped
//! transaction leaves no trace. Suited to tests and local development.

use crate::application::{ApplicationRecord, ApplicationStatus, RegistrationCategory};
use crate::directory::{ClubNode, DistrictNode, StateNode, StudentNode};
use crate::store::{ApprovalTx, RegistryStore};
use crate::window::{RegistrationWindow, WindowStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssfi_core::{
    ApplicationId, ClubId, DistrictId, IdentityId, StateId, StudentId, WindowId,
};
use ssfi_membership::{MembershipId, ScopeCode, ScopeKey};
use ssfi_platform_access::{
    CodeConsumption, HierarchyDirectory, Identity, IdentityStore, OneTimeCode, RoleProfile,
    StoreError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Registry {
    identities: BTreeMap<IdentityId, Identity>,
    profiles: Vec<RoleProfile>,
    applications: BTreeMap<ApplicationId, ApplicationRecord>,
    windows: BTreeMap<WindowId, RegistrationWindow>,
    counters: HashMap<ScopeKey, u32>,
    states: BTreeMap<StateId, StateNode>,
    districts: BTreeMap<DistrictId, DistrictNode>,
    clubs: BTreeMap<ClubId, ClubNode>,
    students: BTreeMap<StudentId, StudentNode>,
    last_node_id: i64,
}

impl Registry {
    fn next_node_id(&mut self) -> i64 {
        self.last_node_id += 1;
        self.last_node_id
    }

    fn identity_mut(&mut self, id: IdentityId) -> Result<&mut Identity, StoreError> {
        self.identities.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "identity",
            id: id.to_string(),
        })
    }

    fn check_identity_unique(&self, identity: &Identity) -> Result<(), StoreError> {
        for other in self.identities.values().filter(|o| o.id != identity.id) {
            let field = if other.phone == identity.phone {
                "phone"
            } else if identity.email.is_some() && other.email == identity.email {
                "email"
            } else if identity.uid.is_some() && other.uid == identity.uid {
                "uid"
            } else {
                continue;
            };
            return Err(StoreError::Duplicate {
                field: field.to_string(),
            });
        }
        Ok(())
    }

    fn find_by_contact(&self, phone: &str, email: Option<&str>) -> Option<Identity> {
        self.identities
            .values()
            .find(|i| i.phone == phone)
            .or_else(|| {
                let email = email?;
                self.identities
                    .values()
                    .find(|i| i.email.as_deref() == Some(email))
            })
            .cloned()
    }
}

/// A cloneable handle to a shared in-memory registry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    inner: Arc<Mutex<Registry>>,
    fail_identity_writes: Arc<AtomicBool>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a state to the directory.
    ///
    /// # Panics
    ///
    /// Panics if `code` is not a valid scope code.
    pub async fn seed_state(&self, code: &str, name: &str) -> StateId {
        let mut registry = self.inner.lock().await;
        let id = StateId::new(registry.next_node_id());
        registry.states.insert(
            id,
            StateNode {
                id,
                code: seed_code(code),
                name: name.to_string(),
            },
        );
        id
    }

    /// Adds a district to the directory.
    ///
    /// # Panics
    ///
    /// Panics if `code` is not a valid scope code.
    pub async fn seed_district(&self, state_id: StateId, code: &str, name: &str) -> DistrictId {
        let mut registry = self.inner.lock().await;
        let id = DistrictId::new(registry.next_node_id());
        registry.districts.insert(
            id,
            DistrictNode {
                id,
                state_id,
                code: seed_code(code),
                name: name.to_string(),
            },
        );
        id
    }

    /// Makes identity inserts and updates fail, to exercise rollback.
    pub fn fail_identity_writes(&self, fail: bool) {
        self.fail_identity_writes.store(fail, Ordering::SeqCst);
    }
}

fn seed_code(code: &str) -> ScopeCode {
    ScopeCode::new(code).unwrap_or_else(|err| panic!("invalid seed code {code}: {err}"))
}

/// A transaction over a private copy of the registry.
struct MemoryTx {
    guard: OwnedMutexGuard<Registry>,
    working: Registry,
    fail_identity_writes: bool,
}

impl MemoryTx {
    fn identity_write_guard(&self) -> Result<(), StoreError> {
        if self.fail_identity_writes {
            return Err(StoreError::Unavailable {
                details: "identity writes disabled".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ApprovalTx for MemoryTx {
    async fn lock_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.working.applications.get(&id).cloned())
    }

    async fn save_application(&mut self, record: &ApplicationRecord) -> Result<(), StoreError> {
        self.working.applications.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_identity_by_contact(
        &mut self,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Option<Identity>, StoreError> {
        Ok(self.working.find_by_contact(phone, email))
    }

    async fn next_sequence(&mut self, key: &ScopeKey) -> Result<u32, StoreError> {
        let counter = self.working.counters.entry(key.clone()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn uid_exists(&mut self, uid: &MembershipId) -> Result<bool, StoreError> {
        Ok(self
            .working
            .identities
            .values()
            .any(|i| i.uid.as_ref() == Some(uid)))
    }

    async fn insert_identity(&mut self, identity: &Identity) -> Result<(), StoreError> {
        self.identity_write_guard()?;
        self.working.check_identity_unique(identity)?;
        self.working.identities.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn update_identity(&mut self, identity: &Identity) -> Result<(), StoreError> {
        self.identity_write_guard()?;
        self.working.check_identity_unique(identity)?;
        *self.working.identity_mut(identity.id)? = identity.clone();
        Ok(())
    }

    async fn create_club(
        &mut self,
        district_id: DistrictId,
        code: &ScopeCode,
        name: &str,
        _at: DateTime<Utc>,
    ) -> Result<ClubId, StoreError> {
        if !self.working.districts.contains_key(&district_id) {
            return Err(StoreError::NotFound {
                entity: "district",
                id: district_id.to_string(),
            });
        }
        let id = ClubId::new(self.working.next_node_id());
        self.working.clubs.insert(
            id,
            ClubNode {
                id,
                district_id,
                code: code.clone(),
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    async fn create_student(
        &mut self,
        club_id: ClubId,
        full_name: &str,
        _at: DateTime<Utc>,
    ) -> Result<StudentId, StoreError> {
        if !self.working.clubs.contains_key(&club_id) {
            return Err(StoreError::NotFound {
                entity: "club",
                id: club_id.to_string(),
            });
        }
        let id = StudentId::new(self.working.next_node_id());
        self.working.students.insert(
            id,
            StudentNode {
                id,
                club_id,
                full_name: full_name.to_string(),
            },
        );
        Ok(id)
    }

    async fn insert_profile(&mut self, profile: &RoleProfile) -> Result<(), StoreError> {
        self.working.profiles.push(profile.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistry {
    async fn begin(&self) -> Result<Box<dyn ApprovalTx>, StoreError> {
        let guard = self.inner.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_identity_writes: self.fail_identity_writes.load(Ordering::SeqCst),
        }))
    }

    async fn insert_application(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        let mut registry = self.inner.lock().await;
        let pending_duplicate = registry.applications.values().any(|a| {
            a.status == ApplicationStatus::Pending
                && a.category == record.category
                && a.applicant.phone == record.applicant.phone
        });
        if pending_duplicate {
            return Err(StoreError::Duplicate {
                field: "pending application".to_string(),
            });
        }
        registry.applications.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.inner.lock().await.applications.get(&id).cloned())
    }

    async fn find_state(&self, id: StateId) -> Result<Option<StateNode>, StoreError> {
        Ok(self.inner.lock().await.states.get(&id).cloned())
    }

    async fn find_state_by_code(&self, code: &ScopeCode) -> Result<Option<StateNode>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .states
            .values()
            .find(|s| &s.code == code)
            .cloned())
    }

    async fn find_district(&self, id: DistrictId) -> Result<Option<DistrictNode>, StoreError> {
        Ok(self.inner.lock().await.districts.get(&id).cloned())
    }

    async fn find_district_by_code(
        &self,
        state_id: StateId,
        code: &ScopeCode,
    ) -> Result<Option<DistrictNode>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .districts
            .values()
            .find(|d| d.state_id == state_id && &d.code == code)
            .cloned())
    }

    async fn find_club(&self, id: ClubId) -> Result<Option<ClubNode>, StoreError> {
        Ok(self.inner.lock().await.clubs.get(&id).cloned())
    }
}

#[async_trait]
impl WindowStore for InMemoryRegistry {
    async fn insert_window(&self, window: &RegistrationWindow) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .windows
            .insert(window.id, window.clone());
        Ok(())
    }

    async fn find_window(&self, id: WindowId) -> Result<Option<RegistrationWindow>, StoreError> {
        Ok(self.inner.lock().await.windows.get(&id).cloned())
    }

    async fn save_window(&self, window: &RegistrationWindow) -> Result<(), StoreError> {
        let mut registry = self.inner.lock().await;
        match registry.windows.get_mut(&window.id) {
            Some(stored) => {
                *stored = window.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "registration window",
                id: window.id.to_string(),
            }),
        }
    }

    async fn windows_for(
        &self,
        category: RegistrationCategory,
    ) -> Result<Vec<RegistrationWindow>, StoreError> {
        let registry = self.inner.lock().await;
        let mut windows: Vec<RegistrationWindow> = registry
            .windows
            .values()
            .filter(|w| w.category == category && !w.is_deleted())
            .cloned()
            .collect();
        windows.sort_by_key(|w| (w.created_at, w.id));
        Ok(windows)
    }
}

#[async_trait]
impl IdentityStore for InMemoryRegistry {
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        Ok(self.inner.lock().await.identities.get(&id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .identities
            .values()
            .find(|i| i.phone == phone)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .identities
            .values()
            .find(|i| i.email.as_deref() == Some(email))
            .cloned())
    }

    async fn insert(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut registry = self.inner.lock().await;
        registry.check_identity_unique(identity)?;
        registry.identities.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn swap_one_time_code(
        &self,
        id: IdentityId,
        expected: Option<DateTime<Utc>>,
        code: Option<&OneTimeCode>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut registry = self.inner.lock().await;
        let identity = registry.identity_mut(id)?;
        if identity.one_time_code.as_ref().map(|c| c.issued_at) != expected {
            return Ok(false);
        }
        identity.one_time_code = code.cloned();
        identity.updated_at = at;
        Ok(true)
    }

    async fn consume_one_time_code(
        &self,
        id: IdentityId,
        issued_at: DateTime<Utc>,
        consumption: CodeConsumption,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut registry = self.inner.lock().await;
        let identity = registry.identity_mut(id)?;
        if identity.one_time_code.as_ref().map(|c| c.issued_at) != Some(issued_at) {
            return Ok(false);
        }
        identity.one_time_code = None;
        match consumption {
            CodeConsumption::Verify => identity.verified = true,
            CodeConsumption::ResetPassword { password_hash } => {
                identity.password_hash = password_hash;
                identity.refresh_token = None;
            }
        }
        identity.updated_at = at;
        Ok(true)
    }

    async fn record_login(
        &self,
        id: IdentityId,
        refresh_fingerprint: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut registry = self.inner.lock().await;
        let identity = registry.identity_mut(id)?;
        identity.refresh_token = Some(refresh_fingerprint.to_string());
        identity.last_login_at = Some(at);
        identity.updated_at = at;
        Ok(())
    }

    async fn set_refresh_token(
        &self,
        id: IdentityId,
        refresh_fingerprint: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut registry = self.inner.lock().await;
        let identity = registry.identity_mut(id)?;
        identity.refresh_token = refresh_fingerprint.map(str::to_string);
        identity.updated_at = at;
        Ok(())
    }

    async fn set_password(
        &self,
        id: IdentityId,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut registry = self.inner.lock().await;
        let identity = registry.identity_mut(id)?;
        identity.password_hash = password_hash.to_string();
        identity.updated_at = at;
        Ok(())
    }

    async fn profiles_of(&self, identity_id: IdentityId) -> Result<Vec<RoleProfile>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .profiles
            .iter()
            .filter(|p| p.identity_id == identity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HierarchyDirectory for InMemoryRegistry {
    async fn state_of_district(&self, id: DistrictId) -> Result<Option<StateId>, StoreError> {
        Ok(self.inner.lock().await.districts.get(&id).map(|d| d.state_id))
    }

    async fn district_of_club(&self, id: ClubId) -> Result<Option<DistrictId>, StoreError> {
        Ok(self.inner.lock().await.clubs.get(&id).map(|c| c.district_id))
    }

    async fn club_of_student(&self, id: StudentId) -> Result<Option<ClubId>, StoreError> {
        Ok(self.inner.lock().await.students.get(&id).map(|s| s.club_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssfi_core::Role;

    fn identity(phone: &str) -> Identity {
        Identity::registered(
            "Tester".to_string(),
            phone.to_string(),
            None,
            Role::Student,
            String::new(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let registry = InMemoryRegistry::new();
        {
            let mut tx = registry.begin().await.unwrap();
            tx.insert_identity(&identity("9000000001")).await.unwrap();
        }
        assert!(registry.find_by_phone("9000000001").await.unwrap().is_none());

        let mut tx = registry.begin().await.unwrap();
        tx.insert_identity(&identity("9000000001")).await.unwrap();
        tx.commit().await.unwrap();
        assert!(registry.find_by_phone("9000000001").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn counters_are_per_scope() {
        let registry = InMemoryRegistry::new();
        let code = |c: &str| ScopeCode::new(c).unwrap();
        let ka = ScopeKey::for_role(
            Role::StateSecretary,
            &ssfi_membership::ScopeCodes::state(code("KA")),
        )
        .unwrap();
        let tn = ScopeKey::for_role(
            Role::StateSecretary,
            &ssfi_membership::ScopeCodes::state(code("TN")),
        )
        .unwrap();

        let mut tx = registry.begin().await.unwrap();
        assert_eq!(tx.next_sequence(&ka).await.unwrap(), 1);
        assert_eq!(tx.next_sequence(&ka).await.unwrap(), 2);
        assert_eq!(tx.next_sequence(&tn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_phone_rejected() {
        let registry = InMemoryRegistry::new();
        registry.insert(&identity("9000000001")).await.unwrap();
        let err = registry.insert(&identity("9000000001")).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Duplicate {
                field: "phone".to_string()
            }
        );
    }
}
