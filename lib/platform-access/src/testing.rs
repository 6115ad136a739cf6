//! In-memory fakes shared by this crate's tests.

use crate::error::{DeliveryError, StoreError};
use crate::identity::{Identity, OneTimeCode};
use crate::notify::NotificationSender;
use crate::profile::RoleProfile;
use crate::scope::HierarchyDirectory;
use crate::store::{CodeConsumption, IdentityStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssfi_core::{ClubId, DistrictId, IdentityId, StateId, StudentId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: Mutex<HashMap<IdentityId, Identity>>,
    profiles: Mutex<Vec<RoleProfile>>,
}

impl MemoryIdentityStore {
    pub fn get(&self, id: IdentityId) -> Option<Identity> {
        self.identities.lock().unwrap().get(&id).cloned()
    }

    pub fn add_profile(&self, profile: RoleProfile) {
        self.profiles.lock().unwrap().push(profile);
    }

    pub fn update(&self, id: IdentityId, f: impl FnOnce(&mut Identity)) {
        f(self.identities.lock().unwrap().get_mut(&id).unwrap());
    }

    fn with<T>(
        &self,
        id: IdentityId,
        f: impl FnOnce(&mut Identity) -> T,
    ) -> Result<T, StoreError> {
        let mut identities = self.identities.lock().unwrap();
        let identity = identities.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "identity",
            id: id.to_string(),
        })?;
        Ok(f(identity))
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        Ok(self.get(id))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .identities
            .lock()
            .unwrap()
            .values()
            .find(|i| i.phone == phone)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .identities
            .lock()
            .unwrap()
            .values()
            .find(|i| i.email.as_deref() == Some(email))
            .cloned())
    }

    async fn insert(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut identities = self.identities.lock().unwrap();
        if identities.values().any(|i| i.phone == identity.phone) {
            return Err(StoreError::Duplicate {
                field: "phone".to_string(),
            });
        }
        identities.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn swap_one_time_code(
        &self,
        id: IdentityId,
        expected: Option<DateTime<Utc>>,
        code: Option<&OneTimeCode>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.with(id, |identity| {
            if identity.one_time_code.as_ref().map(|c| c.issued_at) != expected {
                return false;
            }
            identity.one_time_code = code.cloned();
            identity.updated_at = at;
            true
        })
    }

    async fn consume_one_time_code(
        &self,
        id: IdentityId,
        issued_at: DateTime<Utc>,
        consumption: CodeConsumption,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.with(id, |identity| {
            if identity.one_time_code.as_ref().map(|c| c.issued_at) != Some(issued_at) {
                return false;
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
            true
        })
    }

    async fn record_login(
        &self,
        id: IdentityId,
        refresh_fingerprint: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with(id, |identity| {
            identity.refresh_token = Some(refresh_fingerprint.to_string());
            identity.last_login_at = Some(at);
            identity.updated_at = at;
        })
    }

    async fn set_refresh_token(
        &self,
        id: IdentityId,
        refresh_fingerprint: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with(id, |identity| {
            identity.refresh_token = refresh_fingerprint.map(str::to_string);
            identity.updated_at = at;
        })
    }

    async fn set_password(
        &self,
        id: IdentityId,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with(id, |identity| {
            identity.password_hash = password_hash.to_string();
            identity.updated_at = at;
        })
    }

    async fn profiles_of(&self, identity_id: IdentityId) -> Result<Vec<RoleProfile>, StoreError> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.identity_id == identity_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingSender {
    pub fn failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Extracts the six-digit code from the latest message.
    pub fn last_code(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let (_, message) = sent.last().unwrap();
        message
            .split(|c: char| !c.is_ascii_digit())
            .find(|part| part.len() == crate::otp::CODE_LENGTH)
            .unwrap()
            .to_string()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError {
                reason: "gateway down".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    pub districts: HashMap<DistrictId, StateId>,
    pub clubs: HashMap<ClubId, DistrictId>,
    pub students: HashMap<StudentId, ClubId>,
}

#[async_trait]
impl HierarchyDirectory for MemoryDirectory {
    async fn state_of_district(&self, id: DistrictId) -> Result<Option<StateId>, StoreError> {
        Ok(self.districts.get(&id).copied())
    }

    async fn district_of_club(&self, id: ClubId) -> Result<Option<DistrictId>, StoreError> {
        Ok(self.clubs.get(&id).copied())
    }

    async fn club_of_student(&self, id: StudentId) -> Result<Option<ClubId>, StoreError> {
        Ok(self.students.get(&id).copied())
    }
}
