//! First-run creation of the global administrator.

use crate::approval::allocate_identifier;
use crate::error::RegistrationError;
use crate::store::RegistryStore;
use rootcause::prelude::Report;
use ssfi_core::{Clock, IdentityId, Role};
use ssfi_membership::{IdentifierPolicy, ScopeCodes, ScopeKey};
use ssfi_platform_access::validate::{
    normalize_optional_email, normalize_phone, validate_name, validate_password,
};
use ssfi_platform_access::{Identity, PasswordHasher};
use tracing::{info, instrument};

/// Administrator credentials supplied by configuration.
#[derive(Clone)]
pub struct AdminSeed {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created { identity_id: IdentityId, uid: String },
    AlreadyPresent { identity_id: IdentityId },
}

/// Creates the administrator unless an identity already holds its phone
/// or email.
///
/// The administrator is verified, approved, never expires, and gets an
/// identifier of the form `PREFIX-00-00-00-NNNN` from the same counter
/// path approvals use.
///
/// # Errors
///
/// `Validation` for bad seed values, or a storage error.
#[instrument(skip_all)]
pub async fn bootstrap_admin(
    store: &dyn RegistryStore,
    hasher: &PasswordHasher,
    policy: &IdentifierPolicy,
    clock: &dyn Clock,
    seed: AdminSeed,
) -> Result<BootstrapOutcome, Report<RegistrationError>> {
    let full_name = validate_name(&seed.full_name).map_err(RegistrationError::from)?;
    let phone = normalize_phone(&seed.phone).map_err(RegistrationError::from)?;
    let email = normalize_optional_email(seed.email.as_deref()).map_err(RegistrationError::from)?;
    validate_password(&seed.password).map_err(RegistrationError::from)?;

    let mut tx = store.begin().await.map_err(RegistrationError::from)?;
    if let Some(existing) = tx
        .find_identity_by_contact(&phone, email.as_deref())
        .await
        .map_err(RegistrationError::from)?
    {
        info!(identity_id = %existing.id, "administrator already present");
        return Ok(BootstrapOutcome::AlreadyPresent {
            identity_id: existing.id,
        });
    }

    let key =
        ScopeKey::for_role(Role::GlobalAdmin, &ScopeCodes::default()).map_err(RegistrationError::from)?;
    let uid = allocate_identifier(tx.as_mut(), policy, &key).await?;
    let identity = Identity::provisioned(
        uid.clone(),
        full_name,
        phone,
        email,
        Role::GlobalAdmin,
        hasher.hash(&seed.password),
        None,
        clock.now(),
    );
    tx.insert_identity(&identity)
        .await
        .map_err(RegistrationError::from)?;
    tx.commit().await.map_err(RegistrationError::from)?;

    info!(identity_id = %identity.id, %uid, "administrator created");
    Ok(BootstrapOutcome::Created {
        identity_id: identity.id,
        uid: uid.to_string(),
    })
}
