//! Authentication and session management.
//!
//! Sessions are stateless on the server: an access token carries the
//! caller's identity and a refresh token is honoured only while its
//! fingerprint is the one stored against the identity. Logging in again
//! replaces the fingerprint; logging out clears it.

use crate::error::AuthenticationError;
use crate::identity::{Identity, OneTimeCode};
use crate::notify::{NotificationSender, one_time_code_message};
use crate::otp::OtpPolicy;
use crate::password::PasswordHasher;
use crate::store::{CodeConsumption, IdentityStore};
use crate::token::{AccessClaims, TokenError, TokenIssuer, TokenPair, fingerprint};
use crate::validate::{normalize_optional_email, normalize_phone, validate_name, validate_password};
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use ssfi_core::{Clock, IdentityId, Role};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

type AuthResult<T> = Result<T, Report<AuthenticationError>>;

/// Self-registration request.
#[derive(Clone, Deserialize)]
pub struct Registration {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Role,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("full_name", &self.full_name)
            .field("phone", &self.phone)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Returned once a code has been issued and handed to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeReceipt {
    pub identity_id: IdentityId,
    pub expires_at: DateTime<Utc>,
}

/// A freshly minted access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: i64,
}

/// Registers identities, verifies codes, and issues and revokes tokens.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn IdentityStore>,
    sender: Arc<dyn NotificationSender>,
    tokens: TokenIssuer,
    hasher: PasswordHasher,
    otp: OtpPolicy,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        sender: Arc<dyn NotificationSender>,
        tokens: TokenIssuer,
        hasher: PasswordHasher,
        otp: OtpPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sender,
            tokens,
            hasher,
            otp,
            clock,
        }
    }

    /// The hasher used for stored passwords.
    #[must_use]
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Creates an unverified identity and sends it a one-time code.
    ///
    /// If delivery fails the identity is kept without a code and the caller
    /// may retry through [`resend_code`](Self::resend_code).
    ///
    /// # Errors
    ///
    /// `Validation` for bad input or an admin role, `DuplicateEntry` when
    /// the phone or email is taken, `DeliveryFailed` when the code could not
    /// be sent.
    #[instrument(skip(self, request), fields(phone = %request.phone, role = %request.role))]
    pub async fn register(&self, request: Registration) -> AuthResult<CodeReceipt> {
        if request.role.is_admin() {
            return Err(AuthenticationError::Validation {
                field: "role",
                reason: "cannot self-register as administrator".to_string(),
            }
            .into());
        }
        let full_name = validate_name(&request.full_name)?;
        let phone = normalize_phone(&request.phone)?;
        let email = normalize_optional_email(request.email.as_deref())?;
        validate_password(&request.password)?;

        self.ensure_unbound(&phone, email.as_deref()).await?;

        let identity = Identity::registered(
            full_name,
            phone,
            email,
            request.role,
            self.hasher.hash(&request.password),
            self.clock.now(),
        );
        self.store
            .insert(&identity)
            .await
            .map_err(AuthenticationError::from)?;
        info!(identity_id = %identity.id, "identity registered");

        self.deliver_code(&identity).await
    }

    /// Confirms phone ownership with the outstanding code.
    ///
    /// # Errors
    ///
    /// `AlreadyVerified`, `InvalidCredentials` for a missing or wrong code,
    /// `CodeExpired` once the code has lapsed.
    #[instrument(skip(self, code))]
    pub async fn verify_code(&self, phone: &str, code: &str) -> AuthResult<()> {
        let identity = self.identity_by_phone(phone).await?;
        if identity.verified {
            return Err(AuthenticationError::AlreadyVerified.into());
        }
        let issued_at = self.check_code(&identity, code)?;

        let consumed = self
            .store
            .consume_one_time_code(
                identity.id,
                issued_at,
                CodeConsumption::Verify,
                self.clock.now(),
            )
            .await
            .map_err(AuthenticationError::from)?;
        if !consumed {
            return Err(AuthenticationError::InvalidCredentials.into());
        }
        info!(identity_id = %identity.id, "identity verified");
        Ok(())
    }

    /// Issues a replacement verification code, subject to the cooldown.
    ///
    /// # Errors
    ///
    /// `AlreadyVerified`, `RateLimited` inside the cooldown, or
    /// `DeliveryFailed`.
    #[instrument(skip(self))]
    pub async fn resend_code(&self, phone: &str) -> AuthResult<CodeReceipt> {
        let identity = self.identity_by_phone(phone).await?;
        if identity.verified {
            return Err(AuthenticationError::AlreadyVerified.into());
        }
        self.deliver_code(&identity).await
    }

    /// Authenticates with phone and password and issues a token pair.
    ///
    /// Checks run in order: active, verified, password, approved, membership
    /// expiry. The administrator skips the last two.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown phone or wrong password, one of
    /// the lifecycle errors otherwise.
    #[instrument(skip(self, password))]
    pub async fn login(&self, phone: &str, password: &str) -> AuthResult<TokenPair> {
        let phone = normalize_phone(phone)?;
        let identity = self
            .store
            .find_by_phone(&phone)
            .await
            .map_err(AuthenticationError::from)?
            .ok_or(AuthenticationError::InvalidCredentials)?;

        if !identity.active {
            return Err(AuthenticationError::AccountInactive.into());
        }
        if !identity.verified {
            return Err(AuthenticationError::NotVerified.into());
        }
        if !self.hasher.verify(password, &identity.password_hash) {
            warn!(identity_id = %identity.id, "password mismatch");
            return Err(AuthenticationError::InvalidCredentials.into());
        }
        if !identity.is_approved() {
            return Err(AuthenticationError::NotApproved.into());
        }
        if identity.is_membership_expired(self.clock.now()) {
            return Err(AuthenticationError::MembershipExpired.into());
        }

        let pair = self.issue_tokens(&identity).await?;
        info!(identity_id = %identity.id, role = %identity.role, "login succeeded");
        Ok(pair)
    }

    /// Issues an access/refresh pair and makes the refresh token the only
    /// one accepted for this identity.
    ///
    /// # Errors
    ///
    /// Fails if signing or storage fails.
    pub async fn issue_tokens(&self, identity: &Identity) -> AuthResult<TokenPair> {
        let now = self.clock.now();
        let access_token = self.tokens.issue_access(
            identity.id.to_string(),
            identity.uid.as_ref().map(|uid| uid.as_str().to_string()),
            identity.role,
            identity.phone.clone(),
            identity.email.clone(),
            now,
        );
        let access_token = access_token.map_err(token_failure)?;
        let refresh_token = self
            .tokens
            .issue_refresh(identity.id.to_string(), now)
            .map_err(token_failure)?;

        self.store
            .record_login(identity.id, &fingerprint(&refresh_token), now)
            .await
            .map_err(AuthenticationError::from)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.tokens.access_ttl().num_seconds(),
        })
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// The refresh token itself is not rotated.
    ///
    /// # Errors
    ///
    /// `TokenExpired`, `InvalidToken` for a bad signature or a token that is
    /// no longer the stored one, `AccountInactive`.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<AccessToken> {
        let now = self.clock.now();
        let claims = self
            .tokens
            .verify_refresh(refresh_token, now)
            .map_err(token_failure)?;
        let identity = self.identity_for_subject(&claims.sub).await?;

        let presented = fingerprint(refresh_token);
        let current = identity.refresh_token.as_deref().unwrap_or_default();
        if !bool::from(presented.as_bytes().ct_eq(current.as_bytes())) {
            warn!(identity_id = %identity.id, "refresh with revoked token");
            return Err(AuthenticationError::InvalidToken {
                reason: "refresh token has been revoked".to_string(),
            }
            .into());
        }
        if !identity.active {
            return Err(AuthenticationError::AccountInactive.into());
        }

        let access_token = self
            .tokens
            .issue_access(
                identity.id.to_string(),
                identity.uid.as_ref().map(|uid| uid.as_str().to_string()),
                identity.role,
                identity.phone.clone(),
                identity.email.clone(),
                now,
            )
            .map_err(token_failure)?;
        Ok(AccessToken {
            access_token,
            expires_in: self.tokens.access_ttl().num_seconds(),
        })
    }

    /// Revokes the stored refresh token.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors.
    #[instrument(skip(self))]
    pub async fn logout(&self, identity_id: IdentityId) -> AuthResult<()> {
        self.store
            .set_refresh_token(identity_id, None, self.clock.now())
            .await
            .map_err(AuthenticationError::from)?;
        info!(%identity_id, "logged out");
        Ok(())
    }

    /// Validates a bearer token and loads the identity behind it.
    ///
    /// # Errors
    ///
    /// `TokenExpired`, `InvalidToken` (including a deleted identity),
    /// `AccountInactive`.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<(AccessClaims, Identity)> {
        let claims = self
            .tokens
            .verify_access(access_token, self.clock.now())
            .map_err(token_failure)?;
        let identity = self.identity_for_subject(&claims.sub).await?;
        if !identity.active {
            return Err(AuthenticationError::AccountInactive.into());
        }
        Ok((claims, identity))
    }

    /// Replaces the password after checking the current one.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` when `current` does not match, `Validation` for
    /// a weak replacement.
    #[instrument(skip(self, current, replacement))]
    pub async fn change_password(
        &self,
        identity_id: IdentityId,
        current: &str,
        replacement: &str,
    ) -> AuthResult<()> {
        validate_password(replacement)?;
        let identity = self
            .store
            .find_by_id(identity_id)
            .await
            .map_err(AuthenticationError::from)?
            .ok_or(AuthenticationError::IdentityNotFound)?;
        if !self.hasher.verify(current, &identity.password_hash) {
            return Err(AuthenticationError::InvalidCredentials.into());
        }
        self.store
            .set_password(identity_id, &self.hasher.hash(replacement), self.clock.now())
            .await
            .map_err(AuthenticationError::from)?;
        info!(%identity_id, "password changed");
        Ok(())
    }

    /// Sends a code authorizing a password reset, subject to the cooldown.
    ///
    /// # Errors
    ///
    /// `IdentityNotFound`, `RateLimited`, `DeliveryFailed`.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, phone: &str) -> AuthResult<CodeReceipt> {
        let identity = self.identity_by_phone(phone).await?;
        self.deliver_code(&identity).await
    }

    /// Sets a new password using the outstanding code and revokes the
    /// refresh token.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials`, `CodeExpired`, `Validation`.
    #[instrument(skip(self, code, replacement))]
    pub async fn reset_password(
        &self,
        phone: &str,
        code: &str,
        replacement: &str,
    ) -> AuthResult<()> {
        validate_password(replacement)?;
        let identity = self.identity_by_phone(phone).await?;
        let issued_at = self.check_code(&identity, code)?;

        let consumed = self
            .store
            .consume_one_time_code(
                identity.id,
                issued_at,
                CodeConsumption::ResetPassword {
                    password_hash: self.hasher.hash(replacement),
                },
                self.clock.now(),
            )
            .await
            .map_err(AuthenticationError::from)?;
        if !consumed {
            return Err(AuthenticationError::InvalidCredentials.into());
        }
        info!(identity_id = %identity.id, "password reset");
        Ok(())
    }

    async fn ensure_unbound(&self, phone: &str, email: Option<&str>) -> AuthResult<()> {
        if self
            .store
            .find_by_phone(phone)
            .await
            .map_err(AuthenticationError::from)?
            .is_some()
        {
            return Err(AuthenticationError::DuplicateEntry {
                field: "phone".to_string(),
            }
            .into());
        }
        if let Some(email) = email
            && self
                .store
                .find_by_email(email)
                .await
                .map_err(AuthenticationError::from)?
                .is_some()
        {
            return Err(AuthenticationError::DuplicateEntry {
                field: "email".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn identity_by_phone(&self, phone: &str) -> AuthResult<Identity> {
        let phone = normalize_phone(phone)?;
        let identity = self
            .store
            .find_by_phone(&phone)
            .await
            .map_err(AuthenticationError::from)?
            .ok_or(AuthenticationError::IdentityNotFound)?;
        Ok(identity)
    }

    async fn identity_for_subject(&self, sub: &str) -> AuthResult<Identity> {
        let invalid = || AuthenticationError::InvalidToken {
            reason: "unknown subject".to_string(),
        };
        let id: IdentityId = sub.parse().map_err(|_| invalid())?;
        let identity = self
            .store
            .find_by_id(id)
            .await
            .map_err(AuthenticationError::from)?
            .ok_or_else(invalid)?;
        Ok(identity)
    }

    /// Returns the `issued_at` of the matching, unexpired code.
    fn check_code(&self, identity: &Identity, code: &str) -> AuthResult<DateTime<Utc>> {
        let Some(stored) = identity.one_time_code.as_ref() else {
            return Err(AuthenticationError::InvalidCredentials.into());
        };
        if !bool::from(stored.code.as_bytes().ct_eq(code.trim().as_bytes())) {
            return Err(AuthenticationError::InvalidCredentials.into());
        }
        if stored.is_expired(self.clock.now()) {
            return Err(AuthenticationError::CodeExpired.into());
        }
        Ok(stored.issued_at)
    }

    /// Issues, stores and sends a code; restores the previous code if the
    /// sender fails.
    async fn deliver_code(&self, identity: &Identity) -> AuthResult<CodeReceipt> {
        let now = self.clock.now();
        let previous = identity.one_time_code.as_ref();
        if let Some(wait) = self.otp.retry_after(previous, now) {
            return Err(AuthenticationError::RateLimited {
                retry_after_seconds: wait.num_seconds().max(1),
            }
            .into());
        }

        let code = self.otp.issue(now);
        let swapped = self
            .store
            .swap_one_time_code(
                identity.id,
                previous.map(|c| c.issued_at),
                Some(&code),
                now,
            )
            .await
            .map_err(AuthenticationError::from)?;
        if !swapped {
            // Another request issued a code between our read and write.
            return Err(AuthenticationError::RateLimited {
                retry_after_seconds: self.otp.cooldown().num_seconds(),
            }
            .into());
        }

        let message = one_time_code_message(&code.code, self.otp.lifetime().num_minutes());
        if let Err(err) = self.sender.send(&identity.phone, &message).await {
            warn!(identity_id = %identity.id, reason = %err.reason, "code delivery failed");
            self.restore_code(identity.id, &code, previous).await;
            return Err(AuthenticationError::from(err).into());
        }

        Ok(CodeReceipt {
            identity_id: identity.id,
            expires_at: code.expires_at,
        })
    }

    async fn restore_code(
        &self,
        id: IdentityId,
        issued: &OneTimeCode,
        previous: Option<&OneTimeCode>,
    ) {
        match self
            .store
            .swap_one_time_code(id, Some(issued.issued_at), previous, self.clock.now())
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(identity_id = %id, "code replaced before it could be restored"),
            Err(err) => warn!(identity_id = %id, error = %err, "failed to restore code"),
        }
    }
}

fn token_failure(err: TokenError) -> AuthenticationError {
    match err {
        TokenError::Expired => AuthenticationError::TokenExpired,
        other => AuthenticationError::InvalidToken {
            reason: other.to_string(),
        },
    }
}
