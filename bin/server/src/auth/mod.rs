//! Authentication for the registry server.
//!
//! This module provides:
//! - Shared application state wiring the domain services to one store
//! - Bearer-token extractors for Axum routes
//! - The `/auth/*` routes: registration, verification, login, refresh,
//!   logout and password management
//!
//! # Authorization Model
//!
//! Access tokens are stateless and short-lived. Every authenticated request
//! reloads the identity (so deactivation and expiry take effect at once)
//! and resolves the caller's hierarchy scope from its role profile.
//! Handlers then apply `require_role` and `require_own_scope` to the
//! specific record they act on.

pub mod middleware;
pub mod routes;

pub use middleware::{RequireAdmin, RequireAuth};

use chrono::Duration;
use ssfi_core::Clock;
use ssfi_membership::IdentifierPolicy;
use ssfi_platform_access::{
    AccessResolver, HierarchyDirectory, IdentityStore, NotificationSender, OtpPolicy,
    PasswordHasher, SessionManager, TokenIssuer,
};
use ssfi_registration::{
    ApplicationService, ApprovalWorkflow, RegistrationGate, RegistryStore, WindowStore,
};
use std::sync::Arc;

/// Everything the services need besides the store and the sender.
pub struct Settings {
    pub tokens: TokenIssuer,
    pub hasher: PasswordHasher,
    pub otp: OtpPolicy,
    pub identifiers: IdentifierPolicy,
    pub membership_term: Duration,
    pub secure_cookies: bool,
    pub clock: Arc<dyn Clock>,
}

/// Shared application state.
pub struct AppState {
    pub sessions: SessionManager,
    pub access: AccessResolver,
    pub gate: RegistrationGate,
    pub applications: ApplicationService,
    pub approvals: ApprovalWorkflow,
    /// Lifetime of the refresh cookie.
    pub refresh_ttl: Duration,
    /// Whether to set the Secure flag on cookies.
    pub secure_cookies: bool,
}

impl AppState {
    /// Wires every service to `store`.
    pub fn new<S>(store: S, sender: Arc<dyn NotificationSender>, settings: Settings) -> Self
    where
        S: IdentityStore + RegistryStore + WindowStore + HierarchyDirectory + 'static,
    {
        let store = Arc::new(store);
        let refresh_ttl = settings.tokens.refresh_ttl();
        let gate = RegistrationGate::new(store.clone(), settings.clock.clone());
        Self {
            sessions: SessionManager::new(
                store.clone(),
                sender.clone(),
                settings.tokens,
                settings.hasher,
                settings.otp,
                settings.clock.clone(),
            ),
            access: AccessResolver::new(store.clone(), store.clone()),
            applications: ApplicationService::new(
                store.clone(),
                gate.clone(),
                settings.clock.clone(),
            ),
            approvals: ApprovalWorkflow::new(
                store,
                sender,
                settings.hasher,
                settings.identifiers,
                settings.membership_term,
                settings.clock,
            ),
            gate,
            refresh_ttl,
            secure_cookies: settings.secure_cookies,
        }
    }
}
