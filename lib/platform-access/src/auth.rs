//! The authenticated caller as seen by request handlers.

use crate::error::AuthorizationError;
use crate::identity::Identity;
use crate::scope::{CallerScope, require_role};
use crate::token::AccessClaims;
use rootcause::prelude::Report;
use ssfi_core::{IdentityId, Role};

/// A caller whose bearer token verified, with its identity and resolved
/// scope.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    claims: AccessClaims,
    identity: Identity,
    scope: CallerScope,
}

impl AuthenticatedIdentity {
    #[must_use]
    pub fn new(claims: AccessClaims, identity: Identity, scope: CallerScope) -> Self {
        Self {
            claims,
            identity,
            scope,
        }
    }

    #[must_use]
    pub fn id(&self) -> IdentityId {
        self.identity.id
    }

    /// Role as currently stored, which may be newer than the token's.
    #[must_use]
    pub fn role(&self) -> Role {
        self.identity.role
    }

    #[must_use]
    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn scope(&self) -> &CallerScope {
        &self.scope
    }

    /// Shorthand for [`require_role`] on this caller.
    ///
    /// # Errors
    ///
    /// `RoleNotAllowed` when the caller's role is not listed.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), Report<AuthorizationError>> {
        require_role(self.role(), allowed)
    }
}
