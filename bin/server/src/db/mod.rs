//! Postgres implementation of the registry's store contracts.
//!
//! One [`PgStore`] implements every trait the services need:
//! - identities, one-time codes, refresh fingerprints and role profiles
//! - the hierarchy directory
//! - registration windows
//! - applications and the approval transaction

mod directory;
mod identity;
mod registry;
mod window;

use ssfi_platform_access::StoreError;
use sqlx::PgPool;
use std::fmt;

/// Store backed by a connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a driver error onto the store contract.
///
/// Unique violations are reported by the field their constraint guards.
fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err
        && db.is_unique_violation()
    {
        let field = match db.constraint() {
            Some("identities_phone_key") => "phone",
            Some("identities_email_key") => "email",
            Some("identities_uid_key") => "uid",
            Some("applications_pending_phone_category") => "pending application",
            Some("states_code_key" | "districts_state_code_key") => "code",
            _ => "record",
        };
        return StoreError::Duplicate {
            field: field.to_string(),
        };
    }
    StoreError::Unavailable {
        details: err.to_string(),
    }
}

/// A stored value failed to decode into its domain type.
fn corrupt(column: &str, value: impl fmt::Display, err: impl fmt::Display) -> StoreError {
    StoreError::Unavailable {
        details: format!("invalid {column} '{value}': {err}"),
    }
}

/// Parses a stored text column.
fn parse<T>(column: &str, raw: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.parse().map_err(|e| corrupt(column, raw, e))
}

fn parse_opt<T>(column: &str, raw: Option<&str>) -> Result<Option<T>, StoreError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.map(|raw| parse(column, raw)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssfi_core::{IdentityId, Role};

    #[test]
    fn parses_stored_ids_and_roles() {
        let id = IdentityId::new();
        let parsed: IdentityId = parse("id", &id.to_string()).unwrap();
        assert_eq!(parsed, id);

        let role: Role = parse("role", "CLUB_OWNER").unwrap();
        assert_eq!(role, Role::ClubOwner);

        let none: Option<Role> = parse_opt("role", None).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn corrupt_values_are_unavailable() {
        let err = parse::<Role>("role", "EMPEROR").unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { details } if details.contains("EMPEROR")));
    }

    #[test]
    fn driver_errors_become_unavailable() {
        let err = store_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }
}
