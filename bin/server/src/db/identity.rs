//! Identities and role profiles.

use super::{PgStore, parse, parse_opt, store_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssfi_core::{ClubId, DistrictId, IdentityId, StateId, StudentId};
use ssfi_platform_access::{
    CodeConsumption, Identity, IdentityStore, OneTimeCode, ProfileDetails, ProfileLink,
    RoleProfile, StoreError,
};
use sqlx::postgres::PgQueryResult;
use sqlx::{FromRow, PgExecutor};
use tracing::instrument;

const IDENTITY_COLUMNS: &str = "id, uid, full_name, phone, email, password_hash, role, verified, \
     approved, active, membership_expires_at, otp_code, otp_issued_at, otp_expires_at, \
     refresh_token, last_login_at, created_at, updated_at";

/// Row type for identity queries.
#[derive(FromRow)]
struct IdentityRow {
    id: String,
    uid: Option<String>,
    full_name: String,
    phone: String,
    email: Option<String>,
    password_hash: String,
    role: String,
    verified: bool,
    approved: bool,
    active: bool,
    membership_expires_at: Option<DateTime<Utc>>,
    otp_code: Option<String>,
    otp_issued_at: Option<DateTime<Utc>>,
    otp_expires_at: Option<DateTime<Utc>>,
    refresh_token: Option<String>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IdentityRow {
    fn try_into_identity(self) -> Result<Identity, StoreError> {
        let one_time_code = match (self.otp_code, self.otp_issued_at, self.otp_expires_at) {
            (Some(code), Some(issued_at), Some(expires_at)) => Some(OneTimeCode {
                code,
                issued_at,
                expires_at,
            }),
            _ => None,
        };
        Ok(Identity {
            id: parse("identities.id", &self.id)?,
            uid: parse_opt("identities.uid", self.uid.as_deref())?,
            full_name: self.full_name,
            phone: self.phone,
            email: self.email,
            password_hash: self.password_hash,
            role: parse("identities.role", &self.role)?,
            verified: self.verified,
            approved: self.approved,
            active: self.active,
            membership_expires_at: self.membership_expires_at,
            one_time_code,
            refresh_token: self.refresh_token,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row type for role profile queries.
#[derive(FromRow)]
struct ProfileRow {
    id: String,
    identity_id: String,
    level: String,
    state_id: Option<i64>,
    district_id: Option<i64>,
    club_id: Option<i64>,
    student_id: Option<i64>,
    contact_address: Option<String>,
    identity_document: Option<String>,
    club_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl ProfileRow {
    fn try_into_profile(self) -> Result<RoleProfile, StoreError> {
        let nodes = (self.state_id, self.district_id, self.club_id, self.student_id);
        let link = match (self.level.as_str(), nodes) {
            ("state", (Some(id), ..)) => ProfileLink::State {
                state_id: StateId::new(id),
            },
            ("district", (_, Some(id), ..)) => ProfileLink::District {
                district_id: DistrictId::new(id),
            },
            ("club", (_, _, Some(id), _)) => ProfileLink::Club {
                club_id: ClubId::new(id),
            },
            ("student", (.., Some(id))) => ProfileLink::Student {
                student_id: StudentId::new(id),
            },
            (level, _) => {
                return Err(super::corrupt(
                    "role_profiles.level",
                    level,
                    "node column missing",
                ));
            }
        };
        Ok(RoleProfile {
            id: parse("role_profiles.id", &self.id)?,
            identity_id: parse("role_profiles.identity_id", &self.identity_id)?,
            link,
            details: ProfileDetails {
                contact_address: self.contact_address,
                identity_document: self.identity_document,
                club_name: self.club_name,
            },
            created_at: self.created_at,
        })
    }
}

async fn find_one<'e>(
    executor: impl PgExecutor<'e>,
    filter: &str,
    value: &str,
) -> Result<Option<Identity>, StoreError> {
    let row: Option<IdentityRow> =
        sqlx::query_as(&format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE {filter} = $1"))
            .bind(value)
            .fetch_optional(executor)
            .await
            .map_err(store_error)?;
    row.map(IdentityRow::try_into_identity).transpose()
}

/// Finds an identity by phone, falling back to email.
pub(super) async fn find_by_contact<'e>(
    executor: impl PgExecutor<'e>,
    phone: &str,
    email: Option<&str>,
) -> Result<Option<Identity>, StoreError> {
    let row: Option<IdentityRow> = sqlx::query_as(&format!(
        r#"
        SELECT {IDENTITY_COLUMNS}
        FROM identities
        WHERE phone = $1 OR ($2::TEXT IS NOT NULL AND email = $2)
        ORDER BY (phone = $1) DESC
        LIMIT 1
        "#
    ))
    .bind(phone)
    .bind(email)
    .fetch_optional(executor)
    .await
    .map_err(store_error)?;
    row.map(IdentityRow::try_into_identity).transpose()
}

pub(super) async fn uid_exists<'e>(
    executor: impl PgExecutor<'e>,
    uid: &str,
) -> Result<bool, StoreError> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM identities WHERE uid = $1)")
        .bind(uid)
        .fetch_one(executor)
        .await
        .map_err(store_error)
}

pub(super) async fn insert_identity<'e>(
    executor: impl PgExecutor<'e>,
    identity: &Identity,
) -> Result<(), StoreError> {
    let code = identity.one_time_code.as_ref();
    sqlx::query(
        r#"
        INSERT INTO identities (
            id, uid, full_name, phone, email, password_hash, role, verified, approved, active,
            membership_expires_at, otp_code, otp_issued_at, otp_expires_at, refresh_token,
            last_login_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(identity.id.to_string())
    .bind(identity.uid.as_ref().map(|uid| uid.as_str()))
    .bind(&identity.full_name)
    .bind(&identity.phone)
    .bind(identity.email.as_deref())
    .bind(&identity.password_hash)
    .bind(identity.role.as_str())
    .bind(identity.verified)
    .bind(identity.approved)
    .bind(identity.active)
    .bind(identity.membership_expires_at)
    .bind(code.map(|c| c.code.as_str()))
    .bind(code.map(|c| c.issued_at))
    .bind(code.map(|c| c.expires_at))
    .bind(identity.refresh_token.as_deref())
    .bind(identity.last_login_at)
    .bind(identity.created_at)
    .bind(identity.updated_at)
    .execute(executor)
    .await
    .map_err(store_error)?;
    Ok(())
}

/// Rewrites the fields approval may change.
pub(super) async fn update_identity<'e>(
    executor: impl PgExecutor<'e>,
    identity: &Identity,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE identities
        SET uid = $2, full_name = $3, email = $4, role = $5, verified = $6, approved = $7,
            active = $8, membership_expires_at = $9, updated_at = $10
        WHERE id = $1
        "#,
    )
    .bind(identity.id.to_string())
    .bind(identity.uid.as_ref().map(|uid| uid.as_str()))
    .bind(&identity.full_name)
    .bind(identity.email.as_deref())
    .bind(identity.role.as_str())
    .bind(identity.verified)
    .bind(identity.approved)
    .bind(identity.active)
    .bind(identity.membership_expires_at)
    .bind(identity.updated_at)
    .execute(executor)
    .await
    .map_err(store_error)?;
    expect_updated(identity.id, result)
}

pub(super) async fn insert_profile<'e>(
    executor: impl PgExecutor<'e>,
    profile: &RoleProfile,
) -> Result<(), StoreError> {
    let (level, state_id, district_id, club_id, student_id) = match profile.link {
        ProfileLink::State { state_id } => ("state", Some(state_id.get()), None, None, None),
        ProfileLink::District { district_id } => {
            ("district", None, Some(district_id.get()), None, None)
        }
        ProfileLink::Club { club_id } => ("club", None, None, Some(club_id.get()), None),
        ProfileLink::Student { student_id } => {
            ("student", None, None, None, Some(student_id.get()))
        }
    };
    sqlx::query(
        r#"
        INSERT INTO role_profiles (
            id, identity_id, level, state_id, district_id, club_id, student_id,
            contact_address, identity_document, club_name, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(profile.id.to_string())
    .bind(profile.identity_id.to_string())
    .bind(level)
    .bind(state_id)
    .bind(district_id)
    .bind(club_id)
    .bind(student_id)
    .bind(profile.details.contact_address.as_deref())
    .bind(profile.details.identity_document.as_deref())
    .bind(profile.details.club_name.as_deref())
    .bind(profile.created_at)
    .execute(executor)
    .await
    .map_err(store_error)?;
    Ok(())
}

fn expect_updated(id: IdentityId, result: PgQueryResult) -> Result<(), StoreError> {
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound {
            entity: "identity",
            id: id.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        find_one(&self.pool, "id", &id.to_string()).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError> {
        find_one(&self.pool, "phone", phone).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        find_one(&self.pool, "email", email).await
    }

    #[instrument(skip_all, fields(identity_id = %identity.id))]
    async fn insert(&self, identity: &Identity) -> Result<(), StoreError> {
        insert_identity(&self.pool, identity).await
    }

    #[instrument(skip(self, code))]
    async fn swap_one_time_code(
        &self,
        id: IdentityId,
        expected: Option<DateTime<Utc>>,
        code: Option<&OneTimeCode>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET otp_code = $3, otp_issued_at = $4, otp_expires_at = $5, updated_at = $6
            WHERE id = $1 AND otp_issued_at IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(id.to_string())
        .bind(expected)
        .bind(code.map(|c| c.code.as_str()))
        .bind(code.map(|c| c.issued_at))
        .bind(code.map(|c| c.expires_at))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, consumption))]
    async fn consume_one_time_code(
        &self,
        id: IdentityId,
        issued_at: DateTime<Utc>,
        consumption: CodeConsumption,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let query = match &consumption {
            CodeConsumption::Verify => sqlx::query(
                r#"
                UPDATE identities
                SET otp_code = NULL, otp_issued_at = NULL, otp_expires_at = NULL,
                    verified = TRUE, updated_at = $3
                WHERE id = $1 AND otp_issued_at = $2
                "#,
            ),
            CodeConsumption::ResetPassword { .. } => sqlx::query(
                r#"
                UPDATE identities
                SET otp_code = NULL, otp_issued_at = NULL, otp_expires_at = NULL,
                    refresh_token = NULL, password_hash = $4, updated_at = $3
                WHERE id = $1 AND otp_issued_at = $2
                "#,
            ),
        };
        let query = query.bind(id.to_string()).bind(issued_at).bind(at);
        let query = match consumption {
            CodeConsumption::Verify => query,
            CodeConsumption::ResetPassword { password_hash } => query.bind(password_hash),
        };
        let result = query.execute(&self.pool).await.map_err(store_error)?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, refresh_fingerprint))]
    async fn record_login(
        &self,
        id: IdentityId,
        refresh_fingerprint: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET refresh_token = $2, last_login_at = $3, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(refresh_fingerprint)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        expect_updated(id, result)
    }

    #[instrument(skip(self, refresh_fingerprint))]
    async fn set_refresh_token(
        &self,
        id: IdentityId,
        refresh_fingerprint: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE identities SET refresh_token = $2, updated_at = $3 WHERE id = $1")
                .bind(id.to_string())
                .bind(refresh_fingerprint)
                .bind(at)
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
        expect_updated(id, result)
    }

    #[instrument(skip(self, password_hash))]
    async fn set_password(
        &self,
        id: IdentityId,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE identities SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(id.to_string())
                .bind(password_hash)
                .bind(at)
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
        expect_updated(id, result)
    }

    async fn profiles_of(&self, identity_id: IdentityId) -> Result<Vec<RoleProfile>, StoreError> {
        let rows: Vec<ProfileRow> = sqlx::query_as(
            r#"
            SELECT id, identity_id, level, state_id, district_id, club_id, student_id,
                   contact_address, identity_document, club_name, created_at
            FROM role_profiles
            WHERE identity_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(identity_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.into_iter().map(ProfileRow::try_into_profile).collect()
    }
}
