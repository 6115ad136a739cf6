//! Applications and the approval transaction.

use super::{PgStore, directory, identity, parse, parse_opt, store_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use ssfi_core::{ApplicationId, ClubId, DistrictId, StateId, StudentId};
use ssfi_membership::{MembershipId, ScopeCode, ScopeKey};
use ssfi_platform_access::{Identity, RoleProfile, StoreError};
use ssfi_registration::{
    ApplicationRecord, ApprovalTx, ClubNode, DistrictNode, RegistryStore, StateNode,
};
use sqlx::{FromRow, PgExecutor, Postgres, Transaction};
use tracing::instrument;

const APPLICATION_COLUMNS: &str = "id, category, status, applicant, codes, placement, details, \
     submitted_at, approved_at, approved_by, rejected_at, rejected_by, rejection_remarks, \
     identity_id, uid";

/// Row type for application queries.
///
/// Applicant, codes, placement and details are stored as JSON.
#[derive(FromRow)]
struct ApplicationRow {
    id: String,
    category: String,
    status: String,
    applicant: serde_json::Value,
    codes: serde_json::Value,
    placement: serde_json::Value,
    details: serde_json::Value,
    submitted_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<String>,
    rejected_at: Option<DateTime<Utc>>,
    rejected_by: Option<String>,
    rejection_remarks: Option<String>,
    identity_id: Option<String>,
    uid: Option<String>,
}

fn from_json<T: DeserializeOwned>(column: &str, value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| super::corrupt(column, "<json>", e))
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Unavailable {
        details: format!("encode json: {e}"),
    })
}

impl ApplicationRow {
    fn try_into_record(self) -> Result<ApplicationRecord, StoreError> {
        Ok(ApplicationRecord {
            id: parse("applications.id", &self.id)?,
            category: parse("applications.category", &self.category)?,
            applicant: from_json("applications.applicant", self.applicant)?,
            codes: from_json("applications.codes", self.codes)?,
            placement: from_json("applications.placement", self.placement)?,
            details: from_json("applications.details", self.details)?,
            status: parse("applications.status", &self.status)?,
            submitted_at: self.submitted_at,
            approved_at: self.approved_at,
            approved_by: parse_opt("applications.approved_by", self.approved_by.as_deref())?,
            rejected_at: self.rejected_at,
            rejected_by: parse_opt("applications.rejected_by", self.rejected_by.as_deref())?,
            rejection_remarks: self.rejection_remarks,
            identity_id: parse_opt("applications.identity_id", self.identity_id.as_deref())?,
            uid: parse_opt("applications.uid", self.uid.as_deref())?,
        })
    }
}

async fn find_application<'e>(
    executor: impl PgExecutor<'e>,
    id: ApplicationId,
    for_update: bool,
) -> Result<Option<ApplicationRecord>, StoreError> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row: Option<ApplicationRow> = sqlx::query_as(&format!(
        "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1 {lock}"
    ))
    .bind(id.to_string())
    .fetch_optional(executor)
    .await
    .map_err(store_error)?;
    row.map(ApplicationRow::try_into_record).transpose()
}

#[async_trait]
impl RegistryStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn ApprovalTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(store_error)?;
        Ok(Box::new(PgApprovalTx { tx }))
    }

    #[instrument(skip_all, fields(application_id = %record.id))]
    async fn insert_application(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO applications (
                id, category, status, phone, applicant, codes, placement, details, submitted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.category.as_str())
        .bind(record.status.as_str())
        .bind(&record.applicant.phone)
        .bind(to_json(&record.applicant)?)
        .bind(to_json(&record.codes)?)
        .bind(to_json(&record.placement)?)
        .bind(to_json(&record.details)?)
        .bind(record.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn find_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        find_application(&self.pool, id, false).await
    }

    async fn find_state(&self, id: StateId) -> Result<Option<StateNode>, StoreError> {
        self.state(id).await
    }

    async fn find_state_by_code(&self, code: &ScopeCode) -> Result<Option<StateNode>, StoreError> {
        self.state_by_code(code).await
    }

    async fn find_district(&self, id: DistrictId) -> Result<Option<DistrictNode>, StoreError> {
        self.district(id).await
    }

    async fn find_district_by_code(
        &self,
        state_id: StateId,
        code: &ScopeCode,
    ) -> Result<Option<DistrictNode>, StoreError> {
        self.district_by_code(state_id, code).await
    }

    async fn find_club(&self, id: ClubId) -> Result<Option<ClubNode>, StoreError> {
        self.club(id).await
    }
}

/// An approval running inside one Postgres transaction.
///
/// Dropping it without [`ApprovalTx::commit`] rolls the transaction back.
struct PgApprovalTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ApprovalTx for PgApprovalTx {
    async fn lock_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        find_application(&mut *self.tx, id, true).await
    }

    async fn save_application(&mut self, record: &ApplicationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE applications
            SET status = $2, approved_at = $3, approved_by = $4, rejected_at = $5,
                rejected_by = $6, rejection_remarks = $7, identity_id = $8, uid = $9
            WHERE id = $1
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.status.as_str())
        .bind(record.approved_at)
        .bind(record.approved_by.map(|id| id.to_string()))
        .bind(record.rejected_at)
        .bind(record.rejected_by.map(|id| id.to_string()))
        .bind(record.rejection_remarks.as_deref())
        .bind(record.identity_id.map(|id| id.to_string()))
        .bind(record.uid.as_ref().map(MembershipId::as_str))
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn find_identity_by_contact(
        &mut self,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Option<Identity>, StoreError> {
        identity::find_by_contact(&mut *self.tx, phone, email).await
    }

    #[instrument(skip(self), fields(scope = %key))]
    async fn next_sequence(&mut self, key: &ScopeKey) -> Result<u32, StoreError> {
        let value: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO identifier_counters (role, state_code, district_code, club_code, last_value)
            VALUES ($1, $2, $3, $4, 1)
            ON CONFLICT (role, state_code, district_code, club_code)
            DO UPDATE SET last_value = identifier_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(key.role().as_str())
        .bind(key.state_code())
        .bind(key.district_code())
        .bind(key.club_code())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)?;
        u32::try_from(value).map_err(|e| super::corrupt("identifier_counters.last_value", value, e))
    }

    async fn uid_exists(&mut self, uid: &MembershipId) -> Result<bool, StoreError> {
        identity::uid_exists(&mut *self.tx, uid.as_str()).await
    }

    async fn insert_identity(&mut self, identity: &Identity) -> Result<(), StoreError> {
        identity::insert_identity(&mut *self.tx, identity).await
    }

    async fn update_identity(&mut self, identity: &Identity) -> Result<(), StoreError> {
        identity::update_identity(&mut *self.tx, identity).await
    }

    async fn create_club(
        &mut self,
        district_id: DistrictId,
        code: &ScopeCode,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<ClubId, StoreError> {
        directory::create_club(&mut *self.tx, district_id, code, name, at).await
    }

    async fn create_student(
        &mut self,
        club_id: ClubId,
        full_name: &str,
        at: DateTime<Utc>,
    ) -> Result<StudentId, StoreError> {
        directory::create_student(&mut *self.tx, club_id, full_name, at).await
    }

    async fn insert_profile(&mut self, profile: &RoleProfile) -> Result<(), StoreError> {
        identity::insert_profile(&mut *self.tx, profile).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(store_error)
    }
}
