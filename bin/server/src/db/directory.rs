//! The State → District → Club → Student directory.

use super::{PgStore, parse, store_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssfi_core::{ClubId, DistrictId, StateId, StudentId};
use ssfi_membership::ScopeCode;
use ssfi_platform_access::{HierarchyDirectory, StoreError};
use ssfi_registration::{ClubNode, DistrictNode, StateNode};
use sqlx::{FromRow, PgExecutor};

#[derive(FromRow)]
struct StateRow {
    id: i64,
    code: String,
    name: String,
}

impl StateRow {
    fn try_into_node(self) -> Result<StateNode, StoreError> {
        Ok(StateNode {
            id: StateId::new(self.id),
            code: parse("states.code", &self.code)?,
            name: self.name,
        })
    }
}

#[derive(FromRow)]
struct DistrictRow {
    id: i64,
    state_id: i64,
    code: String,
    name: String,
}

impl DistrictRow {
    fn try_into_node(self) -> Result<DistrictNode, StoreError> {
        Ok(DistrictNode {
            id: DistrictId::new(self.id),
            state_id: StateId::new(self.state_id),
            code: parse("districts.code", &self.code)?,
            name: self.name,
        })
    }
}

#[derive(FromRow)]
struct ClubRow {
    id: i64,
    district_id: i64,
    code: String,
    name: String,
}

impl ClubRow {
    fn try_into_node(self) -> Result<ClubNode, StoreError> {
        Ok(ClubNode {
            id: ClubId::new(self.id),
            district_id: DistrictId::new(self.district_id),
            code: parse("clubs.code", &self.code)?,
            name: self.name,
        })
    }
}

impl PgStore {
    pub(super) async fn state(&self, id: StateId) -> Result<Option<StateNode>, StoreError> {
        let row: Option<StateRow> = sqlx::query_as("SELECT id, code, name FROM states WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(StateRow::try_into_node).transpose()
    }

    pub(super) async fn state_by_code(
        &self,
        code: &ScopeCode,
    ) -> Result<Option<StateNode>, StoreError> {
        let row: Option<StateRow> =
            sqlx::query_as("SELECT id, code, name FROM states WHERE code = $1")
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        row.map(StateRow::try_into_node).transpose()
    }

    pub(super) async fn district(
        &self,
        id: DistrictId,
    ) -> Result<Option<DistrictNode>, StoreError> {
        let row: Option<DistrictRow> =
            sqlx::query_as("SELECT id, state_id, code, name FROM districts WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        row.map(DistrictRow::try_into_node).transpose()
    }

    pub(super) async fn district_by_code(
        &self,
        state_id: StateId,
        code: &ScopeCode,
    ) -> Result<Option<DistrictNode>, StoreError> {
        let row: Option<DistrictRow> = sqlx::query_as(
            "SELECT id, state_id, code, name FROM districts WHERE state_id = $1 AND code = $2",
        )
        .bind(state_id.get())
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        row.map(DistrictRow::try_into_node).transpose()
    }

    pub(super) async fn club(&self, id: ClubId) -> Result<Option<ClubNode>, StoreError> {
        let row: Option<ClubRow> =
            sqlx::query_as("SELECT id, district_id, code, name FROM clubs WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        row.map(ClubRow::try_into_node).transpose()
    }

    async fn parent_of(&self, sql: &'static str, id: i64) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)
    }
}

pub(super) async fn create_club<'e>(
    executor: impl PgExecutor<'e>,
    district_id: DistrictId,
    code: &ScopeCode,
    name: &str,
    at: DateTime<Utc>,
) -> Result<ClubId, StoreError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO clubs (district_id, code, name, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(district_id.get())
    .bind(code.as_str())
    .bind(name)
    .bind(at)
    .fetch_one(executor)
    .await
    .map_err(store_error)?;
    Ok(ClubId::new(id))
}

pub(super) async fn create_student<'e>(
    executor: impl PgExecutor<'e>,
    club_id: ClubId,
    full_name: &str,
    at: DateTime<Utc>,
) -> Result<StudentId, StoreError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO students (club_id, full_name, created_at)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(club_id.get())
    .bind(full_name)
    .bind(at)
    .fetch_one(executor)
    .await
    .map_err(store_error)?;
    Ok(StudentId::new(id))
}

#[async_trait]
impl HierarchyDirectory for PgStore {
    async fn state_of_district(&self, id: DistrictId) -> Result<Option<StateId>, StoreError> {
        let parent = self
            .parent_of("SELECT state_id FROM districts WHERE id = $1", id.get())
            .await?;
        Ok(parent.map(StateId::new))
    }

    async fn district_of_club(&self, id: ClubId) -> Result<Option<DistrictId>, StoreError> {
        let parent = self
            .parent_of("SELECT district_id FROM clubs WHERE id = $1", id.get())
            .await?;
        Ok(parent.map(DistrictId::new))
    }

    async fn club_of_student(&self, id: StudentId) -> Result<Option<ClubId>, StoreError> {
        let parent = self
            .parent_of("SELECT club_id FROM students WHERE id = $1", id.get())
            .await?;
        Ok(parent.map(ClubId::new))
    }
}
