//! Registration windows.

use super::{PgStore, parse, parse_opt, store_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssfi_core::WindowId;
use ssfi_platform_access::StoreError;
use ssfi_registration::{RegistrationCategory, RegistrationWindow, WindowStore};
use sqlx::FromRow;
use tracing::instrument;

const WINDOW_COLUMNS: &str = "id, category, title, starts_at, ends_at, fee, active, created_by, \
     created_at, updated_at, deleted_at, deleted_by";

#[derive(FromRow)]
struct WindowRow {
    id: String,
    category: String,
    title: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    fee: i64,
    active: bool,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<String>,
}

impl WindowRow {
    fn try_into_window(self) -> Result<RegistrationWindow, StoreError> {
        Ok(RegistrationWindow {
            id: parse("registration_windows.id", &self.id)?,
            category: parse("registration_windows.category", &self.category)?,
            title: self.title,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            fee: self.fee,
            active: self.active,
            created_by: parse("registration_windows.created_by", &self.created_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            deleted_by: parse_opt("registration_windows.deleted_by", self.deleted_by.as_deref())?,
        })
    }
}

#[async_trait]
impl WindowStore for PgStore {
    #[instrument(skip_all, fields(window_id = %window.id))]
    async fn insert_window(&self, window: &RegistrationWindow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO registration_windows (
                id, category, title, starts_at, ends_at, fee, active, created_by,
                created_at, updated_at, deleted_at, deleted_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(window.id.to_string())
        .bind(window.category.as_str())
        .bind(&window.title)
        .bind(window.starts_at)
        .bind(window.ends_at)
        .bind(window.fee)
        .bind(window.active)
        .bind(window.created_by.to_string())
        .bind(window.created_at)
        .bind(window.updated_at)
        .bind(window.deleted_at)
        .bind(window.deleted_by.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn find_window(&self, id: WindowId) -> Result<Option<RegistrationWindow>, StoreError> {
        let row: Option<WindowRow> = sqlx::query_as(&format!(
            "SELECT {WINDOW_COLUMNS} FROM registration_windows WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        row.map(WindowRow::try_into_window).transpose()
    }

    #[instrument(skip_all, fields(window_id = %window.id))]
    async fn save_window(&self, window: &RegistrationWindow) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE registration_windows
            SET title = $2, starts_at = $3, ends_at = $4, fee = $5, active = $6,
                updated_at = $7, deleted_at = $8, deleted_by = $9
            WHERE id = $1
            "#,
        )
        .bind(window.id.to_string())
        .bind(&window.title)
        .bind(window.starts_at)
        .bind(window.ends_at)
        .bind(window.fee)
        .bind(window.active)
        .bind(window.updated_at)
        .bind(window.deleted_at)
        .bind(window.deleted_by.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "registration window",
                id: window.id.to_string(),
            });
        }
        Ok(())
    }

    async fn windows_for(
        &self,
        category: RegistrationCategory,
    ) -> Result<Vec<RegistrationWindow>, StoreError> {
        let rows: Vec<WindowRow> = sqlx::query_as(&format!(
            r#"
            SELECT {WINDOW_COLUMNS}
            FROM registration_windows
            WHERE category = $1 AND deleted_at IS NULL
            ORDER BY created_at, id
            "#
        ))
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.into_iter().map(WindowRow::try_into_window).collect()
    }
}
