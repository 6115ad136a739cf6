//! Registration windows: when a category accepts submissions.
//!
//! A window is open iff it is active, not soft-deleted, and the current
//! time lies within `[starts_at, ends_at]`. When several windows of one
//! category overlap, the category is open if any of them is, and
//! [`RegistrationGate::open_window`] reports the most recently created.

use crate::application::RegistrationCategory;
use crate::error::RegistrationError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use ssfi_core::{Clock, IdentityId, WindowId};
use ssfi_platform_access::StoreError;
use std::sync::Arc;
use tracing::{info, instrument};

/// A scheduling record gating one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationWindow {
    pub id: WindowId,
    pub category: RegistrationCategory,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Fee in minor currency units.
    pub fee: i64,
    pub active: bool,
    pub created_by: IdentityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<IdentityId>,
}

impl RegistrationWindow {
    /// Returns true when submissions are accepted at `now`.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.deleted_at.is_none() && self.starts_at <= now && now <= self.ends_at
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Fields for a new window.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWindow {
    pub category: RegistrationCategory,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub fee: i64,
}

/// A partial update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowUpdate {
    pub title: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub fee: Option<i64>,
    pub active: Option<bool>,
}

/// Persistence for windows.
#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn insert_window(&self, window: &RegistrationWindow) -> Result<(), StoreError>;

    /// Includes soft-deleted windows.
    async fn find_window(&self, id: WindowId) -> Result<Option<RegistrationWindow>, StoreError>;

    async fn save_window(&self, window: &RegistrationWindow) -> Result<(), StoreError>;

    /// Non-deleted windows of `category`, oldest first.
    async fn windows_for(
        &self,
        category: RegistrationCategory,
    ) -> Result<Vec<RegistrationWindow>, StoreError>;
}

type GateResult<T> = Result<T, Report<RegistrationError>>;

/// Manages windows and answers whether a category is open.
#[derive(Clone)]
pub struct RegistrationGate {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
}

impl RegistrationGate {
    #[must_use]
    pub fn new(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates an active window.
    ///
    /// # Errors
    ///
    /// `Validation` when the title is blank, the fee negative, or start is
    /// after end.
    #[instrument(skip(self, request), fields(category = %request.category))]
    pub async fn create(
        &self,
        request: NewWindow,
        actor: IdentityId,
    ) -> GateResult<RegistrationWindow> {
        let title = validate_title(&request.title)?;
        validate_schedule(request.starts_at, request.ends_at, request.fee)?;

        let now = self.clock.now();
        let window = RegistrationWindow {
            id: WindowId::new(),
            category: request.category,
            title,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            fee: request.fee,
            active: true,
            created_by: actor,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        };
        self.store
            .insert_window(&window)
            .await
            .map_err(RegistrationError::from)?;
        info!(window_id = %window.id, "registration window created");
        Ok(window)
    }

    /// Applies a partial update.
    ///
    /// The merged schedule must still satisfy start ≤ end.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or deleted windows, `Validation` otherwise.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: WindowId,
        update: WindowUpdate,
    ) -> GateResult<RegistrationWindow> {
        let mut window = self.live_window(id).await?;

        if let Some(title) = update.title {
            window.title = validate_title(&title)?;
        }
        window.starts_at = update.starts_at.unwrap_or(window.starts_at);
        window.ends_at = update.ends_at.unwrap_or(window.ends_at);
        window.fee = update.fee.unwrap_or(window.fee);
        window.active = update.active.unwrap_or(window.active);
        validate_schedule(window.starts_at, window.ends_at, window.fee)?;

        window.updated_at = self.clock.now();
        self.store
            .save_window(&window)
            .await
            .map_err(RegistrationError::from)?;
        info!(window_id = %window.id, "registration window updated");
        Ok(window)
    }

    /// Soft-deletes a window: deactivates it and records who and when.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or already deleted windows.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: WindowId, actor: IdentityId) -> GateResult<RegistrationWindow> {
        let mut window = self.live_window(id).await?;
        let now = self.clock.now();
        window.active = false;
        window.deleted_at = Some(now);
        window.deleted_by = Some(actor);
        window.updated_at = now;
        self.store
            .save_window(&window)
            .await
            .map_err(RegistrationError::from)?;
        info!(window_id = %window.id, "registration window deleted");
        Ok(window)
    }

    /// Returns true when `category` accepts submissions now.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors.
    pub async fn is_open(&self, category: RegistrationCategory) -> GateResult<bool> {
        Ok(self.open_window(category).await?.is_some())
    }

    /// The most recently created open window of `category`, if any.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors.
    pub async fn open_window(
        &self,
        category: RegistrationCategory,
    ) -> GateResult<Option<RegistrationWindow>> {
        let now = self.clock.now();
        let windows = self
            .store
            .windows_for(category)
            .await
            .map_err(RegistrationError::from)?;
        Ok(windows
            .into_iter()
            .filter(|w| w.is_open_at(now))
            .max_by_key(|w| (w.created_at, w.id)))
    }

    /// Non-deleted windows of `category`.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors.
    pub async fn list(&self, category: RegistrationCategory) -> GateResult<Vec<RegistrationWindow>> {
        let windows = self
            .store
            .windows_for(category)
            .await
            .map_err(RegistrationError::from)?;
        Ok(windows)
    }

    async fn live_window(&self, id: WindowId) -> GateResult<RegistrationWindow> {
        match self
            .store
            .find_window(id)
            .await
            .map_err(RegistrationError::from)?
        {
            Some(window) if !window.is_deleted() => Ok(window),
            _ => Err(RegistrationError::not_found("registration window", id).into()),
        }
    }
}

fn validate_title(title: &str) -> Result<String, RegistrationError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(RegistrationError::Validation {
            field: "title",
            reason: "must be 1 to 200 characters".to_string(),
        });
    }
    Ok(title.to_string())
}

fn validate_schedule(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    fee: i64,
) -> Result<(), RegistrationError> {
    if starts_at > ends_at {
        return Err(RegistrationError::Validation {
            field: "ends_at",
            reason: "window ends before it starts".to_string(),
        });
    }
    if fee < 0 {
        return Err(RegistrationError::Validation {
            field: "fee",
            reason: "must not be negative".to_string(),
        });
    }
    Ok(())
}
