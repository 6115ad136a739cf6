//! Outbound notifications (one-time codes, temporary passwords).

use crate::error::DeliveryError;
use async_trait::async_trait;

/// Delivers a text message to a phone number.
///
/// Failures are reported, never swallowed, so callers can surface them as
/// retryable.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), DeliveryError>;
}

/// Message carrying a one-time code.
#[must_use]
pub fn one_time_code_message(code: &str, lifetime_minutes: i64) -> String {
    format!("Your SSFI verification code is {code}. It expires in {lifetime_minutes} minutes.")
}

/// Message carrying a temporary password after approval.
#[must_use]
pub fn temporary_password_message(uid: &str, password: &str) -> String {
    format!(
        "Your SSFI membership {uid} is approved. Temporary password: {password}. Change it after first login."
    )
}
