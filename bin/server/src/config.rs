//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`AUTH__JWT_SECRET`, `MEMBERSHIP__TERM_DAYS`).
//! Values stay strings until deserialization so phone numbers keep their
//! leading `+`.

use serde::Deserialize;
use std::fmt;

/// Deployment environment; only development exposes error detail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

/// Server configuration composed from the component configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub environment: Environment,

    pub auth: AuthConfig,

    #[serde(default)]
    pub membership: MembershipConfig,

    /// Administrator created on first start.
    #[serde(default)]
    pub admin: Option<AdminConfig>,

    /// SMS gateway; a logging sender is used when absent.
    #[serde(default)]
    pub sms: Option<SmsConfig>,
}

/// Token, code and password settings.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for access and refresh tokens; at least 32 bytes.
    pub jwt_secret: String,

    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,

    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,

    #[serde(default = "default_otp_lifetime_minutes")]
    pub otp_lifetime_minutes: i64,

    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,

    /// Whether to set the Secure flag on the refresh cookie (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .field("otp_lifetime_minutes", &self.otp_lifetime_minutes)
            .field("password_iterations", &self.password_iterations)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

/// Identifier prefixes and membership term.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_student_prefix")]
    pub student_prefix: String,

    #[serde(default = "default_term_days")]
    pub term_days: i64,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            student_prefix: default_student_prefix(),
            term_days: default_term_days(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_name")]
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("full_name", &self.full_name)
            .field("phone", &self.phone)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Deserialize)]
pub struct SmsConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsConfig")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_access_ttl_minutes() -> i64 {
    15
}

fn default_refresh_ttl_days() -> i64 {
    7
}

fn default_otp_lifetime_minutes() -> i64 {
    10
}

fn default_password_iterations() -> u32 {
    600_000
}

fn default_secure_cookies() -> bool {
    true
}

fn default_prefix() -> String {
    "SSFI".to_string()
}

fn default_student_prefix() -> String {
    "SSFS".to_string()
}

fn default_term_days() -> i64 {
    365
}

fn default_admin_name() -> String {
    "Global Administrator".to_string()
}

/// Shortest accepted token secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default().separator("__"))
    }

    fn from_source(
        source: impl config::Source + Send + Sync + 'static,
    ) -> Result<Self, config::ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(config::ConfigError::Message(format!(
                "auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.membership.term_days <= 0 {
            return Err(config::ConfigError::Message(
                "membership.term_days must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
