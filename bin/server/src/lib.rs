//! SSFI registry server.
//!
//! This crate provides the HTTP boundary of the membership registry:
//! - [`app::router`]: every route, with request tracing
//! - [`auth`]: shared state, bearer extractors and the `/auth/*` routes
//! - [`api`]: caller introspection, registration windows, applications
//! - [`db::PgStore`]: the Postgres implementation of the store traits
//! - [`config::ServerConfig`]: environment configuration
//! - [`sms`]: outbound SMS senders

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod sms;
