//! Registry routes outside `/auth`: caller introspection, registration
//! windows and applications.

pub mod applications;
pub mod me;
pub mod windows;

use axum::Json;
use axum_extra::extract::WithRejection;

use crate::error::ApiError;

type JsonBody<T> = WithRejection<Json<T>, ApiError>;
