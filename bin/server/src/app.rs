//! Router assembly.

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::{applications, me, windows};
use crate::auth::{AppState, routes as auth};
use crate::config::Environment;
use crate::error::attach_detail;

/// Builds the full HTTP surface over `state`.
///
/// In development, error responses also carry the diagnostic `detail`.
pub fn router(state: Arc<AppState>, environment: Environment) -> Router {
    let router = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/resend", post(auth::resend))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/password/change", post(auth::change_password))
        .route("/auth/password/forgot", post(auth::forgot_password))
        .route("/auth/password/reset", post(auth::reset_password))
        .route("/me", get(me::me))
        .route("/scope/{kind}/{id}", get(me::check_scope))
        .route("/windows", post(windows::create).get(windows::list))
        .route(
            "/windows/{key}",
            delete(windows::delete).patch(windows::update),
        )
        .route("/windows/{key}/open", get(windows::open))
        .route("/applications", post(applications::submit))
        .route("/applications/{key}", get(applications::get))
        .route("/applications/{key}/transition", post(applications::transition))
        .with_state(state);

    let router = match environment {
        Environment::Development => router.layer(axum::middleware::map_response(attach_detail)),
        Environment::Production => router,
    };
    router.layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Settings;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use chrono::{DateTime, Duration, Utc};
    use serde_json::{Value, json};
    use ssfi_core::FixedClock;
    use ssfi_membership::IdentifierPolicy;
    use ssfi_platform_access::{
        DeliveryError, NotificationSender, OtpPolicy, PasswordHasher, TokenIssuer,
    };
    use ssfi_registration::{AdminSeed, InMemoryRegistry, bootstrap_admin};
    use std::sync::Mutex;
    use tower::ServiceExt;

    const ADMIN_PHONE: &str = "9000000001";
    const ADMIN_PASSWORD: &str = "admin-password";

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String)>>);

    impl Outbox {
        fn last_code(&self) -> String {
            let sent = self.0.lock().unwrap();
            let (_, message) = sent.last().unwrap();
            message
                .split(|c: char| !c.is_ascii_digit())
                .find(|part| part.len() == 6)
                .unwrap()
                .to_string()
        }
    }

    #[async_trait]
    impl NotificationSender for Outbox {
        async fn send(&self, phone: &str, message: &str) -> Result<(), DeliveryError> {
            self.0
                .lock()
                .unwrap()
                .push((phone.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct Harness {
        app: Router,
        outbox: Arc<Outbox>,
        clock: FixedClock,
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn harness(environment: Environment) -> Harness {
        let clock = FixedClock::new(start());
        let registry = InMemoryRegistry::new();
        let ka = registry.seed_state("KA", "Karnataka").await;
        registry.seed_district(ka, "MYS", "Mysuru").await;

        let hasher = PasswordHasher::new(1_000);
        let identifiers = IdentifierPolicy::new("SSFI", "SSFS").unwrap();
        bootstrap_admin(
            &registry,
            &hasher,
            &identifiers,
            &clock,
            AdminSeed {
                full_name: "Global Administrator".to_string(),
                phone: ADMIN_PHONE.to_string(),
                email: None,
                password: ADMIN_PASSWORD.to_string(),
            },
        )
        .await
        .unwrap();

        let outbox = Arc::new(Outbox::default());
        let settings = Settings {
            tokens: TokenIssuer::new(
                "test-secret-test-secret-test-secret",
                Duration::minutes(15),
                Duration::days(7),
            ),
            hasher,
            otp: OtpPolicy::new(Duration::minutes(10)),
            identifiers,
            membership_term: Duration::days(365),
            secure_cookies: false,
            clock: Arc::new(clock.clone()),
        };
        let state = Arc::new(AppState::new(registry, outbox.clone(), settings));
        Harness {
            app: router(state, environment),
            outbox,
            clock,
        }
    }

    impl Harness {
        async fn call(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> Response {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let body = match body {
                Some(body) => {
                    request = request.header(header::CONTENT_TYPE, "application/json");
                    Body::from(body.to_string())
                }
                None => Body::empty(),
            };
            self.app
                .clone()
                .oneshot(request.body(body).unwrap())
                .await
                .unwrap()
        }

        async fn login(&self, phone: &str, password: &str) -> String {
            let response = self
                .call(
                    "POST",
                    "/auth/login",
                    None,
                    Some(json!({ "phone": phone, "password": password })),
                )
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            json_of(response).await["access_token"]
                .as_str()
                .unwrap()
                .to_string()
        }

        async fn open_club_window(&self, admin: &str) -> Value {
            let now = self.clock_now();
            let response = self
                .call(
                    "POST",
                    "/windows",
                    Some(admin),
                    Some(json!({
                        "category": "CLUB",
                        "title": "Club affiliation 2026",
                        "starts_at": now - Duration::days(1),
                        "ends_at": now + Duration::days(30),
                        "fee": 2500,
                    })),
                )
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            json_of(response).await
        }

        async fn submit_club(&self) -> Response {
            self.call(
                "POST",
                "/applications",
                None,
                Some(json!({
                    "category": "CLUB",
                    "full_name": "Asha Rao",
                    "phone": "9876543210",
                    "state_code": "KA",
                    "district_code": "MYS",
                    "club_code": "RSC",
                    "club_name": "Royal Skaters",
                })),
            )
            .await
        }

        fn clock_now(&self) -> DateTime<Utc> {
            use ssfi_core::Clock;
            self.clock.now()
        }
    }

    async fn json_of(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn club_application_end_to_end() {
        let h = harness(Environment::Production).await;
        let admin = h.login(ADMIN_PHONE, ADMIN_PASSWORD).await;

        // Closed until a window exists.
        let response = h.submit_club().await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        h.open_club_window(&admin).await;
        let response = h.call("GET", "/windows/club/open", None, None).await;
        let status = json_of(response).await;
        assert_eq!(status["open"], true);
        assert_eq!(status["window"]["fee"], 2500);

        let response = h.submit_club().await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let application = json_of(response).await;
        assert_eq!(application["status"], "PENDING");
        let id = application["id"].as_str().unwrap().to_string();

        let response = h
            .call(
                "POST",
                &format!("/applications/{id}/transition"),
                Some(&admin),
                Some(json!({ "action": "APPROVE" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = json_of(response).await;
        assert_eq!(outcome["application"]["status"], "APPROVED");
        assert_eq!(
            outcome["application"]["uid"],
            "SSFI-KA-MYS-RSC-0001"
        );
        let password = outcome["temporary_password"].as_str().unwrap().to_string();

        let owner = h.login("9876543210", &password).await;
        let response = h.call("GET", "/me", Some(&owner), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let me = json_of(response).await;
        assert_eq!(me["identity"]["role"], "CLUB_OWNER");
        assert!(me["identity"].get("password_hash").is_none());
        assert!(me["scope"][0]["clubId"].is_number());

        // Club owners may not review applications.
        let response = h
            .call("GET", &format!("/applications/{id}"), Some(&owner), None)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_of(response).await["code"], "FORBIDDEN");

        // A decided application cannot be decided again.
        let response = h
            .call(
                "POST",
                &format!("/applications/{id}/transition"),
                Some(&admin),
                Some(json!({ "action": "REJECT", "remarks": "late" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn window_management_requires_admin() {
        let h = harness(Environment::Production).await;

        let response = h
            .call("POST", "/windows", None, Some(json!({ "category": "CLUB" })))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = h.call("GET", "/windows?category=CLUB", Some("garbage"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn deleted_window_closes_category() {
        let h = harness(Environment::Production).await;
        let admin = h.login(ADMIN_PHONE, ADMIN_PASSWORD).await;
        let window = h.open_club_window(&admin).await;
        let id = window["id"].as_str().unwrap();

        let response = h
            .call("DELETE", &format!("/windows/{id}"), Some(&admin), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = h.call("GET", "/windows/CLUB/open", None, None).await;
        assert_eq!(json_of(response).await["open"], false);

        let response = h.call("GET", "/windows?category=CLUB", Some(&admin), None).await;
        assert_eq!(json_of(response).await, json!([]));
    }

    #[tokio::test]
    async fn window_updates_are_validated() {
        let h = harness(Environment::Production).await;
        let admin = h.login(ADMIN_PHONE, ADMIN_PASSWORD).await;
        let window = h.open_club_window(&admin).await;
        let id = window["id"].as_str().unwrap();

        let response = h
            .call(
                "PATCH",
                &format!("/windows/{id}"),
                Some(&admin),
                Some(json!({ "ends_at": h.clock_now() - Duration::days(5) })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = h
            .call(
                "PATCH",
                "/windows/not-an-id",
                Some(&admin),
                Some(json!({ "fee": 10 })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn self_registration_needs_code_and_approval() {
        let h = harness(Environment::Production).await;

        let response = h
            .call(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "full_name": "Ravi Kumar",
                    "phone": "9123456780",
                    "email": null,
                    "password": "long-enough",
                    "role": "STUDENT",
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = h
            .call(
                "POST",
                "/auth/verify",
                None,
                Some(json!({ "phone": "9123456780", "code": h.outbox.last_code() })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = h
            .call(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "phone": "9123456780", "password": "long-enough" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn login_sets_refresh_cookie_accepted_by_refresh() {
        let h = harness(Environment::Production).await;
        let response = h
            .call(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "phone": ADMIN_PHONE, "password": ADMIN_PASSWORD })),
            )
            .await;
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/auth"));
        let pair = cookie.split(';').next().unwrap().to_string();

        h.clock.advance(Duration::minutes(1));
        let request = Request::builder()
            .method("POST")
            .uri("/auth/refresh")
            .header(header::COOKIE, pair)
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_of(response).await["access_token"].is_string());
    }

    #[tokio::test]
    async fn scope_check_rejects_unknown_levels() {
        let h = harness(Environment::Production).await;
        let admin = h.login(ADMIN_PHONE, ADMIN_PASSWORD).await;

        let response = h.call("GET", "/scope/club/42", Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = h.call("GET", "/scope/planet/1", Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn development_errors_carry_detail() {
        let h = harness(Environment::Development).await;
        let response = h.call("GET", "/windows/CLUB/open", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = h.call("GET", "/windows/PARTY/open", None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_of(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["detail"].is_string());
    }
}
