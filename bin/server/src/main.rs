use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use ssfi_core::SystemClock;
use ssfi_membership::IdentifierPolicy;
use ssfi_platform_access::{NotificationSender, OtpPolicy, PasswordHasher, TokenIssuer};
use ssfi_registration::{AdminSeed, BootstrapOutcome, bootstrap_admin};
use ssfi_server::{
    app,
    auth::{AppState, Settings},
    config::ServerConfig,
    db::PgStore,
    sms::{HttpSmsSender, LoggingSender},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(environment = ?config.environment, "loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("running database migrations");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let store = PgStore::new(db_pool);
    let hasher = PasswordHasher::new(config.auth.password_iterations);
    let identifiers = IdentifierPolicy::new(
        config.membership.prefix.clone(),
        config.membership.student_prefix.clone(),
    )
    .expect("invalid membership prefixes");

    if let Some(admin) = config.admin.clone() {
        let seed = AdminSeed {
            full_name: admin.full_name,
            phone: admin.phone,
            email: admin.email,
            password: admin.password,
        };
        match bootstrap_admin(&store, &hasher, &identifiers, &SystemClock, seed)
            .await
            .expect("failed to bootstrap administrator")
        {
            BootstrapOutcome::Created { identity_id, uid } => {
                tracing::info!(%identity_id, %uid, "created global administrator");
            }
            BootstrapOutcome::AlreadyPresent { identity_id } => {
                tracing::debug!(%identity_id, "global administrator already present");
            }
        }
    }

    let sender: Arc<dyn NotificationSender> = match config.sms.clone() {
        Some(sms) => Arc::new(
            HttpSmsSender::new(sms.endpoint, sms.api_key).expect("failed to build SMS client"),
        ),
        None => {
            tracing::warn!("no SMS gateway configured; messages will only be logged");
            Arc::new(LoggingSender)
        }
    };

    let settings = Settings {
        tokens: TokenIssuer::new(
            config.auth.jwt_secret.clone(),
            Duration::minutes(config.auth.access_ttl_minutes),
            Duration::days(config.auth.refresh_ttl_days),
        ),
        hasher,
        otp: OtpPolicy::new(Duration::minutes(config.auth.otp_lifetime_minutes)),
        identifiers,
        membership_term: Duration::days(config.membership.term_days),
        secure_cookies: config.auth.secure_cookies,
        clock: Arc::new(SystemClock),
    };
    let state = Arc::new(AppState::new(store, sender, settings));
    let app = app::router(state, config.environment);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app).await.expect("server error");
}
