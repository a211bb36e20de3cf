use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stackboard_api::clock::SystemClock;
use stackboard_api::config::Config;
use stackboard_api::db::token_repository::PgTokenRepository;
use stackboard_api::db::user_repository::PgUserRepository;
use stackboard_api::middleware::auth::TokenServiceHandle;
use stackboard_api::services::email::EmailService;
use stackboard_api::services::events::{spawn_mail_dispatcher, EventSink};
use stackboard_api::services::password::BcryptHasher;
use stackboard_api::services::token::TokenService;
use stackboard_api::{db, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let email = EmailService::new(&config).map(Arc::new);
    if email.is_some() {
        info!("SMTP email service configured");
    } else {
        info!("SMTP not configured — token mails disabled");
    }

    let (events, events_rx) = EventSink::new();
    spawn_mail_dispatcher(events_rx, email);

    let users: Arc<dyn stackboard_api::db::user_repository::UserRepository> =
        Arc::new(PgUserRepository::new(pool.clone()));
    let tokens_repo = Arc::new(PgTokenRepository::new(pool.clone()));
    let hasher: Arc<dyn stackboard_api::services::password::PasswordHasher> =
        Arc::new(BcryptHasher::new(config.security.bcrypt_cost));

    let token_service = Arc::new(TokenService::new(
        config.security.clone(),
        users.clone(),
        tokens_repo,
        hasher.clone(),
        Arc::new(SystemClock),
        events,
    ));

    let state = AppState {
        db: pool,
        users,
        hasher,
        tokens: token_service.clone(),
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Users
        .route("/users", post(routes::users::register))
        .route("/users/me", get(routes::users::me))
        .route("/users/{username}", get(routes::users::profile))
        // Tokens
        .route(
            "/tokens/authentication",
            post(routes::tokens::authenticate).delete(routes::tokens::logout),
        )
        .route("/tokens/refresh", post(routes::tokens::refresh))
        .route("/tokens/activation", post(routes::tokens::request_activation_token))
        .route("/tokens/activate", post(routes::tokens::activate_account))
        .route(
            "/tokens/password-reset",
            post(routes::tokens::request_password_reset_token),
        )
        .route(
            "/tokens/password-reset/confirm",
            post(routes::tokens::confirm_password_reset),
        )
        .layer(axum::Extension(TokenServiceHandle(token_service)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("stackboard API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
