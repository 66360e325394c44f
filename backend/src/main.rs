//! Stock ledger backend server
//!
//! Bookkeeping for warehouse stock: receipts, deliveries, transfers and count
//! adjustments post into per-location product stock and an append-only ledger.

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod handlers;
mod middleware;
mod routes;
mod services;

pub use config::Config;

use services::AlertService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = config::Config::load()?;

    tracing::info!("Starting stock ledger server");
    tracing::info!("Environment: {}", config.environment);

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    if config.should_migrate() {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    if config.alerts.generate_on_startup {
        match AlertService::new(db_pool.clone()).generate().await {
            Ok(summary) => tracing::info!(created = summary.created.len(), "Startup alert scan done"),
            // A failed scan should not keep the API down
            Err(e) => tracing::error!(error = %e, "Startup alert scan failed"),
        }
    }

    let state = AppState {
        db: db_pool,
        config: Arc::new(config.clone()),
    };

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// `STOCKD_LOG_FORMAT=json` switches to structured JSON lines
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stockd=debug,tower_http=debug,sqlx=warn".into());

    let json = std::env::var("STOCKD_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api", routes::api_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

async fn root() -> &'static str {
    "Stock ledger API"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config {
            environment: "test".to_string(),
            server: crate::config::ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
            },
            database: crate::config::DatabaseConfig {
                url: "postgres://stockd@localhost/stockd_test".to_string(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_secs: 1,
                run_migrations: false,
            },
            jwt: crate::config::JwtConfig {
                secret: "test-secret".to_string(),
                access_token_expiry: 3600,
            },
            ledger: crate::config::LedgerConfig {
                default_page_size: 50,
                max_page_size: 500,
            },
            alerts: crate::config::AlertConfig {
                generate_on_startup: false,
            },
        };

        // Never connects; these requests are answered before any query runs
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();

        AppState {
            db,
            config: Arc::new(config),
        }
    }

    async fn error_code(response: axum::response::Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        json["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_root_is_public() {
        let response = create_app(test_state())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Stock ledger API");
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let response = create_app(test_state())
            .oneshot(
                Request::builder()
                    .uri("/api/dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let response = create_app(test_state())
            .oneshot(
                Request::builder()
                    .uri("/api/ledger")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "INVALID_TOKEN");
    }

    fn staff_token(state: &AppState) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = chrono::Utc::now().timestamp();
        let claims = services::auth::Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            role: shared::UserRole::Warehouse,
            warehouse_id: Some(uuid::Uuid::new_v4()),
            exp: now + 600,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_malformed_pick_body_rejected() {
        let state = test_state();
        let token = staff_token(&state);

        for body in ["{not json", r#"{"item_id":"x"}"#] {
            let response = create_app(state.clone())
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/api/deliveries/{}/pick", uuid::Uuid::new_v4()))
                        .header(header::AUTHORIZATION, format!("Bearer {}", token))
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(error_code(response).await, "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = create_app(test_state())
            .oneshot(
                Request::builder()
                    .uri("/api/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
