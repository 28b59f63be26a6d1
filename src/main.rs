use anyhow::{anyhow, Context};
use axum::{
    http::{header, HeaderValue},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use stridecoach::crypto::NoteCipher;
use stridecoach::db::PgStore;
use stridecoach::domain::intensity::KeywordClassifier;
use stridecoach::middleware::{PgHitStore, RateLimiter};
use stridecoach::services::program_generator::OpenAiProgramSource;
use stridecoach::state::{AppState, SharedState};
use stridecoach::web;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_GENERATE_LIMIT: u32 = 5;
const GENERATE_WINDOW_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL missing")?;
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    let cipher = NoteCipher::from_env()?;
    let session_key = general_purpose::STANDARD
        .decode(std::env::var("SESSION_KEY").context("SESSION_KEY missing")?.trim())
        .map_err(|_| anyhow!("SESSION_KEY must be base64"))?;

    let generator = OpenAiProgramSource::from_env();
    if !generator.is_enabled() {
        tracing::warn!("OPENAI_API_KEY not set, program generation disabled");
    }

    let generate_limit = match std::env::var("GENERATE_RATE_LIMIT") {
        Ok(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("GENERATE_RATE_LIMIT must be a number, got {raw}"))?,
        Err(_) => DEFAULT_GENERATE_LIMIT,
    };
    let generate_limiter = RateLimiter::new(
        Arc::new(PgHitStore::new(pool.clone())),
        generate_limit,
        GENERATE_WINDOW_SECS,
    );

    let shared: SharedState = Arc::new(AppState {
        store: PgStore::new(pool),
        cipher,
        generator: Arc::new(generator),
        classifier: Arc::new(KeywordClassifier::default()),
        generate_limiter: generate_limiter.clone(),
        session_key,
    });

    let scheduler = JobScheduler::new().await?;

    // Rate limit counters cleanup - every hour
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let limiter = generate_limiter.clone();
            Box::pin(async move {
                limiter.cleanup().await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started: rate limit cleanup hourly");

    let app = Router::new().merge(web::routes(shared)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            )),
    );

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        format!("0.0.0.0:{}", port)
    });
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
