use identity_service::config::Config;
use identity_service::handlers::AppState;
use identity_service::otp::{LogNotifier, Notifier, OtpStore, RedisOtpStore, WebhookNotifier};
use identity_service::repositories::{
    PgActorRepository, PgEventRegistrationRepository, PgEventRepository,
};
use identity_service::routes;
use identity_service::services::{
    EnrollmentPolicy, EnrollmentService, EventService, IdentityService, OtpIssuer, OtpPolicy,
    TokenMinter,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Identity Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Configuration loaded successfully");

    // Metrics recorder must be installed before any counter is touched
    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to install metrics recorder: {}", e);
        e
    })?;

    // Initialize database connection pool
    info!("Connecting to database...");
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            e
        })?;

    info!("Database connection established");

    // One-time codes live in Redis
    let otp_store: Arc<dyn OtpStore> = Arc::new(RedisOtpStore::connect(&config.redis.url).await?);

    let notifier: Arc<dyn Notifier> = match config.notifier_url.clone() {
        Some(url) => Arc::new(WebhookNotifier::new(url)?),
        None => {
            warn!("NOTIFIER_URL not set, one-time codes will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let otp = OtpIssuer::new(
        otp_store,
        notifier,
        OtpPolicy {
            ttl: config.otp_ttl,
            saga_ttl: config.registration_saga_ttl,
            invalidate_on_confirm: config.invalidate_otp_on_confirm,
        },
    );

    let tokens = Arc::new(TokenMinter::new(
        config.jwt_signing_secret,
        config.access_token_ttl,
        config.refresh_token_ttl,
    )?);

    let actors = Arc::new(PgActorRepository::new(db_pool.clone()));
    let events = Arc::new(PgEventRepository::new(db_pool.clone()));
    let registrations = Arc::new(PgEventRegistrationRepository::new(db_pool));

    // Create application state
    let state = Arc::new(AppState {
        identity: IdentityService::new(actors.clone(), otp, tokens, config.bcrypt_cost)?,
        events: EventService::new(events.clone()),
        enrollment: EnrollmentService::new(
            events,
            registrations,
            actors,
            EnrollmentPolicy {
                buffer_hours: config.enrollment_buffer_hours,
                min_lead_hours: config.enrollment_min_lead_hours,
                enforce_branch_conflict: config.enforce_branch_conflict,
            },
        ),
    });

    // Build application routes
    let app = routes::build_routes(state, metrics_handle);

    // Parse bind address
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Identity Service listening on {}", addr);

    // Start server with ConnectInfo support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
