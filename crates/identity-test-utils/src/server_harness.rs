//! Test server harness for E2E testing
//!
//! Provides TestIdentityServer, a real router bound to a random port and
//! backed by the in-memory stores, so HTTP tests need neither PostgreSQL
//! nor Redis.

use crate::test_ids::TEST_SIGNING_SECRET;
use common::secret::SecretBox;
use identity_service::config::{
    DEFAULT_ACCESS_TOKEN_TTL_SECONDS, DEFAULT_ENROLLMENT_BUFFER_HOURS,
    DEFAULT_ENROLLMENT_MIN_LEAD_HOURS, DEFAULT_OTP_TTL_SECONDS,
    DEFAULT_REFRESH_TOKEN_TTL_SECONDS, DEFAULT_REGISTRATION_SAGA_TTL_SECONDS, MIN_BCRYPT_COST,
};
use identity_service::handlers::AppState;
use identity_service::models::{ActorKind, Event};
use identity_service::otp::notifier::mock::CapturingNotifier;
use identity_service::otp::store::mock::InMemoryOtpStore;
use identity_service::repositories::actors::mock::InMemoryActorRepository;
use identity_service::repositories::event_registrations::mock::InMemoryEventRegistrationRepository;
use identity_service::repositories::events::mock::InMemoryEventRepository;
use identity_service::routes;
use identity_service::services::{
    EnrollmentPolicy, EnrollmentService, EventService, IdentityService, OtpIssuer, OtpPolicy,
    TokenMinter,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Knobs that tests flip away from the defaults.
#[derive(Debug, Clone, Copy)]
pub struct TestServerOptions {
    pub invalidate_otp_on_confirm: bool,
    pub enforce_branch_conflict: bool,
    pub enrollment_buffer_hours: f64,
    pub enrollment_min_lead_hours: f64,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            invalidate_otp_on_confirm: true,
            enforce_branch_conflict: false,
            enrollment_buffer_hours: DEFAULT_ENROLLMENT_BUFFER_HOURS,
            enrollment_min_lead_hours: DEFAULT_ENROLLMENT_MIN_LEAD_HOURS,
        }
    }
}

/// Test harness for spawning the identity service in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_e2e() -> Result<(), anyhow::Error> {
///     let server = TestIdentityServer::spawn().await?;
///
///     let response = server
///         .client()
///         .post(format!("{}/api/v1/auth/students/login", server.url()))
///         .json(&json!({"user_login": "S00001", "password": "..."}))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 401);
///     Ok(())
/// }
/// ```
pub struct TestIdentityServer {
    addr: SocketAddr,
    client: reqwest::Client,
    actors: Arc<InMemoryActorRepository>,
    events: Arc<InMemoryEventRepository>,
    registrations: Arc<InMemoryEventRegistrationRepository>,
    otp_store: Arc<InMemoryOtpStore>,
    notifier: Arc<CapturingNotifier>,
    _handle: JoinHandle<()>,
}

impl TestIdentityServer {
    /// Spawn a server with default options
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(TestServerOptions::default()).await
    }

    /// Spawn a server with the given options
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use the lowest accepted bcrypt cost to keep tests fast
    /// - Start the HTTP server in the background
    pub async fn spawn_with(options: TestServerOptions) -> Result<Self, anyhow::Error> {
        let actors = Arc::new(InMemoryActorRepository::new());
        let events = Arc::new(InMemoryEventRepository::new());
        let registrations = Arc::new(InMemoryEventRegistrationRepository::new(events.clone()));
        let otp_store = Arc::new(InMemoryOtpStore::new());
        let notifier = Arc::new(CapturingNotifier::new());

        let tokens = Arc::new(
            TokenMinter::new(
                SecretBox::new(Box::new(TEST_SIGNING_SECRET.to_vec())),
                Duration::from_secs(DEFAULT_ACCESS_TOKEN_TTL_SECONDS),
                Duration::from_secs(DEFAULT_REFRESH_TOKEN_TTL_SECONDS),
            )
            .map_err(|e| anyhow::anyhow!("Failed to build token minter: {}", e))?,
        );

        let otp = OtpIssuer::new(
            otp_store.clone(),
            notifier.clone(),
            OtpPolicy {
                ttl: Duration::from_secs(DEFAULT_OTP_TTL_SECONDS),
                saga_ttl: Duration::from_secs(DEFAULT_REGISTRATION_SAGA_TTL_SECONDS),
                invalidate_on_confirm: options.invalidate_otp_on_confirm,
            },
        );

        let state = Arc::new(AppState {
            identity: IdentityService::new(actors.clone(), otp, tokens, MIN_BCRYPT_COST)
                .map_err(|e| anyhow::anyhow!("Failed to build identity service: {}", e))?,
            events: EventService::new(events.clone()),
            enrollment: EnrollmentService::new(
                events.clone(),
                registrations.clone(),
                actors.clone(),
                EnrollmentPolicy {
                    buffer_hours: options.enrollment_buffer_hours,
                    min_lead_hours: options.enrollment_min_lead_hours,
                    enforce_branch_conflict: options.enforce_branch_conflict,
                },
            ),
        });

        // Each server gets its own recorder, never installed globally
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        // Build routes using the service's real route builder
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            client: reqwest::Client::new(),
            actors,
            events,
            registrations,
            otp_store,
            notifier,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Absolute URL for an API path such as `/api/v1/events`
    pub fn api(&self, path: &str) -> String {
        format!("{}{}", self.url(), path)
    }

    pub fn actors(&self) -> &InMemoryActorRepository {
        &self.actors
    }

    pub fn registrations(&self) -> &InMemoryEventRegistrationRepository {
        &self.registrations
    }

    pub fn otp_store(&self) -> &InMemoryOtpStore {
        &self.otp_store
    }

    /// Messages the service tried to deliver
    pub fn notifier(&self) -> &CapturingNotifier {
        &self.notifier
    }

    /// Store an event directly, bypassing input validation
    ///
    /// Used for rows the API would refuse to create, such as events with no
    /// start time.
    pub async fn insert_event(&self, event: Event) {
        self.events.insert_raw(event).await;
    }

    /// Create an actor through the API and return the response body
    pub async fn create_actor(
        &self,
        kind: ActorKind,
        body: &Value,
    ) -> Result<Value, anyhow::Error> {
        let response = self
            .client
            .post(self.api(&format!("/api/v1/actors/{}", kind.path_segment())))
            .json(body)
            .send()
            .await?;
        anyhow::ensure!(
            response.status() == 201,
            "create actor returned {}",
            response.status()
        );
        Ok(response.json().await?)
    }

    /// Run the full email registration flow and return the confirm response
    ///
    /// # Arguments
    /// * `kind` - Actor kind to register as
    /// * `email` - Contact address the code is sent to
    /// * `draft` - Actor draft, typically from `ActorDraftBuilder`
    pub async fn register(
        &self,
        kind: ActorKind,
        email: &str,
        draft: Value,
    ) -> Result<Value, anyhow::Error> {
        let base = format!("/api/v1/auth/{}", kind.path_segment());

        let response = self
            .client
            .post(self.api(&format!("{}/register", base)))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        anyhow::ensure!(
            response.status() == 202,
            "register returned {}",
            response.status()
        );

        let code = self
            .notifier
            .last_code_for(&email.trim().to_lowercase())
            .await
            .ok_or_else(|| anyhow::anyhow!("No code was sent to {}", email))?;

        let response = self
            .client
            .post(self.api(&format!("{}/register/confirm", base)))
            .json(&json!({ "email": email, "otp": code, "actor": draft }))
            .send()
            .await?;
        anyhow::ensure!(
            response.status() == 201,
            "register confirm returned {}",
            response.status()
        );
        Ok(response.json().await?)
    }
}

impl Drop for TestIdentityServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released immediately
        self._handle.abort();
    }
}
