use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use domain::services::{MailTransport, QuotaLedger, SubmissionQueryService};
use domain::store::FormStore;
use shared::identity::{IdentityError, IdentityVerifier};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{Config, IdentityConfig};
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, security_headers_middleware,
    trace_id, RateLimiterState,
};
use crate::routes::{
    email_settings, forms, health, notification_logs, settings, submissions, usage,
};
use crate::services::{DeliveryExecutor, IntakeService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn FormStore>,
    pub verifier: Arc<IdentityVerifier>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    pub intake: IntakeService,
    pub quota: QuotaLedger,
    pub queries: SubmissionQueryService,
    /// Set when running against PostgreSQL, for pool metrics.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn FormStore>,
        mailer: Arc<dyn MailTransport>,
    ) -> Result<Self, IdentityError> {
        let verifier = build_verifier(&config.identity)?;
        let rate_limiter = RateLimiterState::new(
            config.security.submit_rate_limit_per_minute,
            config.security.trust_proxy_headers,
        )
        .map(Arc::new);

        let delivery = DeliveryExecutor::new(
            store.clone(),
            mailer,
            config.email.default_from.clone(),
            Duration::from_secs(config.email.send_timeout_secs),
        );

        Ok(Self {
            intake: IntakeService::new(store.clone(), delivery),
            quota: QuotaLedger::new(store.clone()),
            queries: SubmissionQueryService::new(store.clone()),
            verifier: Arc::new(verifier),
            config: Arc::new(config),
            rate_limiter,
            store,
            pool: None,
        })
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

/// RS256 public key wins over the shared secret when both are set.
fn build_verifier(config: &IdentityConfig) -> Result<IdentityVerifier, IdentityError> {
    let mut verifier = if !config.public_key.is_empty() {
        IdentityVerifier::from_rsa_pem(&config.public_key)?
    } else {
        IdentityVerifier::from_secret(&config.shared_secret)?
    };

    if let Some(issuer) = &config.issuer {
        verifier = verifier.with_issuer(issuer.clone());
    }
    if let Some(audience) = &config.audience {
        verifier = verifier.with_audience(audience.clone());
    }
    Ok(verifier.with_leeway(config.leeway_secs))
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin, forms are embedded on arbitrary sites
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Public submission endpoint, rate limited per client IP. It sits outside
    // the request timeout: the submission is stored before delivery, and each
    // send is bounded by `email.send_timeout_secs` so its outcome is logged.
    let submit_routes = Router::new()
        .route("/api/v1/forms/:form_id/submissions", post(forms::submit_form))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Owner routes; TenantAuth on each handler resolves the tenant
    let owner_routes = Router::new()
        .route("/api/v1/forms", get(forms::list_forms).post(forms::create_form))
        .route("/api/v1/forms/templates", get(forms::list_templates))
        .route(
            "/api/v1/forms/from-template",
            post(forms::create_form_from_template),
        )
        .route("/api/v1/forms/:form_id", delete(forms::delete_form))
        .route(
            "/api/v1/forms/:form_id/email-settings",
            get(email_settings::get_email_settings).put(email_settings::update_email_settings),
        )
        .route(
            "/api/v1/forms/:form_id/email-settings/toggle",
            post(email_settings::toggle_email_settings),
        )
        .route("/api/v1/submissions", get(submissions::list_submissions))
        .route(
            "/api/v1/submissions/search",
            get(submissions::search_submissions),
        )
        .route(
            "/api/v1/submissions/export",
            get(submissions::export_submissions),
        )
        .route(
            "/api/v1/submissions/:submission_id",
            delete(submissions::delete_submission),
        )
        .route(
            "/api/v1/submissions/:submission_id/logs",
            get(submissions::get_submission_logs),
        )
        .route(
            "/api/v1/notification-logs",
            get(notification_logs::list_notification_logs),
        )
        .route(
            "/api/v1/settings/global",
            get(settings::get_global_settings).put(settings::update_global_settings),
        )
        .route("/api/v1/usage", get(usage::get_usage));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    let timed_routes = Router::new()
        .merge(public_routes)
        .merge(owner_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )));

    Router::new()
        .merge(timed_routes)
        .merge(submit_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
