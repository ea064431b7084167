//! Per-client rate limiting for the public submission endpoint.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter as GovRateLimiter,
};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tokio::task::JoinHandle;

use crate::app::AppState;
use crate::error::ApiError;
use domain::services::RequestMetadata;

type KeyedRateLimiter = GovRateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Key used when no client address can be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// How often idle client entries are dropped.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Rate limiter keyed by client IP.
pub struct RateLimiterState {
    limiter: KeyedRateLimiter,
    clock: DefaultClock,
    per_minute: NonZeroU32,
    trust_proxy_headers: bool,
}

impl RateLimiterState {
    /// Returns `None` when `per_minute` is 0 (rate limiting disabled).
    ///
    /// Forwarding headers are only used as the client key when
    /// `trust_proxy_headers` is set; otherwise the socket peer is used.
    pub fn new(per_minute: u32, trust_proxy_headers: bool) -> Option<Self> {
        let per_minute = NonZeroU32::new(per_minute)?;
        Some(Self {
            limiter: GovRateLimiter::keyed(Quota::per_minute(per_minute)),
            clock: DefaultClock::default(),
            per_minute,
            trust_proxy_headers,
        })
    }

    /// `Err` carries the retry-after delay in seconds, at least 1.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        self.limiter
            .check_key(&client.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()).as_secs().max(1))
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute.get()
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Drops clients whose quota has fully replenished.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

/// Prunes idle clients every `every` until the runtime shuts down.
pub fn spawn_pruning(limiter: Arc<RateLimiterState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let before = limiter.tracked_clients();
            limiter.prune();
            tracing::debug!(
                before,
                after = limiter.tracked_clients(),
                "Pruned rate limiter state"
            );
        }
    })
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("per_minute", &self.per_minute)
            .field("tracked_clients", &self.limiter.len())
            .finish()
    }
}

/// Socket peer address, or the forwarded client address when the service
/// sits behind a trusted proxy.
fn client_key(req: &Request<Body>, trust_proxy_headers: bool) -> String {
    let forwarded = if trust_proxy_headers {
        RequestMetadata::from_headers(
            req.headers()
                .iter()
                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
        )
        .ip
    } else {
        None
    };

    forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(req).await;
    };

    let client = client_key(&req, limiter.trust_proxy_headers);
    if let Err(retry_after_secs) = limiter.check(&client) {
        tracing::warn!(
            client = %client,
            limit_per_minute = limiter.per_minute(),
            retry_after_secs,
            "Submission rate limit exceeded"
        );
        return ApiError::RateLimited { retry_after_secs }.into_response();
    }

    next.run(req).await
}
