//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use upi_types::LedgerRepository;

use super::auth::auth_middleware;
use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::LedgerService;
use crate::openapi::ApiDoc;

/// HTTP Server for the UPI ledger API.
pub struct HttpServer<R: LedgerRepository> {
    state: Arc<AppState<R>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: LedgerRepository> HttpServer<R> {
    /// Creates a new HTTP server with the given service.
    pub fn new(service: LedgerService<R>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::default()), // 100 req/min default
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(service: LedgerService<R>, requests_per_minute: u32) -> Self {
        use std::time::Duration;
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/register", post(handlers::register::<R>))
            .route("/api/banks", get(handlers::list_banks::<R>))
            .route("/api/ifsc/{code}", get(handlers::find_ifsc::<R>))
            .route("/api/accounts", post(handlers::link_account::<R>))
            .route("/api/accounts", get(handlers::list_accounts::<R>))
            .route("/api/accounts/{id}", get(handlers::get_account::<R>))
            .route(
                "/api/credit-lines/bank",
                post(handlers::activate_bank_line::<R>),
            )
            .route(
                "/api/credit-lines/network",
                post(handlers::activate_network_line::<R>),
            )
            .route("/api/credit-lines", get(handlers::list_credit_lines::<R>))
            .route(
                "/api/credit-lines/{id}/pin",
                post(handlers::set_credit_line_pin::<R>),
            )
            .route("/api/balance", post(handlers::balance::<R>))
            .route(
                "/api/transfers/account",
                post(handlers::transfer_to_account::<R>),
            )
            .route(
                "/api/transfers/credit-line",
                post(handlers::pay_to_credit_line::<R>),
            )
            .route("/api/transactions", get(handlers::history::<R>))
            .route(
                "/api/transactions/recent-receivers",
                get(handlers::recent_receivers::<R>),
            )
            .route(
                "/api/transactions/{txn_ref}",
                get(handlers::transaction_detail::<R>),
            )
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware::<R>,
            ))
            .layer(TraceLayer::new_for_http())
            // Outermost so preflight requests never reach the auth gate.
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
