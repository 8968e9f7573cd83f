//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the transfer routes and their aliases
//! - Wire up middleware (timeout, request ID, tracing, CORS)
//! - Serve on a listener until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, Request},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::blockchain::{AlloyRpc, ChainRpc};
use crate::config::RelayConfig;
use crate::http::handlers;
use crate::transfer::TransferService;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Paths that all run the same transfer operation.
pub const TRANSFER_ROUTES: [&str; 5] = [
    "/convert",
    "/send-eth",
    "/withdraw",
    "/transfer",
    "/eip1559-transfer",
];

/// Application state injected into handlers.
///
/// `service` is `None` when no signing key was supplied; the process still
/// serves `/status` and `/health`.
pub struct AppState<R: ChainRpc = AlloyRpc> {
    pub service: Option<Arc<TransferService<R>>>,
}

impl<R: ChainRpc> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

/// HTTP front end for the relay.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new<R: ChainRpc>(config: &RelayConfig, service: Option<Arc<TransferService<R>>>) -> Self {
        let state = AppState { service };
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<R: ChainRpc>(config: &RelayConfig, state: AppState<R>) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let mut router: Router<AppState<R>> = Router::new();
        for path in TRANSFER_ROUTES {
            router = router.route(path, post(handlers::transfer::<R>));
        }

        router
            .route("/balance", get(handlers::balance::<R>))
            .route("/status", get(handlers::status::<R>))
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(
                |request: &Request<Body>| {
                    let id = request
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %id,
                    )
                },
            ))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
