pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::domain::{profile::ProfileService, qr::RenderOptions, scanner::CaptureConstraints};
use handlers::{dev, health::health_check, qr, scanner};

#[derive(Debug)]
pub struct AppState<P: ProfileService> {
    pub profiles: Arc<P>,
    pub render: RenderOptions,
    pub scanner: CaptureConstraints,
}

impl<P: ProfileService> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            profiles: self.profiles.clone(),
            render: self.render,
            scanner: self.scanner,
        }
    }
}

/// Builds the HTTP routes. Developer routes are only mounted when `dev_tools` is set.
pub fn router<P: ProfileService>(state: AppState<P>, dev_tools: bool) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
            let uri = request.uri().to_string();
            tracing::info_span!("request", method = %request.method(), uri)
        });

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/profiles/{id}/qr", get(qr::profile_qr::<P>))
        .route("/profiles/{id}/qr.png", get(qr::profile_qr_png::<P>))
        .route("/qr/decode", post(qr::decode_payload))
        .route("/scanner/constraints", get(scanner::constraints::<P>));

    if dev_tools {
        tracing::warn!("Developer routes enabled");
        router = router.route("/dev/sample-qr", get(dev::sample_qr::<P>));
    }

    router
        .layer(cors_layer)
        .layer(trace_layer)
        .with_state(state)
}

pub struct Server {
    router: Router,
    listener: TcpListener,
    port: u16,
}

impl Server {
    /// Binds the listener. Use port `0` to let the OS pick one, then read it back with [`port`](Self::port).
    pub async fn new<P: ProfileService>(profiles: P, config: &Config) -> Result<Self> {
        let state = AppState {
            profiles: Arc::new(profiles),
            render: config.qr,
            scanner: config.scanner,
        };
        let router = router(state, config.dev_tools);

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Binding TCP listener on {addr}"))?;
        let port = listener
            .local_addr()
            .context("Getting local address")?
            .port();

        Ok(Self {
            router,
            listener,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run(self) -> Result<()> {
        tracing::info!("Server listening on port {}", self.port);
        axum::serve(self.listener, self.router)
            .await
            .context("Running server")
    }
}
