//! Forward proxy server.
//!
//! # Responsibilities
//! - Accept client connections from the bounded listener
//! - Serve HTTP/1.1 with upgrades (CONNECT tunnels)
//! - Enforce client proxy authentication
//! - Dispatch CONNECT to tunnel.rs, everything else to forward.rs
//! - Graceful shutdown: stop accepting, drain connections and tunnels

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request};
use axum::response::Response;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::Credentials;
use crate::config::{ProxyConfig, TimeoutConfig};
use crate::http::forward::forward_handler;
use crate::http::hook::{ConnectionHook, RoutingHook};
use crate::http::response::auth_required;
use crate::http::tunnel::handle_connect;
use crate::net::{ConnectionTracker, Listener};
use crate::routing::{ConfigurationError, RoutingPolicy};

/// State shared by every connection handler.
#[derive(Clone)]
pub struct ProxyState {
    pub hook: Arc<dyn ConnectionHook>,
    pub client: Client<HttpConnector, Body>,
    /// `Proxy-Authorization` value presented to the upstream proxy.
    pub upstream_auth: Option<HeaderValue>,
    /// Credentials clients must present, if any.
    pub client_auth: Option<Arc<Credentials>>,
    pub timeouts: TimeoutConfig,
    pub tracker: ConnectionTracker,
}

impl ProxyState {
    /// Returns a 407 response if the request lacks valid credentials.
    fn authorize(&self, request: &Request<Body>) -> Option<Response> {
        let expected = self.client_auth.as_ref()?;
        if expected.verify(request.headers().get(header::PROXY_AUTHORIZATION)) {
            None
        } else {
            tracing::warn!("Proxy authentication failed");
            Some(auth_required())
        }
    }
}

/// HTTP forward proxy.
pub struct ProxyServer {
    config: ProxyConfig,
    policy: Arc<RoutingPolicy>,
    state: ProxyState,
}

impl ProxyServer {
    /// Build the server and its routing policy.
    ///
    /// Fails if the upstream proxy URL is malformed.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigurationError> {
        let policy = Arc::new(RoutingPolicy::from_config(&config.routing)?);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.timeouts.connect()));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let upstream_auth = policy
            .upstream()
            .and_then(|target| target.credentials())
            .map(Credentials::basic_header);
        let client_auth = config
            .auth
            .credentials
            .as_deref()
            .and_then(Credentials::parse)
            .map(Arc::new);

        let state = ProxyState {
            hook: Arc::new(RoutingHook::new(policy.clone())),
            client,
            upstream_auth,
            client_auth,
            timeouts: config.timeouts.clone(),
            tracker: ConnectionTracker::new(),
        };

        Ok(Self {
            config,
            policy,
            state,
        })
    }

    /// Replace the connection hook.
    pub fn with_hook(mut self, hook: Arc<dyn ConnectionHook>) -> Self {
        self.state.hook = hook;
        self
    }

    pub fn policy(&self) -> &Arc<RoutingPolicy> {
        &self.policy
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Router for non-CONNECT requests.
    fn build_router(state: ProxyState) -> Router {
        Router::new()
            .fallback(forward_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.policy.upstream().map(ToString::to_string).unwrap_or_else(|| "none".into()),
            exceptions = self.policy.exceptions().len(),
            auth = self.state.client_auth.is_some(),
            "Proxy server starting"
        );

        let router = Self::build_router(self.state.clone());

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            continue;
                        }
                    };
                    let guard = self.state.tracker.track();
                    let state = self.state.clone();
                    let router = router.clone();
                    let conn_shutdown = shutdown.resubscribe();
                    let span = tracing::debug_span!("connection", id = %guard.id(), peer = %peer);
                    tokio::spawn(
                        async move {
                            let _permit = permit;
                            let _guard = guard;
                            serve_connection(stream, peer, state, router, conn_shutdown).await;
                        }
                        .instrument(span),
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);
        if !self.state.tracker.wait_for_drain(grace).await {
            tracing::warn!(
                remaining = self.state.tracker.active_count(),
                "Grace period elapsed with connections still open"
            );
        }

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: ProxyState,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) {
    let io = TokioIo::new(stream);
    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        let state = state.clone();
        let router = router.clone();
        async move { Ok::<_, Infallible>(dispatch(state, router, request.map(Body::new)).await) }
    });

    let conn = http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .serve_connection(io, service)
        .with_upgrades();
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.recv() => {
            // Finish the in-flight request, then close keep-alive connections.
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        tracing::debug!(peer = %peer, error = %e, "Connection error");
    }
}

async fn dispatch(state: ProxyState, router: Router, request: Request<Body>) -> Response {
    let span = tracing::info_span!(
        "proxy_request",
        request_id = %Uuid::new_v4(),
        method = %request.method(),
        uri = %request.uri(),
    );

    async move {
        if let Some(denied) = state.authorize(&request) {
            return denied;
        }
        if request.method() == Method::CONNECT {
            handle_connect(state, request).await
        } else {
            match router.oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        }
    }
    .instrument(span)
    .await
}
