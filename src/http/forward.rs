//! Plain-HTTP forwarding (absolute-form requests).
//!
//! # Responsibilities
//! - Ask the connection hook where to connect
//! - Direct: send the request to the origin through the pooled client
//! - Upstream: send the absolute-form request to the upstream proxy
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped in both directions
//! - Whole exchange bounded by `timeouts.request_secs`

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper_util::rt::TokioIo;

use crate::http::error::ProxyError;
use crate::http::hook::ConnectTarget;
use crate::http::response::{into_client_response, strip_hop_by_hop};
use crate::http::server::ProxyState;
use crate::net::dial;

/// Fallback handler for every non-CONNECT request.
pub async fn forward_handler(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    if request.uri().authority().is_none() {
        tracing::debug!(uri = %request.uri(), "Rejecting origin-form request");
        return (
            StatusCode::BAD_REQUEST,
            "Proxy requests must use an absolute URI",
        )
            .into_response();
    }

    let route = state.hook.before_upstream_connection(&request);
    let result = match route {
        None => {
            tracing::debug!(uri = %request.uri(), "Forwarding directly");
            forward_direct(&state, request).await
        }
        Some(target) => {
            tracing::debug!(uri = %request.uri(), upstream = %target, "Forwarding via upstream");
            forward_via_upstream(&state, &target, request).await
        }
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Forwarding failed");
            e.into_response()
        }
    }
}

async fn forward_direct(state: &ProxyState, mut request: Request<Body>) -> Result<Response, ProxyError> {
    strip_hop_by_hop(request.headers_mut());

    let deadline = state.timeouts.request();
    let response = tokio::time::timeout(deadline, state.client.request(request))
        .await
        .map_err(|_| ProxyError::Timeout(deadline))??;

    Ok(into_client_response(response))
}

async fn forward_via_upstream(
    state: &ProxyState,
    target: &ConnectTarget,
    mut request: Request<Body>,
) -> Result<Response, ProxyError> {
    strip_hop_by_hop(request.headers_mut());
    ensure_host_header(&mut request);
    if let Some(auth) = &state.upstream_auth {
        request
            .headers_mut()
            .insert(header::PROXY_AUTHORIZATION, auth.clone());
    }

    let deadline = state.timeouts.request();
    let exchange = async {
        let stream = dial(&target.host, target.port, state.timeouts.connect())
            .await
            .map_err(|source| ProxyError::connect(target, source))?;

        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "Upstream connection closed with error");
            }
        });

        // The URI stays in absolute form so the upstream proxy knows the origin.
        let response = sender.send_request(request).await?;
        Ok::<_, ProxyError>(into_client_response(response))
    };

    tokio::time::timeout(deadline, exchange)
        .await
        .map_err(|_| ProxyError::Timeout(deadline))?
}

fn ensure_host_header(request: &mut Request<Body>) {
    if request.headers().contains_key(header::HOST) {
        return;
    }
    let host = request
        .uri()
        .authority()
        .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok());
    if let Some(host) = host {
        request.headers_mut().insert(header::HOST, host);
    }
}
