//! CONNECT tunnel handling.
//!
//! # Responsibilities
//! - Ask the connection hook where to connect
//! - Direct: open TCP to the origin
//! - Upstream: open TCP to the upstream proxy and issue our own CONNECT
//! - Answer the client 200 only once the outbound side is ready
//! - Splice bytes both ways until either side closes
//!
//! # Design Decisions
//! - Outbound connection established before replying so failures become 502/504
//! - Tunnels run in their own task and are tracked for graceful shutdown
//! - Bytes are never inspected (no TLS interception)

use axum::body::Body;
use axum::http::uri::Authority;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::http::error::ProxyError;
use crate::http::hook::ConnectTarget;
use crate::http::request::{target_host, target_port};
use crate::http::server::ProxyState;
use crate::net::{dial, ConnectionGuard};

/// The outbound half of a tunnel.
enum Outbound {
    Direct(TcpStream),
    Upstream(TokioIo<Upgraded>),
}

/// Handle a `CONNECT host:port` request.
pub async fn handle_connect(state: ProxyState, request: Request<Body>) -> Response {
    let Some(authority) = request.uri().authority().cloned() else {
        return (StatusCode::BAD_REQUEST, "CONNECT target must be host:port").into_response();
    };

    let route = state.hook.before_upstream_connection(&request);
    let outbound = match &route {
        None => {
            let host = target_host(&request).unwrap_or_default();
            let port = target_port(&request);
            tracing::debug!(authority = %authority, "Tunnelling directly");
            dial(&host, port, state.timeouts.connect())
                .await
                .map(Outbound::Direct)
                .map_err(|source| ProxyError::connect(&authority, source))
        }
        Some(target) => {
            tracing::debug!(authority = %authority, upstream = %target, "Tunnelling via upstream");
            connect_via_upstream(&state, target, &authority)
                .await
                .map(Outbound::Upstream)
        }
    };

    let outbound = match outbound {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::warn!(authority = %authority, error = %e, "Tunnel setup failed");
            return e.into_response();
        }
    };

    let guard = state.tracker.track();
    let upgrade = hyper::upgrade::on(request);
    tokio::spawn(async move {
        match upgrade.await {
            Ok(upgraded) => {
                let client = TokioIo::new(upgraded);
                match outbound {
                    Outbound::Direct(server) => splice(client, server, &authority, guard).await,
                    Outbound::Upstream(server) => splice(client, server, &authority, guard).await,
                }
            }
            Err(e) => tracing::warn!(authority = %authority, error = %e, "Client upgrade failed"),
        }
    });

    Response::new(Body::empty())
}

/// Open a tunnel to `authority` through the upstream proxy at `target`.
async fn connect_via_upstream(
    state: &ProxyState,
    target: &ConnectTarget,
    authority: &Authority,
) -> Result<TokioIo<Upgraded>, ProxyError> {
    let stream = dial(&target.host, target.port, state.timeouts.connect())
        .await
        .map_err(|source| ProxyError::connect(target, source))?;

    let deadline = state.timeouts.tunnel_handshake();
    let handshake = async {
        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                tracing::debug!(error = %e, "Upstream tunnel connection error");
            }
        });

        let mut connect = Request::builder()
            .method(Method::CONNECT)
            .uri(authority.as_str())
            .header(header::HOST, authority.as_str());
        if let Some(auth) = &state.upstream_auth {
            connect = connect.header(header::PROXY_AUTHORIZATION, auth.clone());
        }
        let connect = connect.body(Body::empty())?;

        let mut response = sender.send_request(connect).await?;
        if !response.status().is_success() {
            return Err(ProxyError::UpstreamRejected {
                target: target.to_string(),
                status: response.status(),
            });
        }

        let upgraded = hyper::upgrade::on(&mut response).await?;
        Ok::<_, ProxyError>(TokioIo::new(upgraded))
    };

    tokio::time::timeout(deadline, handshake)
        .await
        .map_err(|_| ProxyError::Timeout(deadline))?
}

async fn splice<C, S>(mut client: C, mut server: S, authority: &Authority, _guard: ConnectionGuard)
where
    C: AsyncRead + AsyncWrite + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::io::copy_bidirectional(&mut client, &mut server).await {
        Ok((from_client, from_server)) => tracing::debug!(
            authority = %authority,
            bytes_sent = from_client,
            bytes_received = from_server,
            "Tunnel closed"
        ),
        Err(e) => tracing::debug!(authority = %authority, error = %e, "Tunnel closed with error"),
    }
}
