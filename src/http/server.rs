//! HTTP server exposing the admission decision.
//!
//! Every path other than the health probe runs the admission pipeline and
//! answers with a bare status code: 204 when the request may proceed, 401,
//! 403 or 429 for the denial reasons, 503 when the bucket store is down and
//! the policy is fail-closed. The fronting proxy treats 204 as "forward".

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use crate::admission::{AdmissionFilter, Decision, DenyReason};
use crate::error::Result;

struct AppState {
    filter: Arc<AdmissionFilter>,
    api_key_header: String,
}

/// HTTP server for the admission check endpoint.
pub struct HttpServer {
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new server.
    pub fn new(addr: SocketAddr, api_key_header: String, filter: Arc<AdmissionFilter>) -> Self {
        Self {
            addr,
            state: Arc::new(AppState {
                filter,
                api_key_header,
            }),
        }
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server stops accepting connections when the provided signal
    /// resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = Router::new()
            .route("/healthz", get(healthz))
            .fallback(check_request)
            .with_state(self.state);

        info!(addr = %self.addr, "Starting admission HTTP server");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await?;

        Ok(())
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn check_request(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> StatusCode {
    // Identity comes from the API key header; without one, the peer address
    // stands in so unlicensed callers still resolve deterministically.
    let header_id = request
        .headers()
        .get(state.api_key_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let client_id = header_id.unwrap_or_else(|| peer.ip().to_string());

    let path = request.uri().path();

    match state.filter.check(Some(&client_id), path).await {
        Ok(decision) => status_for(decision),
        Err(e) => {
            error!(path = %path, error = %e, "Admission check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn status_for(decision: Decision) -> StatusCode {
    match decision {
        Decision::Allow => StatusCode::NO_CONTENT,
        Decision::Deny(DenyReason::Unauthorized) => StatusCode::UNAUTHORIZED,
        Decision::Deny(DenyReason::Forbidden) => StatusCode::FORBIDDEN,
        Decision::Deny(DenyReason::TooManyRequests) => StatusCode::TOO_MANY_REQUESTS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(Decision::Allow), StatusCode::NO_CONTENT);
        assert_eq!(
            status_for(Decision::Deny(DenyReason::Unauthorized)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(Decision::Deny(DenyReason::Forbidden)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(Decision::Deny(DenyReason::TooManyRequests)),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
