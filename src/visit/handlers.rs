use axum::{
    extract::{ConnectInfo, State},
    http::{header::HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, warn};

use super::render::visit_page;
use crate::client_ip;
use crate::config::PingFailureMode;
use crate::storage::{Storage, StorageError};

pub struct VisitState {
    pub storage: Arc<dyn Storage>,
    pub ping_failure: PingFailureMode,
}

/// A recoverable failure in one stage of a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFailure {
    Increment,
    ReadBack,
    NoValidIp,
}

impl VisitFailure {
    pub fn message(self) -> &'static str {
        match self {
            VisitFailure::Increment => "Unable to update the counter",
            VisitFailure::ReadBack => "Unable to read the counter value",
            VisitFailure::NoValidIp => "No valid ip",
        }
    }
}

/// Count the visit and report the caller's addresses
///
/// Every stage runs even when an earlier one failed. Exactly one response is
/// written: 400 listing each failure when any stage failed, otherwise the
/// 200 HTML page.
pub async fn record_visit(
    State(state): State<Arc<VisitState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = state.storage.ping().await {
        return ping_failed(state.ping_failure, &err);
    }

    let mut failures = Vec::new();

    if let Err(err) = state.storage.increment_counter().await {
        error!(operation = "increment counter", error = %err, "Unable to update the counter");
        failures.push(VisitFailure::Increment);
    }

    let counter = match state.storage.counter().await {
        Ok(counter) => Some(counter),
        Err(err) => {
            error!(operation = "read counter", error = %err, "Could not read the counter");
            failures.push(VisitFailure::ReadBack);
            None
        }
    };

    let findings = match client_ip::resolve(&headers, &addr.to_string()) {
        Ok(findings) => findings,
        Err(err) => {
            warn!(remote_addr = %addr, error = %err, "No valid client ip");
            failures.push(VisitFailure::NoValidIp);
            Vec::new()
        }
    };

    match counter {
        Some(counter) if failures.is_empty() => {
            (StatusCode::OK, Html(visit_page(&findings, counter))).into_response()
        }
        _ => failure_response(&failures),
    }
}

fn failure_response(failures: &[VisitFailure]) -> Response {
    let body = failures
        .iter()
        .map(|failure| failure.message())
        .collect::<Vec<_>>()
        .join("\n");

    (StatusCode::BAD_REQUEST, body).into_response()
}

/// The database is assumed to always be up; a failed ping either takes the
/// process down or fails only this request, per `PingFailureMode`.
fn ping_failed(mode: PingFailureMode, err: &StorageError) -> Response {
    match mode {
        PingFailureMode::Exit => {
            error!(operation = "ping", error = %err, "DB Error, terminating");
            std::process::exit(1);
        }
        PingFailureMode::Unavailable => {
            error!(operation = "ping", error = %err, "DB Error");
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable").into_response()
        }
    }
}
