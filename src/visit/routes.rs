use axum::{routing::any, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::PingFailureMode;
use crate::storage::Storage;

use super::handlers::{record_visit, VisitState};

pub fn create_visit_router(storage: Arc<dyn Storage>, ping_failure: PingFailureMode) -> Router {
    let state = Arc::new(VisitState {
        storage,
        ping_failure,
    });

    Router::new()
        .route("/", any(record_visit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
