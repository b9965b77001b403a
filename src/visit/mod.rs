pub mod handlers;
pub mod render;
pub mod routes;

pub use handlers::{VisitFailure, VisitState};
pub use routes::create_visit_router;
