//! MedAssist HTTP server library: state, routes and error mapping.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
