//! MedAssist Runtime: pipeline orchestration and session state.

pub mod orchestrator;
pub mod session;
pub mod types;

pub use orchestrator::Orchestrator;
pub use session::{IndexTicket, Session, Stage};
pub use types::*;
