//! MedAssist Chat: prompt construction and answer generation.

pub mod azure;
pub mod generator;
pub mod prompt;
pub mod types;

pub use azure::{AzureChatGenerator, GenerationSettings};
pub use generator::AnswerGenerator;
pub use prompt::{build_messages, fallback_answer, ERROR_ANSWER, FALLBACK_ANSWER, NO_CONTEXT_ANSWER};
pub use types::{ChatMessage, Role};
