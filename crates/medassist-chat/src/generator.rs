//! Answer generation trait.

use async_trait::async_trait;

use medassist_core::Result;

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Answer `question` using only `contexts` as evidence.
    async fn generate(&self, question: &str, contexts: &[String]) -> Result<String>;
}
