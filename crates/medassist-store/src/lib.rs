//! MedAssist Store: vector index backends.

pub mod azure;
pub mod index;
pub mod memory;
pub mod types;

pub use azure::AzureSearchIndex;
pub use index::SearchIndex;
pub use memory::InMemoryIndex;
pub use types::*;
