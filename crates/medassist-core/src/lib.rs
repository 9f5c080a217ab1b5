//! MedAssist Core: error taxonomy, configuration, retry policy, progress events.

pub mod config;
pub mod error;
pub mod progress;
pub mod retry;

pub use config::{AzureOpenAiConfig, HttpPolicy, MedAssistConfig, SearchServiceConfig};
pub use error::{Error, Result, ServiceFailure};
pub use progress::{NoopObserver, ProgressEvent, ProgressObserver};
pub use retry::RetryPolicy;
