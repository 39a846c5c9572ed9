//! Structured completion service: contract, HTTP client, retry policy

pub mod client;
pub mod retry;
pub mod types;

pub use client::OpenAiCompletionClient;
pub use retry::RetryPolicy;
pub use types::{complete_as, CompletionRequest, CompletionService, OutputSchema};
