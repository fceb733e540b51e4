//! All OpenAI functionality

pub mod assistants;
pub mod backend;
pub mod client;
pub mod extract;
pub mod responses;

// Re-export main types for convenience
pub use backend::{CompletionBackend, from_config};
