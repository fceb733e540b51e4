//! askdocs - An HTTP endpoint that answers questions from your documents using `OpenAI`.
//!
//! A single API Lambda receives `POST { "question": "..." }`, forwards the
//! question to `OpenAI` with the `file_search` tool pointed at the configured
//! vector stores or files, and returns `{ "answer", "sources" }`.
//!
//! # Architecture
//!
//! The system uses:
//! - AWS Lambda (API Gateway / function URL events) for serverless execution
//! - reqwest for the `OpenAI` HTTP API
//! - Either the Responses API (one synchronous call) or the Assistants API
//!   (assistant, thread and run, with status polling), selected by
//!   `RELAY_PROTOCOL`
//! - Tokio for async runtime
//!
//! # Example
//!
//! ```no_run
//! use askdocs::core::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     askdocs::setup_logging();
//!
//!     let config = AppConfig::from_env()?;
//!     let result = askdocs::relay::handle_question("What is the refund policy?", &config).await?;
//!
//!     println!("{}", result.answer);
//!     for source in &result.sources {
//!         println!("  cited: {source}");
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod ai;
pub mod api;
pub mod core;
pub mod errors;
pub mod relay;
pub mod utils;

pub use errors::RelayError;

/// Configure structured logging with JSON format for AWS Lambda environments.
///
/// This function sets up tracing-subscriber with a JSON formatter suitable for
/// `CloudWatch` Logs integration, filtered by `RUST_LOG` (default `info`).
/// Calling it more than once is harmless.
///
/// # Example
///
/// ```
/// askdocs::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
