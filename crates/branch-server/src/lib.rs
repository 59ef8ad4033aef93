//! HTTP proxy between the branch client and an OpenAI-compatible upstream.
//!
//! Three POST endpoints under `/api` assemble a prompt, call the upstream
//! with streaming enabled, and answer with the bare text deltas as
//! `text/plain`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod prompt;
pub mod server;

pub use config::ServerConfig;
pub use error::{AppError, Result};
pub use server::{app_config, run, AppState};
