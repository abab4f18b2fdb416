//! # mailsieve-infer
//!
//! Minimal HTTP client for local OpenAI-style inference servers
//! (llama.cpp, vLLM, LM Studio and friends).
//!
//! The engine only needs two calls:
//! - `complete`: text completion for a classification prompt
//! - `health_probe`: which model (if any) the server has loaded
//!
//! Transport and server failures are classified so callers can decide
//! what to retry ([`Error::is_transient`], [`Error::is_rate_limit`]).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;

pub use client::InferClient;
pub use error::{Error, Result};
