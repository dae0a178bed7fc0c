//! LLM capability layer
//!
//! Capability traits (embedding, generation) and the HTTP client for
//! OpenAI-/vLLM-compatible inference services.

mod client;
mod traits;

pub use client::{ChatMessage, LlmClient};
pub use traits::{Embedder, Generator};
