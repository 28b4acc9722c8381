//! Bundled HTTP adapters for the provider boundaries.
//!
//! These are thin `reqwest` clients: no retries, no streaming, one request
//! per call. Timeouts are fixed at construction time, and a timed-out call
//! is reported as an ordinary provider failure. Endpoints can be overridden
//! to point at compatible self-hosted services or mock servers.

mod anthropic;
mod openai;

pub use anthropic::AnthropicCompletions;
pub use openai::OpenAiEmbeddings;
