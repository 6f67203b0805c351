//! # agent-runtime
//!
//! LLM providers for the hydroponic assistant.
//!
//! - **Ollama** (default): local inference via Ollama
//!
//! ```rust,ignore
//! use agent_runtime::OllamaProvider;
//!
//! let provider = OllamaProvider::from_env();
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};
