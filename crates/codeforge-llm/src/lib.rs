//! Model invocation backends
//!
//! Every provider implements [`ModelBackend`]. The router and orchestrator only
//! ever see the trait; [`BackendRegistry`] maps configured model names to the
//! concrete backend that serves them and is itself a `ModelBackend`.

mod http_client;
mod openai_backend;
mod registry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
mod scripted;

pub use openai_backend::OpenAiCompatibleBackend;
pub use registry::BackendRegistry;
pub use types::{Message, ModelBackend, ModelCompletion, ModelInvocation, Role};
pub use codeforge_utils::LlmError;

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::{ScriptedBackend, ScriptedReply};
