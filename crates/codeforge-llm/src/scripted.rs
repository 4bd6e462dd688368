//! Deterministic in-process backend for tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use codeforge_utils::LlmError;

use crate::types::{ModelBackend, ModelCompletion, ModelInvocation};

/// One scripted response
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Error(LlmError),
    /// Never completes; only a timeout or cancellation ends the call
    Hang,
    /// Wait, then answer with the inner reply
    Delay(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn delayed(after: Duration, reply: Self) -> Self {
        Self::Delay(after, Box::new(reply))
    }
}

type Responder = Box<dyn Fn(&ModelInvocation) -> ScriptedReply + Send + Sync>;

/// Backend answering from per-model queues.
///
/// When a model's queue is empty the fallback responder answers; without one
/// the call fails with `LlmError::Misconfiguration`. Every invocation is recorded.
#[derive(Default)]
pub struct ScriptedBackend {
    queues: Mutex<HashMap<String, VecDeque<ScriptedReply>>>,
    fallback: Option<Responder>,
    calls: Mutex<Vec<ModelInvocation>>,
}

impl std::fmt::Debug for ScriptedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedBackend")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every unscripted call with `responder`
    #[must_use]
    pub fn with_fallback(
        mut self,
        responder: impl Fn(&ModelInvocation) -> ScriptedReply + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Some(Box::new(responder));
        self
    }

    /// Queue a reply for the next call to `model`
    pub fn push(&self, model: &str, reply: ScriptedReply) {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(model.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Invocations received so far, in call order
    #[must_use]
    pub fn calls(&self) -> Vec<ModelInvocation> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn next_reply(&self, invocation: &ModelInvocation) -> ScriptedReply {
        let queued = self
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&invocation.model)
            .and_then(VecDeque::pop_front);

        match (queued, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(invocation),
            (None, None) => ScriptedReply::Error(LlmError::Misconfiguration(format!(
                "No scripted reply left for model '{}'",
                invocation.model
            ))),
        }
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn invoke(&self, invocation: ModelInvocation) -> Result<ModelCompletion, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());

        let mut reply = self.next_reply(&invocation);
        loop {
            match reply {
                ScriptedReply::Text(text) => {
                    return Ok(ModelCompletion::new(text, "scripted", invocation.model));
                }
                ScriptedReply::Error(err) => return Err(err),
                ScriptedReply::Hang => return std::future::pending().await,
                ScriptedReply::Delay(after, inner) => {
                    tokio::time::sleep(after).await;
                    reply = *inner;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(model: &str) -> ModelInvocation {
        ModelInvocation::new(model, "p", 10, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let backend = ScriptedBackend::new()
            .with_fallback(|inv| ScriptedReply::text(format!("echo {}", inv.prompt())));
        backend.push("m", ScriptedReply::text("first"));

        assert_eq!(backend.invoke(invocation("m")).await.unwrap().text, "first");
        assert_eq!(backend.invoke(invocation("m")).await.unwrap().text, "echo p");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_queue_without_fallback_errors() {
        let backend = ScriptedBackend::new();
        let err = backend.invoke(invocation("m")).await.unwrap_err();
        assert!(matches!(err, LlmError::Misconfiguration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_is_cut_by_timeout() {
        let backend = ScriptedBackend::new();
        backend.push("m", ScriptedReply::Hang);
        let result =
            tokio::time::timeout(Duration::from_secs(5), backend.invoke(invocation("m"))).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_then_reply() {
        let backend = ScriptedBackend::new();
        backend.push(
            "m",
            ScriptedReply::delayed(Duration::from_secs(2), ScriptedReply::text("late")),
        );
        let start = tokio::time::Instant::now();
        let completion = backend.invoke(invocation("m")).await.unwrap();
        assert_eq!(completion.text, "late");
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
