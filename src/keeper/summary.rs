//! Summaries of archived conversation through an external text generator.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::openai;

/// Returned instead of a summary when no backend is configured.
pub const NOT_CONFIGURED: &str = "OpenAI key not configured";

const INSTRUCTION: &str = "Below are chat messages.\nWrite a short summary:";

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, openai::Error>;
}

#[derive(Debug)]
pub enum SummaryError {
    Backend(openai::Error),
    Timeout(Duration),
    /// The worker task panicked or was cancelled.
    Worker(String),
}

impl fmt::Display for SummaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "{e}"),
            Self::Timeout(d) => write!(f, "no answer within {}s", d.as_secs()),
            Self::Worker(e) => write!(f, "worker failed: {e}"),
        }
    }
}

impl std::error::Error for SummaryError {}

/// Instruction, blank line, then the texts one per line.
pub fn build_prompt(texts: &[String]) -> String {
    format!("{INSTRUCTION}\n\n{}", texts.join("\n"))
}

pub struct SummaryGateway {
    backend: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl SummaryGateway {
    pub fn new(backend: Option<Arc<dyn TextGenerator>>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Summarize `texts` with exactly one backend call.
    ///
    /// The call runs on its own task so the caller's handler only waits for
    /// the result, and is abandoned after the configured timeout.
    pub async fn summarize(&self, texts: &[String]) -> Result<String, SummaryError> {
        let Some(backend) = self.backend.clone() else {
            return Ok(NOT_CONFIGURED.to_string());
        };

        let prompt = build_prompt(texts);
        let timeout = self.timeout;
        info!("📝 Summarizing {} message(s) ({} chars)", texts.len(), prompt.len());

        let worker = tokio::spawn(async move {
            tokio::time::timeout(timeout, backend.generate(&prompt)).await
        });

        match worker.await {
            Ok(Ok(Ok(summary))) => Ok(summary),
            Ok(Ok(Err(e))) => Err(SummaryError::Backend(e)),
            Ok(Err(_elapsed)) => Err(SummaryError::Timeout(timeout)),
            Err(e) => Err(SummaryError::Worker(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Echo {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String, openai::Error> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("summary".to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _prompt: &str) -> Result<String, openai::Error> {
            Err(openai::Error::Api("500 Internal Server Error".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl TextGenerator for Hanging {
        async fn generate(&self, _prompt: &str) -> Result<String, openai::Error> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prompt_shape() {
        let prompt = build_prompt(&texts(&["one", "two"]));
        assert_eq!(prompt, "Below are chat messages.\nWrite a short summary:\n\none\ntwo");
    }

    #[tokio::test]
    async fn test_unconfigured_returns_sentinel() {
        let gateway = SummaryGateway::new(None, Duration::from_secs(1));
        assert!(!gateway.is_configured());
        assert_eq!(gateway.summarize(&texts(&["a"])).await.unwrap(), NOT_CONFIGURED);
    }

    #[tokio::test]
    async fn test_single_backend_call() {
        let echo = Arc::new(Echo { prompts: Mutex::new(Vec::new()) });
        let gateway = SummaryGateway::new(Some(echo.clone()), Duration::from_secs(5));

        let summary = gateway.summarize(&texts(&["hi", "there"])).await.unwrap();
        assert_eq!(summary, "summary");

        let prompts = echo.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].ends_with("\n\nhi\nthere"));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let gateway = SummaryGateway::new(Some(Arc::new(Failing)), Duration::from_secs(5));
        let err = gateway.summarize(&texts(&["a"])).await.unwrap_err();
        assert!(matches!(err, SummaryError::Backend(openai::Error::Api(_))));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let gateway = SummaryGateway::new(Some(Arc::new(Hanging)), Duration::from_millis(50));
        let err = gateway.summarize(&texts(&["a"])).await.unwrap_err();
        assert!(matches!(err, SummaryError::Timeout(_)));
    }
}
