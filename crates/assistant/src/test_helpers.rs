//! Scripted stand-ins for the provider and retriever seams.

use async_trait::async_trait;
use dermassist_core::error::{ProviderError, RetrievalError};
use dermassist_core::knowledge::{Retriever, Snippet};
use dermassist_core::message::Message;
use dermassist_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;
use std::time::Duration;

/// Returns scripted answers in order and records every request.
///
/// Panics if called more times than it has answers.
pub struct ScriptedProvider {
    answers: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(answers: Vec<&str>) -> Self {
        Self {
            answers: answers.into_iter().map(String::from).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(answer: &str) -> Self {
        Self::new(vec![answer])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let call = requests.len();
        let answer = self.answers.get(call).unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more answers (call #{call}, have {})",
                self.answers.len()
            )
        });
        requests.push(request);
        Ok(text_response(answer))
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Always fails with a network error.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection reset".into()))
    }
}

/// Answers only after `delay`, recording every request on arrival.
pub struct SlowProvider {
    delay: Duration,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SlowProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        tokio::time::sleep(self.delay).await;
        Ok(text_response("slow answer"))
    }
}

/// Returns a fixed snippet list and records queries.
pub struct StaticRetriever {
    snippets: Vec<Snippet>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StaticRetriever {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            snippets: texts.iter().map(|t| Snippet::new(*t)).collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static"
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Snippet>, RetrievalError> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        Ok(self.snippets.iter().take(k).cloned().collect())
    }
}

/// Always fails, as if the index were unreachable.
pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    fn name(&self) -> &str {
        "failing"
    }

    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<Snippet>, RetrievalError> {
        Err(RetrievalError::Unavailable("index offline".into()))
    }
}
