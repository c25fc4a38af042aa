//! The conversation orchestrator: one chat turn, start to finish.

use dermassist_config::AppConfig;
use dermassist_core::classification::ClassificationResult;
use dermassist_core::error::Error;
use dermassist_core::knowledge::Retriever;
use dermassist_core::message::SessionId;
use dermassist_core::provider::Provider;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::composer::{ComposedPrompt, compose};
use crate::directive::BehaviorDirective;
use crate::generator::{Generation, Generator};
use crate::session::SessionStore;

/// Reply returned whenever retrieval or generation fails.
pub const FALLBACK_REPLY: &str =
    "I apologize, but I'm having trouble connecting to the server. Please try again later.";

/// The result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: SessionId,
    pub reply: String,
    /// Turns committed to session memory (0 when the turn failed).
    pub turns_added: usize,
    /// Whether `reply` is [`FALLBACK_REPLY`] because the pipeline failed.
    pub fallback: bool,
    /// Sources of the snippets the answer was grounded on.
    pub sources: Vec<String>,
}

/// Sequences composition, retrieval, generation and memory commit.
pub struct Assistant {
    retriever: Arc<dyn Retriever>,
    generator: Generator,
    directive: BehaviorDirective,
    sessions: SessionStore,
    top_k: usize,
    timeout: Duration,
}

impl Assistant {
    pub fn new(retriever: Arc<dyn Retriever>, generator: Generator) -> Self {
        Self {
            retriever,
            generator,
            directive: BehaviorDirective::default(),
            sessions: SessionStore::default(),
            top_k: 3,
            timeout: Duration::from_secs(60),
        }
    }

    /// Build an assistant from configuration, loading a custom directive
    /// when `assistant.directive_path` is set.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        retriever: Arc<dyn Retriever>,
    ) -> Result<Self, Error> {
        let generator = Generator::new(provider, config.default_model.clone())
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens);

        let directive = match &config.assistant.directive_path {
            Some(path) => BehaviorDirective::load(Path::new(path))?,
            None => BehaviorDirective::default(),
        };

        Ok(Self::new(retriever, generator)
            .with_directive(directive)
            .with_top_k(config.retrieval.top_k)
            .with_timeout(Duration::from_secs(config.assistant.generation_timeout_secs))
            .with_max_sessions(config.assistant.max_sessions))
    }

    pub fn with_directive(mut self, directive: BehaviorDirective) -> Self {
        self.directive = directive;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.sessions = SessionStore::new(max_sessions);
        self
    }

    pub fn directive(&self) -> &BehaviorDirective {
        &self.directive
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer `message` within `session`.
    ///
    /// Only a blank message is an error. Retrieval, generation and timeout
    /// failures produce [`FALLBACK_REPLY`] with memory left untouched.
    pub async fn handle_chat(
        &self,
        session: &SessionId,
        message: &str,
        classification: Option<ClassificationResult>,
    ) -> Result<ChatOutcome, Error> {
        if message.trim().is_empty() {
            return Err(Error::Input("No message provided".into()));
        }

        let handle = self.sessions.handle(session).await;
        let mut memory = handle.lock().await;

        let prompt = compose(message, classification.as_ref(), &memory);
        debug!(
            session = %session,
            turns = memory.len(),
            classified = classification.is_some(),
            "Composed prompt"
        );

        let result = match tokio::time::timeout(self.timeout, self.answer(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }),
        };

        match result {
            Ok(generation) => {
                let turns_added =
                    memory.record_exchange(classification.as_ref(), message, &generation.answer);
                info!(
                    session = %session,
                    turns = memory.len(),
                    added = turns_added,
                    snippets = generation.grounding.len(),
                    "Chat turn committed"
                );
                let sources = generation.sources().into_iter().map(String::from).collect();
                Ok(ChatOutcome {
                    session_id: session.clone(),
                    reply: generation.answer,
                    turns_added,
                    fallback: false,
                    sources,
                })
            }
            Err(e) => {
                warn!(session = %session, error = %e, "Chat pipeline failed, returning fallback");
                Ok(ChatOutcome {
                    session_id: session.clone(),
                    reply: FALLBACK_REPLY.to_string(),
                    turns_added: 0,
                    fallback: true,
                    sources: Vec::new(),
                })
            }
        }
    }

    /// Retrieval then generation, with the composed text as both the
    /// retrieval query and the model input.
    async fn answer(&self, prompt: &ComposedPrompt) -> Result<Generation, Error> {
        let snippets = self.retriever.retrieve(prompt.text(), self.top_k).await?;
        debug!(retriever = %self.retriever.name(), snippets = snippets.len(), "Retrieved context");
        let generation = self
            .generator
            .generate(&self.directive, snippets, prompt)
            .await?;
        Ok(generation)
    }
}
