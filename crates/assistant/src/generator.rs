//! Grounded generation: directive + snippets + composed prompt → answer.

use dermassist_core::error::ProviderError;
use dermassist_core::knowledge::Snippet;
use dermassist_core::message::Message;
use dermassist_core::provider::{Provider, ProviderRequest, Usage};
use std::sync::Arc;
use tracing::info;

use crate::composer::ComposedPrompt;
use crate::directive::BehaviorDirective;

/// An answer plus the material it was grounded on.
#[derive(Debug, Clone)]
pub struct Generation {
    pub answer: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub grounding: Vec<Snippet>,
    pub directive_version: String,
}

impl Generation {
    /// Distinct snippet sources, in retrieval order.
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for source in self.grounding.iter().filter_map(|s| s.source.as_deref()) {
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        sources
    }
}

/// Sends one grounded request to the configured model.
pub struct Generator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl Generator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The request sent for one turn: the rendered directive as the system
    /// message, the composed prompt as the user message.
    pub fn build_request(
        &self,
        directive: &BehaviorDirective,
        snippets: &[Snippet],
        input: &ComposedPrompt,
    ) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(directive.render(snippets)),
                Message::user(input.text()),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: vec![],
        }
    }

    pub async fn generate(
        &self,
        directive: &BehaviorDirective,
        snippets: Vec<Snippet>,
        input: &ComposedPrompt,
    ) -> Result<Generation, ProviderError> {
        let request = self.build_request(directive, &snippets, input);
        let response = self.provider.complete(request).await?;

        info!(
            provider = %self.provider.name(),
            model = %response.model,
            snippets = snippets.len(),
            answer_len = response.message.content.len(),
            "Generated grounded answer"
        );

        Ok(Generation {
            answer: response.message.content,
            model: response.model,
            usage: response.usage,
            grounding: snippets,
            directive_version: directive.version().to_string(),
        })
    }
}
