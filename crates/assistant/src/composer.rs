//! Prompt composition.
//!
//! Builds the single text the model answers for one chat turn:
//!
//! ```text
//! Recent skin analysis result:        (only with a classification)
//! - Disease: Acne
//! - Confidence: 87.00%
//! - Description: ...
//!
//! Previous conversation:               (only with a non-empty transcript)
//! User: ...
//! Assistant: ...
//!
//! User question: <message>
//! ```
//!
//! The transcript is rendered in full; nothing is filtered or truncated.

use dermassist_core::classification::ClassificationResult;

use crate::session::{SessionMemory, classification_lines};

/// The assembled input for one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    text: String,
}

impl ComposedPrompt {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl std::fmt::Display for ComposedPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Compose the prompt for `user_message`. Pure: reads `memory`, never
/// changes it.
pub fn compose(
    user_message: &str,
    classification: Option<&ClassificationResult>,
    memory: &SessionMemory,
) -> ComposedPrompt {
    let mut sections = Vec::with_capacity(3);

    if let Some(c) = classification {
        sections.push(format!(
            "Recent skin analysis result:\n{}",
            classification_lines(c)
        ));
    }

    if !memory.is_empty() {
        let transcript = memory
            .turns()
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker_label(), turn.text))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("Previous conversation:\n{transcript}"));
    }

    sections.push(format!("User question: {user_message}"));

    ComposedPrompt {
        text: sections.join("\n\n"),
    }
}
