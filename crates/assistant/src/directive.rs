//! The behavior directive: the fixed system instruction sent with every
//! generation request.
//!
//! The directive is data, not logic. It never changes with conversation
//! state; deployments may swap in their own text from a file, which is
//! versioned by its file name.

use dermassist_core::error::Error;
use dermassist_core::knowledge::Snippet;
use std::path::Path;

/// Placeholder replaced by the retrieved snippets.
pub const CONTEXT_SLOT: &str = "{context}";

/// Reply for "who created you?" questions.
pub const CREATOR_ATTRIBUTION: &str = "I was created by Sanish Bhagat.";

/// Reply when the retrieved context does not cover a medical question.
pub const NO_CONTEXT_REFUSAL: &str = "🩺 I don't have an exact answer from my trusted medical sources. Please consult a certified dermatologist for accurate guidance.";

/// Reply for questions unrelated to skin health.
pub const OFF_TOPIC_REFUSAL: &str = "⚠️ This assistant is for skin health and dermatology. Your query seems unrelated. Please ask about skin diseases, symptoms, or skin care.";

const V1_TEMPLATE: &str = r#"You are Derma-AI, an AI-powered dermatology assistant designed to help users understand
skin diseases, symptoms, prevention, and basic care guidance.

======================== RULES OF BEHAVIOR ========================

1. GREETINGS & POLITE MESSAGES
- If the user greets you (e.g., "hi", "hello", "good morning") or uses polite phrases
  (e.g., "thank you", "bye", "ok"), respond politely, briefly, and in a friendly tone.

2. CREATOR ATTRIBUTION
- If the user asks "Who created you?" or similar, reply with:
  "I was created by Sanish Bhagat."

3. MEDICAL DERMATOLOGY QUERIES (MAIN PURPOSE)
- If the user asks about:
    • Acne
    • Actinic Keratosis
    • Basal Cell Carcinoma
    • Eczema
    • Rosacea
    • Skin symptoms
    • Causes, risks, complications
    • Skin care advice
    • UV protection
    • When to see a doctor
  → You must answer ONLY using the provided context (curated medical knowledge).

- If the context does not contain the answer, reply:
  "🩺 I don't have an exact answer from my trusted medical sources. Please consult a certified dermatologist for accurate guidance."

4. IMAGE + CLASSIFIER OUTPUT
- If a recent skin analysis result is provided, you may explain it using the context.
- Never invent information beyond the context.

5. MATHEMATICAL QUERIES
- If the user asks for simple/basic mathematics, answer it correctly.

6. SESSION MEMORY
- You may use information from the current session (not from previous sessions).

7. NON-MEDICAL OR UNRELATED QUERIES
- If the user asks something unrelated to dermatology, skincare, symptoms, or medical topics,
  respond with:
  "⚠️ This assistant is for skin health and dermatology. Your query seems unrelated. Please ask about skin diseases, symptoms, or skin care."

8. SAFETY
- Do NOT provide medical diagnosis.
- Do NOT give prescription medication.
- Provide only educational, non-medical guidance based on the context.

===================================================================
{context}
"#;

/// A versioned system instruction with a `{context}` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorDirective {
    version: String,
    template: String,
}

impl BehaviorDirective {
    /// The built-in directive.
    pub fn v1() -> Self {
        Self {
            version: "v1".into(),
            template: V1_TEMPLATE.into(),
        }
    }

    /// Build a directive from custom text. The text must contain the
    /// `{context}` slot exactly once.
    pub fn from_template(
        version: impl Into<String>,
        template: impl Into<String>,
    ) -> Result<Self, Error> {
        let template = template.into();
        match template.matches(CONTEXT_SLOT).count() {
            1 => Ok(Self {
                version: version.into(),
                template,
            }),
            n => Err(Error::Config {
                message: format!("directive must contain {CONTEXT_SLOT} exactly once, found {n}"),
            }),
        }
    }

    /// Load a directive from a text file; its version is `file:<name>`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let template = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read directive {}: {e}", path.display()),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_template(format!("file:{name}"), template)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Fill the context slot with snippet texts, separated by blank lines.
    pub fn render(&self, snippets: &[Snippet]) -> String {
        let context = snippets
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.template.replacen(CONTEXT_SLOT, &context, 1)
    }
}

impl Default for BehaviorDirective {
    fn default() -> Self {
        Self::v1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_carries_the_fixed_replies() {
        let d = BehaviorDirective::v1();
        assert_eq!(d.version(), "v1");
        assert!(d.template().contains(CREATOR_ATTRIBUTION));
        assert!(d.template().contains(NO_CONTEXT_REFUSAL));
        assert!(d.template().contains(OFF_TOPIC_REFUSAL));
        assert_eq!(d.template().matches(CONTEXT_SLOT).count(), 1);
    }

    #[test]
    fn render_fills_context_slot() {
        let d = BehaviorDirective::v1();
        let rendered = d.render(&[
            Snippet::new("Acne is a skin condition."),
            Snippet::new("Use sunscreen daily."),
        ]);
        assert!(!rendered.contains(CONTEXT_SLOT));
        assert!(rendered.ends_with("Acne is a skin condition.\n\nUse sunscreen daily.\n"));
    }

    #[test]
    fn render_without_snippets_leaves_empty_context() {
        let d = BehaviorDirective::from_template("t", "Rules.\n{context}").unwrap();
        assert_eq!(d.render(&[]), "Rules.\n");
    }

    #[test]
    fn render_is_independent_of_previous_calls() {
        let d = BehaviorDirective::v1();
        let first = d.render(&[Snippet::new("one")]);
        let _ = d.render(&[Snippet::new("two")]);
        assert_eq!(d.render(&[Snippet::new("one")]), first);
    }

    #[test]
    fn template_without_slot_is_rejected() {
        let err = BehaviorDirective::from_template("bad", "no slot here").unwrap_err();
        assert!(err.to_string().contains("{context}"));
        assert!(BehaviorDirective::from_template("bad", "{context}{context}").is_err());
    }

    #[test]
    fn loads_from_file_with_versioned_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic-v2.txt");
        std::fs::write(&path, "Be brief.\n{context}").unwrap();

        let d = BehaviorDirective::load(&path).unwrap();
        assert_eq!(d.version(), "file:clinic-v2.txt");
        assert_eq!(d.render(&[Snippet::new("ctx")]), "Be brief.\nctx");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = BehaviorDirective::load(Path::new("/nonexistent/directive.txt")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
