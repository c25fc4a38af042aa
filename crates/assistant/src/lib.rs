//! The conversation core of DermAssist.
//!
//! One chat turn runs through a fixed pipeline:
//!
//! 1. **Lock** the caller's session (one writer per session)
//! 2. **Compose** the prompt from classification, transcript and question
//! 3. **Retrieve** the top-k knowledge snippets for the composed text
//! 4. **Generate** a grounded answer under the behavior directive
//! 5. **Commit** the new turns to session memory, or nothing on failure
//!
//! Any failure in steps 2–4 yields a fixed fallback reply and leaves the
//! session exactly as it was.

pub mod composer;
pub mod directive;
pub mod generator;
pub mod orchestrator;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use composer::{ComposedPrompt, compose};
pub use directive::BehaviorDirective;
pub use generator::{Generation, Generator};
pub use orchestrator::{Assistant, ChatOutcome, FALLBACK_REPLY};
pub use session::{SessionMemory, SessionStore};
