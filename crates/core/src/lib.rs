//! # DermAssist Core
//!
//! Domain types, traits, and error definitions for the DermAssist
//! dermatology assistant. This crate has **no framework dependencies**: it
//! defines the domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Each black-box collaborator is a trait here:
//! - [`Classifier`] maps image bytes to a [`ClassificationResult`]
//! - [`Retriever`] maps a query to ranked knowledge [`Snippet`]s
//! - [`Provider`] talks to a generative model
//!
//! Implementations live in their own crates, so the orchestration core can be
//! tested against scripted stand-ins.

pub mod classification;
pub mod error;
pub mod knowledge;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use classification::{ClassificationResult, Classifier, DiseaseLabel};
pub use error::{Error, Result};
pub use knowledge::{Retriever, Snippet};
pub use message::{ConversationTurn, Message, Role, SessionId, Speaker};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
