//! Image classification for DermAssist.
//!
//! [`preprocess`] turns uploaded bytes into the normalized RGB tensor the
//! model expects; [`RemoteClassifier`] sends it to a model server speaking
//! the TensorFlow Serving REST predict protocol and maps the returned
//! probabilities onto a [`ClassificationResult`](dermassist_core::ClassificationResult).

pub mod preprocess;
pub mod remote;

pub use preprocess::{ImageTensor, preprocess};
pub use remote::RemoteClassifier;
