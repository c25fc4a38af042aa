//! Knowledge retrieval for DermAssist.
//!
//! The medical knowledge base is a set of text chunks with embeddings,
//! stored in a [`VectorIndex`]. At chat time an [`EmbeddingRetriever`]
//! embeds the query and asks the index for its nearest chunks; offline,
//! [`Ingestor`] splits reference documents and fills the index.

pub mod index;
pub mod ingest;
pub mod json_index;
pub mod pinecone;
pub mod retriever;
pub mod vector;

pub use index::{IndexEntry, VectorIndex, chunk_id, chunk_number};
pub use ingest::{Ingestor, chunk_document};
pub use json_index::JsonIndex;
pub use pinecone::PineconeIndex;
pub use retriever::EmbeddingRetriever;
pub use vector::{cosine_similarity, nearest};
