//! Office document indexing and semantic search.
//!
//! Files are normalized into [`Document`] records by [`loader`], given a
//! content-derived [`DocId`] by [`identity`], and committed into a
//! [`DocumentIndex`] that pairs a tantivy record store with an mmap vector
//! file. [`http`] and [`cli`] expose search and a stub answer endpoint.

pub mod answer;
pub mod cli;
pub mod config;
pub mod http;
pub mod identity;
pub mod loader;
pub mod logging;
pub mod processor;
pub mod store;
pub mod utils;
pub mod vector;

pub use config::Settings;
pub use identity::DocId;
pub use loader::{Document, DocumentKind, LoadError, Metadata, MetadataValue, load_file};
pub use processor::{DocumentProcessor, ProcessOutcome};
pub use store::{DocumentIndex, Filter, IndexError, SearchHit, SearchRequest};
pub use vector::{EmbeddingGenerator, FastEmbedGenerator, HashingEmbedder};
