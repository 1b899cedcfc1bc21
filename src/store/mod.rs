//! Document index: tantivy records plus mmap vectors.

mod error;
pub mod filter;
mod index;
mod schema;
mod transaction;

pub use error::{IndexError, IndexResult};
pub use filter::{Condition, Filter, FilterError};
pub use index::{
    DocumentIndex, EMBEDDING_BATCH_SIZE, SearchHit, SearchRequest, StoredDocument,
};
pub use schema::DocumentSchema;
pub use transaction::{CommitSummary, IndexTransaction};
