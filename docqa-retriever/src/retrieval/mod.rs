pub mod document_id;
pub mod document_index;
pub mod index_builder;
mod retry;
pub mod retriever;
pub mod session;

pub use document_id::DocumentId;
pub use document_index::{DocumentIndex, IndexEntry, SearchHit, squared_l2};
pub use index_builder::IndexBuilder;
pub use retriever::{DEFAULT_TOP_K, Retriever, format_context};
pub use session::{ActiveDocument, DocumentSession};
