pub mod backend;
pub mod error;
pub mod http;
pub mod ingest;
pub mod upstream;

pub use backend::{BranchBackend, ByteStream};
pub use error::{LLMError, Result};
pub use http::HttpBackend;
pub use ingest::{ingest, snapshots, SnapshotStream, Utf8StreamDecoder};
pub use upstream::{LLMProvider, OpenAICompatProvider, TokenStream};
