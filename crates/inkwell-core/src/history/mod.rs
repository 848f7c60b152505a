//! Per-user conversation history: storage, retention caps, compression.

pub mod compressor;
pub mod limits;
pub mod store;

pub use compressor::{CompressedHistory, HistoryCompressor};
pub use store::HistoryStore;
