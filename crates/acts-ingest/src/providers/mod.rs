//! Provider abstractions for the remote services the pipeline talks to
//!
//! The record store and the aggregation service sit behind traits so the
//! pipeline stages can run against the real HTTP APIs or in-process doubles.

pub mod forward;
pub mod http_store;
pub mod memory;
pub mod store;

pub use forward::{ForwardTarget, HttpForwardTarget, LogForwardTarget};
pub use http_store::HttpRecordStore;
pub use memory::{MemoryRecordStore, StoreOp};
pub use store::{ActFilter, ActPatch, DocumentFilter, DocumentPatch, FileUpload, RecordStore};
