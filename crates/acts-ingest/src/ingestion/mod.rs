//! Text extraction from downloaded act documents

pub mod engine;
mod extractor;
pub mod sniff;

pub use engine::{TextEngine, ToolEngine};
pub use extractor::Extractor;
pub use sniff::{sniff, ContentKind};
