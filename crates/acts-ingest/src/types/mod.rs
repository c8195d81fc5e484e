//! Core types for the acts pipeline

pub mod act;
pub mod issuer;
pub mod progress;

pub use act::{Act, ActToForward, Document, DocumentRef, ForwardPayload, ParsedAct, ParsedActs};
pub use issuer::Issuer;
pub use progress::{Level, ProgressEvent, RunEvent, Stage};
