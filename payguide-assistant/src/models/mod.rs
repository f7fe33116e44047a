pub mod chat;
pub mod document;

pub use chat::{ChatMessage, Role, Transcript};
pub use document::{CachedDocument, DocumentHandle, FileState};
