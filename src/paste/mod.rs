//! Paste storage, identifiers and lifecycle rules.

mod backend;
mod draft;
mod memory;
mod model;
mod sqlite;
mod store;
pub mod token;

pub use backend::PasteBackend;
pub use draft::{LineEnd, PasteDraft, AUTHOR_FIELD_MAX_LENGTH, DEFAULT_SYNTAX};
pub use memory::MemoryPasteBackend;
pub use model::{CreatedPaste, NewPaste, Paste, PasteView};
pub use sqlite::SqlitePasteBackend;
pub use store::{unix_now, PasteStore};
pub use token::PASTE_ID_LENGTH;
