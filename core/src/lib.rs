//! Core of the pagenote note-taking application: the note store, the list
//! projection, the rich-text document model and the interaction
//! controllers that sit on top of it.

pub mod commands;
pub mod error;
pub mod images;
pub mod list;
pub mod models;
pub mod richtext;
pub mod session;
pub mod storage;

pub use error::{Error, Result};
pub use session::Session;
