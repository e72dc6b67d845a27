//! Rich-text document model. Content is a sequence of blocks holding styled
//! text runs and embedded images; every formatting command is a structural
//! transform on that model, and the markup form is what gets persisted.

mod edit;
pub mod markup;
mod model;
mod surface;

pub use edit::MAX_INDENT;
pub use model::{
    Align, Block, BlockKind, Document, Image, ImageId, Inline, InlineStyle, ListKind, Mark, Position,
    Selection, TextRun,
};
pub use surface::{EditorSurface, Mutation};
