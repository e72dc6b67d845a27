pub mod body;
mod layout;
mod widgets;

pub use layout::render;
