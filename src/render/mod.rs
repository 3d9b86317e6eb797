//! Render intermediate representation
//!
//! The layout pass writes into a `RenderListBuilder`; backends consume the
//! finished `RenderList` page by page.

pub mod commands;

pub use commands::*;
