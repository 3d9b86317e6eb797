//! Pipa tablature notation compiler
//!
//! Turns plain-text Pipa (Chinese lute) tablature into a page-segmented list
//! of positioned drawing commands:
//!
//! lexer → parser → theory pass → layout pass → `RenderList`
//!
//! The crate builds both as an `rlib` and as a WASM module; see `api` for
//! the JavaScript entry points.

pub mod api;
pub mod ast;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod passes;
pub mod pipeline;
pub mod render;

// Re-export commonly used types
pub use ast::{Document, NoteUnit, Section, TextNode, TreeDump};
pub use config::{LayoutConfig, RuleConfig, ScoreConfig};
pub use error::{Result, ScoreError};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use passes::{LayoutPass, ScorePass, ScoreType, TheoryPass};
pub use pipeline::{Analysis, Compilation, Diagnostics, ScorePipeline};
pub use render::{CommandType, MarkerKind, Page, RenderCommand, RenderList};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Debug) {
            wasm_warn!("Logger already initialized: {}", e);
        }
    }

    log::info!("Pipa score WASM module initialized");
}
