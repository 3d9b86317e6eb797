//! Pipa score WASM API
//!
//! - `helpers`: console logging macros and `JsValue` conversion
//! - `score`: compile, parse, dump and configuration entry points

pub mod helpers;
pub mod score;

pub use score::*;
