//! JavaScript entry points for compiling tablature
//!
//! The active pipeline lives in WASM-owned storage so the front end can swap
//! the notation rules at runtime. When nothing has been set, the built-in
//! Pipa configuration is loaded on first use.

use lazy_static::lazy_static;
use std::sync::{Mutex, MutexGuard};
use wasm_bindgen::prelude::*;

use super::helpers::{score_error, serialize};
use crate::ast::TreeDump;
use crate::config::ScoreConfig;
use crate::pipeline::ScorePipeline;
use crate::{wasm_error, wasm_info, wasm_warn};

lazy_static! {
    static ref PIPELINE: Mutex<Option<ScorePipeline>> = Mutex::new(None);
}

fn lock_pipeline() -> Result<MutexGuard<'static, Option<ScorePipeline>>, JsValue> {
    PIPELINE.lock().map_err(|e| {
        wasm_error!("Pipeline lock poisoned: {}", e);
        JsValue::from_str("Pipeline lock poisoned")
    })
}

/// Run `f` against the active pipeline, creating the built-in one if needed
fn with_pipeline<T>(f: impl FnOnce(&ScorePipeline) -> Result<T, JsValue>) -> Result<T, JsValue> {
    let mut guard = lock_pipeline()?;
    if guard.is_none() {
        wasm_info!("Loading built-in Pipa configuration");
        let pipeline = ScorePipeline::builtin().map_err(|e| score_error("Built-in config", e))?;
        *guard = Some(pipeline);
    }
    match guard.as_ref() {
        Some(pipeline) => f(pipeline),
        None => Err(JsValue::from_str("No pipeline loaded")),
    }
}

/// Compile notation text to its render command list (pages of commands)
#[wasm_bindgen(js_name = compileScore)]
pub fn compile_score(text: &str) -> Result<JsValue, JsValue> {
    wasm_info!("compileScore called ({} chars)", text.len());

    with_pipeline(|pipeline| {
        let compilation = pipeline.run(text).map_err(|e| score_error("Compile", e))?;
        if !compilation.diagnostics.is_empty() {
            wasm_warn!(
                "{} lexical / {} structural anomalies recovered",
                compilation.diagnostics.lexical.len(),
                compilation.diagnostics.structural.len()
            );
        }
        wasm_info!("compileScore produced {} page(s)", compilation.render_list.pages.len());
        serialize(&compilation.render_list, "Render list serialization error")
    })
}

/// Compile to the render command list as a JSON string
#[wasm_bindgen(js_name = compileScoreJson)]
pub fn compile_score_json(text: &str) -> Result<String, JsValue> {
    with_pipeline(|pipeline| {
        pipeline
            .compile(text)
            .and_then(|list| list.to_json())
            .map_err(|e| score_error("Compile", e))
    })
}

/// Parse and resolve notation text; returns the document tree and diagnostics
#[wasm_bindgen(js_name = parseScore)]
pub fn parse_score(text: &str) -> Result<JsValue, JsValue> {
    wasm_info!("parseScore called ({} chars)", text.len());

    with_pipeline(|pipeline| {
        let analysis = pipeline.analyze(text).map_err(|e| score_error("Analyze", e))?;
        serialize(&analysis, "Document serialization error")
    })
}

/// Indented text dump of the resolved tree, for debugging a transcription
#[wasm_bindgen(js_name = dumpScoreTree)]
pub fn dump_score_tree(text: &str) -> Result<String, JsValue> {
    with_pipeline(|pipeline| {
        let analysis = pipeline.analyze(text).map_err(|e| score_error("Analyze", e))?;
        Ok(TreeDump::render(&analysis.document))
    })
}

/// Replace the active rules and layout with a YAML configuration.
/// The previous pipeline stays active if the new one is invalid.
#[wasm_bindgen(js_name = setScoreConfig)]
pub fn set_score_config(yaml: &str) -> Result<(), JsValue> {
    wasm_info!("setScoreConfig called");

    let pipeline = ScoreConfig::from_yaml_str(yaml)
        .and_then(ScorePipeline::new)
        .map_err(|e| score_error("Config rejected", e))?;

    *lock_pipeline()? = Some(pipeline);
    wasm_info!("setScoreConfig completed successfully");
    Ok(())
}

/// Go back to the built-in Pipa configuration
#[wasm_bindgen(js_name = resetScoreConfig)]
pub fn reset_score_config() -> Result<(), JsValue> {
    *lock_pipeline()? = None;
    wasm_info!("Score config reset to built-in");
    Ok(())
}
