//! Passes over the parsed document
//!
//! Each score type has a fixed, compiled-in list of passes. They run in
//! order over the same tree; whatever a pass produces for later stages
//! (the render list) goes into the shared `PipelineContext`.

pub mod layout;
pub mod theory;

pub use layout::LayoutPass;
pub use theory::TheoryPass;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::Document;
use crate::config::ScoreConfig;
use crate::error::{Result, ScoreError};
use crate::render::RenderList;

/// Output shared between passes of one pipeline run
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub render_list: Option<RenderList>,
}

pub trait ScorePass {
    fn name(&self) -> &'static str;

    fn run(&mut self, document: &mut Document, context: &mut PipelineContext) -> Result<()>;
}

impl ScorePass for TheoryPass {
    fn name(&self) -> &'static str {
        "theory"
    }

    fn run(&mut self, document: &mut Document, _context: &mut PipelineContext) -> Result<()> {
        document.accept_mut(self)
    }
}

impl ScorePass for LayoutPass {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn run(&mut self, document: &mut Document, context: &mut PipelineContext) -> Result<()> {
        document.accept_mut(self)?;
        context.render_list = Some(self.take_render_list());
        Ok(())
    }
}

/// Notation families the pipeline knows how to compile
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    #[default]
    Pipa,
}

impl ScoreType {
    /// The pass list for this score type, in execution order
    pub fn passes(self, config: &ScoreConfig) -> Result<Vec<Box<dyn ScorePass>>> {
        match self {
            ScoreType::Pipa => Ok(vec![
                Box::new(TheoryPass::new(&config.rules)),
                Box::new(LayoutPass::new(&config.layout, &config.rules)?),
            ]),
        }
    }
}

impl FromStr for ScoreType {
    type Err = ScoreError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pipa" => Ok(ScoreType::Pipa),
            _ => Err(ScoreError::UnsupportedScoreType(name.to_string())),
        }
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreType::Pipa => write!(f, "pipa"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_type_from_str() {
        assert_eq!("pipa".parse::<ScoreType>().unwrap(), ScoreType::Pipa);
        assert_eq!(" Pipa ".parse::<ScoreType>().unwrap(), ScoreType::Pipa);
        assert!(matches!(
            "guqin".parse::<ScoreType>(),
            Err(ScoreError::UnsupportedScoreType(ref name)) if name == "guqin"
        ));
    }

    #[test]
    fn test_pipa_pass_order() {
        let config = ScoreConfig::builtin().unwrap();
        let names: Vec<_> = ScoreType::Pipa
            .passes(&config)
            .unwrap()
            .iter()
            .map(|pass| pass.name())
            .collect();
        assert_eq!(names, vec!["theory", "layout"]);
    }
}
