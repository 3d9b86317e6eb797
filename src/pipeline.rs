//! End-to-end compilation: text → tokens → tree → passes → render list
//!
//! A `ScorePipeline` owns its configuration and compiled lexer. Every call
//! builds fresh parser and pass state, so one pipeline can compile any
//! number of documents and independent pipelines never share anything.

use serde::{Deserialize, Serialize};

use crate::ast::Document;
use crate::config::ScoreConfig;
use crate::error::Result;
use crate::lexer::{LexAnomaly, Lexer};
use crate::parser::{Parser, StructuralAnomaly};
use crate::passes::{PipelineContext, ScoreType, TheoryPass};
use crate::render::RenderList;

/// Recovered input problems, in source order
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    pub lexical: Vec<LexAnomaly>,
    pub structural: Vec<StructuralAnomaly>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.lexical.is_empty() && self.structural.is_empty()
    }
}

/// Parsed tree plus what was recovered while building it
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Analysis {
    pub document: Document,
    pub diagnostics: Diagnostics,
}

/// Fully processed document and its render list
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Compilation {
    pub document: Document,
    pub render_list: RenderList,
    pub diagnostics: Diagnostics,
}

pub struct ScorePipeline {
    config: ScoreConfig,
    score_type: ScoreType,
    lexer: Lexer,
}

impl ScorePipeline {
    /// Validate `config` and compile its rules. All configuration errors
    /// surface here, before any input is read.
    pub fn new(config: ScoreConfig) -> Result<Self> {
        let lexer = Lexer::new(&config.rules)?;
        config.layout.validate()?;
        Ok(Self {
            config,
            score_type: ScoreType::Pipa,
            lexer,
        })
    }

    /// Pipeline over the built-in Pipa rules
    pub fn builtin() -> Result<Self> {
        Self::new(ScoreConfig::builtin()?)
    }

    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    pub fn score_type(&self) -> ScoreType {
        self.score_type
    }

    /// Lex and parse only; no pass has run
    pub fn parse_document(&self, text: &str) -> Document {
        self.parse_with_diagnostics(text).document
    }

    fn parse_with_diagnostics(&self, text: &str) -> Analysis {
        let lexed = self.lexer.tokenize_with_diagnostics(text);
        let mut parser = Parser::with_layout(&self.config.rules, &self.config.layout);
        let document = parser.parse(&lexed.tokens);
        Analysis {
            document,
            diagnostics: Diagnostics {
                lexical: lexed.anomalies,
                structural: parser.warnings().to_vec(),
            },
        }
    }

    /// Parse and resolve musical content (modes, durations, fire chains)
    /// without laying anything out
    pub fn analyze(&self, text: &str) -> Result<Analysis> {
        let mut analysis = self.parse_with_diagnostics(text);
        let mut theory = TheoryPass::new(&self.config.rules);
        analysis.document.accept_mut(&mut theory)?;
        Ok(analysis)
    }

    /// Run every pass and keep the resolved, positioned tree
    pub fn run(&self, text: &str) -> Result<Compilation> {
        let Analysis {
            mut document,
            diagnostics,
        } = self.parse_with_diagnostics(text);

        let mut context = PipelineContext::default();
        for mut pass in self.score_type.passes(&self.config)? {
            log::debug!("Running {} pass", pass.name());
            pass.run(&mut document, &mut context)?;
        }

        if !diagnostics.is_empty() {
            log::warn!(
                "Compiled with {} lexical and {} structural anomalies",
                diagnostics.lexical.len(),
                diagnostics.structural.len()
            );
        }

        let render_list = context.render_list.unwrap_or_default();
        Ok(Compilation {
            document,
            render_list,
            diagnostics,
        })
    }

    /// Compile `text` to its render command list
    pub fn compile(&self, text: &str) -> Result<RenderList> {
        Ok(self.run(text)?.render_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_resolves_without_layout() {
        let pipeline = ScorePipeline::builtin().unwrap();
        let analysis = pipeline.analyze("{一/h}{二/h}").unwrap();
        let units: Vec<_> = analysis.document.note_units().collect();
        assert_eq!(units[0].duration, 0.5);
        assert!(units.iter().all(|u| u.geometry.is_none()));
        assert_eq!(analysis.document.mode.as_deref(), Some("黄钟调"));
    }

    #[test]
    fn test_parse_document_leaves_durations_raw() {
        let pipeline = ScorePipeline::builtin().unwrap();
        let document = pipeline.parse_document("{一/y}");
        assert_eq!(document.note_units().next().unwrap().duration, 1.0);
        assert!(document.mode.is_none());
    }

    #[test]
    fn test_diagnostics_collected() {
        let pipeline = ScorePipeline::builtin().unwrap();
        let compilation = pipeline.run("{一?}\n{二\n## 第二段\n/pz").unwrap();
        assert_eq!(compilation.diagnostics.lexical.len(), 1);
        assert_eq!(compilation.diagnostics.lexical[0].line, 1);
        assert_eq!(compilation.diagnostics.structural.len(), 1);
        assert_eq!(compilation.diagnostics.structural[0].line, 4);
        assert_eq!(compilation.document.note_units().count(), 2);
    }

    #[test]
    fn test_invalid_layout_fails_at_construction() {
        let mut config = ScoreConfig::builtin().unwrap();
        config.layout.unit_num = 0;
        assert!(ScorePipeline::new(config).is_err());
    }
}
