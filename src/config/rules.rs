//! Declarative lexer rules and notation tables
//!
//! Everything here is data: token patterns, the duration table, metadata
//! labels and display glyph tables. Swapping the YAML changes the notation
//! without touching lexer or parser code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::lexer::{LexState, Semantic, TokenKind};
use crate::render::MarkerKind;

/// Which part of a rule's match becomes the token value
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Capture {
    #[default]
    Whole,
    Group1,
}

/// Lexer state(s) a rule applies in
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateFilter {
    #[default]
    Any,
    Normal,
    Unit,
}

impl StateFilter {
    pub fn admits(self, state: LexState) -> bool {
        match self {
            StateFilter::Any => true,
            StateFilter::Normal => state == LexState::Normal,
            StateFilter::Unit => state == LexState::Unit,
        }
    }
}

/// One entry of the ordered token rule table
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TokenRule {
    pub kind: TokenKind,
    pub pattern: String,
    #[serde(default)]
    pub semantic: Option<Semantic>,
    #[serde(default)]
    pub capture: Capture,
    /// Capture group copied into `Token::extra`
    #[serde(default)]
    pub extra_group: Option<usize>,
    #[serde(default)]
    pub state: StateFilter,
    #[serde(default)]
    pub push: Option<LexState>,
    #[serde(default)]
    pub pop: bool,
    /// Match and advance but emit nothing (whitespace)
    #[serde(default)]
    pub skip: bool,
}

/// Document fields a `%` metadata label can map to
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetaField {
    Source,
    Transcriber,
    Proofreader,
    Date,
}

/// Rule table plus the notation lookup tables used by the passes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RuleConfig {
    pub tokens: Vec<TokenRule>,

    /// Time-modifier glyph → duration multiplier
    pub duration_modifier_map: BTreeMap<String, f32>,

    /// Metadata label (e.g. `来源`) → document field
    #[serde(default)]
    pub document_meta_map: BTreeMap<String, MetaField>,

    /// Duration-halving glyph that is shown once per fire chain
    pub fire_glyph: String,

    /// Glyphs that only affect duration and are removed after use
    #[serde(default)]
    pub consumed_glyphs: Vec<String>,

    /// Time-modifier glyph → displayed character
    #[serde(default)]
    pub time_modifier_glyphs: BTreeMap<String, String>,

    /// Rhythm-modifier glyph → marker drawn for it
    #[serde(default)]
    pub rhythm_markers: BTreeMap<String, MarkerKind>,

    /// Mode used when the document declares none
    pub default_mode: String,
}

impl RuleConfig {
    pub fn duration_of(&self, glyph: &str) -> Option<f32> {
        self.duration_modifier_map.get(glyph).copied()
    }

    pub fn is_consumed(&self, glyph: &str) -> bool {
        self.consumed_glyphs.iter().any(|g| g == glyph)
    }

    pub fn meta_field(&self, label: &str) -> Option<MetaField> {
        self.document_meta_map.get(label).copied()
    }

    pub fn marker_for(&self, glyph: &str) -> Option<MarkerKind> {
        self.rhythm_markers.get(glyph).copied()
    }

    /// Display text for a time modifier; glyphs without a table entry draw as written
    pub fn time_glyph_text<'a>(&'a self, glyph: &'a str) -> &'a str {
        self.time_modifier_glyphs
            .get(glyph)
            .map(String::as_str)
            .unwrap_or(glyph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_filter_admits() {
        assert!(StateFilter::Any.admits(LexState::Normal));
        assert!(StateFilter::Any.admits(LexState::Unit));
        assert!(StateFilter::Unit.admits(LexState::Unit));
        assert!(!StateFilter::Unit.admits(LexState::Normal));
        assert!(!StateFilter::Normal.admits(LexState::Unit));
    }

    #[test]
    fn test_rule_defaults_from_yaml() {
        let rule: TokenRule = serde_yaml::from_str("kind: skip_space\npattern: '^\\s+'\nskip: true\n").unwrap();
        assert_eq!(rule.kind, TokenKind::SkipSpace);
        assert_eq!(rule.capture, Capture::Whole);
        assert_eq!(rule.state, StateFilter::Any);
        assert!(rule.semantic.is_none());
        assert!(rule.push.is_none());
        assert!(!rule.pop);
        assert!(rule.skip);
    }
}
