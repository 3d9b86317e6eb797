//! Token definitions for the tablature lexer
//!
//! `TokenKind` is what a rule recognised on the surface; `Semantic` is what
//! the parser should do with it. Keeping the two apart lets the rule table
//! change its surface syntax without touching the parser.

use serde::{Deserialize, Serialize};

/// Surface-level token kinds a rule can produce
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// `# title`
    ScoreDocument,
    /// `% label：value`
    DocumentMeta,
    /// `## section title`
    Section,
    /// `@ mode`
    Mode,
    /// `= free text`
    Comment,
    /// `{`
    UnitStart,
    /// `}`
    UnitEnd,
    MainChar,
    TimeMod,
    RightRhythmMod,
    BottomRhythmMod,
    /// Small-character group in parentheses
    SubChar,
    SkipSpace,
}

/// Parser dispatch tag attached to a token by its rule
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Semantic {
    DocumentMeta,
    Mode,
    Section,
    Control,
    MainChar,
    TimeModifier,
    SmallModifier,
    RightRhythmModifier,
    BottomRhythmModifier,
    TextUnit,
}

/// Lexer states. `Unit` is active between a unit-open and unit-close delimiter.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LexState {
    #[default]
    Normal,
    Unit,
}

/// A token with its source line
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    /// 1-based source line
    pub line: usize,
    pub semantic: Option<Semantic>,
    /// Second capture, e.g. the value half of `% 来源：三五要录`
    pub extra: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            line,
            semantic: None,
            extra: None,
        }
    }

    pub fn with_semantic(mut self, semantic: Option<Semantic>) -> Self {
        self.semantic = semantic;
        self
    }

    pub fn with_extra(mut self, extra: Option<String>) -> Self {
        self.extra = extra;
        self
    }
}

/// An input span no rule could match. The lexer skips one character and goes on.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LexAnomaly {
    pub line: usize,
    /// Character offset within the trimmed line
    pub column: usize,
    pub snippet: String,
}
