//! Rule-driven lexer for Pipa tablature text
//!
//! Input is scanned line by line. At each position the rules admitted by the
//! current state are tried in table order and the first match wins. A
//! unit-open delimiter pushes the `Unit` state, in which the scanner keeps
//! taking modifier tokens from the same line until the unit closes.
//!
//! The lexer never fails on input: a span no rule matches is recorded as a
//! `LexAnomaly`, one character is skipped, and scanning continues.

pub mod token;

pub use token::*;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{Capture, RuleConfig, TokenRule};
use crate::error::{Result, ScoreError};

/// `{ ... }` spans on one line
static UNIT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("static regex"));

/// Innermost parenthesised small-character group, full-width or ASCII
static PAREN_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([（(][^（）()]*[）)])").expect("static regex"));

#[derive(Clone)]
struct CompiledRule {
    rule: TokenRule,
    regex: Regex,
}

/// Output of a lexing run
#[derive(Clone, Debug, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub anomalies: Vec<LexAnomaly>,
}

/// Tokenizer built from an ordered rule table
#[derive(Clone)]
pub struct Lexer {
    rules: Vec<CompiledRule>,
}

impl Lexer {
    /// Compile the rule table. A pattern that does not compile is a config error.
    pub fn new(config: &RuleConfig) -> Result<Self> {
        let rules = config
            .tokens
            .iter()
            .map(|rule| {
                // Rules only ever match at the scan cursor. The group anchors every
                // alternation branch, and a pattern's own leading `^` is redundant.
                let anchored = format!("^(?:{})", rule.pattern);
                let regex = Regex::new(&anchored).map_err(|source| ScoreError::InvalidPattern {
                    rule: format!("{:?}", rule.kind),
                    source,
                })?;
                Ok(CompiledRule {
                    rule: rule.clone(),
                    regex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("Lexer compiled {} rules", rules.len());
        Ok(Self { rules })
    }

    /// Tokenize `text`, discarding anomaly records (they are still logged)
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        self.tokenize_with_diagnostics(text).tokens
    }

    /// Tokenize `text` and return the unmatched spans alongside the tokens
    pub fn tokenize_with_diagnostics(&self, text: &str) -> LexOutput {
        let mut output = LexOutput::default();
        let mut states = vec![LexState::Normal];

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = isolate_small_groups(raw_line.trim());
            if line.is_empty() {
                continue;
            }
            self.scan_line(&line, line_no, &mut states, &mut output);
        }

        if states.len() > 1 {
            log::warn!("Input ended inside an open note unit");
        }
        output
    }

    fn scan_line(&self, line: &str, line_no: usize, states: &mut Vec<LexState>, output: &mut LexOutput) {
        let mut pos = 0;

        while pos < line.len() {
            let state = states.last().copied().unwrap_or_default();
            let rest = &line[pos..];

            let Some(consumed) = self.match_one(rest, state, line_no, states, output) else {
                let skipped = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                let column = line[..pos].chars().count();
                let snippet: String = rest.chars().take(12).collect();
                log::warn!("⚠️ Unrecognized input at line {}:{}: '{}'", line_no, column, snippet);
                output.anomalies.push(LexAnomaly {
                    line: line_no,
                    column,
                    snippet,
                });
                pos += skipped;
                continue;
            };
            pos += consumed;

            // Inside a unit, keep taking modifiers from this line until it closes
            if state == LexState::Unit {
                while pos < line.len() && states.last() == Some(&LexState::Unit) {
                    match self.match_one(&line[pos..], LexState::Unit, line_no, states, output) {
                        Some(consumed) => pos += consumed,
                        None => break,
                    }
                }
            }
        }
    }

    /// Try the rules admitted in `state` against the start of `rest`.
    /// Returns the number of bytes consumed, or `None` when nothing matches.
    fn match_one(
        &self,
        rest: &str,
        state: LexState,
        line_no: usize,
        states: &mut Vec<LexState>,
        output: &mut LexOutput,
    ) -> Option<usize> {
        for compiled in self.rules.iter().filter(|r| r.rule.state.admits(state)) {
            let Some(caps) = compiled.regex.captures(rest) else {
                continue;
            };
            let whole = caps.get(0)?;
            if whole.end() == 0 {
                // Empty matches would never advance
                continue;
            }
            let rule = &compiled.rule;

            if !rule.skip {
                let value = match rule.capture {
                    Capture::Whole => whole.as_str(),
                    Capture::Group1 => caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
                };
                let extra = rule
                    .extra_group
                    .and_then(|group| caps.get(group))
                    .map(|m| m.as_str().to_string());
                log::debug!("  token {:?} '{}' (line {})", rule.kind, value, line_no);
                output.tokens.push(
                    Token::new(rule.kind, value, line_no)
                        .with_semantic(rule.semantic)
                        .with_extra(extra),
                );
            }

            if let Some(next) = rule.push {
                // Units do not nest: re-entering the same state is not stacked
                if states.last() != Some(&next) {
                    states.push(next);
                }
            } else if rule.pop && states.len() > 1 {
                states.pop();
            }

            return Some(whole.end());
        }
        None
    }
}

/// Put spaces around parenthesised small-character groups inside `{...}` so
/// the generic rules cannot read a bracket as part of a neighbouring token.
fn isolate_small_groups(line: &str) -> String {
    UNIT_SPAN
        .replace_all(line, |caps: &regex::Captures| {
            PAREN_GROUP.replace_all(&caps[0], " $1 ").into_owned()
        })
        .into_owned()
}
