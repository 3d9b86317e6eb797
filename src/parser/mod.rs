//! Token stream → document tree
//!
//! The parser dispatches on each token's semantic tag and keeps two cursors,
//! the current section and the current note unit, so modifiers attach
//! backward to the unit they follow. It never aborts: a token that cannot be
//! placed is dropped with a warning and recorded as a `StructuralAnomaly`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ast::{Document, DocumentChild, NoteUnit, Section, SectionChild, TextKind, TextNode};
use crate::config::{LayoutConfig, MetaField, RuleConfig};
use crate::lexer::{Semantic, Token, TokenKind};

/// A token the parser could not attach and dropped
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StructuralAnomaly {
    pub line: usize,
    pub message: String,
}

pub struct Parser {
    meta_map: BTreeMap<String, MetaField>,
    layout: LayoutConfig,

    document: Document,
    /// Index into `document.children`
    current_section: Option<usize>,
    /// Index into the current section's children
    current_unit: Option<usize>,
    warnings: Vec<StructuralAnomaly>,
}

impl Parser {
    pub fn new(rules: &RuleConfig) -> Self {
        Self::with_layout(rules, &LayoutConfig::default())
    }

    /// Parser whose documents carry `layout`'s page size and margins
    pub fn with_layout(rules: &RuleConfig, layout: &LayoutConfig) -> Self {
        Self {
            meta_map: rules.document_meta_map.clone(),
            layout: layout.clone(),
            document: Document::with_layout(layout),
            current_section: None,
            current_unit: None,
            warnings: Vec::new(),
        }
    }

    /// Anomalies from the last `parse` call
    pub fn warnings(&self) -> &[StructuralAnomaly] {
        &self.warnings
    }

    pub fn parse(&mut self, tokens: &[Token]) -> Document {
        self.document = Document::with_layout(&self.layout);
        self.current_section = None;
        self.current_unit = None;
        self.warnings.clear();

        for token in tokens {
            let Some(semantic) = token.semantic else {
                log::debug!("Token {:?} carries no semantic tag, ignored", token.kind);
                continue;
            };
            match semantic {
                Semantic::DocumentMeta => self.handle_document_meta(token),
                Semantic::Mode => self.handle_mode(token),
                Semantic::Section => self.handle_section(token),
                Semantic::Control => self.handle_control(token),
                Semantic::MainChar => self.handle_main_char(token),
                Semantic::TimeModifier => self.handle_time_modifier(token),
                Semantic::SmallModifier => self.handle_small_modifier(token),
                Semantic::RightRhythmModifier => self.handle_right_rhythm(token),
                Semantic::BottomRhythmModifier => self.handle_bottom_rhythm(token),
                Semantic::TextUnit => self.handle_text(token),
            }
        }

        if self.current_unit.is_some() {
            self.warn(tokens.last().map(|t| t.line).unwrap_or(0), "note unit left open at end of input");
            self.close_unit();
        }

        log::info!(
            "Parsed {} top-level nodes, {} note units, {} warnings",
            self.document.children.len(),
            self.document.note_units().count(),
            self.warnings.len()
        );
        std::mem::take(&mut self.document)
    }

    // ========================================================================
    // Cursor helpers
    // ========================================================================

    fn warn(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        log::warn!("⚠️ line {}: {}", line, message);
        self.warnings.push(StructuralAnomaly { line, message });
    }

    fn section_mut(&mut self) -> Option<&mut Section> {
        match self.document.children.get_mut(self.current_section?) {
            Some(DocumentChild::Section(section)) => Some(section),
            _ => None,
        }
    }

    fn unit_mut(&mut self) -> Option<&mut NoteUnit> {
        let index = self.current_unit?;
        match self.section_mut()?.children.get_mut(index) {
            Some(SectionChild::Unit(unit)) => Some(unit),
            _ => None,
        }
    }

    /// Release the unit cursor. A unit without a main character is kept but reported.
    fn close_unit(&mut self) -> bool {
        let Some(line) = self.unit_mut().map(|unit| unit.line) else {
            self.current_unit = None;
            return false;
        };
        let empty = self
            .unit_mut()
            .is_some_and(|unit| unit.main_score_character.is_empty());
        self.current_unit = None;
        if empty {
            self.warn(line, "note unit has no main character");
        }
        true
    }

    /// Apply `apply` to the open unit, or drop the token with a warning
    fn with_unit(&mut self, token: &Token, apply: impl FnOnce(&mut NoteUnit)) {
        match self.unit_mut() {
            Some(unit) => apply(unit),
            None => self.warn(
                token.line,
                format!("'{}' outside any note unit, dropped", token.value),
            ),
        }
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    fn handle_document_meta(&mut self, token: &Token) {
        match token.kind {
            TokenKind::ScoreDocument => self.document.title = Some(token.value.clone()),
            _ => {
                let value = token.extra.clone().unwrap_or_default();
                match self.meta_map.get(&token.value).copied() {
                    Some(MetaField::Source) => self.document.source = Some(value),
                    Some(MetaField::Transcriber) => self.document.transcriber = Some(value),
                    Some(MetaField::Proofreader) => self.document.proofreader = Some(value),
                    Some(MetaField::Date) => self.document.date = Some(value),
                    None => self.warn(
                        token.line,
                        format!("unknown metadata label '{}'", token.value),
                    ),
                }
            }
        }
    }

    fn handle_mode(&mut self, token: &Token) {
        let mode = Some(token.value.clone());
        let mid_flow = self
            .section_mut()
            .is_some_and(|section| section.synthetic && !section.children.is_empty());
        if mid_flow {
            // Music already placed keeps its mode; the change starts a new untitled run
            self.close_unit();
            self.document.children.push(DocumentChild::Section(Section::synthetic()));
            self.current_section = Some(self.document.children.len() - 1);
        }
        match self.section_mut() {
            Some(section) => section.mode = mode,
            None => self.document.mode = mode,
        }
    }

    fn handle_section(&mut self, token: &Token) {
        self.close_unit();
        self.document
            .children
            .push(DocumentChild::Section(Section::titled(token.value.clone())));
        self.current_section = Some(self.document.children.len() - 1);
    }

    fn handle_control(&mut self, token: &Token) {
        match token.kind {
            TokenKind::UnitStart => self.open_unit(token),
            TokenKind::UnitEnd => {
                if !self.close_unit() {
                    self.warn(token.line, "unit close without an open unit");
                }
            }
            other => log::debug!("Control token {:?} has no handler", other),
        }
    }

    fn open_unit(&mut self, token: &Token) {
        if self.current_unit.is_some() {
            // Units do not nest; the new one replaces the cursor
            self.warn(token.line, "unit opened while another is still open");
            self.close_unit();
        }

        if self.section_mut().is_none() {
            self.document.children.push(DocumentChild::Section(Section::synthetic()));
            self.current_section = Some(self.document.children.len() - 1);
        }

        let Some(section) = self.section_mut() else {
            return;
        };
        section.children.push(SectionChild::Unit(NoteUnit::at_line(token.line)));
        let index = section.children.len() - 1;
        self.current_unit = Some(index);
    }

    fn handle_main_char(&mut self, token: &Token) {
        let glyph = token.value.clone();
        self.with_unit(token, |unit| unit.main_score_character = glyph);
    }

    fn handle_time_modifier(&mut self, token: &Token) {
        let glyph = token.value.clone();
        self.with_unit(token, |unit| unit.time_modifiers.push(glyph));
    }

    fn handle_small_modifier(&mut self, token: &Token) {
        let glyphs: Vec<String> = token
            .value
            .chars()
            .filter(|c| !matches!(c, '(' | ')' | '（' | '）') && !c.is_whitespace())
            .map(String::from)
            .collect();
        self.with_unit(token, |unit| unit.small_modifiers.extend(glyphs));
    }

    fn handle_right_rhythm(&mut self, token: &Token) {
        let glyph = token.value.clone();
        self.with_unit(token, |unit| unit.right_rhythm_modifier = Some(glyph));
    }

    fn handle_bottom_rhythm(&mut self, token: &Token) {
        let glyph = token.value.clone();
        self.with_unit(token, |unit| unit.bottom_rhythm_modifier = Some(glyph));
    }

    fn handle_text(&mut self, token: &Token) {
        let node = TextNode::new(TextKind::Comment, token.value.clone());
        match self.section_mut() {
            Some(section) => section.children.push(SectionChild::Text(node)),
            None => self.document.children.push(DocumentChild::Text(node)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoreConfig;
    use crate::lexer::Lexer;

    fn parse(text: &str) -> (Document, Vec<StructuralAnomaly>) {
        let config = ScoreConfig::builtin().unwrap();
        let tokens = Lexer::new(&config.rules).unwrap().tokenize(text);
        let mut parser = Parser::new(&config.rules);
        let doc = parser.parse(&tokens);
        (doc, parser.warnings().to_vec())
    }

    #[test]
    fn test_units_before_header_get_synthetic_section() {
        let (doc, warnings) = parse("{一}{二/pz}");
        assert!(warnings.is_empty());
        assert_eq!(doc.children.len(), 1);

        let section = doc.sections().next().unwrap();
        assert!(section.synthetic);
        assert!(section.title.is_none());

        let units: Vec<_> = section.note_units().collect();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].main_score_character, "一");
        assert_eq!(units[1].bottom_rhythm_modifier.as_deref(), Some("/pz"));
    }

    #[test]
    fn test_header_metadata() {
        let text = "# 最凉州\n@ 沙陀调\n% 来源：三五要录\n% 录入: 某人\n## 第一段\n@ 壹越调\n{一}";
        let (doc, warnings) = parse(text);
        assert!(warnings.is_empty());
        assert_eq!(doc.title.as_deref(), Some("最凉州"));
        assert_eq!(doc.mode.as_deref(), Some("沙陀调"));
        assert_eq!(doc.source.as_deref(), Some("三五要录"));
        assert_eq!(doc.transcriber.as_deref(), Some("某人"));

        let section = doc.sections().next().unwrap();
        assert_eq!(section.title.as_deref(), Some("第一段"));
        assert_eq!(section.mode.as_deref(), Some("壹越调"));
        assert!(!section.synthetic);
    }

    #[test]
    fn test_small_group_split_into_glyphs() {
        let (doc, _) = parse("{合（七言）/h}");
        let unit = doc.note_units().next().unwrap();
        assert_eq!(unit.small_modifiers, vec!["七", "言"]);
        assert_eq!(unit.time_modifiers, vec!["/h"]);
    }

    #[test]
    fn test_comments_attach_to_current_container() {
        let (doc, _) = parse("= 前言\n## 第一段\n= 段注\n{一}");
        assert!(matches!(&doc.children[0], DocumentChild::Text(t) if t.text == "前言"));
        let section = doc.sections().next().unwrap();
        assert!(matches!(&section.children[0], SectionChild::Text(t) if t.text == "段注"));
        assert_eq!(section.note_units().count(), 1);
    }

    #[test]
    fn test_unbalanced_close_is_recovered() {
        let (doc, warnings) = parse("{一\n## 第二段\n}{二}");
        assert_eq!(doc.note_units().count(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("without an open unit"));
    }

    #[test]
    fn test_units_do_not_nest() {
        let (doc, warnings) = parse("{一{二}");
        let units: Vec<_> = doc.note_units().collect();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].main_score_character, "一");
        assert_eq!(units[1].main_score_character, "二");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_unknown_meta_label_is_warned() {
        let (doc, warnings) = parse("% 抄本：某寺");
        assert!(doc.source.is_none());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 1);
    }

    #[test]
    fn test_section_closes_open_unit() {
        let (doc, warnings) = parse("{一\n## 第二段\n/pz");
        assert_eq!(doc.sections().count(), 2);
        let first = doc.sections().next().unwrap().note_units().next().unwrap();
        assert!(first.bottom_rhythm_modifier.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_unit_without_main_character_is_reported() {
        let (doc, warnings) = parse("{/pz}\n{}{二}");
        assert_eq!(doc.note_units().count(), 3);
        let lines: Vec<_> = warnings.iter().map(|w| w.line).collect();
        assert_eq!(lines, vec![1, 2]);
        assert!(warnings.iter().all(|w| w.message.contains("no main character")));
    }

    #[test]
    fn test_mode_after_untitled_music_starts_new_section() {
        let (doc, warnings) = parse("{一}\n@ 沙陀调\n{二}");
        assert!(warnings.is_empty());
        let sections: Vec<_> = doc.sections().collect();
        assert_eq!(sections.len(), 2);
        assert!(sections[0].mode.is_none());
        assert!(sections[1].synthetic);
        assert_eq!(sections[1].mode.as_deref(), Some("沙陀调"));
        assert_eq!(sections[1].note_units().next().unwrap().main_score_character, "二");
    }

    #[test]
    fn test_parser_is_reusable() {
        let config = ScoreConfig::builtin().unwrap();
        let lexer = Lexer::new(&config.rules).unwrap();
        let mut parser = Parser::new(&config.rules);
        let first = parser.parse(&lexer.tokenize("{一"));
        assert_eq!(parser.warnings().len(), 1);
        let second = parser.parse(&lexer.tokenize("{一}"));
        assert!(parser.warnings().is_empty());
        assert_eq!(first.note_units().count(), second.note_units().count());
    }
}
