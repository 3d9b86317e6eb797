//! Indented text rendering of the tree, for debugging transcriptions

use std::fmt::Write;

use super::nodes::{Document, NoteUnit, Section, TextNode};
use super::visitor::Visitor;

#[derive(Debug, Default)]
pub struct TreeDump {
    out: String,
    depth: usize,
}

impl TreeDump {
    pub fn render(document: &Document) -> String {
        let mut dump = TreeDump::default();
        document.accept(&mut dump);
        dump.out
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}{}", "  ".repeat(self.depth), text);
    }
}

impl Visitor for TreeDump {
    fn visit_document(&mut self, document: &Document) {
        let title = document.title.as_deref().unwrap_or("(untitled)");
        match &document.mode {
            Some(mode) => self.line(&format!("ScoreDocument: {} (mode={})", title, mode)),
            None => self.line(&format!("ScoreDocument: {}", title)),
        }

        self.depth += 1;
        let meta = [
            ("source", &document.source),
            ("transcriber", &document.transcriber),
            ("proofreader", &document.proofreader),
            ("date", &document.date),
        ];
        for (label, value) in meta {
            if let Some(value) = value {
                self.line(&format!("{}: {}", label, value));
            }
        }
        for child in &document.children {
            child.accept(self);
        }
        self.depth -= 1;
    }

    fn visit_section(&mut self, section: &Section) {
        let mut line = String::from("Section:");
        match &section.title {
            Some(title) => {
                let _ = write!(line, " {}", title);
            }
            None if section.synthetic => line.push_str(" (implicit)"),
            None => {}
        }
        if let Some(mode) = &section.mode {
            let _ = write!(line, " (mode={})", mode);
        }
        self.line(&line);

        self.depth += 1;
        for child in &section.children {
            child.accept(self);
        }
        self.depth -= 1;
    }

    fn visit_note_unit(&mut self, unit: &NoteUnit) {
        let mut line = format!("NoteUnit: {}", unit.main_score_character);
        if !unit.small_modifiers.is_empty() {
            let _ = write!(line, " [small: {}]", unit.small_modifiers.join(""));
        }
        if !unit.time_modifiers.is_empty() {
            let _ = write!(line, " [time: {}]", unit.time_modifiers.join(" "));
        }
        if let Some(right) = &unit.right_rhythm_modifier {
            let _ = write!(line, " [right: {}]", right);
        }
        if let Some(bottom) = &unit.bottom_rhythm_modifier {
            let _ = write!(line, " [bottom: {}]", bottom);
        }
        let _ = write!(line, " duration={}", unit.duration);
        self.line(&line);
    }

    fn visit_text(&mut self, text: &TextNode) {
        let kind = format!("{:?}", text.kind).to_lowercase();
        self.line(&format!("Text({}): {}", kind, text.text));
    }
}
