//! Double-dispatch traversal over the document tree
//!
//! `VisitorMut` is what the passes implement: each node kind has a handler
//! whose default recurses into the node's children (via the `walk_*`
//! functions) so a pass overrides only the kinds it cares about. Overriding
//! a container handler and calling the matching `walk_*` keeps recursion.
//!
//! `Visitor` is the read-only counterpart used by debug output.

use super::nodes::{Document, DocumentChild, NoteUnit, Section, SectionChild, TextNode};

/// Mutating visitor. Handlers return `Result` so a pass can abort on a
/// configuration error found mid-walk.
pub trait VisitorMut {
    type Error;

    fn visit_document(&mut self, document: &mut Document) -> Result<(), Self::Error> {
        walk_document(self, document)
    }

    fn visit_section(&mut self, section: &mut Section) -> Result<(), Self::Error> {
        walk_section(self, section)
    }

    // Leaves: nothing to recurse into
    fn visit_note_unit(&mut self, _unit: &mut NoteUnit) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_text(&mut self, _text: &mut TextNode) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Visit every child of `document` in order
pub fn walk_document<V: VisitorMut + ?Sized>(visitor: &mut V, document: &mut Document) -> Result<(), V::Error> {
    for child in document.children.iter_mut() {
        child.accept_mut(visitor)?;
    }
    Ok(())
}

/// Visit every child of `section` in order
pub fn walk_section<V: VisitorMut + ?Sized>(visitor: &mut V, section: &mut Section) -> Result<(), V::Error> {
    for child in section.children.iter_mut() {
        child.accept_mut(visitor)?;
    }
    Ok(())
}

/// Read-only visitor with the same default recursion
pub trait Visitor {
    fn visit_document(&mut self, document: &Document) {
        for child in &document.children {
            child.accept(self);
        }
    }

    fn visit_section(&mut self, section: &Section) {
        for child in &section.children {
            child.accept(self);
        }
    }

    fn visit_note_unit(&mut self, _unit: &NoteUnit) {}

    fn visit_text(&mut self, _text: &TextNode) {}
}

impl Document {
    pub fn accept_mut<V: VisitorMut + ?Sized>(&mut self, visitor: &mut V) -> Result<(), V::Error> {
        visitor.visit_document(self)
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_document(self)
    }
}

impl DocumentChild {
    pub fn accept_mut<V: VisitorMut + ?Sized>(&mut self, visitor: &mut V) -> Result<(), V::Error> {
        match self {
            DocumentChild::Section(section) => visitor.visit_section(section),
            DocumentChild::Text(text) => visitor.visit_text(text),
        }
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            DocumentChild::Section(section) => visitor.visit_section(section),
            DocumentChild::Text(text) => visitor.visit_text(text),
        }
    }
}

impl SectionChild {
    pub fn accept_mut<V: VisitorMut + ?Sized>(&mut self, visitor: &mut V) -> Result<(), V::Error> {
        match self {
            SectionChild::Unit(unit) => visitor.visit_note_unit(unit),
            SectionChild::Text(text) => visitor.visit_text(text),
        }
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            SectionChild::Unit(unit) => visitor.visit_note_unit(unit),
            SectionChild::Text(text) => visitor.visit_text(text),
        }
    }
}
