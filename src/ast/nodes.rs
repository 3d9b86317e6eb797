//! Document tree for a Pipa score
//!
//! Ownership is strictly parent → child. The parser creates nodes, the
//! theory pass resolves their musical content, and the layout pass fills in
//! the geometry fields (`*_pos`, `geometry`, `position`). Geometry is `None`
//! until layout has run.

use serde::{Deserialize, Serialize};

use crate::config::{LayoutConfig, Margin};
use crate::error::Result;

/// Absolute position on a page, in pixels
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box; `x`/`y` is the top-left corner
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root of the tree; owns every section and text node
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Document {
    pub title: Option<String>,

    /// Declared mode; the theory pass fills in the default when absent
    pub mode: Option<String>,

    pub source: Option<String>,
    pub transcriber: Option<String>,
    pub proofreader: Option<String>,
    pub date: Option<String>,

    pub page_width: f32,
    pub page_height: f32,
    pub margin: Margin,

    pub children: Vec<DocumentChild>,

    /// Layout output
    pub title_pos: Option<Point>,
    pub mode_pos: Option<Point>,
    /// Width the header columns took from the right margin
    pub header_width: f32,
}

impl Default for Document {
    fn default() -> Self {
        Self::with_layout(&LayoutConfig::default())
    }
}

impl Document {
    /// Empty document sized for `layout`
    pub fn with_layout(layout: &LayoutConfig) -> Self {
        Self {
            title: None,
            mode: None,
            source: None,
            transcriber: None,
            proofreader: None,
            date: None,
            page_width: layout.page_width,
            page_height: layout.page_height,
            margin: layout.margin,
            children: Vec::new(),
            title_pos: None,
            mode_pos: None,
            header_width: 0.0,
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.children.iter().filter_map(|child| match child {
            DocumentChild::Section(section) => Some(section),
            DocumentChild::Text(_) => None,
        })
    }

    /// Every note unit in document order
    pub fn note_units(&self) -> impl Iterator<Item = &NoteUnit> {
        self.sections().flat_map(|section| section.note_units())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum DocumentChild {
    Section(Section),
    Text(TextNode),
}

// ============================================================================
// Section
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Section {
    pub title: Option<String>,

    /// `None` until resolved means "inherit from the previous sibling"
    pub mode: Option<String>,

    /// Created by the parser for units that appeared before any `##` header
    pub synthetic: bool,

    /// Set by the theory pass when an explicit mode changes the inherited one
    pub show_mode: bool,

    pub children: Vec<SectionChild>,

    pub title_pos: Option<Point>,
    pub mode_pos: Option<Point>,
    pub header_width: f32,
}

impl Section {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Untitled container for units that precede any section header
    pub fn synthetic() -> Self {
        Self {
            synthetic: true,
            ..Self::default()
        }
    }

    pub fn note_units(&self) -> impl Iterator<Item = &NoteUnit> {
        self.children.iter().filter_map(|child| match child {
            SectionChild::Unit(unit) => Some(unit),
            SectionChild::Text(_) => None,
        })
    }

    /// Whether the layout pass has a header to draw
    pub fn has_header(&self) -> bool {
        self.title.is_some() || self.show_mode
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum SectionChild {
    Unit(NoteUnit),
    Text(TextNode),
}

// ============================================================================
// Note unit
// ============================================================================

/// One musical event: a main glyph plus its modifiers
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NoteUnit {
    /// Empty until a main-character token arrives
    pub main_score_character: String,

    /// Individual small-character glyphs, in source order
    pub small_modifiers: Vec<String>,

    /// Time-modifier glyphs as written (`/h`, `/y`, ...)
    pub time_modifiers: Vec<String>,

    pub right_rhythm_modifier: Option<String>,
    pub bottom_rhythm_modifier: Option<String>,

    /// Duration multiplier; 1.0 until the theory pass resolves it
    pub duration: f32,

    /// Source line of the unit-open delimiter
    pub line: usize,

    pub geometry: Option<UnitGeometry>,
}

impl Default for NoteUnit {
    fn default() -> Self {
        Self {
            main_score_character: String::new(),
            small_modifiers: Vec::new(),
            time_modifiers: Vec::new(),
            right_rhythm_modifier: None,
            bottom_rhythm_modifier: None,
            duration: 1.0,
            line: 0,
            geometry: None,
        }
    }
}

impl NoteUnit {
    pub fn at_line(line: usize) -> Self {
        Self {
            line,
            ..Self::default()
        }
    }

    pub fn has_time_modifier(&self, glyph: &str) -> bool {
        self.time_modifiers.iter().any(|g| g == glyph)
    }
}

/// Where the layout pass put each part of a note unit
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct UnitGeometry {
    pub main_char_pos: Point,
    pub small_mod_pos: Vec<Point>,
    pub time_mod_pos: Vec<Point>,
    pub right_rhythm_mod_pos: Option<Point>,
    pub bottom_rhythm_mod_pos: Option<Point>,
    pub bounds: BoundingBox,
}

// ============================================================================
// Text
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    /// Free commentary line (`= ...`)
    Comment,
}

/// Free text placed as a vertical block of one or more columns
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TextNode {
    pub kind: TextKind,
    pub text: String,

    /// Top-right corner of the first block, after layout
    pub position: Option<Point>,

    /// Columns the text wraps into, after layout
    pub columns: usize,

    /// Horizontal space reserved for those columns
    pub width: f32,
}

impl TextNode {
    pub fn new(kind: TextKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            position: None,
            columns: 0,
            width: 0.0,
        }
    }
}
