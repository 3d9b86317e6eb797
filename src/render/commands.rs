//! Render command list produced by the layout pass
//!
//! This is the hand-off boundary to a renderer backend. Every command is
//! already positioned; the backend only maps `CommandType` to a visual style
//! and draws `text` with its top-right corner at `position`. Nothing here
//! names a font or a colour.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ast::Point;
use crate::error::Result;

/// Free-form per-command data. Ordered so serialized output is deterministic.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// What a command draws
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    DocumentTitle,
    SectionTitle,
    Mode,
    MainChar,
    SmallModifier,
    TextBlock,
    DotMarker,
    CircleMarker,
    LineMarker,
    BaiMarker,
    CheckMarker,
}

/// Rhythm marks drawn as fixed glyphs of the score font
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Dot,
    Circle,
    Line,
    Bai,
    Check,
}

impl MarkerKind {
    pub fn command_type(self) -> CommandType {
        match self {
            MarkerKind::Dot => CommandType::DotMarker,
            MarkerKind::Circle => CommandType::CircleMarker,
            MarkerKind::Line => CommandType::LineMarker,
            MarkerKind::Bai => CommandType::BaiMarker,
            MarkerKind::Check => CommandType::CheckMarker,
        }
    }

    /// Code point the score font draws for this marker
    pub fn glyph(self) -> &'static str {
        match self {
            MarkerKind::Dot => "乐",
            MarkerKind::Circle => "只",
            MarkerKind::Line => "段",
            MarkerKind::Bai => "百",
            MarkerKind::Check => "拨",
        }
    }
}

/// A single positioned drawing instruction
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RenderCommand {
    #[serde(rename = "type")]
    pub kind: CommandType,

    /// Anchor point (top-right of the glyph or block)
    pub position: Point,

    /// Literal text to draw; markers carry their fixed glyph
    pub text: String,

    pub metadata: Metadata,
}

/// All commands for one page, in drawing order
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    pub commands: Vec<RenderCommand>,
}

/// Top-level render artifact. Each page is self-contained.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct RenderList {
    pub page_width: f32,
    pub page_height: f32,
    pub pages: Vec<Page>,
}

impl RenderList {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// All commands of all pages, in order
    pub fn commands(&self) -> impl Iterator<Item = &RenderCommand> {
        self.pages.iter().flat_map(|page| page.commands.iter())
    }
}

/// Appends render commands to the current page and cuts pages on request
#[derive(Debug, Default)]
pub struct RenderListBuilder {
    pages: Vec<Page>,
    current: Vec<RenderCommand>,
}

impl RenderListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_raw_command(&mut self, kind: CommandType, position: Point, text: &str, metadata: Metadata) {
        self.current.push(RenderCommand {
            kind,
            position,
            text: text.to_string(),
            metadata,
        });
    }

    pub fn add_document_title(&mut self, text: &str, position: Point, metadata: Metadata) {
        self.add_raw_command(CommandType::DocumentTitle, position, text, metadata);
    }

    pub fn add_section_title(&mut self, text: &str, position: Point, metadata: Metadata) {
        self.add_raw_command(CommandType::SectionTitle, position, text, metadata);
    }

    pub fn add_mode(&mut self, text: &str, position: Point, metadata: Metadata) {
        self.add_raw_command(CommandType::Mode, position, text, metadata);
    }

    pub fn add_main_char(&mut self, text: &str, position: Point) {
        self.add_raw_command(CommandType::MainChar, position, text, Metadata::new());
    }

    pub fn add_small_modifier(&mut self, text: &str, position: Point, metadata: Metadata) {
        self.add_raw_command(CommandType::SmallModifier, position, text, metadata);
    }

    /// Multi-column vertical text; metadata says how to wrap it
    pub fn add_text_block(&mut self, text: &str, position: Point, metadata: Metadata) {
        self.add_raw_command(CommandType::TextBlock, position, text, metadata);
    }

    pub fn add_marker(&mut self, marker: MarkerKind, position: Point) {
        self.add_raw_command(marker.command_type(), position, marker.glyph(), Metadata::new());
    }

    /// Number of pages closed so far plus the open one
    pub fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    /// Close the current page and open an empty one
    pub fn new_page(&mut self) {
        let number = self.pages.len() + 1;
        let commands = std::mem::take(&mut self.current);
        log::debug!("Page {} closed with {} commands", number, commands.len());
        self.pages.push(Page { number, commands });
    }

    /// Close the last page and return the finished list
    pub fn finish(mut self, page_width: f32, page_height: f32) -> RenderList {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.new_page();
        }
        RenderList {
            page_width,
            page_height,
            pages: self.pages,
        }
    }
}
