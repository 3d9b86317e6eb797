//! Flow typesetting: right-to-left columns, top-to-bottom slots
//!
//! The pass walks the resolved tree once and writes two things: absolute
//! geometry into the nodes, and a page-segmented `RenderList`.
//!
//! Geometry model:
//! - Columns run top to bottom and advance right to left. A note column is
//!   `unit_column_width` wide: the main character plus a right-hand lane for
//!   rhythm markers.
//! - Each note column holds `unit_num` slots. A unit with duration ≥ 1.0
//!   fills a slot; fractional units share one, each placed at
//!   `beat × half_slot_fill × slot_height` below the slot top. A whole unit
//!   after an unfinished fraction starts the next slot.
//! - Headers and free text are vertical blocks that wrap into as many
//!   columns as their length needs, split across pages if necessary.
//!
//! All positions are the top-right corner of what is drawn.

use serde_json::json;

use crate::ast::{
    walk_document, walk_section, BoundingBox, Document, NoteUnit, Point, Section, TextNode, UnitGeometry,
    VisitorMut,
};
use crate::config::{LayoutConfig, RuleConfig};
use crate::error::{Result, ScoreError};
use crate::render::{Metadata, RenderList, RenderListBuilder};

/// Beats within this distance of a whole slot count as filling it
const BEAT_EPSILON: f32 = 1e-4;

/// Rows of the block's own glyph height left above each kind of header
const TITLE_INDENT_ROWS: usize = 0;
const HEADER_INDENT_ROWS: usize = 1;
const TEXT_INDENT_ROWS: usize = 2;

/// Builder method that emits one kind of column-text command
type Emit = fn(&mut RenderListBuilder, &str, Point, Metadata);

#[derive(Debug, Clone, Copy)]
struct Cursor {
    /// Right edge of the current (or next) column
    x: f32,
    /// Top of the current slot
    y: f32,
    units_in_column: usize,
    /// Fraction of the current slot already used
    beat: f32,
    /// A note column is open at `x`
    column_open: bool,
}

impl Cursor {
    fn page_start(config: &LayoutConfig) -> Self {
        Self {
            x: config.origin_x(),
            y: config.margin.top,
            units_in_column: 0,
            beat: 0.0,
            column_open: false,
        }
    }
}

/// Where a column-text block landed
#[derive(Debug, Clone, Copy)]
struct Placement {
    position: Point,
    columns: usize,
    width: f32,
}

pub struct LayoutPass {
    config: LayoutConfig,
    rules: RuleConfig,
    builder: RenderListBuilder,
    cursor: Cursor,
}

impl LayoutPass {
    /// Fails if the page geometry cannot hold one slot, one column or one character
    pub fn new(config: &LayoutConfig, rules: &RuleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            rules: rules.clone(),
            builder: RenderListBuilder::new(),
            cursor: Cursor::page_start(config),
        })
    }

    /// Hand over the commands emitted so far and reset for another document
    pub fn take_render_list(&mut self) -> RenderList {
        let builder = std::mem::take(&mut self.builder);
        self.cursor = Cursor::page_start(&self.config);
        builder.finish(self.config.page_width, self.config.page_height)
    }

    pub fn finish(mut self) -> RenderList {
        self.take_render_list()
    }

    // ========================================================================
    // Cursor movement
    // ========================================================================

    fn break_page(&mut self) {
        log::debug!("Page break after page {}", self.builder.page_count());
        self.builder.new_page();
        self.cursor = Cursor::page_start(&self.config);
    }

    /// Finish the open note column so the next element starts a fresh one
    fn close_note_column(&mut self) {
        if self.cursor.column_open {
            self.cursor.x -= self.config.unit_column_width() + self.config.column_spacing;
            self.cursor.column_open = false;
        }
    }

    fn open_note_column(&mut self) {
        self.close_note_column();
        if self.cursor.x - self.config.unit_column_width() < self.config.margin.left {
            self.break_page();
        }
        self.cursor.y = self.config.margin.top;
        self.cursor.units_in_column = 0;
        self.cursor.beat = 0.0;
        self.cursor.column_open = true;
    }

    // ========================================================================
    // Column text (titles, modes, comments)
    // ========================================================================

    /// Lay `text` out as vertical columns of `(w, h)` glyphs starting
    /// `indent_rows` rows below the top margin. `extra` goes on the first block.
    fn place_column_text(
        &mut self,
        text: &str,
        (w, h): (f32, f32),
        indent_rows: usize,
        emit: Emit,
        mut extra: Metadata,
    ) -> Option<Placement> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return None;
        }

        let top = self.config.margin.top + indent_rows as f32 * h;
        let per_column = (((self.config.content_bottom() - top) / h).floor() as usize).max(1);
        let total_columns = chars.len().div_ceil(per_column);

        let mut first = None;
        let mut remaining = chars.as_slice();
        while !remaining.is_empty() {
            let mut fit = ((self.cursor.x - self.config.margin.left) / w).floor() as usize;
            if fit == 0 {
                self.break_page();
                fit = (((self.cursor.x - self.config.margin.left) / w).floor() as usize).max(1);
            }

            let columns = fit.min(remaining.len().div_ceil(per_column));
            let take = (columns * per_column).min(remaining.len());
            let chunk: String = remaining[..take].iter().collect();
            remaining = &remaining[take..];

            let position = Point::new(self.cursor.x, top);
            let mut metadata = std::mem::take(&mut extra);
            metadata.insert("chars_per_column".to_string(), json!(per_column));
            metadata.insert("columns".to_string(), json!(columns));
            metadata.insert("column_width".to_string(), json!(w));
            metadata.insert("row_height".to_string(), json!(h));
            emit(&mut self.builder, &chunk, position, metadata);

            if first.is_none() {
                first = Some(position);
            }
            self.cursor.x -= columns as f32 * w;
        }
        self.cursor.x -= self.config.column_spacing;

        first.map(|position| Placement {
            position,
            columns: total_columns,
            width: total_columns as f32 * w,
        })
    }

    fn document_metadata(document: &Document) -> Metadata {
        let mut metadata = Metadata::new();
        let fields = [
            ("source", &document.source),
            ("transcriber", &document.transcriber),
            ("proofreader", &document.proofreader),
            ("date", &document.date),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                metadata.insert(key.to_string(), json!(value));
            }
        }
        metadata
    }

    fn place_document_header(&mut self, document: &mut Document) {
        let mut metadata = Self::document_metadata(document);
        let mut width = 0.0;

        if let Some(title) = document.title.clone() {
            let placed = self.place_column_text(
                &title,
                self.config.title_space(),
                TITLE_INDENT_ROWS,
                RenderListBuilder::add_document_title,
                std::mem::take(&mut metadata),
            );
            if let Some(placed) = placed {
                document.title_pos = Some(placed.position);
                width += placed.width + self.config.column_spacing;
            }
        }

        if let Some(mode) = document.mode.clone() {
            let placed = self.place_column_text(
                &mode,
                self.config.mode_space(),
                HEADER_INDENT_ROWS,
                RenderListBuilder::add_mode,
                metadata,
            );
            if let Some(placed) = placed {
                document.mode_pos = Some(placed.position);
                width += placed.width + self.config.column_spacing;
            }
        }

        document.header_width = width;
    }

    fn place_section_header(&mut self, section: &mut Section) {
        self.close_note_column();
        let mut width = 0.0;

        if let Some(title) = section.title.clone() {
            let placed = self.place_column_text(
                &title,
                self.config.title_space(),
                HEADER_INDENT_ROWS,
                RenderListBuilder::add_section_title,
                Metadata::new(),
            );
            if let Some(placed) = placed {
                section.title_pos = Some(placed.position);
                width += placed.width + self.config.column_spacing;
            }
        }

        if section.show_mode {
            if let Some(mode) = section.mode.clone() {
                let placed = self.place_column_text(
                    &mode,
                    self.config.mode_space(),
                    HEADER_INDENT_ROWS,
                    RenderListBuilder::add_mode,
                    Metadata::new(),
                );
                if let Some(placed) = placed {
                    section.mode_pos = Some(placed.position);
                    width += placed.width + self.config.column_spacing;
                }
            }
        }

        section.header_width = width;
    }

    // ========================================================================
    // Note units
    // ========================================================================

    fn place_marker(&mut self, glyph: Option<&str>, position: Point) -> Option<Point> {
        let glyph = glyph?;
        match self.rules.marker_for(glyph) {
            Some(marker) => {
                self.builder.add_marker(marker, position);
                Some(position)
            }
            None => {
                log::warn!("No marker for rhythm glyph '{}', not drawn", glyph);
                None
            }
        }
    }

    /// Move to the next slot, leaving any unused beat behind
    fn advance_slot(&mut self) {
        self.cursor.y += self.config.slot_height();
        self.cursor.units_in_column += 1;
        self.cursor.beat = 0.0;
    }

    fn place_unit(&mut self, unit: &mut NoteUnit) {
        // A whole unit never shares a slot with a pending fraction
        if self.cursor.column_open && self.cursor.beat > BEAT_EPSILON && unit.duration >= 1.0 - BEAT_EPSILON {
            self.advance_slot();
        }
        if !self.cursor.column_open || self.cursor.units_in_column >= self.config.unit_num {
            self.open_note_column();
        }

        let (main_w, main_h) = self.config.main_char_space();
        let (small_w, small_h) = self.config.small_char_space();
        let bottom = self.config.content_bottom();
        let slot_h = self.config.slot_height();
        let x = self.cursor.x;

        let offset = self.cursor.beat * self.config.half_slot_fill * slot_h;
        let top = (self.cursor.y + offset).min(bottom - main_h);
        let main_char_pos = Point::new(x - small_w, top);
        if !unit.main_score_character.is_empty() {
            self.builder.add_main_char(&unit.main_score_character, main_char_pos);
        }

        // Small and time glyphs stack downward, centred under the main character
        let stack_x = x - small_w - (main_w - small_w) / 2.0;
        let mut stack_y = top + main_h;

        let mut small_mod_pos = Vec::with_capacity(unit.small_modifiers.len());
        for glyph in &unit.small_modifiers {
            let position = Point::new(stack_x, stack_y.min(bottom - small_h));
            self.builder.add_small_modifier(glyph, position, role("small"));
            small_mod_pos.push(position);
            stack_y += small_h;
        }

        let mut time_mod_pos = Vec::with_capacity(unit.time_modifiers.len());
        for glyph in &unit.time_modifiers {
            let position = Point::new(stack_x, stack_y.min(bottom - small_h));
            let text = self.rules.time_glyph_text(glyph);
            self.builder.add_small_modifier(text, position, role("time"));
            time_mod_pos.push(position);
            stack_y += small_h;
        }

        let right_rhythm_mod_pos = self.place_marker(
            unit.right_rhythm_modifier.as_deref(),
            Point::new(x, top + (main_h - small_h) / 2.0),
        );
        let bottom_rhythm_mod_pos = self.place_marker(
            unit.bottom_rhythm_modifier.as_deref(),
            Point::new(stack_x, stack_y.min(bottom - small_h)),
        );
        if bottom_rhythm_mod_pos.is_some() {
            stack_y += small_h;
        }
        if stack_y > bottom {
            log::warn!(
                "Modifiers of unit '{}' (line {}) overrun the page bottom, overlapping at y={}",
                unit.main_score_character,
                unit.line,
                bottom - small_h
            );
        }

        let column_width = self.config.unit_column_width();
        unit.geometry = Some(UnitGeometry {
            main_char_pos,
            small_mod_pos,
            time_mod_pos,
            right_rhythm_mod_pos,
            bottom_rhythm_mod_pos,
            bounds: BoundingBox {
                x: x - column_width,
                y: top,
                width: column_width,
                height: stack_y.min(bottom) - top,
            },
        });

        self.cursor.beat += unit.duration;
        if self.cursor.beat >= 1.0 - BEAT_EPSILON {
            self.advance_slot();
        }
    }
}

fn role(role: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("role".to_string(), json!(role));
    metadata
}

impl VisitorMut for LayoutPass {
    type Error = ScoreError;

    fn visit_document(&mut self, document: &mut Document) -> Result<()> {
        log::info!("📐 Layout pass start");
        self.builder = RenderListBuilder::new();
        self.cursor = Cursor::page_start(&self.config);

        self.place_document_header(document);
        walk_document(self, document)?;

        log::info!("Layout pass done, {} pages", self.builder.page_count());
        Ok(())
    }

    fn visit_section(&mut self, section: &mut Section) -> Result<()> {
        if section.has_header() {
            self.place_section_header(section);
        }
        walk_section(self, section)
    }

    fn visit_note_unit(&mut self, unit: &mut NoteUnit) -> Result<()> {
        self.place_unit(unit);
        Ok(())
    }

    fn visit_text(&mut self, text: &mut TextNode) -> Result<()> {
        self.close_note_column();
        let placed = self.place_column_text(
            &text.text,
            self.config.textunit_space(),
            TEXT_INDENT_ROWS,
            RenderListBuilder::add_text_block,
            Metadata::new(),
        );
        if let Some(placed) = placed {
            text.position = Some(placed.position);
            text.columns = placed.columns;
            text.width = placed.width;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DocumentChild, SectionChild, TextKind};
    use crate::config::ScoreConfig;
    use crate::render::CommandType;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn unit(main: &str, duration: f32) -> SectionChild {
        let mut unit = NoteUnit::default();
        unit.main_score_character = main.to_string();
        unit.duration = duration;
        SectionChild::Unit(unit)
    }

    fn document(children: Vec<SectionChild>) -> Document {
        let mut section = Section::synthetic();
        section.children = children;
        let mut doc = Document::default();
        doc.children.push(DocumentChild::Section(section));
        doc
    }

    fn run(config: &LayoutConfig, doc: &mut Document) -> RenderList {
        let rules = ScoreConfig::builtin().unwrap().rules;
        let mut pass = LayoutPass::new(config, &rules).unwrap();
        pass.visit_document(doc).unwrap();
        pass.finish()
    }

    fn unit_positions(doc: &Document) -> Vec<Point> {
        doc.note_units()
            .map(|u| u.geometry.as_ref().unwrap().main_char_pos)
            .collect()
    }

    #[test]
    fn test_rejects_impossible_page() {
        let rules = ScoreConfig::builtin().unwrap().rules;
        let config = LayoutConfig {
            page_height: 60.0,
            ..LayoutConfig::default()
        };
        assert!(matches!(
            LayoutPass::new(&config, &rules),
            Err(ScoreError::PageTooSmall { .. })
        ));
    }

    #[test]
    fn test_whole_units_fill_slots_then_break_column() {
        let config = LayoutConfig::default();
        let mut doc = document((0..5).map(|_| unit("一", 1.0)).collect());
        run(&config, &mut doc);

        let positions = unit_positions(&doc);
        let slot = config.slot_height();
        for (i, position) in positions.iter().take(4).enumerate() {
            assert!(approx(position.y, config.margin.top + i as f32 * slot));
            assert!(approx(position.x, positions[0].x));
        }
        // fifth unit starts the next column to the left
        assert!(approx(positions[4].y, config.margin.top));
        assert!(approx(
            positions[0].x - positions[4].x,
            config.unit_column_width() + config.column_spacing
        ));
    }

    #[test]
    fn test_half_units_share_a_slot() {
        let config = LayoutConfig::default();
        let mut doc = document(vec![unit("一", 0.5), unit("二", 0.5), unit("三", 1.0)]);
        run(&config, &mut doc);

        let positions = unit_positions(&doc);
        let slot = config.slot_height();
        let top = config.margin.top;
        assert!(approx(positions[0].y, top));
        assert!(approx(positions[1].y, top + 0.4 * slot));
        assert!(approx(positions[2].y, top + slot));
    }

    #[test]
    fn test_whole_unit_after_half_starts_next_slot() {
        let config = LayoutConfig::default();
        let mut doc = document(vec![unit("一", 0.5), unit("二", 1.0), unit("三", 1.0)]);
        run(&config, &mut doc);

        let positions = unit_positions(&doc);
        let slot = config.slot_height();
        let top = config.margin.top;
        assert!(approx(positions[0].y, top));
        assert!(approx(positions[1].y, top + slot));
        assert!(approx(positions[2].y, top + 2.0 * slot));
    }

    #[test]
    fn test_pending_half_at_column_end_breaks_column() {
        let config = LayoutConfig::default();
        let mut children: Vec<_> = (0..config.unit_num - 1).map(|_| unit("一", 1.0)).collect();
        children.push(unit("二", 0.5));
        children.push(unit("三", 1.0));
        let mut doc = document(children);
        run(&config, &mut doc);

        let positions = unit_positions(&doc);
        let last = positions[config.unit_num];
        assert!(approx(last.y, config.margin.top));
        assert!(last.x < positions[0].x);
    }

    #[test]
    fn test_empty_main_character_is_not_drawn() {
        let config = LayoutConfig::default();
        let mut empty = NoteUnit::default();
        empty.bottom_rhythm_modifier = Some("/pz".to_string());
        let mut doc = document(vec![SectionChild::Unit(empty), unit("二", 1.0)]);
        let list = run(&config, &mut doc);

        let main_chars: Vec<_> = list
            .commands()
            .filter(|c| c.kind == CommandType::MainChar)
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(main_chars, vec!["二"]);
        assert!(list.commands().any(|c| c.kind == CommandType::CircleMarker));
        assert!(doc.note_units().all(|u| u.geometry.is_some()));
    }

    #[test]
    fn test_long_unit_takes_one_slot() {
        let config = LayoutConfig::default();
        let mut doc = document(vec![unit("一", 2.0), unit("二", 1.0)]);
        run(&config, &mut doc);
        let positions = unit_positions(&doc);
        assert!(approx(positions[1].y, config.margin.top + config.slot_height()));
    }

    #[test]
    fn test_modifiers_stack_under_main_character() {
        let config = LayoutConfig::default();
        let mut rich = NoteUnit::default();
        rich.main_score_character = "合".to_string();
        rich.small_modifiers = vec!["七".to_string(), "言".to_string()];
        rich.time_modifiers = vec!["/h".to_string()];
        rich.right_rhythm_modifier = Some("/b".to_string());
        rich.bottom_rhythm_modifier = Some("/pz".to_string());
        rich.duration = 0.5;
        let mut doc = document(vec![SectionChild::Unit(rich)]);
        let list = run(&config, &mut doc);

        let geometry = doc.note_units().next().unwrap().geometry.clone().unwrap();
        let (_, main_h) = config.main_char_space();
        let (_, small_h) = config.small_char_space();
        assert!(approx(geometry.small_mod_pos[0].y, geometry.main_char_pos.y + main_h));
        assert!(approx(geometry.small_mod_pos[1].y, geometry.small_mod_pos[0].y + small_h));
        assert!(approx(geometry.time_mod_pos[0].y, geometry.small_mod_pos[1].y + small_h));
        let bottom = geometry.bottom_rhythm_mod_pos.unwrap();
        assert!(approx(bottom.y, geometry.time_mod_pos[0].y + small_h));
        assert!(geometry.right_rhythm_mod_pos.unwrap().x > geometry.main_char_pos.x);

        let texts: Vec<_> = list
            .commands()
            .filter(|c| c.kind == CommandType::SmallModifier)
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(texts, vec!["七", "言", "火"]);
        assert!(list.commands().any(|c| c.kind == CommandType::BaiMarker && c.text == "百"));
        assert!(list.commands().any(|c| c.kind == CommandType::CircleMarker));
    }

    #[test]
    fn test_overlong_modifier_stack_stays_on_page() {
        let config = LayoutConfig::default();
        let mut crowded = NoteUnit::default();
        crowded.main_score_character = "合".to_string();
        crowded.small_modifiers = (0..12).map(|_| "七".to_string()).collect();
        crowded.bottom_rhythm_modifier = Some("/pz".to_string());
        let mut doc = document(vec![SectionChild::Unit(crowded)]);
        let list = run(&config, &mut doc);

        let (_, small_h) = config.small_char_space();
        let floor = config.content_bottom() - small_h;
        for command in list.commands() {
            assert!(command.position.y <= floor + 1e-3);
        }
        let geometry = doc.note_units().next().unwrap().geometry.clone().unwrap();
        assert!(geometry.bounds.bottom() <= config.content_bottom() + 1e-3);
    }

    #[test]
    fn test_text_wraps_into_columns() {
        let config = LayoutConfig::default();
        let (w, h) = config.textunit_space();
        let top = config.margin.top + 2.0 * h;
        let capacity = ((config.content_bottom() - top) / h).floor() as usize;

        let long = "注".repeat(capacity * 2 + 1);
        let mut doc = document(vec![unit("一", 1.0), SectionChild::Text(TextNode::new(TextKind::Comment, long))]);
        let list = run(&config, &mut doc);

        let section = doc.sections().next().unwrap();
        let SectionChild::Text(text) = &section.children[1] else {
            panic!("expected text node");
        };
        assert_eq!(text.columns, 3);
        assert!(approx(text.width, 3.0 * w));
        assert!(approx(text.position.unwrap().y, top));

        let block = list
            .commands()
            .find(|c| c.kind == CommandType::TextBlock)
            .unwrap();
        assert_eq!(block.metadata["chars_per_column"], json!(capacity));
        assert_eq!(block.metadata["columns"], json!(3));

        // text follows music, so it starts left of the note column
        let unit_x = doc.note_units().next().unwrap().geometry.as_ref().unwrap().bounds.x;
        assert!(text.position.unwrap().x <= unit_x);
    }

    #[test]
    fn test_section_header_breaks_column() {
        let config = LayoutConfig::default();
        let mut first = Section::synthetic();
        first.children.push(unit("一", 1.0));
        let mut second = Section::titled("第二段");
        second.children.push(unit("二", 1.0));
        let mut doc = Document::default();
        doc.children.push(DocumentChild::Section(first));
        doc.children.push(DocumentChild::Section(second));
        let list = run(&config, &mut doc);

        let positions = unit_positions(&doc);
        assert!(approx(positions[1].y, config.margin.top));
        let header = doc.sections().nth(1).unwrap();
        let title_x = header.title_pos.unwrap().x;
        assert!(title_x < positions[0].x);
        assert!(positions[1].x < title_x);
        assert!(approx(header.header_width, config.title_space().0 + config.column_spacing));
        assert_eq!(
            list.commands().filter(|c| c.kind == CommandType::SectionTitle).count(),
            1
        );
    }

    #[test]
    fn test_document_metadata_rides_on_title() {
        let config = LayoutConfig::default();
        let mut doc = document(vec![unit("一", 1.0)]);
        doc.title = Some("番假崇".to_string());
        doc.mode = Some("黄钟调".to_string());
        doc.source = Some("三五要录".to_string());
        let list = run(&config, &mut doc);

        let title = list.commands().next().unwrap();
        assert_eq!(title.kind, CommandType::DocumentTitle);
        assert_eq!(title.metadata["source"], json!("三五要录"));
        assert!(approx(title.position.x, config.origin_x()));
        assert!(doc.mode_pos.is_some());
        assert!(doc.header_width > 0.0);
    }

    #[test]
    fn test_narrow_page_breaks() {
        let config = LayoutConfig {
            page_width: 400.0,
            ..LayoutConfig::default()
        };
        let mut doc = document((0..config.unit_num * 5).map(|_| unit("一", 1.0)).collect());
        let list = run(&config, &mut doc);

        assert!(list.pages.len() > 1);
        for command in list.commands() {
            assert!(command.position.x >= config.margin.left);
            assert!(command.position.x <= config.page_width - config.margin.right);
            assert!(command.position.y >= config.margin.top);
            assert!(command.position.y <= config.page_height - config.margin.bottom);
        }
    }

    #[test]
    fn test_pass_is_reusable() {
        let config = LayoutConfig::default();
        let rules = ScoreConfig::builtin().unwrap().rules;
        let mut pass = LayoutPass::new(&config, &rules).unwrap();

        let mut first = document(vec![unit("一", 1.0)]);
        pass.visit_document(&mut first).unwrap();
        let a = pass.take_render_list();

        let mut second = document(vec![unit("一", 1.0)]);
        pass.visit_document(&mut second).unwrap();
        let b = pass.take_render_list();
        assert_eq!(a, b);
    }
}
