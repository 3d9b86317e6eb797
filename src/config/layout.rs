//! Page geometry and font metrics for the layout pass
//!
//! Only base sizes are stored; every derived size (character boxes, slot
//! height, column widths) is computed from them so a config file can never
//! hold inconsistent values.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoreError};

/// Page margins in pixels
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Margin {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margin {
    fn default() -> Self {
        Self {
            top: 20.0,
            right: 20.0,
            bottom: 20.0,
            left: 20.0,
        }
    }
}

/// Configuration for layout calculations
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Page width in pixels
    pub page_width: f32,

    /// Page height in pixels
    pub page_height: f32,

    pub margin: Margin,

    /// Rhythmic slots per column
    pub unit_num: usize,

    /// Main score character font size; all other sizes derive from it
    pub main_char_size: f32,

    /// Horizontal space a character occupies per point of font size
    pub width_per_pt: f32,

    /// Vertical space a character occupies per point of font size
    pub height_per_pt: f32,

    /// Gap left between columns
    pub column_spacing: f32,

    /// Share of the slot height spread over one whole beat of fractional units.
    /// With 0.8 the second half-beat unit starts at 40% of the slot.
    pub half_slot_fill: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 2160.0,
            page_height: 1280.0,
            margin: Margin::default(),
            unit_num: 4,
            main_char_size: 48.0,
            width_per_pt: 1.5,
            height_per_pt: 1.2,
            column_spacing: 12.0,
            half_slot_fill: 0.8,
        }
    }
}

impl LayoutConfig {
    pub fn title_size(&self) -> f32 {
        self.main_char_size
    }

    pub fn small_char_size(&self) -> f32 {
        self.main_char_size / 2.0
    }

    pub fn mode_size(&self) -> f32 {
        self.title_size() / 2.0
    }

    pub fn textunit_size(&self) -> f32 {
        self.title_size() / 2.0
    }

    /// (x, y) space a single character of `size` occupies
    fn space(&self, size: f32) -> (f32, f32) {
        (size * self.width_per_pt, size * self.height_per_pt)
    }

    pub fn main_char_space(&self) -> (f32, f32) {
        self.space(self.main_char_size)
    }

    pub fn small_char_space(&self) -> (f32, f32) {
        self.space(self.small_char_size())
    }

    pub fn title_space(&self) -> (f32, f32) {
        self.space(self.title_size())
    }

    pub fn mode_space(&self) -> (f32, f32) {
        self.space(self.mode_size())
    }

    pub fn textunit_space(&self) -> (f32, f32) {
        self.space(self.textunit_size())
    }

    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin.left - self.margin.right
    }

    pub fn content_height(&self) -> f32 {
        self.page_height - self.margin.top - self.margin.bottom
    }

    /// Lowest y any content may start at
    pub fn content_bottom(&self) -> f32 {
        self.page_height - self.margin.bottom
    }

    /// Right edge of the first column on every page
    pub fn origin_x(&self) -> f32 {
        self.page_width - self.margin.right
    }

    pub fn slot_height(&self) -> f32 {
        self.content_height() / self.unit_num.max(1) as f32
    }

    /// A note column holds the main character plus a right-hand rhythm lane
    pub fn unit_column_width(&self) -> f32 {
        self.main_char_space().0 + self.small_char_space().0
    }

    /// Reject geometry that cannot place even one element. Checked once,
    /// before any layout starts.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(ScoreError::PageTooSmall { reason });

        if self.unit_num == 0 {
            return fail("unit_num must be at least 1".to_string());
        }
        if self.main_char_size <= 0.0 || self.width_per_pt <= 0.0 || self.height_per_pt <= 0.0 {
            return fail("font metrics must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.half_slot_fill) {
            return fail(format!("half_slot_fill {} is outside 0..=1", self.half_slot_fill));
        }

        let (main_w, main_h) = self.main_char_space();
        if self.slot_height() < main_h {
            return fail(format!(
                "slot height {:.1} is smaller than one main character ({:.1})",
                self.slot_height(),
                main_h
            ));
        }

        let widest = self
            .unit_column_width()
            .max(self.title_space().0)
            .max(self.textunit_space().0)
            .max(main_w);
        if self.content_width() < widest {
            return fail(format!(
                "content width {:.1} cannot hold one column ({:.1})",
                self.content_width(),
                widest
            ));
        }

        // Headers start one row down, text blocks two rows down; each needs a character below that.
        let title_rows = 2.0 * self.title_space().1;
        let text_rows = 3.0 * self.textunit_space().1;
        if self.content_height() < title_rows.max(text_rows) {
            return fail(format!(
                "content height {:.1} cannot hold an indented header",
                self.content_height()
            ));
        }

        Ok(())
    }
}
