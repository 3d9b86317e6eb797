//! Semantic resolution: modes, durations and fire chains
//!
//! Runs before layout and never touches geometry.

use std::collections::BTreeMap;

use crate::ast::{walk_document, Document, DocumentChild, NoteUnit, SectionChild, VisitorMut};
use crate::config::RuleConfig;
use crate::error::{Result, ScoreError};

/// Duration of a unit that may carry the visible fire glyph
const FIRE_DURATION: f32 = 0.5;

pub struct TheoryPass {
    default_mode: String,
    durations: BTreeMap<String, f32>,
    consumed: Vec<String>,
    fire_glyph: String,
}

impl TheoryPass {
    pub fn new(rules: &RuleConfig) -> Self {
        Self {
            default_mode: rules.default_mode.clone(),
            durations: rules.duration_modifier_map.clone(),
            consumed: rules.consumed_glyphs.clone(),
            fire_glyph: rules.fire_glyph.clone(),
        }
    }

    /// Fill in the document mode and every section's inherited mode
    fn resolve_modes(&self, document: &mut Document) {
        let mut inherited = document
            .mode
            .get_or_insert_with(|| self.default_mode.clone())
            .clone();

        for child in document.children.iter_mut() {
            let DocumentChild::Section(section) = child else {
                continue;
            };
            match &section.mode {
                Some(mode) => {
                    section.show_mode = *mode != inherited;
                    inherited = mode.clone();
                }
                None => {
                    section.mode = Some(inherited.clone());
                    section.show_mode = false;
                }
            }
        }
    }

    /// Keep the fire glyph only on the first unit of each run of
    /// half-duration fire units. Section starts and text nodes end a run.
    fn collapse_fire_chains(&self, document: &mut Document) {
        let mut collapsed = 0;

        for child in document.children.iter_mut() {
            let DocumentChild::Section(section) = child else {
                continue;
            };
            let mut in_chain = false;

            for item in section.children.iter_mut() {
                let SectionChild::Unit(unit) = item else {
                    in_chain = false;
                    continue;
                };
                if !self.is_fire_unit(unit) {
                    in_chain = false;
                    continue;
                }
                if in_chain {
                    unit.time_modifiers.retain(|g| *g != self.fire_glyph);
                    collapsed += 1;
                }
                in_chain = true;
            }
        }

        if collapsed > 0 {
            log::debug!("Collapsed {} fire glyphs", collapsed);
        }
    }

    fn is_fire_unit(&self, unit: &NoteUnit) -> bool {
        unit.has_time_modifier(&self.fire_glyph) && unit.duration == FIRE_DURATION
    }
}

impl VisitorMut for TheoryPass {
    type Error = ScoreError;

    fn visit_document(&mut self, document: &mut Document) -> Result<()> {
        log::info!("🎼 Theory pass start");
        self.resolve_modes(document);
        walk_document(self, document)?;
        self.collapse_fire_chains(document);
        log::info!("Theory pass done, mode {}", document.mode.as_deref().unwrap_or_default());
        Ok(())
    }

    fn visit_note_unit(&mut self, unit: &mut NoteUnit) -> Result<()> {
        let mut duration = 1.0;
        for glyph in &unit.time_modifiers {
            let factor = self
                .durations
                .get(glyph)
                .ok_or_else(|| ScoreError::UnknownDurationGlyph(glyph.clone()))?;
            duration *= factor;
        }
        unit.duration = duration;

        let consumed = &self.consumed;
        unit.time_modifiers.retain(|g| !consumed.contains(g));
        Ok(())
    }
}
