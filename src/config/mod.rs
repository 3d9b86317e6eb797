//! Static configuration for the notation pipeline
//!
//! A `ScoreConfig` bundles the lexer rule table and notation lookup tables
//! (`RuleConfig`) with page geometry (`LayoutConfig`). It is loaded once,
//! validated once, and then handed to each component's constructor.

pub mod layout;
pub mod rules;

pub use layout::*;
pub use rules::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, ScoreError};

/// Built-in Pipa rules, shipped inside the binary
const BUILTIN_CONFIG: &str = include_str!("../../config/pipa.yaml");

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScoreConfig {
    pub rules: RuleConfig,

    #[serde(default)]
    pub layout: LayoutConfig,
}

impl ScoreConfig {
    /// Parse a config from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ScoreConfig = serde_yaml::from_str(yaml)?;
        log::debug!(
            "Loaded score config: {} token rules, {} duration entries",
            config.rules.tokens.len(),
            config.rules.duration_modifier_map.len()
        );
        Ok(config)
    }

    /// Read and parse a YAML config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ScoreError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// The default Pipa notation rules and page layout
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_CONFIG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenKind;
    use crate::render::MarkerKind;

    #[test]
    fn test_builtin_config_loads() {
        let config = ScoreConfig::builtin().expect("built-in config should parse");
        assert_eq!(config.rules.default_mode, "黄钟调");
        assert_eq!(config.rules.fire_glyph, "/h");
        assert_eq!(config.rules.duration_of("/h"), Some(0.5));
        assert_eq!(config.rules.duration_of("/y"), Some(2.0));
        assert!(config.rules.is_consumed("/hh"));
        assert_eq!(config.rules.meta_field("来源"), Some(MetaField::Source));
        assert_eq!(config.rules.marker_for("/pz"), Some(MarkerKind::Circle));
        assert_eq!(config.rules.marker_for("/g"), Some(MarkerKind::Check));
        assert_eq!(config.rules.time_glyph_text("/h"), "火");
        assert_eq!(config.rules.time_glyph_text("/q"), "/q");
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_section_rule_precedes_title_rule() {
        let config = ScoreConfig::builtin().unwrap();
        let position = |kind: TokenKind| config.rules.tokens.iter().position(|r| r.kind == kind);
        assert!(position(TokenKind::Section) < position(TokenKind::ScoreDocument));
    }

    #[test]
    fn test_layout_section_is_optional() {
        let yaml = r#"
rules:
  default_mode: 沙陀调
  fire_glyph: /h
  duration_modifier_map: { /h: 0.5 }
  tokens: []
"#;
        let config = ScoreConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.layout, LayoutConfig::default());
        assert!(config.rules.consumed_glyphs.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_a_config_error() {
        let err = ScoreConfig::from_yaml_str("rules: [not, a, map]").unwrap_err();
        assert!(matches!(err, ScoreError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = ScoreConfig::from_path("/nonexistent/pipa.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pipa.yaml"));
    }
}
