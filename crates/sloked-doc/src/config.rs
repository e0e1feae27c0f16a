//! `DocumentSetConfig`: the handful of defaults a [`crate::DocumentSet`]
//! needs before any document is open, parsed the way `core-config` parses
//! `oxidized.toml` — tolerant of unknown fields, falling back to sensible
//! defaults rather than refusing to start.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::newline::NewlineStyle;

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSetConfig {
    #[serde(default = "DocumentSetConfig::default_newline_style")]
    pub default_newline_style: NewlineStyle,
    #[serde(default = "DocumentSetConfig::default_encoding_name")]
    pub default_encoding: String,
}

impl Default for DocumentSetConfig {
    fn default() -> Self {
        Self {
            default_newline_style: Self::default_newline_style(),
            default_encoding: Self::default_encoding_name(),
        }
    }
}

impl DocumentSetConfig {
    fn default_newline_style() -> NewlineStyle {
        NewlineStyle::Lf
    }

    fn default_encoding_name() -> String {
        "utf-8".to_string()
    }

    /// Parse a `[default_newline_style]`/`default_encoding`-shaped TOML
    /// document. Unknown keys are ignored, matching `core-config`'s
    /// forward-evolution tolerance.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing document set configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = DocumentSetConfig::from_toml_str("").unwrap();
        assert_eq!(config.default_newline_style, NewlineStyle::Lf);
        assert_eq!(config.default_encoding, "utf-8");
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config = DocumentSetConfig::from_toml_str(
            "default_newline_style = \"crlf\"\ndefault_encoding = \"utf-32le\"\n",
        )
        .unwrap();
        assert_eq!(config.default_newline_style, NewlineStyle::Crlf);
        assert_eq!(config.default_encoding, "utf-32le");
    }
}
