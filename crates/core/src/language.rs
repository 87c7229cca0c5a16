//! Recognition language tags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Negotiated recognition language, as sent by the client.
///
/// Carried verbatim; the dispatcher never validates it. Clients send either
/// protocol enum names (`ENGLISH_US`) or BCP-47 tags (`en-US`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// BCP-47 form of the tag, if it is one the protocol defines
    pub fn locale(&self) -> Option<&'static str> {
        let locale = match self.0.as_str() {
            "ENGLISH_US" | "en-US" | "en_US" => "en-US",
            "ENGLISH_UK" | "en-GB" | "en_GB" => "en-GB",
            "ENGLISH_AU" | "en-AU" | "en_AU" => "en-AU",
            "GERMAN" | "de-DE" | "de_DE" => "de-DE",
            "FRENCH" | "fr-FR" | "fr_FR" => "fr-FR",
            "JAPANESE" | "ja-JP" | "ja_JP" => "ja-JP",
            _ => return None,
        };
        Some(locale)
    }

    /// Two-letter language code (`en` for `en-US`)
    pub fn primary(&self) -> Option<&'static str> {
        self.locale().and_then(|l| l.split('-').next())
    }

    /// Whether this tag matches an engine-declared language (`en-US` or `en`)
    pub fn matches(&self, declared: &str) -> bool {
        if self.0.eq_ignore_ascii_case(declared) {
            return true;
        }
        match self.locale() {
            Some(locale) => {
                locale.eq_ignore_ascii_case(declared)
                    || self
                        .primary()
                        .is_some_and(|p| p.eq_ignore_ascii_case(declared))
            },
            None => false,
        }
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for LanguageTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_names_map_to_locales() {
        assert_eq!(LanguageTag::new("ENGLISH_US").locale(), Some("en-US"));
        assert_eq!(LanguageTag::new("GERMAN").locale(), Some("de-DE"));
        assert_eq!(LanguageTag::new("KLINGON").locale(), None);
    }

    #[test]
    fn test_matches_declared_language() {
        let tag = LanguageTag::new("ENGLISH_UK");
        assert!(tag.matches("en-GB"));
        assert!(tag.matches("en"));
        assert!(!tag.matches("de"));
        assert!(LanguageTag::new("xx-YY").matches("xx-yy"));
    }
}
