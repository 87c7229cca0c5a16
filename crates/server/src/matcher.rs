//! Transcript to intent matching

use chipper_core::LanguageTag;
use std::collections::BTreeMap;

/// A resolved intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMatch {
    pub intent: String,
    pub parameters: BTreeMap<String, String>,
}

/// Resolves a transcript to an intent
pub trait IntentMatcher: Send + Sync {
    fn match_intent(&self, transcript: &str, language: &LanguageTag) -> Option<IntentMatch>;
}

/// Phrase-table matcher
///
/// An intent matches when one of its phrases occurs in the transcript on word
/// boundaries. The longest matching phrase wins.
#[derive(Debug, Clone, Default)]
pub struct PhraseMatcher {
    // (normalized phrase, intent), longest phrase first
    phrases: Vec<(String, String)>,
}

impl PhraseMatcher {
    pub fn new(table: &BTreeMap<String, Vec<String>>) -> Self {
        let mut phrases: Vec<(String, String)> = table
            .iter()
            .flat_map(|(intent, phrases)| {
                phrases
                    .iter()
                    .map(|p| normalize(p))
                    .filter(|p| !p.is_empty())
                    .map(move |p| (p, intent.clone()))
            })
            .collect();
        phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.1.cmp(&b.1)));
        Self { phrases }
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

impl IntentMatcher for PhraseMatcher {
    fn match_intent(&self, transcript: &str, _language: &LanguageTag) -> Option<IntentMatch> {
        let padded = format!(" {} ", normalize(transcript));
        self.phrases
            .iter()
            .find(|(phrase, _)| padded.contains(&format!(" {} ", phrase)))
            .map(|(_, intent)| IntentMatch {
                intent: intent.clone(),
                parameters: BTreeMap::new(),
            })
    }
}

/// Lowercase, drop punctuation other than apostrophes, collapse whitespace
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
