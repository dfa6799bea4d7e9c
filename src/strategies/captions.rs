//! Caption track selection and timed-text parsing shared by the scraping strategies.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use super::QualityTier;
use crate::utils::{decode_html_entities, normalize_whitespace};

/// One entry of a player response's `captionTracks` list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    #[serde(default)]
    pub language_code: String,
    /// `"asr"` for auto-generated tracks
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    pub fn tier(&self) -> QualityTier {
        if self.is_auto_generated() {
            QualityTier::Approximate
        } else {
            QualityTier::Exact
        }
    }

    fn matches_language(&self, language: &str) -> bool {
        self.language_code.eq_ignore_ascii_case(language)
    }

    fn matches_language_family(&self, language: &str) -> bool {
        let family = language.split('-').next().unwrap_or(language);
        self.language_code
            .split('-')
            .next()
            .is_some_and(|code| code.eq_ignore_ascii_case(family))
    }
}

/// Pick the best track for a language.
///
/// Preference: human track in the exact language, auto track in the exact language,
/// any track in the same language family, then whatever comes first.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.matches_language(language) && !t.is_auto_generated())
        .or_else(|| tracks.iter().find(|t| t.matches_language(language)))
        .or_else(|| tracks.iter().find(|t| t.matches_language_family(language)))
        .or_else(|| tracks.first())
}

fn cue_regex() -> &'static Regex {
    static CUE: OnceLock<Regex> = OnceLock::new();
    CUE.get_or_init(|| {
        Regex::new(r"(?s)<(?:text|p)\b[^>]*>(.*?)</(?:text|p)>").expect("valid cue regex")
    })
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

/// Join the cue text of a timed-text document (`<text>` or srv3 `<p>` cues)
pub fn parse_timed_text(document: &str) -> String {
    let cues: Vec<String> = cue_regex()
        .captures_iter(document)
        .filter_map(|caps| caps.get(1))
        .map(|body| {
            let stripped = tag_regex().replace_all(body.as_str(), "");
            // cue bodies are HTML-escaped text inside XML-escaped markup
            let decoded = decode_html_entities(&decode_html_entities(&stripped));
            normalize_whitespace(&decoded)
        })
        .filter(|cue| !cue.is_empty())
        .collect();

    cues.join(" ")
}
