//! Script segmentation: turns a pasted script into numbered shot drafts.
//!
//! A segment starts at every shot/scene marker ("Shot 3", "Scene 12",
//! "Phân cảnh 4", ...). The marker stays at the head of its segment and is
//! stripped again during field extraction.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Locale, Shot, StoryboardError, StyleTag};

pub const DEFAULT_KEYWORDS: [&str; 5] = ["Shot", "Scene", "Phân cảnh", "Cảnh", "Phân đoạn"];

/// How the fields of a segment are extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// Everything after the header token is both summary and prompt.
    #[default]
    Simple,
    /// The header line is the summary; the body (or its `Prompt:` section)
    /// is the visual prompt.
    Structured,
}

/// What to do with text that appears before the first marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreambleMode {
    /// Keep it as an unlabeled leading shot.
    #[default]
    Keep,
    /// Discard it. A script without any marker yields no shots.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub policy: ExtractionPolicy,
    #[serde(default)]
    pub preamble: PreambleMode,
    #[serde(default)]
    pub locale: Locale,
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            policy: ExtractionPolicy::default(),
            preamble: PreambleMode::default(),
            locale: Locale::default(),
        }
    }
}

impl ParserConfig {
    pub fn with_policy(mut self, policy: ExtractionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_preamble(mut self, preamble: PreambleMode) -> Self {
        self.preamble = preamble;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

/// A slice of the script that becomes one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    /// False for leading text kept before the first marker. Unlabeled
    /// segments have no header to strip.
    pub labeled: bool,
}

#[derive(Debug, Clone)]
pub struct ScriptParser {
    config: ParserConfig,
    marker: Regex,
    header: Regex,
    prompt_marker: Regex,
}

impl ScriptParser {
    pub fn new(config: ParserConfig) -> Result<Self, StoryboardError> {
        let mut keywords: Vec<&str> = config
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(StoryboardError::NoMarkerKeywords);
        }
        // Longest first so "Phân cảnh" wins over its suffix "Cảnh".
        keywords.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
        keywords.dedup();

        let alternation = keywords
            .iter()
            .map(|k| {
                k.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");

        let marker = Regex::new(&format!(r"(?i)\b(?:{alternation})\s+\d+"))?;
        // Separators after the index stay on the header's line so a structured
        // title line is never swallowed.
        let header = Regex::new(&format!(
            r"(?i)^\s*(?:{alternation})\s+\d+(?:[:\-–—.)]|[^\S\r\n])*"
        ))?;
        let prompt_marker = Regex::new(r"(?i)\bprompt:")?;

        Ok(Self {
            config,
            marker,
            header,
            prompt_marker,
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Splits the script at every marker. Blank segments are skipped and the
    /// preamble is handled per [`PreambleMode`].
    pub fn segment<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let starts: Vec<usize> = self.marker.find_iter(text).map(|m| m.start()).collect();
        let mut segments = Vec::with_capacity(starts.len() + 1);

        let preamble_end = starts.first().copied().unwrap_or(text.len());
        let preamble = &text[..preamble_end];
        if self.config.preamble == PreambleMode::Keep && !preamble.trim().is_empty() {
            segments.push(Segment {
                text: preamble,
                labeled: false,
            });
        }

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            let slice = &text[start..end];
            if !slice.trim().is_empty() {
                segments.push(Segment {
                    text: slice,
                    labeled: true,
                });
            }
        }

        segments
    }

    /// Parses the script into shot drafts numbered from 1. Blank input gives
    /// an empty list.
    pub fn parse(&self, text: &str, style: StyleTag) -> Vec<Shot> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let shots: Vec<Shot> = self
            .segment(text)
            .into_iter()
            .enumerate()
            .map(|(idx, segment)| {
                let (summary, prompt) = self.extract_segment(&segment);
                Shot::new(idx as u32 + 1, summary, prompt, style)
            })
            .collect();

        debug!(
            shots = shots.len(),
            policy = ?self.config.policy,
            "parsed script"
        );
        shots
    }

    /// Returns `(summary, visual_prompt)` for one marker-led segment.
    pub fn extract(&self, segment: &str) -> (String, String) {
        self.extract_body(self.strip_header(segment))
    }

    fn extract_segment(&self, segment: &Segment<'_>) -> (String, String) {
        if segment.labeled {
            self.extract(segment.text)
        } else {
            self.extract_body(segment.text.trim_start())
        }
    }

    fn extract_body(&self, body: &str) -> (String, String) {
        match self.config.policy {
            ExtractionPolicy::Simple => self.extract_simple(body),
            ExtractionPolicy::Structured => self.extract_structured(body),
        }
    }

    fn strip_header<'a>(&self, text: &'a str) -> &'a str {
        match self.header.find(text) {
            Some(m) => &text[m.end()..],
            None => text,
        }
    }

    fn extract_simple(&self, body: &str) -> (String, String) {
        let locale = self.config.locale;
        let body = body.trim();
        if body.is_empty() {
            (
                locale.missing_summary().to_string(),
                locale.missing_prompt().to_string(),
            )
        } else {
            (body.to_string(), body.to_string())
        }
    }

    /// The header is already gone, so the first line is the title even when
    /// the marker itself spanned a line break.
    fn extract_structured(&self, body: &str) -> (String, String) {
        let locale = self.config.locale;
        let body = body.trim_start_matches([' ', '\t']);
        let (title, rest) = body.split_once('\n').unwrap_or((body, ""));

        let title = title.trim();
        let summary = if title.is_empty() {
            locale.missing_summary().to_string()
        } else {
            title.to_string()
        };

        let prompt = match self.prompt_marker.find(rest) {
            Some(m) => rest[m.end()..].trim(),
            None => rest.trim(),
        };
        let prompt = if prompt.is_empty() {
            summary.clone()
        } else {
            prompt.to_string()
        };

        (summary, prompt)
    }
}

impl Default for ScriptParser {
    fn default() -> Self {
        // The built-in keywords are plain words, so the patterns always compile.
        Self::new(ParserConfig::default()).expect("default marker keywords compile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured() -> ScriptParser {
        ScriptParser::new(ParserConfig::default().with_policy(ExtractionPolicy::Structured))
            .unwrap()
    }

    #[test]
    fn test_segments_at_each_marker() {
        let parser = ScriptParser::default();
        let segments = parser.segment("Shot 1: a\nShot 2: b\nScene 3 - c");
        assert_eq!(segments.len(), 3);
        assert!(segments[0].text.starts_with("Shot 1"));
        assert!(segments[1].text.starts_with("Shot 2"));
        assert!(segments[2].text.starts_with("Scene 3"));
        assert!(segments.iter().all(|s| s.labeled));
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        let parser = ScriptParser::default();
        let shots = parser.parse("SHOT 1: one shot 2: two sCeNe 3: three", StyleTag::Sketch);
        let summaries: Vec<_> = shots.iter().map(|s| s.summary.as_str()).collect();
        assert_eq!(summaries, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_multi_word_keyword_is_one_marker() {
        let parser = ScriptParser::default();
        let shots = parser.parse(
            "Phân cảnh 1: Cô gái đứng trên đồi\nPhân cảnh 2: Trời mưa",
            StyleTag::Sketch,
        );
        assert_eq!(shots.len(), 2);
        assert_eq!(shots[0].summary, "Cô gái đứng trên đồi");
        assert_eq!(shots[1].summary, "Trời mưa");
    }

    #[test]
    fn test_vietnamese_markers_ignore_case() {
        let parser = ScriptParser::default();
        let shots = parser.parse("cảnh 1: bình minh\nPHÂN ĐOẠN 2: hoàng hôn", StyleTag::Sketch);
        assert_eq!(shots.len(), 2);
        assert_eq!(shots[0].summary, "bình minh");
        assert_eq!(shots[1].summary, "hoàng hôn");
    }

    #[test]
    fn test_marker_needs_word_boundary() {
        let parser = ScriptParser::default();
        let shots = parser.parse("Shot 1: take a screenshot 3 times", StyleTag::Sketch);
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].summary, "take a screenshot 3 times");
    }

    #[test]
    fn test_marker_needs_an_index() {
        let parser = ScriptParser::default();
        let shots = parser.parse("Shot 1: the shot we wanted\nScene two", StyleTag::Sketch);
        assert_eq!(shots.len(), 1);
    }

    #[test]
    fn test_simple_strips_separators() {
        let parser = ScriptParser::default();
        for input in ["Shot 4: wide", "Shot 4 - wide", "Shot 4 – wide", "Shot 4. wide", "Shot 4 wide"] {
            let shots = parser.parse(input, StyleTag::Sketch);
            assert_eq!(shots[0].summary, "wide", "input {input:?}");
            assert_eq!(shots[0].visual_prompt, "wide");
        }
    }

    #[test]
    fn test_simple_empty_body_uses_placeholders() {
        let parser = ScriptParser::default();
        let shots = parser.parse("Shot 1:\nShot 2: b", StyleTag::Sketch);
        assert_eq!(shots[0].summary, Locale::English.missing_summary());
        assert_eq!(shots[0].visual_prompt, Locale::English.missing_prompt());
    }

    #[test]
    fn test_placeholders_follow_locale() {
        let parser =
            ScriptParser::new(ParserConfig::default().with_locale(Locale::Vietnamese)).unwrap();
        let shots = parser.parse("Cảnh 1 -", StyleTag::Sketch);
        assert_eq!(shots[0].summary, "Không có mô tả");
        assert_eq!(shots[0].visual_prompt, "Mô tả hình ảnh...");
    }

    #[test]
    fn test_structured_remainder_is_prompt() {
        let shots = structured().parse("Shot 2: intro\nProvides context", StyleTag::Sketch);
        assert_eq!(shots[0].summary, "intro");
        assert_eq!(shots[0].visual_prompt, "Provides context");
    }

    #[test]
    fn test_structured_explicit_prompt() {
        let shots = structured().parse(
            "Shot 1 – wide\nPrompt: a lone figure on a hill",
            StyleTag::Sketch,
        );
        assert_eq!(shots[0].summary, "wide");
        assert_eq!(shots[0].visual_prompt, "a lone figure on a hill");
    }

    #[test]
    fn test_structured_header_split_across_lines() {
        let shots = structured().parse("Shot\n3: z", StyleTag::Sketch);
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].summary, "z");
        assert_eq!(shots[0].visual_prompt, "z");

        let shots = structured().parse("Shot\n3: z\nPrompt: a quiet street", StyleTag::Sketch);
        assert_eq!(shots[0].summary, "z");
        assert_eq!(shots[0].visual_prompt, "a quiet street");
    }

    #[test]
    fn test_structured_header_alone_on_its_line() {
        let shots = structured().parse("Shot 2:\nProvides context", StyleTag::Sketch);
        assert_eq!(shots[0].summary, Locale::English.missing_summary());
        assert_eq!(shots[0].visual_prompt, "Provides context");
    }

    #[test]
    fn test_preamble_is_not_header_stripped() {
        let parser = ScriptParser::new(
            ParserConfig::default()
                .with_policy(ExtractionPolicy::Structured)
                .with_preamble(PreambleMode::Keep),
        )
        .unwrap();
        let segments = parser.segment("Opening titles\nfade in\nShot 1: dawn");
        assert!(!segments[0].labeled);
        assert!(segments[1].labeled);

        let shots = parser.parse("Opening titles\nfade in\nShot 1: dawn", StyleTag::Sketch);
        assert_eq!(shots[0].summary, "Opening titles");
        assert_eq!(shots[0].visual_prompt, "fade in");
        assert_eq!(shots[1].summary, "dawn");
    }

    #[test]
    fn test_default_parser_builds() {
        let parser = ScriptParser::default();
        assert_eq!(parser.config(), &ParserConfig::default());
    }

    #[test]
    fn test_structured_prompt_marker_is_case_insensitive() {
        let shots = structured().parse(
            "Shot 1: dawn\nThe hero wakes.\nPROMPT:  sunrise over rooftops \n",
            StyleTag::Sketch,
        );
        assert_eq!(shots[0].summary, "dawn");
        assert_eq!(shots[0].visual_prompt, "sunrise over rooftops");
    }

    #[test]
    fn test_structured_without_body_falls_back_to_summary() {
        let shots = structured().parse("Shot 1: dusk", StyleTag::Sketch);
        assert_eq!(shots[0].visual_prompt, "dusk");

        let shots = structured().parse("Shot 1: dusk\nPrompt:   ", StyleTag::Sketch);
        assert_eq!(shots[0].visual_prompt, "dusk");
    }

    #[test]
    fn test_custom_keywords() {
        let parser =
            ScriptParser::new(ParserConfig::default().with_keywords(["Plan", "Einstellung"]))
                .unwrap();
        let shots = parser.parse("Plan 1: a Einstellung 2: b Shot 3: c", StyleTag::Sketch);
        assert_eq!(shots.len(), 2);
        assert_eq!(shots[1].summary, "b Shot 3: c");
    }

    #[test]
    fn test_empty_keyword_set_is_rejected() {
        let err = ScriptParser::new(ParserConfig::default().with_keywords(["  "])).unwrap_err();
        assert!(matches!(err, StoryboardError::NoMarkerKeywords));
    }
}
