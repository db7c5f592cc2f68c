use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::fmt;

use crate::error::ConfigError;

pub const DEFAULT_REPETITION_THRESHOLD: f64 = 0.5;

pub const DEFAULT_SPAM_PATTERNS: &[&str] = &[
    r"(click here|follow me|check out|dm me|buy now)",
    r"https?://bit\.ly",
    r"💰|💵|💴|💶|💷|💲",
    r"\b(crypto|nft|airdrop)\b",
];

pub const DEFAULT_HARMFUL_PATTERNS: &[&str] = &[
    r"\b(kill|die|suicide|harm yourself)\b",
    r"\b(hate|racist|bigot)\b",
];

const ERROR_INDICATORS: &[&str] = &[
    "error:",
    "exception:",
    "failed to",
    "could not",
    "unable to",
    "traceback",
    "stack trace",
];

const PLACEHOLDERS: &[&str] = &[
    "lorem ipsum",
    "[placeholder]",
    "todo",
    "xxx",
    "test test",
    "sample text",
    "example post",
    "generated text",
];

// Lead-ins models like to put before the actual post
const PREAMBLES: &[&str] = &[
    "here's a post:",
    "here’s a post:",
    "here is a post:",
    "generated post:",
    "post:",
];

const MAX_EXCLAMATIONS: usize = 3;
const MAX_QUESTIONS: usize = 3;
const MAX_URLS: usize = 2;
const MAX_PHRASE_REPEATS: usize = 2;
const ALL_CAPS_MIN_LENGTH: usize = 20;

lazy_static! {
    static ref URL_ONLY: Regex = Regex::new(r"^https?://\S+$").unwrap();
    static ref URL: Regex = Regex::new(r"https?://\S+").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref HASHTAG: Regex = Regex::new(r"#\w+").unwrap();
    static ref MENTION: Regex = Regex::new(r"@\w+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationProfile {
    General,
    Dispatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Empty,
    TooShort,
    TooLong,
    Repetitive,
    Spam,
    Harmful,
    ErrorMessage,
    UrlOnly,
    RepeatedPhrase,
    Placeholder,
    Punctuation,
    AllCaps,
    TooManyUrls,
}

impl Check {
    pub fn label(self) -> &'static str {
        match self {
            Check::Empty => "empty",
            Check::TooShort => "too_short",
            Check::TooLong => "too_long",
            Check::Repetitive => "repetitive",
            Check::Spam => "spam",
            Check::Harmful => "harmful",
            Check::ErrorMessage => "error_message",
            Check::UrlOnly => "url_only",
            Check::RepeatedPhrase => "repeated_phrase",
            Check::Placeholder => "placeholder",
            Check::Punctuation => "punctuation",
            Check::AllCaps => "all_caps",
            Check::TooManyUrls => "too_many_urls",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub check: Check,
    pub detail: String,
}

impl Rejection {
    fn new(check: Check, detail: impl Into<String>) -> Self {
        Self {
            check,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted,
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted)
    }

    /// `None` exactly when accepted.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Accepted => None,
            ValidationOutcome::Rejected(r) => Some(&r.detail),
        }
    }
}

impl From<Result<(), Rejection>> for ValidationOutcome {
    fn from(result: Result<(), Rejection>) -> Self {
        match result {
            Ok(()) => ValidationOutcome::Accepted,
            Err(rejection) => ValidationOutcome::Rejected(rejection),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStats {
    pub length: usize,
    pub words: usize,
    pub lines: usize,
    pub has_urls: bool,
    pub has_hashtags: bool,
    pub has_mentions: bool,
}

pub struct ContentValidator {
    char_limit: usize,
    min_length: usize,
    repetition_threshold: f64,
    spam: Vec<Regex>,
    harmful: Vec<Regex>,
}

impl ContentValidator {
    pub fn new(char_limit: usize, min_length: usize) -> Result<Self, ConfigError> {
        Self::with_patterns(
            char_limit,
            min_length,
            DEFAULT_SPAM_PATTERNS,
            DEFAULT_HARMFUL_PATTERNS,
        )
    }

    pub fn with_patterns(
        char_limit: usize,
        min_length: usize,
        spam: &[&str],
        harmful: &[&str],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            char_limit,
            min_length,
            repetition_threshold: DEFAULT_REPETITION_THRESHOLD,
            spam: compile(spam)?,
            harmful: compile(harmful)?,
        })
    }

    pub fn check(&self, profile: ValidationProfile, text: &str) -> ValidationOutcome {
        match profile {
            ValidationProfile::General => self.validate(text),
            ValidationProfile::Dispatch => self.validate_for_dispatch(text),
        }
    }

    pub fn validate(&self, text: &str) -> ValidationOutcome {
        self.general_checks(text).into()
    }

    // stricter gate for model output, right before publishing
    pub fn validate_for_dispatch(&self, text: &str) -> ValidationOutcome {
        self.dispatch_checks(text).into()
    }

    fn general_checks(&self, text: &str) -> Result<(), Rejection> {
        let trimmed = self.check_length(text)?;

        if is_repetitive(trimmed, self.repetition_threshold) {
            return Err(Rejection::new(
                Check::Repetitive,
                "Content appears to be repetitive or low quality",
            ));
        }
        if let Some(found) = first_match(&self.spam, trimmed) {
            return Err(Rejection::new(
                Check::Spam,
                format!("Content contains spam-like patterns: {found}"),
            ));
        }
        if let Some(found) = first_match(&self.harmful, trimmed) {
            return Err(Rejection::new(
                Check::Harmful,
                format!("Content contains potentially harmful language: {found}"),
            ));
        }
        let lower = trimmed.to_lowercase();
        if ERROR_INDICATORS.iter().any(|i| lower.contains(i)) {
            return Err(Rejection::new(
                Check::ErrorMessage,
                "Content appears to be an error message",
            ));
        }
        if URL_ONLY.is_match(trimmed) {
            return Err(Rejection::new(
                Check::UrlOnly,
                "Content is just a URL without context",
            ));
        }
        Ok(())
    }

    fn dispatch_checks(&self, text: &str) -> Result<(), Rejection> {
        let trimmed = self.check_length(text)?;
        let lower = trimmed.to_lowercase();

        if let Some(phrase) = repeated_phrase(&lower) {
            return Err(Rejection::new(
                Check::RepeatedPhrase,
                format!("Content contains repetitive patterns: \"{phrase}\""),
            ));
        }
        if let Some(placeholder) = PLACEHOLDERS.iter().find(|p| lower.contains(*p)) {
            return Err(Rejection::new(
                Check::Placeholder,
                format!("Content contains placeholder text: {placeholder}"),
            ));
        }
        let exclamations = trimmed.matches('!').count();
        let questions = trimmed.matches('?').count();
        if exclamations > MAX_EXCLAMATIONS || questions > MAX_QUESTIONS {
            return Err(Rejection::new(
                Check::Punctuation,
                "Content contains excessive punctuation",
            ));
        }
        if trimmed.chars().count() > ALL_CAPS_MIN_LENGTH && is_all_caps(trimmed) {
            return Err(Rejection::new(Check::AllCaps, "Content is all caps"));
        }
        let urls = URL.find_iter(trimmed).count();
        if urls > MAX_URLS {
            return Err(Rejection::new(
                Check::TooManyUrls,
                format!("Content contains too many URLs ({urls}, max {MAX_URLS})"),
            ));
        }
        Ok(())
    }

    // Stages shared by both profiles; yields the trimmed text
    fn check_length<'a>(&self, text: &'a str) -> Result<&'a str, Rejection> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Rejection::new(
                Check::Empty,
                "Content is empty or whitespace only",
            ));
        }
        let length = trimmed.chars().count();
        if length < self.min_length {
            return Err(Rejection::new(
                Check::TooShort,
                format!(
                    "Content too short ({length} chars, minimum {})",
                    self.min_length
                ),
            ));
        }
        if length > self.char_limit {
            return Err(Rejection::new(
                Check::TooLong,
                format!(
                    "Content exceeds limit ({length} chars, max {})",
                    self.char_limit
                ),
            ));
        }
        Ok(trimmed)
    }
}

fn compile(patterns: &[&str]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(ConfigError::from)
        })
        .collect()
}

fn first_match<'a>(patterns: &[Regex], text: &'a str) -> Option<&'a str> {
    patterns
        .iter()
        .find_map(|p| p.find(text))
        .map(|m| m.as_str())
}

// Share of the most frequent alphanumeric char; no alphanumerics at all counts as repetitive
fn is_repetitive(text: &str, threshold: f64) -> bool {
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in text.chars().filter(|c| c.is_alphanumeric()) {
        *counts.entry(c).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();
    let Some(most_common) = counts.values().max() else {
        return true;
    };
    (*most_common as f64 / total as f64) > threshold
}

// First 3-word phrase seen more than MAX_PHRASE_REPEATS times
fn repeated_phrase(lower: &str) -> Option<String> {
    let words: Vec<&str> = lower.split_whitespace().collect();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for window in words.windows(3) {
        let phrase = window.join(" ");
        let count = seen.entry(phrase.clone()).or_insert(0);
        *count += 1;
        if *count > MAX_PHRASE_REPEATS {
            return Some(phrase);
        }
    }
    None
}

fn is_all_caps(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

/// Normalize generated text: trim, collapse whitespace, drop wrapping quotes
/// and known preambles. Runs to a fixed point, so it is idempotent.
pub fn sanitize(text: &str) -> String {
    let mut current = collapse_whitespace(text);
    loop {
        let next = strip_preamble(strip_quotes(&current));
        if next == current {
            return current;
        }
        current = next.to_string();
    }
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return text[1..text.len() - 1].trim();
        }
    }
    text
}

fn strip_preamble(text: &str) -> &str {
    for preamble in PREAMBLES {
        let head = text.get(..preamble.len());
        if head.is_some_and(|h| h.to_lowercase() == *preamble) {
            return text[preamble.len()..].trim();
        }
    }
    text
}

pub fn content_stats(text: &str) -> ContentStats {
    ContentStats {
        length: text.chars().count(),
        words: text.split_whitespace().count(),
        lines: text.lines().count(),
        has_urls: URL.is_match(text),
        has_hashtags: HASHTAG.is_match(text),
        has_mentions: MENTION.is_match(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ContentValidator {
        ContentValidator::new(280, 10).unwrap()
    }

    fn rejected_by(outcome: ValidationOutcome) -> Check {
        match outcome {
            ValidationOutcome::Rejected(r) => r.check,
            ValidationOutcome::Accepted => panic!("expected a rejection"),
        }
    }

    #[test]
    fn over_limit_is_rejected_with_lengths() {
        let text = "A".repeat(300);
        for profile in [ValidationProfile::General, ValidationProfile::Dispatch] {
            let outcome = validator().check(profile, &text);
            assert_eq!(
                outcome.reason(),
                Some("Content exceeds limit (300 chars, max 280)")
            );
        }
    }

    #[test]
    fn empty_and_whitespace_are_rejected_first() {
        let v = validator();
        assert_eq!(rejected_by(v.validate("")), Check::Empty);
        assert_eq!(rejected_by(v.validate("   \n\t")), Check::Empty);
        assert_eq!(rejected_by(v.validate_for_dispatch("  ")), Check::Empty);
    }

    #[test]
    fn short_content_is_rejected_regardless_of_other_content() {
        let v = validator();
        for text in ["short", "!!!!!!", "buy now", "error:"] {
            let outcome = v.validate(text);
            assert_eq!(rejected_by(outcome.clone()), Check::TooShort, "{text}");
            assert!(outcome.reason().unwrap().contains("minimum 10"));
        }
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let v = ContentValidator::new(12, 1).unwrap();
        // 12 chars, 24+ bytes
        assert_eq!(rejected_by(v.validate("äöü äöü und so")), Check::TooLong);
        assert!(v.validate("héllo wörld!").is_accepted());
    }

    #[test]
    fn dominant_character_is_repetitive() {
        let v = validator();
        assert_eq!(rejected_by(v.validate("aaaaaaaaab and")), Check::Repetitive);
        assert_eq!(rejected_by(v.validate("zzzz zzzz zzzz xy")), Check::Repetitive);
        assert_eq!(rejected_by(v.validate("... --- ... !!!")), Check::Repetitive);
    }

    #[test]
    fn spam_reason_names_matched_text() {
        let v = validator();
        let outcome = v.validate("You should Check Out my new page");
        assert_eq!(
            outcome.reason(),
            Some("Content contains spam-like patterns: Check Out")
        );
        assert_eq!(rejected_by(v.validate("Free NFT drop tonight only")), Check::Spam);
        assert_eq!(
            rejected_by(v.validate("see https://bit.ly/3abc for more")),
            Check::Spam
        );
    }

    #[test]
    fn harmful_language_is_rejected_after_spam() {
        let v = validator();
        let outcome = v.validate("I really hate mondays so much");
        assert_eq!(
            outcome.reason(),
            Some("Content contains potentially harmful language: hate")
        );
        // "die" only as a whole word
        assert!(v.validate("The diet starts again tomorrow").is_accepted());
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let v = ContentValidator::with_patterns(280, 10, &[r"\bgiveaway\b"], &[]).unwrap();
        assert_eq!(rejected_by(v.validate("Huge GIVEAWAY this weekend")), Check::Spam);
        assert!(v.validate("I hate waiting for the bus").is_accepted());
        assert!(ContentValidator::with_patterns(280, 10, &["("], &[]).is_err());
    }

    #[test]
    fn error_text_is_rejected() {
        let v = validator();
        for text in [
            "Error: generation failed: connection refused",
            "Traceback (most recent call last)",
            "Sorry, I was unable to write that post",
        ] {
            assert_eq!(rejected_by(v.validate(text)), Check::ErrorMessage, "{text}");
        }
    }

    #[test]
    fn bare_url_is_rejected() {
        let v = validator();
        assert_eq!(
            rejected_by(v.validate("https://example.com/some/long/path")),
            Check::UrlOnly
        );
        assert!(v.validate("Visit my site at https://example.com").is_accepted());
    }

    #[test]
    fn regular_posts_pass_both_profiles() {
        let v = validator();
        for text in [
            "Just a regular post about my day!",
            "This is a normal post about technology",
            "The quick brown fox jumps over the lazy dog multiple times",
            "Short ALL CAPS",
        ] {
            let general = v.validate(text);
            let dispatch = v.validate_for_dispatch(text);
            assert!(general.is_accepted(), "{text}: {:?}", general.reason());
            assert!(dispatch.is_accepted(), "{text}: {:?}", dispatch.reason());
            assert_eq!(general.reason(), None);
        }
    }

    #[test]
    fn repeated_phrase_is_caught_at_dispatch() {
        let outcome = validator().validate_for_dispatch("This is a test test test test test");
        assert_eq!(outcome.clone().reason().map(|r| r.contains("repetitive")), Some(true));
        assert_eq!(rejected_by(outcome), Check::RepeatedPhrase);
    }

    #[test]
    fn dispatch_rules_reject_model_artifacts() {
        let v = validator();
        let cases = [
            ("Lorem ipsum dolor sit amet", Check::Placeholder),
            ("TODO: Write actual content here", Check::Placeholder),
            ("Sample text for testing purposes", Check::Placeholder),
            ("Generated text goes here", Check::Placeholder),
            ("Wow! This is great! So cool! Amazing!", Check::Punctuation),
            ("What? Why? Who? When? Where now", Check::Punctuation),
            ("HELLO EVERYONE THIS IS ALL CAPS", Check::AllCaps),
            (
                "Links: http://a.com and http://b.com and http://c.com",
                Check::TooManyUrls,
            ),
        ];
        for (text, expected) in cases {
            assert_eq!(rejected_by(v.validate_for_dispatch(text)), expected, "{text}");
        }
    }

    #[test]
    fn profile_dispatches_to_matching_rules() {
        let v = validator();
        let text = "Lorem ipsum dolor sit amet";
        assert!(v.check(ValidationProfile::General, text).is_accepted());
        assert!(!v.check(ValidationProfile::Dispatch, text).is_accepted());
    }

    #[test]
    fn sanitize_normalizes_model_output() {
        assert_eq!(sanitize("  hello   world \n again "), "hello world again");
        assert_eq!(sanitize("\"quoted post\""), "quoted post");
        assert_eq!(sanitize("'single quoted'"), "single quoted");
        assert_eq!(sanitize("Here's a post: Sunny day"), "Sunny day");
        assert_eq!(sanitize("GENERATED POST:   Rainy day"), "Rainy day");
        assert_eq!(sanitize("\"mismatched'"), "\"mismatched'");
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("\""), "\"");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "plain",
            "\"'nested quotes'\"",
            "Here's a post: \"Post: hello\"",
            "\"Here is a post:  'spaced   out'  \"",
            "post: post: post:",
            "'\"'",
            "Here’s a post:    ümlaut  ",
            "\t\"  \"  ",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "input {sample:?}");
        }
    }

    #[test]
    fn stats_describe_content() {
        let stats = content_stats("Hello @friend #rust\nsee https://example.com");
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.words, 5);
        assert!(stats.has_urls && stats.has_hashtags && stats.has_mentions);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        // model-like output: optional wrapping quotes and preambles around mixed whitespace
        fn generated_text() -> impl Strategy<Value = String> {
            let head = prop::sample::select(vec![
                "",
                "\"",
                "'",
                "Here's a post:",
                "HERE’S A POST: \"",
                "post: 'post:",
                " \u{3000}",
            ]);
            let tail = prop::sample::select(vec!["", "\"", "'", "\n\t", "\u{a0}", "' \""]);
            (
                head,
                "[a-zA-Z0-9 .:!?'\"\t\n\u{a0}\u{2003}\u{3000}éß日]{0,60}",
                tail,
            )
                .prop_map(|(head, body, tail)| format!("{head}{body}{tail}"))
        }

        proptest! {
            #[test]
            fn sanitize_is_idempotent_for_generated_text(text in generated_text()) {
                let once = sanitize(&text);
                prop_assert_eq!(sanitize(&once), once);
            }

            #[test]
            fn sanitize_is_idempotent_for_any_string(text in any::<String>()) {
                let once = sanitize(&text);
                prop_assert_eq!(sanitize(&once), once);
            }

            #[test]
            fn short_text_is_rejected_by_both_profiles(
                text in "\\PC{0,9}",
                pad in "[ \t\n\u{a0}]{0,4}",
            ) {
                let v = validator();
                let padded = format!("{pad}{text}{pad}");
                let expected = if padded.trim().is_empty() {
                    Check::Empty
                } else {
                    Check::TooShort
                };
                for profile in [ValidationProfile::General, ValidationProfile::Dispatch] {
                    prop_assert_eq!(rejected_by(v.check(profile, &padded)), expected);
                }
            }

            #[test]
            fn long_text_is_rejected_by_both_profiles(body in "\\PC{279,400}") {
                let v = validator();
                let text = format!("x{body}x");
                for profile in [ValidationProfile::General, ValidationProfile::Dispatch] {
                    prop_assert_eq!(rejected_by(v.check(profile, &text)), Check::TooLong);
                }
            }
        }
    }
}
