use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::trace;

use crate::models::RepoRecord;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^<]+?>").unwrap();
    static ref ENTITY: Regex = Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap();
    // handles like @alice.bsky.social
    static ref HANDLE: Regex = Regex::new(
        r"@\w+\.([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?"
    )
    .unwrap();
    static ref SPECIAL: Regex = Regex::new(r"[^\w\s.,!?;:]").unwrap();
    static ref SHORTCODE: Regex = Regex::new(r":\w+:").unwrap();
}

fn decode_entity(caps: &Captures) -> String {
    let name = &caps[1];
    let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => None,
        }
    };
    match decoded {
        Some(c) => c.to_string(),
        None => caps[0].to_string(),
    }
}

/// Reduce a source post to plain words and basic punctuation.
pub fn clean_content(content: &str) -> String {
    let cleaned = HTML_TAG.replace_all(content, "");
    let cleaned = ENTITY.replace_all(&cleaned, decode_entity);
    let cleaned = HANDLE.replace_all(&cleaned, "");
    let cleaned = SPECIAL.replace_all(&cleaned, "");
    let cleaned = SHORTCODE.replace_all(&cleaned, "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    trace!(original = content, cleaned = %cleaned, "Cleaned post");
    cleaned
}

/// Cleaned, non-empty texts of the given records.
pub fn extract_texts(records: &[RepoRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| {
            let text = clean_content(&r.value.text);
            if text.is_empty() {
                trace!(uri = %r.uri, "Dropping post with no usable text");
                return None;
            }
            Some(text)
        })
        .collect()
}
