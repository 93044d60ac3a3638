//! Release-name parser - best-effort metadata extraction from release strings.
//!
//! Release names are unstructured ("Title - Author (2021) [EN] [epub]"), so
//! everything here is heuristic and lossy by design. The output only feeds
//! the confidence matcher; parsing never fails, it just leaves fields empty.

use chrono::{Datelike, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Metadata recovered from a release string. All fields best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRelease {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub language: Option<String>,
}

/// Language codes recognized inside bracketed tags.
const LANGUAGE_CODES: &[&str] = &[
    "EN", "DE", "FR", "ES", "IT", "NL", "PT", "RU", "PL", "SV", "DA", "NO", "FI", "CS", "HU",
    "RO", "TR", "JA", "ZH", "KO", "ENG", "GER", "FRE", "SPA", "ITA", "DUT", "POR", "RUS",
];

/// Parse a free-text release string into candidate metadata.
pub fn parse_release_name(raw: &str) -> ParsedRelease {
    let mut text = raw.to_string();

    let language = extract_language(&mut text);
    let year = extract_year(&mut text);
    strip_tag_groups(&mut text);
    let (title, author) = split_title_author(&text);

    ParsedRelease {
        title,
        author,
        year,
        language,
    }
}

/// Find and remove the first bracketed 2-3 letter token from the known
/// language-code set. Returns the code uppercased.
fn extract_language(text: &mut String) -> Option<String> {
    let re = Regex::new(r"[\[(]\s*([A-Za-z]{2,3})\s*[\])]").expect("invalid language regex");

    for caps in re.captures_iter(text) {
        let code = caps.get(1)?.as_str().to_uppercase();
        if LANGUAGE_CODES.contains(&code.as_str()) {
            let full = caps.get(0)?;
            let range = full.start()..full.end();
            text.replace_range(range, " ");
            return Some(code);
        }
    }
    None
}

/// Find and remove a 4-digit token bounded by separators whose value is a
/// plausible publication year.
fn extract_year(text: &mut String) -> Option<i32> {
    let re = Regex::new(r"(?:^|[^0-9])([0-9]{4})(?:[^0-9]|$)").expect("invalid year regex");
    let max_year = Utc::now().year() + 1;

    for caps in re.captures_iter(text) {
        let group = caps.get(1)?;
        let Ok(year) = group.as_str().parse::<i32>() else {
            continue;
        };
        if (1900..=max_year).contains(&year) {
            let range = group.start()..group.end();
            text.replace_range(range, " ");
            return Some(year);
        }
    }
    None
}

/// Remove remaining bracketed/parenthetical tag groups (group names, codecs,
/// empty shells left by year/language removal).
fn strip_tag_groups(text: &mut String) {
    let brackets = Regex::new(r"\[[^\]]*\]").expect("invalid bracket regex");
    let parens = Regex::new(r"\([^)]*\)").expect("invalid paren regex");

    *text = brackets.replace_all(text, " ").into_owned();
    *text = parens.replace_all(text, " ").into_owned();
}

fn split_title_author(text: &str) -> (Option<String>, Option<String>) {
    let segments: Vec<String> = text
        .split(" - ")
        .map(clean_segment)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect();

    match segments.len() {
        0 => (None, None),
        1 => (Some(segments[0].clone()), None),
        _ => {
            let title = segments
                .iter()
                .find(|s| s.len() >= 3)
                .or_else(|| segments.first())
                .cloned();
            let last = segments.last().filter(|s| Some(*s) != title.as_ref());
            let author = last.filter(|s| looks_like_person_name(s)).cloned();
            (title, author)
        }
    }
}

/// Collapse dots/underscores into spaces and squeeze whitespace.
fn clean_segment(segment: &str) -> String {
    let replaced: String = segment
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A personal name: has a space, no digits, and is reasonably short.
fn looks_like_person_name(segment: &str) -> bool {
    segment.contains(' ')
        && segment.len() <= 40
        && !segment.chars().any(|c| c.is_ascii_digit())
}
