//! Weighted confidence scoring of a candidate against request metadata.
//!
//! Component weights: ISBN 50, title 25, author 15, year 5, language 5.
//! A field missing on either side contributes nothing; it is never a penalty.

use std::collections::HashSet;

use crate::request::BookRequest;
use crate::source::BookCandidate;

use super::types::MatchResult;

const ISBN_POINTS: f32 = 50.0;
const TITLE_POINTS: f32 = 25.0;
const AUTHOR_POINTS: f32 = 15.0;
const YEAR_POINTS: f32 = 5.0;
const LANGUAGE_POINTS: f32 = 5.0;

/// Score a candidate against a request. Pure and deterministic.
pub fn calculate_confidence(candidate: &BookCandidate, request: &BookRequest) -> MatchResult {
    let mut total = 0.0f32;

    if isbn_matches(candidate, request) {
        total += ISBN_POINTS;
    }

    if let Some(ref title) = candidate.title {
        total += text_similarity(title, &request.title) * TITLE_POINTS;
    }

    if let Some(ref author) = candidate.author {
        let best = request
            .authors
            .iter()
            .map(|a| text_similarity(author, a))
            .fold(0.0f32, f32::max);
        total += best * AUTHOR_POINTS;
    }

    if let (Some(candidate_year), Some(request_year)) = (candidate.year, request.year) {
        if (candidate_year - request_year).abs() <= 1 {
            total += YEAR_POINTS;
        }
    }

    if let (Some(ref cl), Some(ref rl)) = (&candidate.language, &request.language) {
        if cl.eq_ignore_ascii_case(rl) {
            total += LANGUAGE_POINTS;
        }
    }

    MatchResult::from_score(total.round().min(100.0) as u8)
}

fn isbn_matches(candidate: &BookCandidate, request: &BookRequest) -> bool {
    let Some(candidate_isbn) = candidate.isbn.as_deref().map(normalize_isbn) else {
        return false;
    };
    if candidate_isbn.is_empty() {
        return false;
    }

    [request.isbn13.as_deref(), request.isbn10.as_deref()]
        .into_iter()
        .flatten()
        .map(normalize_isbn)
        .any(|isbn| isbn == candidate_isbn)
}

fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Normalized text similarity in [0.0, 1.0].
///
/// Token overlap relative to the reference string, with fuzzy credit for
/// small spelling variations. Case and punctuation insensitive.
pub fn text_similarity(text: &str, reference: &str) -> f32 {
    let text_tokens = tokenize(text);
    let reference_tokens = tokenize(reference);

    if reference_tokens.is_empty() {
        // Degenerate titles like "It" tokenize to nothing; fall back to a
        // whole-string comparison.
        return if normalize(text) == normalize(reference) && !normalize(reference).is_empty() {
            1.0
        } else {
            0.0
        };
    }

    let exact = reference_tokens
        .iter()
        .filter(|t| text_tokens.contains(*t))
        .count();

    let fuzzy = reference_tokens
        .iter()
        .filter(|t| {
            !text_tokens.contains(*t) && text_tokens.iter().any(|c| is_fuzzy_match(t, c))
        })
        .count();

    ((exact as f32 + fuzzy as f32 * 0.8) / reference_tokens.len() as f32).min(1.0)
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn tokenize(text: &str) -> HashSet<String> {
    let stop_words: HashSet<&str> = ["the", "a", "an", "and", "or", "of", "in", "on", "by"]
        .into_iter()
        .collect();

    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_string)
        .filter(|s| s.len() > 1)
        .filter(|s| !stop_words.contains(s.as_str()))
        .collect()
}

/// Small edit distance on words of comparable length, e.g. Herbert/Herbet.
fn is_fuzzy_match(a: &str, b: &str) -> bool {
    if a.len() < 4 || b.len() < 4 {
        return false;
    }
    if (a.len() as i32 - b.len() as i32).abs() > 2 {
        return false;
    }

    let threshold = if a.len() >= 8 { 2 } else { 1 };
    levenshtein_distance(a, b) <= threshold
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate().take(a_len + 1) {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate().take(b_len + 1) {
        *val = j;
    }

    for (i, a_char) in a_chars.iter().enumerate() {
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = if *a_char == *b_char { 0 } else { 1 };
            matrix[i + 1][j + 1] = (matrix[i][j + 1] + 1)
                .min(matrix[i + 1][j] + 1)
                .min(matrix[i][j] + cost);
        }
    }

    matrix[a_len][b_len]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::ConfidenceTier;
    use crate::source::SourceKind;

    fn make_request(title: &str, author: &str) -> BookRequest {
        BookRequest::new(title, vec![author.to_string()])
    }

    fn make_candidate(title: &str, author: &str) -> BookCandidate {
        BookCandidate {
            id: "c1".to_string(),
            source: SourceKind::DirectArchive,
            title: Some(title.to_string()),
            author: Some(author.to_string()),
            isbn: None,
            year: None,
            language: None,
            file_type: Some("epub".to_string()),
            size_bytes: None,
            release_name: None,
            download_url: None,
        }
    }

    #[test]
    fn test_perfect_match_scores_100() {
        let mut request = make_request("The Fellowship of the Ring", "J. R. R. Tolkien");
        request.isbn13 = Some("978-0-618-57494-2".to_string());
        request.year = Some(1954);
        request.language = Some("en".to_string());

        let mut candidate = make_candidate("The Fellowship of the Ring", "J. R. R. Tolkien");
        candidate.isbn = Some("9780618574942".to_string());
        candidate.year = Some(1954);
        candidate.language = Some("EN".to_string());

        let result = calculate_confidence(&candidate, &request);
        assert_eq!(result.score, 100);
        assert_eq!(result.tier, ConfidenceTier::High);
    }

    #[test]
    fn test_score_always_within_bounds() {
        let request = make_request("Dune", "Frank Herbert");
        let candidates = [
            make_candidate("Dune", "Frank Herbert"),
            make_candidate("Something else entirely", "Nobody"),
            make_candidate("", ""),
        ];

        for candidate in &candidates {
            let result = calculate_confidence(candidate, &request);
            assert!(result.score <= 100);
        }
    }

    #[test]
    fn test_title_only_partial_match_is_low_tier() {
        // ~0.7 title similarity and nothing else: expect roughly 17-18 points.
        let request = make_request("the hobbit or there and back again", "");
        let mut candidate = make_candidate("hobbit there back", "");
        candidate.author = None;

        let sim = text_similarity("hobbit there back", &request.title);
        assert!((sim - 0.75).abs() < 0.11, "similarity was {}", sim);

        let result = calculate_confidence(&candidate, &request);
        assert!(
            (17..=19).contains(&result.score),
            "score was {}",
            result.score
        );
        assert_eq!(result.tier, ConfidenceTier::Low);
    }

    #[test]
    fn test_missing_isbn_is_neutral() {
        let request = make_request("Dune", "Frank Herbert");
        let candidate = make_candidate("Dune", "Frank Herbert");

        // Title 25 + author 15, no penalty for the missing ISBN.
        let result = calculate_confidence(&candidate, &request);
        assert_eq!(result.score, 40);
    }

    #[test]
    fn test_isbn_mismatch_scores_zero_for_component() {
        let mut request = make_request("Dune", "Frank Herbert");
        request.isbn13 = Some("9780441013593".to_string());

        let mut candidate = make_candidate("Dune", "Frank Herbert");
        candidate.isbn = Some("9780000000000".to_string());

        let result = calculate_confidence(&candidate, &request);
        assert_eq!(result.score, 40);
    }

    #[test]
    fn test_year_within_one_counts() {
        let mut request = make_request("Dune", "");
        request.year = Some(1965);

        let mut candidate = make_candidate("Dune", "");
        candidate.author = None;
        candidate.year = Some(1966);

        let result = calculate_confidence(&candidate, &request);
        assert_eq!(result.score, 30); // title 25 + year 5

        candidate.year = Some(1967);
        let result = calculate_confidence(&candidate, &request);
        assert_eq!(result.score, 25);
    }

    #[test]
    fn test_language_case_insensitive() {
        let mut request = make_request("Dune", "");
        request.language = Some("EN".to_string());

        let mut candidate = make_candidate("Dune", "");
        candidate.author = None;
        candidate.language = Some("en".to_string());

        let result = calculate_confidence(&candidate, &request);
        assert_eq!(result.score, 30);
    }

    #[test]
    fn test_text_similarity_identical() {
        assert_eq!(text_similarity("Dune Messiah", "Dune Messiah"), 1.0);
        assert_eq!(text_similarity("dune-messiah", "Dune Messiah"), 1.0);
    }

    #[test]
    fn test_text_similarity_disjoint() {
        assert_eq!(text_similarity("Foundation", "Dune Messiah"), 0.0);
    }

    #[test]
    fn test_text_similarity_fuzzy_spelling() {
        let sim = text_similarity("Frank Herbet", "Frank Herbert");
        assert!(sim > 0.85, "fuzzy similarity was {}", sim);
    }

    #[test]
    fn test_text_similarity_degenerate_reference() {
        assert_eq!(text_similarity("It", "It"), 1.0);
        assert_eq!(text_similarity("Us", "It"), 0.0);
    }

    #[test]
    fn test_normalize_isbn() {
        assert_eq!(normalize_isbn("978-0-618-57494-2"), "9780618574942");
        assert_eq!(normalize_isbn("0 14 044926 x"), "014044926X");
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
        assert_eq!(levenshtein_distance("", "abc"), 3);
    }
}
