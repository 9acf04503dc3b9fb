//! Keyword text parsing and hashtag transport encoding.
//!
//! The keyword field is read line by line. Words on the same line must all
//! appear in a post (AND); separate lines are alternative searches (OR).
//!
//! Weibo topics are written `#topic#`. The search endpoint expects the `#`
//! delimiters percent-encoded, so `#活动#` travels as `%23活动%23`.

use crate::models::{KeywordDirective, KeywordExpression};

/// Escape used in place of a `#` delimiter.
pub const HASHTAG_ESCAPE: &str = "%23";

/// Parses the raw keyword field into an expression.
///
/// Blank lines are dropped. Words are split on any Unicode whitespace, so an
/// ideographic space (U+3000) separates words too. Every token is passed
/// through [`encode_hashtag`].
pub fn parse_expression(raw: &str) -> KeywordExpression {
    let directives = raw
        .lines()
        .filter_map(|line| {
            let mut tokens: Vec<String> = line.split_whitespace().map(encode_hashtag).collect();
            match tokens.len() {
                0 => None,
                1 => tokens.pop().map(KeywordDirective::Single),
                _ => Some(KeywordDirective::All(tokens)),
            }
        })
        .collect();
    KeywordExpression(directives)
}

/// Encodes a `#topic#` token for transport. Other tokens are returned as-is.
///
/// Tokens shorter than three characters (`#`, `##`) are not topics.
pub fn encode_hashtag(token: &str) -> String {
    if token.chars().count() < 3 {
        return token.to_string();
    }
    match token
        .strip_prefix('#')
        .and_then(|rest| rest.strip_suffix('#'))
    {
        Some(inner) => format!("{HASHTAG_ESCAPE}{inner}{HASHTAG_ESCAPE}"),
        None => token.to_string(),
    }
}

/// Restores the `#topic#` form of an encoded token. Inverse of
/// [`encode_hashtag`]; tokens that were never encoded are returned as-is.
pub fn decode_hashtag(token: &str) -> String {
    match token
        .strip_prefix(HASHTAG_ESCAPE)
        .and_then(|rest| rest.strip_suffix(HASHTAG_ESCAPE))
    {
        Some(inner) if !inner.is_empty() => format!("#{inner}#"),
        _ => token.to_string(),
    }
}
