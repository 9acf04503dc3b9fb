//! Core data models shared by the compiler, the job controller and the server.
//!
//! These types describe one crawl job from the raw form fields through the
//! compiled, engine-ready directive to the outcome reported back to the
//! operator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use uuid::Uuid;

/// Raw form fields decoded from the `POST /run` body.
///
/// Every field defaults to an empty string when the browser omits it.
#[derive(Debug, Clone, Default)]
pub struct FormSubmission {
    /// Multi-line keyword text. One search per line, space-separated words
    /// within a line must co-occur.
    pub keywords: String,
    pub start_date: String,
    pub end_date: String,
    /// Content category code as submitted (`"0"`..`"6"`).
    pub weibo_type: String,
    /// Media-presence code as submitted (`"0"`..`"4"`).
    pub contain_type: String,
    /// Comma-separated province names, or the "all regions" sentinel.
    pub region: String,
}

impl FormSubmission {
    /// Builds a submission from decoded `name=value` pairs. When a field is
    /// repeated the first value wins; unknown names are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        let mut seen = HashSet::new();
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "keywords" => &mut form.keywords,
                "start_date" => &mut form.start_date,
                "end_date" => &mut form.end_date,
                "weibo_type" => &mut form.weibo_type,
                "contain_type" => &mut form.contain_type,
                "region" => &mut form.region,
                _ => continue,
            };
            if seen.insert(name) {
                *slot = value;
            }
        }
        form
    }
}

/// One line of the keyword field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KeywordDirective {
    /// A single search token.
    Single(String),
    /// Tokens that must all appear in the same post (AND).
    All(Vec<String>),
}

impl KeywordDirective {
    /// Renders the directive in the engine's query syntax, where a space
    /// between words means AND.
    pub fn query_text(&self) -> String {
        match self {
            KeywordDirective::Single(token) => token.clone(),
            KeywordDirective::All(tokens) => tokens.join(" "),
        }
    }
}

/// Ordered list of keyword directives; any one of them may match (OR).
///
/// An empty expression tells the engine to keep its built-in keyword list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeywordExpression(pub Vec<KeywordDirective>);

impl KeywordExpression {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeywordDirective> {
        self.0.iter()
    }

    /// The first directive when it is a plain keyword rather than a
    /// conjunction. Used to guess which output directory belongs to this run.
    pub fn leading_literal(&self) -> Option<&str> {
        match self.0.first() {
            Some(KeywordDirective::Single(token)) => Some(token),
            _ => None,
        }
    }
}

/// Inclusive publication date window, as `YYYY-MM-DD` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Filter codes and region names exactly as the operator selected them.
///
/// `regions` never contains the "all regions" sentinel; an empty vector means
/// no geographic filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub weibo_type: i64,
    pub contain_type: i64,
    pub regions: Vec<String>,
}

/// A province-level region in the engine's representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRegion {
    pub name: String,
    /// Administrative code, `None` when the name is not in the lookup table.
    pub code: Option<u32>,
}

/// Filter selection after translation by a [`FilterLookup`](crate::regions::FilterLookup).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedFilters {
    pub weibo_type: i64,
    pub contain_type: i64,
    /// Empty exactly when no geographic filter applies.
    pub regions: Vec<ResolvedRegion>,
}

/// Fully compiled, engine-ready description of one crawl job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlDirective {
    pub keywords: KeywordExpression,
    pub dates: DateRange,
    pub filters: ResolvedFilters,
}

/// Transient state of the one job currently running.
#[derive(Debug, Clone)]
pub struct JobSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub directive: CrawlDirective,
}

impl JobSession {
    pub fn start(directive: CrawlDirective) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            directive,
        }
    }
}

/// Result of a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Output file (or directory) found after the crawl, if any.
    pub artifact: Option<PathBuf>,
}
