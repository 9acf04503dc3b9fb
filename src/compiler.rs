//! Form-to-directive compilation.
//!
//! [`compile`] turns the raw fields of one form submission into a
//! [`CrawlDirective`]. It is lenient: missing fields fall back to
//! defaults, dates are forwarded without format checks and filter codes are
//! not range-checked. Only a filter code that is not an integer is rejected.

use chrono::NaiveDate;
use tracing::warn;

use crate::config::DefaultsConfig;
use crate::error::ValidationError;
use crate::keywords::parse_expression;
use crate::models::{CrawlDirective, DateRange, FilterSelection, FormSubmission};
use crate::regions::{resolve, FilterLookup};

/// Start date used when the form leaves it empty.
pub const DEFAULT_START_DATE: &str = "2025-10-01";
/// End date used when the form leaves it empty.
pub const DEFAULT_END_DATE: &str = "2025-10-28";
/// Region value meaning "do not filter by region".
pub const ALL_REGIONS: &str = "全部";

/// Compiles a form submission into an engine-ready directive.
pub fn compile(
    form: &FormSubmission,
    defaults: &DefaultsConfig,
    lookup: &dyn FilterLookup,
) -> Result<CrawlDirective, ValidationError> {
    let keywords = parse_expression(&form.keywords);

    let dates = DateRange {
        start: date_or(&form.start_date, &defaults.start_date, "start_date"),
        end: date_or(&form.end_date, &defaults.end_date, "end_date"),
    };

    let selection = FilterSelection {
        weibo_type: parse_code(&form.weibo_type, "weibo_type")?,
        contain_type: parse_code(&form.contain_type, "contain_type")?,
        regions: parse_regions(&form.region, &defaults.region_sentinel),
    };

    Ok(CrawlDirective {
        keywords,
        dates,
        filters: resolve(lookup, &selection),
    })
}

fn date_or(value: &str, fallback: &str, field: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return fallback.to_string();
    }
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        warn!(field, value, "date is not YYYY-MM-DD, passing it to the engine as-is");
    }
    value.to_string()
}

/// Parses a filter code. Blank means `0`.
fn parse_code(value: &str, field: &'static str) -> Result<i64, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<i64>()
        .map_err(|_| ValidationError::NotAnInteger {
            field,
            value: value.to_string(),
        })
}

/// Splits the region field on ASCII and full-width commas.
///
/// Returns an empty list (no geographic filter) when nothing remains or when
/// any piece is the sentinel: "all regions" combined with specific provinces
/// is still all regions. The sentinel comparison ignores case.
pub fn parse_regions(raw: &str, sentinel: &str) -> Vec<String> {
    let sentinel = sentinel.trim().to_lowercase();
    let pieces: Vec<String> = raw
        .split(&[',', '，'][..])
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect();

    if pieces.iter().any(|piece| piece.to_lowercase() == sentinel) {
        return Vec::new();
    }
    pieces
}
