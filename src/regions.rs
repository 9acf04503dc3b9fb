//! Translation of filter selections into the crawl engine's representation.
//!
//! The mapping tables belong to the crawl engine. This module only defines
//! the [`FilterLookup`] seam, a built-in table mirroring the engine's
//! province list, and [`resolve`], which calls the lookup with normalized
//! input and skips the region lookup entirely when no geographic filter is
//! wanted.

use tracing::{debug, warn};

use crate::models::{FilterSelection, ResolvedFilters, ResolvedRegion};

/// Highest content-category code the engine understands (0 = all posts,
/// 6 = opinion posts).
pub const MAX_WEIBO_TYPE: i64 = 6;
/// Highest media-presence code the engine understands (0 = no filter,
/// 4 = contains a short link).
pub const MAX_CONTAIN_TYPE: i64 = 4;

/// Lookup table owned by the crawl engine.
pub trait FilterLookup: Send + Sync {
    /// Engine code for a content category selection.
    fn category(&self, code: i64) -> i64;

    /// Engine code for a media-presence selection.
    fn media(&self, code: i64) -> i64;

    /// Engine representation of one region name.
    fn region(&self, name: &str) -> ResolvedRegion;
}

/// Resolves a selection through `lookup`.
///
/// The region lookup is not consulted when the selection has no regions, so
/// the engine's own default region behaviour is preserved.
pub fn resolve(lookup: &dyn FilterLookup, selection: &FilterSelection) -> ResolvedFilters {
    let regions = if selection.regions.is_empty() {
        Vec::new()
    } else {
        selection
            .regions
            .iter()
            .map(|name| lookup.region(name))
            .collect()
    };

    ResolvedFilters {
        weibo_type: lookup.category(selection.weibo_type),
        contain_type: lookup.media(selection.contain_type),
        regions,
    }
}

/// Province-level regions accepted by the Weibo advanced search, with their
/// administrative division codes.
const PROVINCES: &[(&str, u32)] = &[
    ("北京", 11),
    ("天津", 12),
    ("河北", 13),
    ("山西", 14),
    ("内蒙古", 15),
    ("辽宁", 21),
    ("吉林", 22),
    ("黑龙江", 23),
    ("上海", 31),
    ("江苏", 32),
    ("浙江", 33),
    ("安徽", 34),
    ("福建", 35),
    ("江西", 36),
    ("山东", 37),
    ("河南", 41),
    ("湖北", 42),
    ("湖南", 43),
    ("广东", 44),
    ("广西", 45),
    ("海南", 46),
    ("重庆", 50),
    ("四川", 51),
    ("贵州", 52),
    ("云南", 53),
    ("西藏", 54),
    ("陕西", 61),
    ("甘肃", 62),
    ("青海", 63),
    ("宁夏", 64),
    ("新疆", 65),
    ("台湾", 71),
    ("香港", 81),
    ("澳门", 82),
    ("其他", 100),
    ("海外", 400),
];

/// Administrative suffixes the engine does not accept. Longest first.
const SUFFIXES: &[&str] = &[
    "特别行政区",
    "维吾尔自治区",
    "壮族自治区",
    "回族自治区",
    "自治区",
    "省",
    "市",
];

/// Built-in [`FilterLookup`] matching the Weibo search crawler.
///
/// Category and media codes are forwarded unchanged; the engine decides what
/// an unknown code means.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeiboRegionTable;

impl WeiboRegionTable {
    /// Strips an administrative suffix, e.g. `安徽省` → `安徽`.
    fn normalize(name: &str) -> &str {
        for suffix in SUFFIXES {
            if let Some(stem) = name.strip_suffix(suffix) {
                if !stem.is_empty() {
                    return stem;
                }
            }
        }
        name
    }
}

impl FilterLookup for WeiboRegionTable {
    fn category(&self, code: i64) -> i64 {
        if !(0..=MAX_WEIBO_TYPE).contains(&code) {
            debug!(code, "weibo_type outside known range, forwarding unchanged");
        }
        code
    }

    fn media(&self, code: i64) -> i64 {
        if !(0..=MAX_CONTAIN_TYPE).contains(&code) {
            debug!(code, "contain_type outside known range, forwarding unchanged");
        }
        code
    }

    fn region(&self, name: &str) -> ResolvedRegion {
        let stem = Self::normalize(name);
        match PROVINCES.iter().find(|(province, _)| *province == stem) {
            Some((province, code)) => ResolvedRegion {
                name: province.to_string(),
                code: Some(*code),
            },
            None => {
                warn!(region = name, "unknown region, forwarding by name");
                ResolvedRegion {
                    name: name.to_string(),
                    code: None,
                }
            }
        }
    }
}
