//! Best-effort discovery of the file a finished crawl produced.
//!
//! The engine writes `<root>/<keyword>/<keyword>.csv`. Directory names are
//! chosen by the engine, so discovery is a heuristic that may find nothing;
//! that is reported as `None`, never as an error.

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::{Config, OutputConfig};
use crate::keywords::decode_hashtag;
use crate::models::KeywordExpression;

/// Shown to the operator when no output could be located.
pub const NOT_FOUND_ADVISORY: &str = "未找到结果文件，请检查爬虫输出目录。";

#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    root: PathBuf,
    matcher: GlobMatcher,
}

impl ArtifactLocator {
    pub fn new(config: &OutputConfig) -> Result<Self> {
        let matcher = Glob::new(&config.artifact_glob)
            .with_context(|| format!("Invalid artifact glob: '{}'", config.artifact_glob))?
            .compile_matcher();
        Ok(Self {
            root: config.root.clone(),
            matcher,
        })
    }

    /// Locator over [`Config::output_root`], so output is looked up where the
    /// engine actually wrote it.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut locator = Self::new(&config.output)?;
        locator.root = config.output_root();
        Ok(locator)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locates the output of a run over `keywords`.
    ///
    /// Output directories are enumerated in file-name order. When the
    /// expression starts with a plain keyword, the first directory whose name
    /// contains it (hashtags restored to `#topic#`) wins; otherwise, or when
    /// none matches, the first directory. Within that directory the first
    /// file matching the artifact glob is returned, or the directory itself.
    pub fn discover(&self, keywords: &KeywordExpression) -> Option<PathBuf> {
        let dirs = sorted_entries(&self.root, |entry| entry.file_type().is_dir());

        let preferred = keywords.leading_literal().map(decode_hashtag).and_then(|keyword| {
            dirs.iter()
                .find(|dir| file_name(dir).contains(keyword.as_str()))
        });
        let chosen = preferred.or_else(|| dirs.first())?;

        let artifact = sorted_entries(chosen, |entry| {
            entry.file_type().is_file() && self.matcher.is_match(entry.file_name())
        })
        .into_iter()
        .next();

        Some(artifact.unwrap_or_else(|| chosen.clone()))
    }
}

/// Immediate children of `dir` accepted by `keep`, sorted by file name.
/// Unreadable or missing directories yield nothing.
fn sorted_entries(dir: &Path, keep: impl Fn(&walkdir::DirEntry) -> bool) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| keep(entry))
        .map(|entry| entry.into_path())
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Opens a discovered artifact with the system's default handler.
pub fn open_artifact(path: &Path) {
    match open::that(path) {
        Ok(()) => info!(path = %path.display(), "opened crawl output"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not open crawl output"),
    }
}
