//! Boundary to the external crawl engine.
//!
//! The engine fetches search result pages, deduplicates posts and writes one
//! CSV per keyword; none of that lives here. This module hands a compiled
//! [`CrawlDirective`] to the engine at the moment of invocation and blocks
//! until the engine is done.
//!
//! [`ProcessEngine`] drives the Scrapy-based Weibo search crawler as a child
//! process, passing the directive as setting overrides:
//!
//! ```text
//! scrapy crawl search -s KEYWORD_LIST=["东南大学 南京大学","%23活动%23"] \
//!     -s START_DATE=2025-10-01 -s END_DATE=2025-10-28 \
//!     -s WEIBO_TYPE=1 -s CONTAIN_TYPE=0 -s REGION=["江苏"]
//! ```

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::models::{CrawlDirective, KeywordDirective};

/// A crawl engine that runs one directive to completion.
pub trait CrawlEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Runs the crawl described by `directive`, blocking the calling thread
    /// until the engine finishes. Returns an error if the engine cannot be
    /// started or ends abnormally.
    fn run(&self, directive: &CrawlDirective) -> Result<()>;
}

/// Renders a directive as the engine's `NAME=value` setting overrides.
///
/// `KEYWORD_LIST` and `REGION` are omitted when empty so the engine keeps its
/// own defaults for them. Conjunctions are joined with a space, which the
/// search endpoint treats as AND.
pub fn engine_settings(directive: &CrawlDirective) -> Vec<(&'static str, String)> {
    let mut settings = Vec::with_capacity(6);

    if !directive.keywords.is_empty() {
        let queries: Vec<String> = directive
            .keywords
            .iter()
            .map(KeywordDirective::query_text)
            .collect();
        settings.push(("KEYWORD_LIST", json_list(&queries)));
    }

    settings.push(("START_DATE", directive.dates.start.clone()));
    settings.push(("END_DATE", directive.dates.end.clone()));
    settings.push(("WEIBO_TYPE", directive.filters.weibo_type.to_string()));
    settings.push(("CONTAIN_TYPE", directive.filters.contain_type.to_string()));

    if !directive.filters.regions.is_empty() {
        let names: Vec<String> = directive
            .filters
            .regions
            .iter()
            .map(|r| r.name.clone())
            .collect();
        settings.push(("REGION", json_list(&names)));
    }

    settings
}

fn json_list(items: &[String]) -> String {
    serde_json::Value::from(items.to_vec()).to_string()
}

/// Runs the crawler as a child process with inherited stdio, so its own
/// progress output shows up in the launcher's console.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    settings_flag: String,
}

impl ProcessEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            settings_flag: config.settings_flag.clone(),
        }
    }

    /// Builds the full command for `directive` without running it.
    pub fn command(&self, directive: &CrawlDirective) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (name, value) in engine_settings(directive) {
            cmd.arg(&self.settings_flag);
            cmd.arg(format!("{}={}", name, value));
        }
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl CrawlEngine for ProcessEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn run(&self, directive: &CrawlDirective) -> Result<()> {
        let mut cmd = self.command(directive);
        debug!(command = ?cmd, "starting crawl engine");

        let status = cmd
            .status()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))?;

        if !status.success() {
            bail!("'{}' exited with {}", self.program, status);
        }

        info!(engine = %self.program, "crawl engine finished");
        Ok(())
    }
}
