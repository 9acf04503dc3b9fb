use anyhow::{Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::compiler::{ALL_REGIONS, DEFAULT_END_DATE, DEFAULT_START_DATE};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Open the form in the default browser once the server is listening.
    #[serde(default = "default_true")]
    pub open_browser: bool,
    /// Delay between sending the completion page and closing the listener.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Config {
    /// Directory the engine writes its results into. A relative
    /// `output.root` is taken relative to `engine.working_dir` when one is
    /// set, since that is where the crawler runs.
    pub fn output_root(&self) -> PathBuf {
        match &self.engine.working_dir {
            Some(dir) if self.output.root.is_relative() => dir.join(&self.output.root),
            _ => self.output.root.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open_browser: true,
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.bind_addr())
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}
fn default_shutdown_grace_ms() -> u64 {
    500
}

/// How to start the external crawl engine.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Flag preceding each `NAME=value` setting override.
    #[serde(default = "default_settings_flag")]
    pub settings_flag: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            working_dir: None,
            settings_flag: default_settings_flag(),
        }
    }
}

fn default_program() -> String {
    "scrapy".to_string()
}
fn default_args() -> Vec<String> {
    vec!["crawl".to_string(), "search".to_string()]
}
fn default_settings_flag() -> String {
    "-s".to_string()
}

/// Where the engine writes its results.
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// One subdirectory per keyword is created under this root.
    #[serde(default = "default_output_root")]
    pub root: PathBuf,
    #[serde(default = "default_artifact_glob")]
    pub artifact_glob: String,
    /// Open the discovered artifact with the system handler after a job.
    #[serde(default = "default_true")]
    pub open_artifact: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            artifact_glob: default_artifact_glob(),
            open_artifact: true,
        }
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("结果文件")
}
fn default_artifact_glob() -> String {
    "*.csv".to_string()
}

/// Fallbacks applied while compiling a form.
#[derive(Debug, Deserialize, Clone)]
pub struct DefaultsConfig {
    #[serde(default = "default_start_date")]
    pub start_date: String,
    #[serde(default = "default_end_date")]
    pub end_date: String,
    #[serde(default = "default_region_sentinel")]
    pub region_sentinel: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            end_date: default_end_date(),
            region_sentinel: default_region_sentinel(),
        }
    }
}

fn default_start_date() -> String {
    DEFAULT_START_DATE.to_string()
}
fn default_end_date() -> String {
    DEFAULT_END_DATE.to_string()
}
fn default_region_sentinel() -> String {
    ALL_REGIONS.to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the built-in defaults so
/// the binary works when launched without any setup.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    info!(path = %path.display(), "no config file, using built-in defaults");
    Ok(Config::default())
}

fn validate(config: &Config) -> Result<()> {
    if config.server.host.trim().is_empty() {
        anyhow::bail!("server.host must not be empty");
    }

    if config.engine.program.trim().is_empty() {
        anyhow::bail!("engine.program must not be empty");
    }

    Glob::new(&config.output.artifact_glob).with_context(|| {
        format!(
            "output.artifact_glob is not a valid glob: '{}'",
            config.output.artifact_glob
        )
    })?;

    if config.defaults.region_sentinel.trim().is_empty() {
        anyhow::bail!("defaults.region_sentinel must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_addr(), "localhost:8080");
        assert!(config.server.open_browser);
        assert_eq!(config.server.shutdown_grace_ms, 500);
        assert_eq!(config.engine.program, "scrapy");
        assert_eq!(config.engine.args, vec!["crawl", "search"]);
        assert_eq!(config.output.root, PathBuf::from("结果文件"));
        assert_eq!(config.output.artifact_glob, "*.csv");
        assert_eq!(config.defaults.start_date, DEFAULT_START_DATE);
        assert_eq!(config.defaults.end_date, DEFAULT_END_DATE);
        assert_eq!(config.defaults.region_sentinel, ALL_REGIONS);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[server]
port = 9090

[engine]
working_dir = "/opt/weiboSearch"
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(
            config.engine.working_dir,
            Some(PathBuf::from("/opt/weiboSearch"))
        );
        assert_eq!(config.engine.settings_flag, "-s");
    }

    #[test]
    fn relative_output_root_follows_working_dir() {
        let mut config = Config::default();
        assert_eq!(config.output_root(), PathBuf::from("结果文件"));

        config.engine.working_dir = Some(PathBuf::from("/opt/weiboSearch"));
        assert_eq!(
            config.output_root(),
            PathBuf::from("/opt/weiboSearch/结果文件")
        );

        config.output.root = PathBuf::from("/data/results");
        assert_eq!(config.output_root(), PathBuf::from("/data/results"));
    }

    #[test]
    fn load_rejects_bad_glob() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("launch.toml");
        std::fs::write(&path, "[output]\nartifact_glob = \"[\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("artifact_glob"), "{err:#}");
    }

    #[test]
    fn load_rejects_empty_program() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("launch.toml");
        std::fs::write(&path, "[engine]\nprogram = \"\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
