//! # weibo-launch CLI
//!
//! Starts the local search form, runs one crawl job and exits. Running the
//! binary without arguments is the same as `weibo-launch serve`, so it works
//! when double-clicked.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `weibo-launch serve` | Serve the form on `localhost:8080` and run one job (default) |
//! | `weibo-launch compile` | Print the directive a form would compile to, without crawling |
//!
//! ## Examples
//!
//! ```bash
//! # Serve with the defaults (no config file needed)
//! weibo-launch
//!
//! # Serve on another port without opening a browser
//! weibo-launch serve --port 9000 --no-browser
//!
//! # Preview a search: two alternative lines, the first an AND of two words
//! weibo-launch compile --keywords "东南大学 南京大学" --keywords "#活动#" --region 江苏
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weibo_launch::compiler::compile;
use weibo_launch::config::{self, Config};
use weibo_launch::engine::engine_settings;
use weibo_launch::models::FormSubmission;
use weibo_launch::regions::WeiboRegionTable;
use weibo_launch::server;

/// weibo-launch: configure and run one Weibo keyword search from a web form.
///
/// Settings are read from a TOML file when it exists; otherwise built-in
/// defaults are used. See `config/weibo-launch.example.toml`.
#[derive(Parser)]
#[command(name = "weibo-launch", version)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./weibo-launch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the search form and run the one submitted job.
    ///
    /// The request that submits the form stays open until the crawl ends.
    /// The server shuts down by itself after answering it.
    Serve {
        /// Do not open the form in a browser.
        #[arg(long)]
        no_browser: bool,

        /// Listen on this port instead of `[server].port`.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the compiled directive and engine settings as JSON.
    ///
    /// Takes the same fields as the web form. Nothing is crawled.
    Compile {
        /// One keyword line; repeat for alternatives. Words separated by
        /// spaces within a line must all appear.
        #[arg(long = "keywords")]
        keywords: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "")]
        start_date: String,

        /// End date (YYYY-MM-DD).
        #[arg(long, default_value = "")]
        end_date: String,

        /// Content category code (0 = all, 1 = original, ... 6 = opinion).
        #[arg(long, default_value = "")]
        weibo_type: String,

        /// Required media code (0 = no filter, 1 = pictures, ... 4 = links).
        #[arg(long, default_value = "")]
        contain_type: String,

        /// Comma-separated province names, or `全部`.
        #[arg(long, default_value = "")]
        region: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weibo_launch=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(atty::is(atty::Stream::Stderr)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut cfg = config::load_or_default(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve {
        no_browser: false,
        port: None,
    }) {
        Commands::Serve { no_browser, port } => {
            if no_browser {
                cfg.server.open_browser = false;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            serve(&cfg).await?;
        }
        Commands::Compile {
            keywords,
            start_date,
            end_date,
            weibo_type,
            contain_type,
            region,
        } => {
            let form = FormSubmission {
                keywords: keywords.join("\n"),
                start_date,
                end_date,
                weibo_type,
                contain_type,
                region,
            };
            print_directive(&cfg, &form)?;
        }
    }

    Ok(())
}

async fn serve(cfg: &Config) -> Result<()> {
    match server::run_server(cfg).await? {
        Some(outcome) => {
            let elapsed = outcome.finished_at - outcome.started_at;
            println!("任务 {} 用时 {} 秒。", outcome.session_id, elapsed.num_seconds());
            if let Some(path) = &outcome.artifact {
                println!("结果文件：{}", path.display());
            }
        }
        None => println!("服务器已关闭，未执行搜索任务。"),
    }
    Ok(())
}

fn print_directive(cfg: &Config, form: &FormSubmission) -> Result<()> {
    let directive = compile(form, &cfg.defaults, &WeiboRegionTable)?;
    let settings: serde_json::Map<String, serde_json::Value> = engine_settings(&directive)
        .into_iter()
        .map(|(name, value)| (name.to_string(), serde_json::Value::String(value)))
        .collect();

    let report = serde_json::json!({
        "directive": directive,
        "settings": settings,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
