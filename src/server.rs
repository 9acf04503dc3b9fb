//! Single-use HTTP front end.
//!
//! Serves the search form, accepts one submission, runs the crawl job inline
//! and then shuts itself down.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | The search form (HTML) |
//! | `POST` | `/run` | Compile the form and run the job; answers when the crawl is done |
//!
//! Every other path or method gets `404 Not Found`.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──POST /run──▶ Running ──job returns──▶ Terminating ──grace timer──▶ exit
//! ```
//!
//! There is no way back to `Idle`: one process serves one job. A submission
//! that arrives while a job runs, or after it finished, is answered with
//! `409 Conflict`. The crawl runs on a blocking worker that the request
//! handler awaits, so the operator's browser waits for the whole crawl.
//! Ctrl-C closes the listener in an orderly way at any point.

use anyhow::{Context, Result};
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::artifact::{open_artifact, ArtifactLocator, NOT_FOUND_ADVISORY};
use crate::compiler::compile;
use crate::config::{Config, DefaultsConfig};
use crate::engine::{CrawlEngine, ProcessEngine};
use crate::error::JobError;
use crate::models::{FormSubmission, JobOutcome};
use crate::regions::{FilterLookup, WeiboRegionTable};
use crate::session::JobController;

const FORM_HTML: &str = include_str!("form.html");

/// Body of the completion page.
pub const COMPLETED_MESSAGE: &str = "爬取完成，请关闭此页面。";

/// Where the server is in its one-job lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Listening; the form can be submitted.
    Idle,
    /// A submission was accepted and its crawl is running.
    Running,
    /// The job is over; the listener closes after the grace period.
    Terminating,
}

/// Owns everything the handlers need: the job controller, the filter lookup,
/// the lifecycle phase and the shutdown trigger.
pub struct Launcher {
    defaults: DefaultsConfig,
    open_artifact: bool,
    shutdown_grace: Duration,
    lookup: Arc<dyn FilterLookup>,
    controller: Arc<JobController>,
    phase: Mutex<Phase>,
    shutdown: Notify,
    result: Mutex<Option<Result<JobOutcome, JobError>>>,
}

impl Launcher {
    pub fn new(config: &Config, controller: JobController, lookup: Arc<dyn FilterLookup>) -> Self {
        Self {
            defaults: config.defaults.clone(),
            open_artifact: config.output.open_artifact,
            shutdown_grace: Duration::from_millis(config.server.shutdown_grace_ms),
            lookup,
            controller: Arc::new(controller),
            phase: Mutex::new(Phase::Idle),
            shutdown: Notify::new(),
            result: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        *lock(&self.phase)
    }

    /// Idle → Running. Returns the current phase if the server is not idle.
    fn begin(&self) -> Result<(), Phase> {
        let mut phase = lock(&self.phase);
        match *phase {
            Phase::Idle => {
                *phase = Phase::Running;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Records the job result, enters `Terminating` and arms the shutdown
    /// timer. The timer starts before the response is written; the grace
    /// period plus axum's connection draining keep the response intact.
    fn finish(self: &Arc<Self>, result: Result<JobOutcome, JobError>) {
        *lock(&self.result) = Some(result);
        *lock(&self.phase) = Phase::Terminating;

        let launcher = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(launcher.shutdown_grace).await;
            launcher.shutdown.notify_one();
        });
    }

    /// The job result, once the server has stopped. `None` when no job ran.
    fn take_result(&self) -> Result<Option<JobOutcome>> {
        match lock(&self.result).take() {
            None => Ok(None),
            Some(Ok(outcome)) => Ok(Some(outcome)),
            Some(Err(e)) => Err(e.into()),
        }
    }

    async fn shutdown_signal(self: Arc<Self>) {
        tokio::select! {
            _ = self.shutdown.notified() => info!("job finished, closing server"),
            _ = interrupt() => info!("interrupt received, closing server"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn interrupt() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Builds the router over a shared [`Launcher`].
pub fn router(launcher: Arc<Launcher>) -> Router {
    Router::new()
        .route("/", get(handle_form))
        .route("/run", post(handle_run))
        .fallback(handle_not_found)
        .method_not_allowed_fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(launcher)
}

/// Starts the server with the configured crawler process and the built-in
/// region table, and serves until one job has completed or the process is
/// interrupted.
///
/// Returns the job outcome, `None` if interrupted before any job ran, or an
/// error if the crawl engine failed.
pub async fn run_server(config: &Config) -> Result<Option<JobOutcome>> {
    let engine = Arc::new(ProcessEngine::new(&config.engine));
    run_server_with_engine(config, engine, Arc::new(WeiboRegionTable)).await
}

/// Like [`run_server`], with an explicit engine and filter lookup.
pub async fn run_server_with_engine(
    config: &Config,
    engine: Arc<dyn CrawlEngine>,
    lookup: Arc<dyn FilterLookup>,
) -> Result<Option<JobOutcome>> {
    let artifacts = ArtifactLocator::from_config(config)?;
    let controller = JobController::new(engine, artifacts);
    let launcher = Arc::new(Launcher::new(config, controller, lookup));

    let bind_addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    let url = config.server.url();
    info!(%url, "form server listening");
    println!("服务器已启动，访问 {} 使用网页填写搜索条件。", url);

    if config.server.open_browser {
        open_in_browser(&url);
    }

    axum::serve(listener, router(launcher.clone()))
        .with_graceful_shutdown(launcher.clone().shutdown_signal())
        .await?;

    launcher.take_result()
}

fn open_in_browser(url: &str) {
    if let Err(e) = open::that(url) {
        warn!(error = %e, "could not open a browser");
        println!("无法自动打开浏览器，请手动访问 {}", url);
    }
}

// ============ Error response ============

/// Plain-text error response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

// ============ Handlers ============

async fn handle_form() -> Html<&'static str> {
    Html(FORM_HTML)
}

async fn handle_not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Handler for `POST /run`.
///
/// The body is decoded as ordered pairs so a repeated field keeps its first
/// value instead of failing. Compiles the form, claims the server's single
/// job, and awaits the crawl on a blocking worker. Invalid input is answered
/// with `400` and leaves the server idle.
async fn handle_run(
    State(launcher): State<Arc<Launcher>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<String, AppError> {
    let form = FormSubmission::from_pairs(pairs);
    let directive = compile(&form, &launcher.defaults, launcher.lookup.as_ref()).map_err(|e| {
        warn!(error = %e, "rejected submission");
        bad_request(e.to_string())
    })?;

    launcher.begin().map_err(|phase| match phase {
        Phase::Terminating => conflict("本次搜索已完成，服务器正在关闭。"),
        _ => conflict("已有搜索任务正在运行，请等待其完成。"),
    })?;

    info!(directive = %serde_json::to_string(&directive).unwrap_or_default(), "accepted submission");

    let controller = launcher.controller.clone();
    let open = launcher.open_artifact;
    let result = tokio::task::spawn_blocking(move || -> Result<JobOutcome, JobError> {
        let outcome = controller.run(directive)?;
        if let (true, Some(path)) = (open, &outcome.artifact) {
            open_artifact(path);
        }
        Ok(outcome)
    })
    .await
    .unwrap_or_else(|e| Err(JobError::Worker(e.to_string())));

    let response = match &result {
        Ok(outcome) => {
            println!("{}", COMPLETED_MESSAGE);
            Ok(completion_page(outcome))
        }
        Err(e) => {
            error!(error = %e, "crawl job failed");
            Err(internal(format!("爬取失败：{}", e)))
        }
    };

    launcher.finish(result);
    response
}

fn completion_page(outcome: &JobOutcome) -> String {
    match &outcome.artifact {
        Some(path) => format!("{}\n结果文件：{}", COMPLETED_MESSAGE, path.display()),
        None => format!("{}\n{}", COMPLETED_MESSAGE, NOT_FOUND_ADVISORY),
    }
}
