//! Single-flight job control.
//!
//! [`JobController`] owns the one session slot. [`JobController::run`]
//! claims the slot, hands the directive to the crawl engine, blocks until the
//! engine returns and then looks for the produced artifact. A second call
//! while the slot is held fails immediately with
//! [`JobError::AlreadyRunning`] and never reaches the engine.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::artifact::ArtifactLocator;
use crate::engine::CrawlEngine;
use crate::error::JobError;
use crate::models::{CrawlDirective, JobOutcome, JobSession};

pub struct JobController {
    engine: Arc<dyn CrawlEngine>,
    artifacts: ArtifactLocator,
    active: Mutex<Option<JobSession>>,
}

impl JobController {
    pub fn new(engine: Arc<dyn CrawlEngine>, artifacts: ArtifactLocator) -> Self {
        Self {
            engine,
            artifacts,
            active: Mutex::new(None),
        }
    }

    /// Whether a job currently holds the slot.
    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    /// Runs one job to completion on the calling thread.
    pub fn run(&self, directive: CrawlDirective) -> Result<JobOutcome, JobError> {
        let session = self.claim(directive)?;
        let _release = SlotRelease(self);

        info!(
            session = %session.id,
            engine = self.engine.name(),
            keywords = session.directive.keywords.len(),
            "crawl job started"
        );

        self.engine
            .run(&session.directive)
            .map_err(JobError::Engine)?;

        let artifact = self.artifacts.discover(&session.directive.keywords);
        match &artifact {
            Some(path) => info!(session = %session.id, artifact = %path.display(), "crawl output found"),
            None => warn!(
                session = %session.id,
                root = %self.artifacts.root().display(),
                "no crawl output found"
            ),
        }

        let finished_at = Utc::now();
        info!(
            session = %session.id,
            elapsed_secs = (finished_at - session.started_at).num_seconds(),
            "crawl job finished"
        );

        Ok(JobOutcome {
            session_id: session.id,
            started_at: session.started_at,
            finished_at,
            artifact,
        })
    }

    fn claim(&self, directive: CrawlDirective) -> Result<JobSession, JobError> {
        let mut slot = self.slot();
        if let Some(current) = slot.as_ref() {
            return Err(JobError::AlreadyRunning {
                started_at: current.started_at,
            });
        }
        let session = JobSession::start(directive);
        *slot = Some(session.clone());
        Ok(session)
    }

    fn slot(&self) -> MutexGuard<'_, Option<JobSession>> {
        // The slot only ever holds plain data, so a poisoned lock is still usable.
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Frees the slot when the job ends, including by panic.
struct SlotRelease<'a>(&'a JobController);

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        self.0.slot().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;
    use crate::keywords::parse_expression;
    use crate::models::{DateRange, ResolvedFilters};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn directive(keywords: &str) -> CrawlDirective {
        CrawlDirective {
            keywords: parse_expression(keywords),
            dates: DateRange {
                start: "2025-10-01".into(),
                end: "2025-10-28".into(),
            },
            filters: ResolvedFilters::default(),
        }
    }

    fn locator(root: &std::path::Path) -> ArtifactLocator {
        ArtifactLocator::new(&OutputConfig {
            root: root.to_path_buf(),
            artifact_glob: "*.csv".into(),
            open_artifact: false,
        })
        .unwrap()
    }

    /// Writes `<root>/<first keyword>/<first keyword>.csv` like the real engine.
    struct WritingEngine {
        root: std::path::PathBuf,
        runs: AtomicUsize,
    }

    impl CrawlEngine for WritingEngine {
        fn name(&self) -> &str {
            "writing"
        }

        fn run(&self, directive: &CrawlDirective) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(keyword) = directive.keywords.leading_literal() {
                let dir = self.root.join(keyword);
                std::fs::create_dir_all(&dir)?;
                std::fs::write(dir.join(format!("{keyword}.csv")), "id\n")?;
            }
            Ok(())
        }
    }

    /// Signals when it starts, then blocks until released.
    struct GatedEngine {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
        runs: AtomicUsize,
    }

    impl CrawlEngine for GatedEngine {
        fn name(&self) -> &str {
            "gated"
        }

        fn run(&self, _directive: &CrawlDirective) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(())
        }
    }

    struct FailingEngine;

    impl CrawlEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(&self, _directive: &CrawlDirective) -> anyhow::Result<()> {
            anyhow::bail!("spider closed: banned")
        }
    }

    #[test]
    fn completed_job_reports_artifact() {
        let tmp = TempDir::new().unwrap();
        let engine = Arc::new(WritingEngine {
            root: tmp.path().to_path_buf(),
            runs: AtomicUsize::new(0),
        });
        let controller = JobController::new(engine.clone(), locator(tmp.path()));

        let outcome = controller.run(directive("东南大学")).unwrap();
        assert_eq!(
            outcome.artifact,
            Some(tmp.path().join("东南大学").join("东南大学.csv"))
        );
        assert!(outcome.finished_at >= outcome.started_at);
        assert_eq!(engine.runs.load(Ordering::SeqCst), 1);
        assert!(!controller.is_active());
    }

    #[test]
    fn missing_output_is_still_success() {
        let tmp = TempDir::new().unwrap();
        let engine = Arc::new(WritingEngine {
            root: tmp.path().join("elsewhere"),
            runs: AtomicUsize::new(0),
        });
        let controller = JobController::new(engine, locator(&tmp.path().join("results")));

        let outcome = controller.run(directive("东南大学")).unwrap();
        assert_eq!(outcome.artifact, None);
    }

    #[test]
    fn second_run_while_active_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let engine = Arc::new(GatedEngine {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
            runs: AtomicUsize::new(0),
        });
        let controller = Arc::new(JobController::new(engine.clone(), locator(tmp.path())));

        let first = {
            let controller = controller.clone();
            std::thread::spawn(move || controller.run(directive("a")))
        };
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(controller.is_active());

        let second = controller.run(directive("b"));
        assert!(matches!(second, Err(JobError::AlreadyRunning { .. })));
        assert_eq!(engine.runs.load(Ordering::SeqCst), 1);

        release_tx.send(()).unwrap();
        first.join().unwrap().unwrap();
        assert!(!controller.is_active());
        assert_eq!(engine.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn engine_failure_propagates_and_frees_slot() {
        let tmp = TempDir::new().unwrap();
        let controller = JobController::new(Arc::new(FailingEngine), locator(tmp.path()));

        let err = controller.run(directive("a")).unwrap_err();
        match err {
            JobError::Engine(e) => assert!(e.to_string().contains("banned")),
            other => panic!("expected engine error, got {other:?}"),
        }
        assert!(!controller.is_active());
    }
}
