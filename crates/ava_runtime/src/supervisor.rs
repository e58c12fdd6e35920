//! Supervised periodic jobs.
//!
//! Every job runs in its own task: sleep for its interval, run the action,
//! record the outcome, repeat. A failing action is logged and counted but
//! never ends its loop; only cancellation does.

use anyhow::Result;
use async_trait::async_trait;
use ava_core::{ErrorLog, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("duplicate job name: {0}")]
    DuplicateJob(String),
    #[error("supervisor already started")]
    AlreadyStarted,
}

/// The work done by one iteration of a job.
#[async_trait]
pub trait JobAction: Send + Sync {
    async fn run(&self) -> Result<()>;
}

#[async_trait]
impl<F, Fut> JobAction for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn run(&self) -> Result<()> {
        (self)().await
    }
}

#[derive(Clone)]
pub struct JobSpec {
    pub name: String,
    pub interval: Duration,
    pub action: Arc<dyn JobAction>,
}

impl JobSpec {
    pub fn new(name: &str, interval: Duration, action: impl JobAction + 'static) -> Self {
        Self {
            name: name.to_string(),
            interval,
            action: Arc::new(action),
        }
    }
}

impl std::fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSpec")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Observable state of one job.
#[derive(Debug, Clone, Serialize)]
pub struct TaskHandle {
    pub name: String,
    #[serde(skip)]
    pub interval: Duration,
    pub interval_secs: f64,
    pub last_run: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub runs: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

impl TaskHandle {
    fn new(spec: &JobSpec) -> Self {
        Self {
            name: spec.name.clone(),
            interval: spec.interval,
            interval_secs: spec.interval.as_secs_f64(),
            last_run: None,
            cancelled: false,
            runs: 0,
            failures: 0,
            last_error: None,
        }
    }
}

struct Running {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

pub struct TaskSupervisor {
    jobs: Vec<JobSpec>,
    handles: Arc<RwLock<Vec<TaskHandle>>>,
    running: Mutex<Option<Running>>,
    errors: Option<Arc<ErrorLog>>,
}

impl TaskSupervisor {
    /// Bind the job registry. Names must be unique.
    pub fn new(jobs: Vec<JobSpec>) -> Result<Self, SupervisorError> {
        let mut seen = HashSet::new();
        for job in &jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(SupervisorError::DuplicateJob(job.name.clone()));
            }
        }
        let handles = jobs.iter().map(TaskHandle::new).collect();
        Ok(Self {
            jobs,
            handles: Arc::new(RwLock::new(handles)),
            running: Mutex::new(None),
            errors: None,
        })
    }

    /// Also record job failures in `errors`, keyed by job name.
    pub fn with_error_log(mut self, errors: Arc<ErrorLog>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name.as_str()).collect()
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub async fn handles(&self) -> Vec<TaskHandle> {
        self.handles.read().await.clone()
    }

    /// Launch one loop per job.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(SupervisorError::AlreadyStarted);
        }

        {
            let mut handles = self.handles.write().await;
            for h in handles.iter_mut() {
                h.cancelled = false;
            }
        }

        let token = CancellationToken::new();
        let tasks = self
            .jobs
            .iter()
            .enumerate()
            .map(|(index, job)| {
                tokio::spawn(run_job(
                    index,
                    job.clone(),
                    Arc::clone(&self.handles),
                    self.errors.clone(),
                    token.child_token(),
                ))
            })
            .collect();

        tracing::info!("Started {} background jobs: {:?}", self.jobs.len(), self.job_names());
        *running = Some(Running { token, tasks });
        Ok(())
    }

    /// Cancel every loop and wait until all of them have exited.
    pub async fn stop(&self) {
        let Some(Running { token, tasks }) = self.running.lock().await.take() else {
            return;
        };
        token.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Background job ended abnormally: {}", e);
            }
        }
        let mut handles = self.handles.write().await;
        for h in handles.iter_mut() {
            h.cancelled = true;
        }
        tracing::info!("All background jobs stopped");
    }
}

async fn run_job(
    index: usize,
    job: JobSpec,
    handles: Arc<RwLock<Vec<TaskHandle>>>,
    errors: Option<Arc<ErrorLog>>,
    token: CancellationToken,
) {
    tracing::debug!("Job {} running every {:?}", job.name, job.interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(job.interval) => {}
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = job.action.run() => outcome,
        };

        let mut handles = handles.write().await;
        let handle = &mut handles[index];
        handle.runs += 1;
        handle.last_run = Some(Utc::now());
        if let Err(e) = outcome {
            handle.failures += 1;
            handle.last_error = Some(format!("{:#}", e));
            tracing::warn!(job = %job.name, "Background job failed: {:#}", e);
            if let Some(errors) = &errors {
                errors.record(&job.name, Severity::Warning, format!("{:#}", e));
            }
        }
    }
    tracing::debug!("Job {} cancelled", job.name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(name: &str, counter: Arc<AtomicUsize>, fail: bool) -> JobSpec {
        JobSpec::new(name, Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if fail {
                    anyhow::bail!("boom");
                }
                Ok(())
            }
        })
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let c = Arc::new(AtomicUsize::new(0));
        let result = TaskSupervisor::new(vec![
            counting_job("a", c.clone(), false),
            counting_job("a", c, false),
        ]);
        assert!(matches!(result, Err(SupervisorError::DuplicateJob(name)) if name == "a"));
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let c = Arc::new(AtomicUsize::new(0));
        let sup = TaskSupervisor::new(vec![counting_job("a", c, false)]).unwrap();
        sup.start().await.unwrap();
        assert!(matches!(sup.start().await, Err(SupervisorError::AlreadyStarted)));
        sup.stop().await;
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let ok = Arc::new(AtomicUsize::new(0));
        let bad = Arc::new(AtomicUsize::new(0));
        let sup = TaskSupervisor::new(vec![
            counting_job("ok", ok.clone(), false),
            counting_job("bad", bad.clone(), true),
        ])
        .unwrap();

        sup.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        sup.stop().await;

        assert!(ok.load(Ordering::SeqCst) >= 2);
        assert!(bad.load(Ordering::SeqCst) >= 2);

        let handles = sup.handles().await;
        let bad_handle = handles.iter().find(|h| h.name == "bad").unwrap();
        assert!(bad_handle.failures >= 2);
        assert_eq!(bad_handle.failures, bad_handle.runs);
        assert_eq!(bad_handle.last_error.as_deref(), Some("boom"));
        let ok_handle = handles.iter().find(|h| h.name == "ok").unwrap();
        assert_eq!(ok_handle.failures, 0);
        assert!(ok_handle.last_run.is_some());
    }

    #[tokio::test]
    async fn test_failures_reach_error_log() {
        let errors = Arc::new(ErrorLog::default());
        let c = Arc::new(AtomicUsize::new(0));
        let sup = TaskSupervisor::new(vec![counting_job("bad", c, true)])
            .unwrap()
            .with_error_log(errors.clone());

        sup.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        sup.stop().await;

        let recent = errors.recent(10);
        assert!(!recent.is_empty());
        assert_eq!(recent[0].source, "bad");
        assert_eq!(recent[0].severity, Severity::Warning);
        assert_eq!(recent[0].message, "boom");
    }

    #[tokio::test]
    async fn test_no_side_effects_after_stop() {
        let c = Arc::new(AtomicUsize::new(0));
        let sup = TaskSupervisor::new(vec![counting_job("a", c.clone(), false)]).unwrap();
        sup.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        sup.stop().await;

        let after_stop = c.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(c.load(Ordering::SeqCst), after_stop);
        assert!(sup.handles().await.iter().all(|h| h.cancelled));
        assert!(!sup.is_running().await);
    }

    #[tokio::test]
    async fn test_hung_action_does_not_block_stop() {
        let sup = TaskSupervisor::new(vec![JobSpec::new(
            "hang",
            Duration::from_millis(1),
            || async {
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            },
        )])
        .unwrap();
        sup.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::time::timeout(Duration::from_secs(1), sup.stop())
            .await
            .expect("stop should not wait for a hung action");
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let sup = TaskSupervisor::new(vec![]).unwrap();
        sup.stop().await;
        assert!(sup.is_empty());
    }
}
