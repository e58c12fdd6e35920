//! Process lifecycle: Stopped -> Starting -> Running -> ShuttingDown -> Stopped.
//!
//! A failed start goes straight back to `Stopped` with no jobs registered.
//! Shutdown cancels the background jobs, closes the open conversation and
//! forces one final reflection, personality update and consolidation.

use crate::health::{
    HealthMonitor, HealthRecord, EMOTIONAL_SYSTEM, MEMORY_SYSTEM, PERSONALITY_SYSTEM,
    SELF_AWARENESS,
};
use crate::supervisor::{JobSpec, SupervisorError, TaskHandle, TaskSupervisor};
use crate::wiring::Subsystems;
use ava_core::config::TaskIntervals;
use ava_core::{AvaConfig, ErrorLog, Memory, MemoryKind, Severity};
use ava_reasoning::ConversationPipeline;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};

pub const JOB_CONSOLIDATE: &str = "consolidate_memories";
pub const JOB_REFLECT: &str = "reflect";
pub const JOB_PERSONALITY: &str = "update_personality";
pub const JOB_HEALTH: &str = "check_health";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    ShuttingDown,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },
    #[error("failed to initialize {subsystem}: {source:#}")]
    Startup {
        subsystem: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Read-only snapshot returned by [`Orchestrator::get_system_status`].
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub is_running: bool,
    pub lifecycle: LifecycleState,
    pub last_health_check: Option<DateTime<Utc>>,
    pub memory_system: Value,
    pub emotional_system: Value,
    pub personality_system: Value,
    pub self_awareness: Value,
    pub jobs: Vec<TaskHandle>,
}

pub struct Orchestrator {
    subsystems: Subsystems,
    intervals: TaskIntervals,
    pipeline: Arc<ConversationPipeline>,
    health: Arc<HealthMonitor>,
    errors: Arc<ErrorLog>,
    supervisor: Mutex<Option<TaskSupervisor>>,
    lifecycle: RwLock<LifecycleState>,
    lifecycle_tx: watch::Sender<LifecycleState>,
    is_running: AtomicBool,
    /// Serializes start and shutdown.
    transition: Mutex<()>,
}

impl Orchestrator {
    pub fn new(config: &AvaConfig, subsystems: Subsystems) -> Self {
        let errors = Arc::new(ErrorLog::default());
        let pipeline = Arc::new(
            ConversationPipeline::new(
                subsystems.memory.clone(),
                subsystems.emotion.clone(),
                subsystems.personality.clone(),
                subsystems.generator.clone(),
                config.conversation.clone(),
            )
            .with_error_log(errors.clone()),
        );
        let health = Arc::new(HealthMonitor::new(subsystems.clone()));
        let (lifecycle_tx, _) = watch::channel(LifecycleState::Stopped);

        Self {
            subsystems,
            intervals: config.tasks.clone(),
            pipeline,
            health,
            errors,
            supervisor: Mutex::new(None),
            lifecycle: RwLock::new(LifecycleState::Stopped),
            lifecycle_tx,
            is_running: AtomicBool::new(false),
            transition: Mutex::new(()),
        }
    }

    // === Lifecycle ===

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub async fn lifecycle_state(&self) -> LifecycleState {
        *self.lifecycle.read().await
    }

    pub fn subscribe_lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle_tx.subscribe()
    }

    async fn set_lifecycle_state(&self, new_state: LifecycleState) {
        let mut state = self.lifecycle.write().await;
        if *state != new_state {
            tracing::info!("Lifecycle transition: {:?} -> {:?}", *state, new_state);
            *state = new_state;
            self.lifecycle_tx.send_replace(new_state);
        }
    }

    async fn require_state(
        &self,
        expected: LifecycleState,
        operation: &'static str,
    ) -> Result<(), OrchestratorError> {
        let state = self.lifecycle_state().await;
        if state == expected {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidState { operation, state })
        }
    }

    /// Initialize every subsystem, then launch the background jobs.
    ///
    /// Any initialization failure aborts the start: no jobs are registered,
    /// the state returns to `Stopped` and the error is returned.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        let _transition = self.transition.lock().await;
        self.require_state(LifecycleState::Stopped, "start").await?;
        self.set_lifecycle_state(LifecycleState::Starting).await;

        match self.bring_up().await {
            Ok(supervisor) => {
                *self.supervisor.lock().await = Some(supervisor);
                self.is_running.store(true, Ordering::SeqCst);
                self.set_lifecycle_state(LifecycleState::Running).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Startup failed: {}", e);
                let source = match &e {
                    OrchestratorError::Startup { subsystem, .. } => *subsystem,
                    _ => "orchestrator",
                };
                self.errors.record(source, Severity::Critical, e.to_string());
                *self.supervisor.lock().await = None;
                self.is_running.store(false, Ordering::SeqCst);
                self.set_lifecycle_state(LifecycleState::Stopped).await;
                Err(e)
            }
        }
    }

    async fn bring_up(&self) -> Result<TaskSupervisor, OrchestratorError> {
        let s = &self.subsystems;
        let startup = |subsystem: &'static str| {
            move |source: anyhow::Error| OrchestratorError::Startup { subsystem, source }
        };

        s.memory.initialize().await.map_err(startup(MEMORY_SYSTEM))?;
        s.emotion.initialize().await.map_err(startup(EMOTIONAL_SYSTEM))?;
        s.personality.initialize().await.map_err(startup(PERSONALITY_SYSTEM))?;
        s.self_awareness.initialize().await.map_err(startup(SELF_AWARENESS))?;

        let supervisor = TaskSupervisor::new(self.jobs())?.with_error_log(self.errors.clone());
        supervisor.start().await?;
        Ok(supervisor)
    }

    fn jobs(&self) -> Vec<JobSpec> {
        let consolidation = self.subsystems.consolidation.clone();
        let self_awareness = self.subsystems.self_awareness.clone();
        let personality = self.subsystems.personality.clone();
        let health = self.health.clone();

        vec![
            JobSpec::new(JOB_CONSOLIDATE, self.intervals.consolidation(), move || {
                let consolidation = consolidation.clone();
                async move {
                    consolidation.consolidate_memories(false).await?;
                    anyhow::Ok(())
                }
            }),
            JobSpec::new(JOB_REFLECT, self.intervals.reflection(), move || {
                let self_awareness = self_awareness.clone();
                async move {
                    self_awareness.reflect(false).await?;
                    anyhow::Ok(())
                }
            }),
            JobSpec::new(JOB_PERSONALITY, self.intervals.personality(), move || {
                let personality = personality.clone();
                async move {
                    personality.update_personality(false).await?;
                    anyhow::Ok(())
                }
            }),
            JobSpec::new(JOB_HEALTH, self.intervals.health_check(), move || {
                let health = health.clone();
                async move {
                    let record = health.check().await;
                    let degraded = record.degraded();
                    if !degraded.is_empty() {
                        anyhow::bail!("degraded subsystems: {}", degraded.join(", "));
                    }
                    anyhow::Ok(())
                }
            }),
        ]
    }

    /// Stop the background jobs and flush final state.
    ///
    /// An in-flight `process_message` is allowed to finish first.
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        let _transition = self.transition.lock().await;
        self.require_state(LifecycleState::Running, "shut down").await?;
        self.set_lifecycle_state(LifecycleState::ShuttingDown).await;

        if let Some(supervisor) = self.supervisor.lock().await.as_ref() {
            supervisor.stop().await;
        }

        if let Some(summary) = self.pipeline.end_conversation().await {
            tracing::info!("Stored conversation summary ({} chars)", summary.len());
        }
        self.persist_final_state().await;

        self.is_running.store(false, Ordering::SeqCst);
        self.set_lifecycle_state(LifecycleState::Stopped).await;
        Ok(())
    }

    async fn persist_final_state(&self) {
        let s = &self.subsystems;

        match s.emotion.get_current_state().await {
            Ok(state) => {
                let memory = Memory::new(
                    MemoryKind::Emotional,
                    format!("Emotional state at shutdown: {}", state.describe()),
                )
                .with_importance(0.6)
                .with_emotion(state)
                .with_metadata("type", json!("final_state"));
                if let Err(e) = s.memory.add_memory(memory).await {
                    self.final_run_failed(MEMORY_SYSTEM, "Failed to record final emotional state", e);
                }
            }
            Err(e) => self.final_run_failed(EMOTIONAL_SYSTEM, "Failed to read final emotional state", e),
        }

        tracing::info!("Running final reflection");
        if let Err(e) = s.self_awareness.reflect(true).await {
            self.final_run_failed(SELF_AWARENESS, "Final reflection failed", e);
        }
        tracing::info!("Running final personality update");
        if let Err(e) = s.personality.update_personality(true).await {
            self.final_run_failed(PERSONALITY_SYSTEM, "Final personality update failed", e);
        }
        tracing::info!("Running final memory consolidation");
        if let Err(e) = s.consolidation.consolidate_memories(true).await {
            self.final_run_failed(MEMORY_SYSTEM, "Final memory consolidation failed", e);
        }
    }

    fn final_run_failed(&self, source: &str, what: &str, e: anyhow::Error) {
        tracing::error!("{}: {:#}", what, e);
        self.errors.record(source, Severity::Error, format!("{}: {:#}", what, e));
    }

    // === Status & health ===

    /// Number of registered background jobs.
    pub async fn job_count(&self) -> usize {
        self.supervisor.lock().await.as_ref().map_or(0, TaskSupervisor::len)
    }

    pub async fn task_handles(&self) -> Vec<TaskHandle> {
        match self.supervisor.lock().await.as_ref() {
            Some(supervisor) => supervisor.handles().await,
            None => Vec::new(),
        }
    }

    /// Poll every subsystem and advance `last_health_check`.
    pub async fn check_system_health(&self) -> HealthRecord {
        self.health.check().await
    }

    pub async fn health_record(&self) -> HealthRecord {
        self.health.record().await
    }

    /// Snapshot of the whole runtime. Callable in any state; changes nothing.
    pub async fn get_system_status(&self) -> SystemStatus {
        let mut summaries = self.health.summaries().await;
        let mut take = |key: &str| summaries.remove(key).unwrap_or(Value::Null);

        SystemStatus {
            is_running: self.is_running(),
            lifecycle: self.lifecycle_state().await,
            last_health_check: self.health.last_health_check().await,
            memory_system: take(MEMORY_SYSTEM),
            emotional_system: take(EMOTIONAL_SYSTEM),
            personality_system: take(PERSONALITY_SYSTEM),
            self_awareness: take(SELF_AWARENESS),
            jobs: self.task_handles().await,
        }
    }

    // === Conversation ===

    pub fn pipeline(&self) -> &Arc<ConversationPipeline> {
        &self.pipeline
    }

    pub fn subsystems(&self) -> &Subsystems {
        &self.subsystems
    }

    /// Recent failures from startup, background jobs and conversation turns.
    pub fn error_log(&self) -> &Arc<ErrorLog> {
        &self.errors
    }

    pub async fn process_message(&self, user_input: &str) -> String {
        self.pipeline.process_message(user_input).await
    }

    pub async fn end_conversation(&self) -> Option<String> {
        self.pipeline.end_conversation().await
    }
}
