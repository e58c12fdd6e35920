//! Lifecycle, shutdown and background-job tests for the Orchestrator.
//!
//! Every subsystem is a recording double, and job intervals are shrunk to a
//! few milliseconds so the loops actually fire during a test.

use ava_core::config::TaskIntervals;
use ava_core::mock::{
    MockConsolidation, MockEmotion, MockGenerator, MockMemory, MockPersonality, MockSelfAwareness,
};
use ava_core::{AvaConfig, EmotionalSnapshot, MemoryKind, Severity};
use ava_runtime::orchestrator::{JOB_CONSOLIDATE, JOB_PERSONALITY, JOB_REFLECT};
use ava_runtime::{LifecycleState, Orchestrator, OrchestratorError, Subsystems};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    memory: Arc<MockMemory>,
    consolidation: Arc<MockConsolidation>,
    emotion: Arc<MockEmotion>,
    personality: Arc<MockPersonality>,
    self_awareness: Arc<MockSelfAwareness>,
    generator: Arc<MockGenerator>,
    orchestrator: Orchestrator,
}

fn fixture_with_interval(interval: Duration) -> Fixture {
    let memory = Arc::new(MockMemory::new());
    let consolidation = Arc::new(MockConsolidation::new());
    let emotion = Arc::new(MockEmotion::new());
    let personality = Arc::new(MockPersonality::new());
    let self_awareness = Arc::new(MockSelfAwareness::new());
    let generator = Arc::new(MockGenerator::with_response("Test response"));

    let subsystems = Subsystems {
        memory: memory.clone(),
        admin: memory.clone(),
        consolidation: consolidation.clone(),
        emotion: emotion.clone(),
        personality: personality.clone(),
        self_awareness: self_awareness.clone(),
        generator: generator.clone(),
    };

    let mut config = AvaConfig::default();
    config.tasks = TaskIntervals::uniform(interval);

    Fixture {
        memory,
        consolidation,
        emotion,
        personality,
        self_awareness,
        generator,
        orchestrator: Orchestrator::new(&config, subsystems),
    }
}

fn fixture() -> Fixture {
    fixture_with_interval(Duration::from_secs(3600))
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_start_registers_jobs() {
    let f = fixture();
    assert_eq!(f.orchestrator.lifecycle_state().await, LifecycleState::Stopped);

    f.orchestrator.start().await.unwrap();

    assert!(f.orchestrator.is_running());
    assert_eq!(f.orchestrator.lifecycle_state().await, LifecycleState::Running);
    assert_eq!(f.orchestrator.job_count().await, 4);
    assert_eq!(f.memory.initialize_calls(), 1);

    f.orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let f = fixture();
    f.orchestrator.start().await.unwrap();

    let err = f.orchestrator.start().await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::InvalidState {
            state: LifecycleState::Running,
            ..
        }
    ));

    f.orchestrator.shutdown().await.unwrap();
}

async fn assert_failed_start(f: &Fixture, subsystem: &str) {
    let err = f.orchestrator.start().await.unwrap_err();
    match &err {
        OrchestratorError::Startup { subsystem: s, .. } => assert_eq!(*s, subsystem),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("Initialization failed"));
    assert!(!f.orchestrator.is_running());
    assert_eq!(f.orchestrator.job_count().await, 0);
    assert_eq!(f.orchestrator.lifecycle_state().await, LifecycleState::Stopped);

    let logged = f.orchestrator.error_log().recent(1);
    assert_eq!(logged[0].source, subsystem);
    assert_eq!(logged[0].severity, Severity::Critical);
}

#[tokio::test]
async fn test_memory_init_failure_aborts_start() {
    let f = fixture();
    f.memory.fail_initialize(true);
    assert_failed_start(&f, "memory_system").await;
}

#[tokio::test]
async fn test_emotion_init_failure_aborts_start() {
    let f = fixture();
    f.emotion.fail_initialize(true);
    assert_failed_start(&f, "emotional_system").await;
}

#[tokio::test]
async fn test_personality_init_failure_aborts_start() {
    let f = fixture();
    f.personality.fail_initialize(true);
    assert_failed_start(&f, "personality_system").await;
}

#[tokio::test]
async fn test_self_awareness_init_failure_aborts_start() {
    let f = fixture();
    f.self_awareness.fail_initialize(true);
    assert_failed_start(&f, "self_awareness").await;
}

#[tokio::test]
async fn test_start_can_be_retried_after_failure() {
    let f = fixture();
    f.memory.fail_initialize(true);
    assert!(f.orchestrator.start().await.is_err());

    f.memory.fail_initialize(false);
    f.orchestrator.start().await.unwrap();
    assert!(f.orchestrator.is_running());
    f.orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_is_broadcast() {
    let f = fixture();
    let mut rx = f.orchestrator.subscribe_lifecycle();

    f.orchestrator.start().await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), LifecycleState::Running);

    f.orchestrator.shutdown().await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), LifecycleState::Stopped);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_flushes_final_state() {
    let f = fixture();
    f.emotion
        .set_current(EmotionalSnapshot::new("joy", 0.7, 0.5, 0.4))
        .await;
    f.orchestrator.start().await.unwrap();

    f.orchestrator.shutdown().await.unwrap();

    assert!(!f.orchestrator.is_running());
    assert_eq!(f.orchestrator.lifecycle_state().await, LifecycleState::Stopped);

    let handles = f.orchestrator.task_handles().await;
    assert_eq!(handles.len(), 4);
    assert!(handles.iter().all(|h| h.cancelled));

    assert_eq!(f.self_awareness.reflect_calls(), vec![true]);
    assert_eq!(f.personality.update_calls(), vec![true]);
    assert_eq!(f.consolidation.calls(), vec![true]);

    let emotional: Vec<_> = f
        .memory
        .added()
        .await
        .into_iter()
        .filter(|m| m.kind == MemoryKind::Emotional)
        .collect();
    assert_eq!(emotional.len(), 1);
    assert_eq!(emotional[0].emotional_context.as_ref().unwrap().primary, "joy");
}

#[tokio::test]
async fn test_shutdown_when_stopped_is_rejected() {
    let f = fixture();
    let err = f.orchestrator.shutdown().await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::InvalidState {
            state: LifecycleState::Stopped,
            ..
        }
    ));
    assert!(f.self_awareness.reflect_calls().is_empty());
}

#[tokio::test]
async fn test_shutdown_survives_final_run_failures() {
    let f = fixture();
    f.orchestrator.start().await.unwrap();
    f.self_awareness.fail_reflect(true);
    f.personality.fail_update(true);
    f.consolidation.set_failing(true);
    f.memory.fail_add(true);

    f.orchestrator.shutdown().await.unwrap();

    assert!(!f.orchestrator.is_running());
    assert_eq!(f.self_awareness.forced_reflections(), 1);
    assert_eq!(f.personality.forced_updates(), 1);
    assert_eq!(f.consolidation.forced_calls(), 1);

    let logged = f.orchestrator.error_log().recent(10);
    let final_failures: Vec<&str> = logged
        .iter()
        .filter(|e| e.severity == Severity::Error)
        .map(|e| e.source.as_str())
        .collect();
    assert!(final_failures.contains(&"self_awareness"));
    assert!(final_failures.contains(&"personality_system"));
    assert!(final_failures.contains(&"memory_system"));
}

#[tokio::test]
async fn test_shutdown_summarizes_open_conversation() {
    let f = fixture();
    f.orchestrator.start().await.unwrap();
    f.orchestrator.process_message("Hello").await;
    f.generator.queue_response("We greeted each other.").await;

    f.orchestrator.shutdown().await.unwrap();

    assert_eq!(f.orchestrator.pipeline().history_len().await, 0);
    let added = f.memory.added().await;
    assert!(added.iter().any(|m| m.content == "We greeted each other."));
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_turn() {
    let f = Arc::new(fixture());
    f.orchestrator.start().await.unwrap();

    let turn = {
        let f = f.clone();
        tokio::spawn(async move { f.orchestrator.process_message("Hello").await })
    };
    tokio::task::yield_now().await;
    f.orchestrator.shutdown().await.unwrap();

    assert_eq!(turn.await.unwrap(), "Test response");
    assert_eq!(f.orchestrator.pipeline().history_len().await, 0);
}

// ============================================================================
// Background jobs
// ============================================================================

#[tokio::test]
async fn test_failing_job_does_not_stop_others() {
    let f = fixture_with_interval(Duration::from_millis(10));
    f.self_awareness.fail_reflect(true);
    f.orchestrator.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let handles = f.orchestrator.task_handles().await;
    let reflect = handles.iter().find(|h| h.name == JOB_REFLECT).unwrap();
    assert!(reflect.runs >= 2);
    assert_eq!(reflect.failures, reflect.runs);
    assert!(reflect.last_error.as_deref().unwrap().contains("Test error"));

    let consolidate = handles.iter().find(|h| h.name == JOB_CONSOLIDATE).unwrap();
    assert!(consolidate.runs >= 2);
    assert_eq!(consolidate.failures, 0);
    let personality = handles.iter().find(|h| h.name == JOB_PERSONALITY).unwrap();
    assert!(personality.runs >= 2);

    assert!(f.self_awareness.reflect_calls().iter().all(|forced| !forced));
    assert!(f.consolidation.calls().len() >= 2);

    f.orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_no_job_runs_after_shutdown() {
    let f = fixture_with_interval(Duration::from_millis(5));
    f.orchestrator.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    f.orchestrator.shutdown().await.unwrap();

    let calls = f.consolidation.calls().len();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(f.consolidation.calls().len(), calls);
}

// ============================================================================
// Health & status
// ============================================================================

#[tokio::test]
async fn test_health_check_is_strictly_increasing() {
    let f = fixture();
    let mut previous = None;
    for _ in 0..5 {
        let record = f.orchestrator.check_system_health().await;
        let stamp = record.last_health_check.unwrap();
        if let Some(prev) = previous {
            assert!(stamp > prev);
        }
        previous = Some(stamp);
    }
}

#[tokio::test]
async fn test_health_check_polls_every_subsystem() {
    let f = fixture();
    let record = f.orchestrator.check_system_health().await;

    assert!(record.degraded().is_empty());
    assert_eq!(f.memory.get_calls(), 1);
    assert_eq!(f.emotion.current_calls(), 1);
    assert_eq!(f.personality.summary_calls(), 1);
    assert_eq!(f.self_awareness.status_calls(), 1);
    assert_eq!(record.subsystem_summaries["memory_system"]["total_memories"], 0);
}

#[tokio::test]
async fn test_status_reports_errors_without_failing() {
    let f = fixture();
    f.personality.fail_summary(true);

    let status = f.orchestrator.get_system_status().await;

    assert!(status.personality_system["error"]
        .as_str()
        .unwrap()
        .contains("unavailable"));
    assert_eq!(status.emotional_system["primary"], "neutral");
}

#[tokio::test]
async fn test_status_is_read_only() {
    let f = fixture();
    let status = f.orchestrator.get_system_status().await;

    assert!(!status.is_running);
    assert_eq!(status.lifecycle, LifecycleState::Stopped);
    assert!(status.last_health_check.is_none());
    assert!(status.jobs.is_empty());
    assert!(f.orchestrator.health_record().await.last_health_check.is_none());

    f.orchestrator.check_system_health().await;
    let stamp = f.orchestrator.health_record().await.last_health_check;
    f.orchestrator.get_system_status().await;
    assert_eq!(f.orchestrator.health_record().await.last_health_check, stamp);
}

#[tokio::test]
async fn test_status_while_running() {
    let f = fixture();
    f.orchestrator.start().await.unwrap();

    let status = f.orchestrator.get_system_status().await;
    assert!(status.is_running);
    assert_eq!(status.lifecycle, LifecycleState::Running);
    assert_eq!(status.jobs.len(), 4);
    assert!(status.jobs.iter().all(|j| !j.cancelled));

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["lifecycle"], "running");
    assert!(json["jobs"][0]["interval_secs"].is_number());

    f.orchestrator.shutdown().await.unwrap();
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_conversation_then_shutdown_scenario() {
    let f = fixture();
    f.orchestrator.start().await.unwrap();

    let response = f.orchestrator.process_message("Hello").await;
    assert_eq!(response, "Test response");
    assert_eq!(f.orchestrator.pipeline().history_len().await, 1);

    f.generator.set_failing(true);
    let response = f.orchestrator.process_message("Hi again").await;
    assert!(response.contains("apologize"));
    assert!(response.contains("try again"));
    assert_eq!(f.orchestrator.pipeline().history_len().await, 1);

    f.orchestrator.shutdown().await.unwrap();
    assert!(!f.orchestrator.is_running());
    assert!(f.orchestrator.task_handles().await.iter().all(|h| h.cancelled));
}
