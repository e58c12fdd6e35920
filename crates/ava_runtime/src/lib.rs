//! # Ava Runtime
//!
//! Keeps the subsystems alive for the life of the process:
//! - [`TaskSupervisor`] drives the periodic maintenance jobs
//! - [`Orchestrator`] owns the lifecycle state machine, health polling and
//!   the final flush on shutdown
//! - [`wiring::build_subsystems`] assembles the production collaborators

pub mod health;
pub mod orchestrator;
pub mod supervisor;
pub mod wiring;

pub use health::{HealthMonitor, HealthRecord};
pub use orchestrator::{LifecycleState, Orchestrator, OrchestratorError, SystemStatus};
pub use supervisor::{JobAction, JobSpec, SupervisorError, TaskHandle, TaskSupervisor};
pub use wiring::{build_subsystems, Subsystems};
