//! Slow-moving parts of Ava's self: the Big Five personality model and the
//! reflection loop that writes insights back into memory.

pub mod personality;
pub mod reflection;

pub use personality::{DevelopmentStage, PersonalitySystem, Traits};
pub use reflection::SelfAwareness;
