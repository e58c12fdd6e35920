//! Ava's emotion subsystem.
//!
//! `EmotionalSystem` turns text into `EmotionalSnapshot`s, folds them into a
//! running state and lets that state drift back to neutral over time.

pub mod dynamics;
pub mod system;

pub use system::EmotionalSystem;
