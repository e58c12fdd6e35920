pub mod consolidation;
pub mod retrieval;
pub mod store;

pub use consolidation::{ConsolidationReport, MemoryConsolidator};
pub use store::MemoryStore;
