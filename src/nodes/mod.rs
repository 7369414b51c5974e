//! Pipeline nodes.
//!
//! Each node owns one stage of the generation workflow and mutates only
//! the candidates it owns at that stage. Node-local failures never
//! propagate out of `run`: they become metric increments and/or
//! `SwarmState::errors` entries, and the Supervisor makes the global
//! continue/abort decision.

pub mod archivist;
pub mod clerk;
pub mod curator;
pub mod deduplicator;
pub mod judge;
pub mod scout;
pub mod supervisor;
pub mod writer;

pub use archivist::Archivist;
pub use clerk::Clerk;
pub use curator::Curator;
pub use deduplicator::Deduplicator;
pub use judge::Judge;
pub use scout::Scout;
pub use supervisor::{decide, init_run, Route, Supervisor};
pub use writer::Writer;
