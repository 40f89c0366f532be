//! The ingestion core: locating deliveries, walking them, and running every
//! discovered unit through copy and derivation.
//!
//! - [`source`] -- vault delivery folder location.
//! - [`coordinator`] -- tree walk and the unit-level worker pool.
//! - [`builder`] -- per-sequence and per-file pipelines.
//! - [`copy`] -- the bounded, cancellable copy orchestrator.
//! - [`artifacts`] -- proxy and review movie derivation.
//! - [`report`] -- per-unit and per-run outcomes.

pub mod artifacts;
pub mod builder;
pub mod coordinator;
pub mod copy;
pub mod report;
pub mod source;

pub use artifacts::{ArtifactReport, DerivedArtifactPipeline};
pub use coordinator::{walk_sources, Coordinator, IngestOptions, WalkResult, WorkUnit};
pub use copy::{CopyBatch, CopyOrchestrator, CopyOutcome, CopyTask};
pub use report::{IngestReport, UnitKind, UnitReport, UnitStatus};
pub use source::{locate_sources, SourceRequest};
