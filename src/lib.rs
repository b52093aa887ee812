//! Procsweep Process Classification Library
//!
//! This library finds runaway or abandoned processes of a user and reclaims
//! their resources. It is framework-agnostic: the CLI shipped with the crate
//! is one front-end, a dashboard or a service can drive the same pipeline.
//!
//! # Features
//!
//! - **Snapshotting**: Immutable `ProcessRecord`s from `/proc` or a recorded snapshot
//! - **Classification**: Orphan, killable, high-memory and stale-binary predicates
//! - **Grouping**: Duplicate program instances clustered with their total memory
//! - **Selection**: AND-composed filters, deterministic sorting, limits and columns
//! - **Kill Executor**: Best-effort batch signalling with one outcome per pid and preview
//!
//! # Usage
//!
//! ```rust
//! use procsweep::{
//!     collect, plan_kill, Classifier, Filter, KillExecutor, KillRequest, OwnerFilter,
//!     RawProcess, Selection, SnapshotSource,
//! };
//!
//! let source = SnapshotSource::new(vec![RawProcess {
//!     pid: 10,
//!     ppid: 1,
//!     name: "orphan1".to_string(),
//!     rss_bytes: 10 * 1024 * 1024,
//!     ..Default::default()
//! }]);
//! let classifier = Classifier::default();
//!
//! // Take a snapshot and pick the orphans
//! let records = collect(&source, &classifier, &OwnerFilter::AllUsers);
//! let request = KillRequest::for_selection(Selection::default().with_filter(Filter::Orphans));
//! let plan = plan_kill(&request, &classifier, &records).unwrap();
//! assert_eq!(plan.pids(), vec![10]);
//!
//! // Execute exactly what the preview showed
//! let result = KillExecutor::new(&source).execute(&plan, false);
//! assert_eq!(result.succeeded_count(), 1);
//! ```

pub mod actions;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod process;

// Re-export main types for convenience
pub use actions::{plan_kill, KillBatchResult, KillExecutor, KillOutcome, KillPlan, KillRequest};
pub use error::{SelectionError, SourceError};
pub use memory::{read_memory_summary, MemorySummary};
pub use pipeline::{
    parse_columns, Column, CwdMatcher, Filter, FilterPreset, Selection, SortField, SortOrder,
};
pub use process::{
    collect, group_processes, Classifier, ClassifierPolicy, OwnerFilter, ProcessGroup,
    ProcessRecord, ProcessSource, ProcfsSource, RawProcess, SnapshotSource,
};
