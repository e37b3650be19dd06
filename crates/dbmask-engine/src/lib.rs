//! Masking engine for dbmask.
//!
//! This crate turns a resolved masking configuration into UPDATE traffic
//! against a live SQL Server database: value generators, the uniqueness
//! resolver, the deterministic value cache, and the orchestrator that drives
//! them table by table through a [`MaskTarget`].

pub mod cache;
pub mod cursor;
pub mod engine;
pub mod errors;
pub mod generators;
pub mod memory;
pub mod model;
pub mod scratch;
pub mod sqlserver;
pub mod target;
pub mod unique;

pub use cache::{DeterministicCache, value_key};
pub use cursor::{RowCursor, ScaffoldNames};
pub use engine::{AutoConfirm, ConfirmGate, MaskingEngine};
pub use errors::{ErrorScope, GenerationError, MaskingError};
pub use generators::{ColumnGenerator, Constraints, GeneratorKind, LocaleKey};
pub use memory::{BatchRecord, MemoryTarget, RowView};
pub use model::{MaskOptions, MaskingReport, TableResult, TableStatus};
pub use scratch::{MemoryScratchStore, ScratchStore, SqlScratchStore};
pub use sqlserver::SqlServerTarget;
pub use target::{
    ArithmeticOp, AssignmentExpr, ColumnAssignment, ConcatPart, DatePart, MaskTarget, RowSet,
    RowUpdate, SourceRow,
};
pub use unique::{UniqueAssignments, UniqueIndexPlan, build_unique_assignments};
