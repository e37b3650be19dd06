//! Masking configuration contracts and validation.
//!
//! Configuration files are checked twice: structurally against the JSON
//! Schema generated from [`MaskingConfiguration`], then semantically, which
//! resolves every column into exactly one [`MaskMode`].

pub mod errors;
pub mod model;
pub mod resolved;
pub mod schema;
pub mod validate;

pub use errors::{ConfigError, IssueSeverity, Result, ValidationIssue, ValidationReport};
pub use model::{
    ActionCategory, ActionKind, ActionRule, Bound, CONFIG_TYPE, ColumnRule, CompositeKind,
    CompositePart, MaskingConfiguration, TableRule,
};
pub use resolved::{GeneratedRule, MaskMode, ResolvedColumn, ResolvedConfig, ResolvedTable};
pub use schema::config_json_schema;
pub use validate::{
    DATE_PARTS, ValidatedConfig, load_config, resolve_config, validate_config,
    validate_config_json,
};
