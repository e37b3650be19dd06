//! Core contracts and helpers for dbmask.
//!
//! This crate defines the SQL value model, catalog metadata types, the
//! database collaborator trait, identifier quoting, and utilities shared by
//! the configuration, engine, and CLI crates.

pub mod catalog;
pub mod database;
pub mod error;
pub mod identifier;
pub mod redaction;
pub mod value;

pub use catalog::{ColumnInfo, IndexInfo, SqlType, TableInfo, TableName, TypeFamily};
pub use database::{Database, Row};
pub use error::{DbError, Result};
pub use identifier::{qualify, quote_ident, quote_literal, validate_identifier};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use value::{
    SqlValue, parse_bool_value, parse_date_value, parse_datetime_value, parse_decimal_value,
    parse_time_value,
};
