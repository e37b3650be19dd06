use dbmask_core::{SqlType, TableName};

use crate::model::{ActionRule, Bound, CompositePart};

/// Validated configuration with every column resolved to a single mode.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub database: String,
    pub tables: Vec<ResolvedTable>,
}

#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub name: TableName,
    pub has_unique_index: bool,
    pub filter_query: Option<String>,
    pub columns: Vec<ResolvedColumn>,
}

impl ResolvedTable {
    pub fn column(&self, name: &str) -> Option<&ResolvedColumn> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    /// Columns masked row by row (Generated and Static modes).
    pub fn row_columns(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns.iter().filter(|column| column.mode.is_per_row())
    }

    pub fn action_columns(&self) -> impl Iterator<Item = (&ResolvedColumn, &ActionRule)> {
        self.columns.iter().filter_map(|column| match &column.mode {
            MaskMode::Action(action) => Some((column, action)),
            _ => None,
        })
    }

    pub fn composite_columns(&self) -> impl Iterator<Item = (&ResolvedColumn, &[CompositePart])> {
        self.columns.iter().filter_map(|column| match &column.mode {
            MaskMode::Composite(parts) => Some((column, parts.as_slice())),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub keep_null: bool,
    pub deterministic: bool,
    pub mode: MaskMode,
}

/// How a column receives its new value.
#[derive(Debug, Clone)]
pub enum MaskMode {
    Generated(GeneratedRule),
    Static(String),
    Action(ActionRule),
    Composite(Vec<CompositePart>),
}

impl MaskMode {
    pub fn is_per_row(&self) -> bool {
        matches!(self, MaskMode::Generated(_) | MaskMode::Static(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            MaskMode::Generated(_) => "generated",
            MaskMode::Static(_) => "static",
            MaskMode::Action(_) => "action",
            MaskMode::Composite(_) => "composite",
        }
    }
}

/// Parameters for the value generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedRule {
    pub masking_type: String,
    pub sub_type: Option<String>,
    pub format: Option<String>,
    pub separator: Option<String>,
    pub character_string: Option<String>,
    pub min: Option<Bound>,
    pub max: Option<Bound>,
}
