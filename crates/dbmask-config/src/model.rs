use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Type tag written into every configuration document.
pub const CONFIG_TYPE: &str = "DataMaskingConfiguration";

/// Root masking document for one database.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MaskingConfiguration {
    /// Database the configuration applies to.
    pub name: String,
    /// Document type tag.
    #[serde(rename = "Type", default = "default_config_type")]
    pub config_type: String,
    /// Tables to mask, processed in order.
    pub tables: Vec<TableRule>,
}

fn default_config_type() -> String {
    CONFIG_TYPE.to_string()
}

/// Masking rules for one schema-qualified table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct TableRule {
    pub name: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Whether a unique index covers any of the masked columns.
    #[serde(default)]
    pub has_unique_index: bool,
    /// Boolean predicate restricting which rows are read and masked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_query: Option<String>,
    pub columns: Vec<ColumnRule>,
}

fn default_schema() -> String {
    "dbo".to_string()
}

/// Masking rule for one column, as written in the configuration file.
///
/// Exactly one of the generated (`MaskingType`), static (`StaticValue`),
/// `Action`, or `Composite` modes must be present; validation resolves the
/// rule into a [`MaskMode`](crate::MaskMode).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnRule {
    pub name: String,
    /// SQL Server type of the column (e.g. `nvarchar`, `int`, `datetime2`).
    pub column_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Bound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Bound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masking_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default)]
    pub deterministic: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub keep_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<Vec<CompositePart>>,
}

/// Numeric, length, or date bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Bound {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Bound {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Bound::Int(value) => Some(*value),
            Bound::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            Bound::Text(value) => value.trim().parse().ok(),
            Bound::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Bound::Int(value) => Some(*value as f64),
            Bound::Float(value) => Some(*value),
            Bound::Text(value) => value.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Bound::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Int(value) => write!(f, "{value}"),
            Bound::Float(value) => write!(f, "{value}"),
            Bound::Text(value) => f.write_str(value),
        }
    }
}

/// Server-side transform of the existing column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ActionRule {
    pub category: ActionCategory,
    #[serde(rename = "Type")]
    pub kind: ActionKind,
    /// Date part for `DateTime` arithmetic (Year, Month, Day, Hour, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Bound>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ActionCategory {
    DateTime,
    Number,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ActionKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Set,
    Nullify,
}

/// One piece of a composite value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CompositePart {
    #[serde(rename = "Type")]
    pub kind: CompositeKind,
    /// Literal text for `Static`, column name for `Column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masking_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CompositeKind {
    Static,
    Column,
    Generated,
}
