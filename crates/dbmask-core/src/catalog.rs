use std::fmt;

use serde::{Deserialize, Serialize};

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Lowercased `schema.table` key for case-insensitive lookups.
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema.to_lowercase(), self.name.to_lowercase())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// SQL Server data types the masking pipeline knows how to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    Numeric,
    Money,
    SmallMoney,
    Float,
    Real,
    Char,
    NChar,
    VarChar,
    NVarChar,
    Text,
    NText,
    Date,
    Time,
    DateTime,
    DateTime2,
    SmallDateTime,
    DateTimeOffset,
    UniqueIdentifier,
    Xml,
}

/// Coarse grouping used by generators and coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Bool,
    Integer,
    Decimal,
    Float,
    Text,
    Date,
    Time,
    DateTime,
    Uuid,
}

impl SqlType {
    /// Parse a type name such as `nvarchar(50)` or `DECIMAL(10, 2)`.
    ///
    /// Returns `None` for types that cannot be masked (spatial, binary,
    /// rowversion, sql_variant, hierarchyid, ...).
    pub fn parse(value: &str) -> Option<Self> {
        let base = value
            .split('(')
            .next()
            .unwrap_or(value)
            .trim()
            .to_lowercase();
        let parsed = match base.as_str() {
            "bit" => SqlType::Bit,
            "tinyint" => SqlType::TinyInt,
            "smallint" => SqlType::SmallInt,
            "int" | "integer" => SqlType::Int,
            "bigint" => SqlType::BigInt,
            "decimal" => SqlType::Decimal,
            "numeric" => SqlType::Numeric,
            "money" => SqlType::Money,
            "smallmoney" => SqlType::SmallMoney,
            "float" => SqlType::Float,
            "real" => SqlType::Real,
            "char" => SqlType::Char,
            "nchar" => SqlType::NChar,
            "varchar" => SqlType::VarChar,
            "nvarchar" => SqlType::NVarChar,
            "text" => SqlType::Text,
            "ntext" => SqlType::NText,
            "date" => SqlType::Date,
            "time" => SqlType::Time,
            "datetime" => SqlType::DateTime,
            "datetime2" => SqlType::DateTime2,
            "smalldatetime" => SqlType::SmallDateTime,
            "datetimeoffset" => SqlType::DateTimeOffset,
            "uniqueidentifier" => SqlType::UniqueIdentifier,
            "xml" => SqlType::Xml,
            _ => return None,
        };
        Some(parsed)
    }

    pub fn family(self) -> TypeFamily {
        match self {
            SqlType::Bit => TypeFamily::Bool,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Int | SqlType::BigInt => {
                TypeFamily::Integer
            }
            SqlType::Decimal | SqlType::Numeric | SqlType::Money | SqlType::SmallMoney => {
                TypeFamily::Decimal
            }
            SqlType::Float | SqlType::Real => TypeFamily::Float,
            SqlType::Char
            | SqlType::NChar
            | SqlType::VarChar
            | SqlType::NVarChar
            | SqlType::Text
            | SqlType::NText
            | SqlType::Xml => TypeFamily::Text,
            SqlType::Date => TypeFamily::Date,
            SqlType::Time => TypeFamily::Time,
            SqlType::DateTime
            | SqlType::DateTime2
            | SqlType::SmallDateTime
            | SqlType::DateTimeOffset => TypeFamily::DateTime,
            SqlType::UniqueIdentifier => TypeFamily::Uuid,
        }
    }

    /// Inclusive value range for integer types.
    pub fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            SqlType::Bit => Some((0, 1)),
            SqlType::TinyInt => Some((0, 255)),
            SqlType::SmallInt => Some((i16::MIN as i64, i16::MAX as i64)),
            SqlType::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            SqlType::BigInt => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    pub fn is_unicode(self) -> bool {
        matches!(
            self,
            SqlType::NChar | SqlType::NVarChar | SqlType::NText | SqlType::Xml
        )
    }

    /// Fixed-width character types pad to their declared length.
    pub fn is_fixed_length(self) -> bool {
        matches!(self, SqlType::Char | SqlType::NChar)
    }
}

/// Column metadata for a live table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    /// Declared character length; `None` for `max` and non-character types.
    pub max_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
    pub is_nullable: bool,
    pub is_identity: bool,
    pub is_computed: bool,
}

impl ColumnInfo {
    pub fn sql_type(&self) -> Option<SqlType> {
        SqlType::parse(&self.data_type)
    }
}

/// Index metadata; only unique indexes matter to masking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_primary_key: bool,
}

/// Live table description returned by the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: TableName,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn identity_column(&self) -> Option<&ColumnInfo> {
        self.columns.iter().find(|column| column.is_identity)
    }

    pub fn unique_indexes(&self) -> impl Iterator<Item = &IndexInfo> {
        self.indexes.iter().filter(|index| index.is_unique)
    }
}
