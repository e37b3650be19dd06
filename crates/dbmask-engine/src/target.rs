use std::fmt;

use dbmask_core::{Result, SqlType, SqlValue, TableInfo, TableName};

static NULL_VALUE: SqlValue = SqlValue::Null;

/// Rows read for one table, addressed by the ordinal column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in value order, excluding the ordinal.
    pub columns: Vec<String>,
    pub rows: Vec<SourceRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub ordinal: i64,
    pub values: Vec<SqlValue>,
}

impl RowSet {
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
    }

    /// Value of `column` in the row at `index`; NULL when either is unknown.
    pub fn value(&self, index: usize, column: &str) -> &SqlValue {
        self.position(column)
            .and_then(|pos| self.rows.get(index).and_then(|row| row.values.get(pos)))
            .unwrap_or(&NULL_VALUE)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// New values for one row, targeted by its ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub ordinal: i64,
    pub values: Vec<(String, SqlValue)>,
}

/// Date parts understood by `DATEADD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Quarter,
    Month,
    DayOfYear,
    Day,
    Week,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl DatePart {
    pub fn parse(value: &str) -> Option<Self> {
        let part = match value.trim().to_lowercase().as_str() {
            "year" | "years" => DatePart::Year,
            "quarter" => DatePart::Quarter,
            "month" | "months" => DatePart::Month,
            "dayofyear" => DatePart::DayOfYear,
            "day" | "days" => DatePart::Day,
            "week" | "weeks" => DatePart::Week,
            "hour" | "hours" => DatePart::Hour,
            "minute" | "minutes" => DatePart::Minute,
            "second" | "seconds" => DatePart::Second,
            "millisecond" | "milliseconds" => DatePart::Millisecond,
            _ => return None,
        };
        Some(part)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Quarter => "quarter",
            DatePart::Month => "month",
            DatePart::DayOfYear => "dayofyear",
            DatePart::Day => "day",
            DatePart::Week => "week",
            DatePart::Hour => "hour",
            DatePart::Minute => "minute",
            DatePart::Second => "second",
            DatePart::Millisecond => "millisecond",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConcatPart {
    Literal(String),
    Column(String),
}

/// Set-based expression computed from the row's current values.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentExpr {
    Null,
    Literal(SqlValue),
    DateAdd { part: DatePart, amount: i64 },
    Arithmetic { op: ArithmeticOp, operand: f64 },
    CopyColumn(String),
    Concat(Vec<ConcatPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAssignment {
    pub column: String,
    pub sql_type: SqlType,
    pub expr: AssignmentExpr,
}

impl fmt::Display for ColumnAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {:?}", self.column, self.expr)
    }
}

/// Everything the orchestrator needs from the database being masked.
///
/// Implementations own SQL rendering; the orchestrator only passes typed
/// values and expressions.
pub trait MaskTarget {
    /// Describe a live table, or `None` when it does not exist.
    fn describe_table(&self, table: &TableName) -> Result<Option<TableInfo>>;
    /// Add `column` as `BIGINT IDENTITY(1,1)`.
    fn add_ordinal_column(&self, table: &TableName, column: &str) -> Result<()>;
    fn drop_column(&self, table: &TableName, column: &str) -> Result<()>;
    fn create_index(&self, table: &TableName, index: &str, column: &str) -> Result<()>;
    fn drop_index(&self, table: &TableName, index: &str) -> Result<()>;
    /// Read `columns` ordered by `ordinal`, restricted by an optional predicate.
    fn read_rows(
        &self,
        table: &TableName,
        ordinal: &str,
        columns: &[String],
        filter: Option<&str>,
    ) -> Result<RowSet>;
    /// Apply per-row updates as one batch; returns affected rows.
    fn execute_batch(&self, table: &TableName, ordinal: &str, updates: &[RowUpdate])
    -> Result<u64>;
    /// Apply set-based assignments as one statement; returns affected rows.
    fn apply_assignments(
        &self,
        table: &TableName,
        assignments: &[ColumnAssignment],
        filter: Option<&str>,
    ) -> Result<u64>;
}
