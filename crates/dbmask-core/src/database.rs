use crate::error::Result;
use crate::value::SqlValue;

/// One result row; values are positional in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// Synchronous connection to one database on a SQL Server instance.
///
/// Implementations apply their own command timeout and report it as
/// [`DbError::Timeout`](crate::DbError::Timeout). Methods take `&self` so the
/// masking target and the scratch store can share one connection.
pub trait Database {
    /// Name of the database the connection is scoped to.
    fn database_name(&self) -> &str;

    /// Run a statement that returns rows (first result set only).
    fn execute_query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Run a statement batch and return the affected row count.
    fn execute_non_query(&self, sql: &str) -> Result<u64>;
}

impl<D: Database + ?Sized> Database for &D {
    fn database_name(&self) -> &str {
        (**self).database_name()
    }

    fn execute_query(&self, sql: &str) -> Result<Vec<Row>> {
        (**self).execute_query(sql)
    }

    fn execute_non_query(&self, sql: &str) -> Result<u64> {
        (**self).execute_non_query(sql)
    }
}
