//! T-SQL rendering for the masking target.
//!
//! Identifiers are bracket-quoted, strings are `N''` literals, and temporal
//! values use ISO 8601 forms that SQL Server reads the same way under every
//! language and date-format setting.

use tracing::debug;

use dbmask_core::{
    ColumnInfo, Database, DbError, IndexInfo, Result, Row, SqlValue, TableInfo, TableName,
    parse_decimal_value, qualify, quote_ident, quote_literal,
};

use crate::target::{
    AssignmentExpr, ColumnAssignment, ConcatPart, MaskTarget, RowSet, RowUpdate, SourceRow,
};

const COLUMNS_QUERY: &str = "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, \
     NUMERIC_PRECISION, NUMERIC_SCALE, \
     CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END, \
     ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(TABLE_SCHEMA) + '.' + QUOTENAME(TABLE_NAME)), COLUMN_NAME, 'IsIdentity'), 0), \
     ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(TABLE_SCHEMA) + '.' + QUOTENAME(TABLE_NAME)), COLUMN_NAME, 'IsComputed'), 0) \
     FROM INFORMATION_SCHEMA.COLUMNS";

const INDEXES_QUERY: &str = "SELECT i.name, i.is_unique, i.is_primary_key, \
     STUFF(( \
         SELECT ',' + c.name \
         FROM sys.index_columns ic \
         JOIN sys.columns c ON ic.object_id = c.object_id AND ic.column_id = c.column_id \
         WHERE ic.object_id = i.object_id AND ic.index_id = i.index_id AND ic.is_included_column = 0 \
         ORDER BY ic.key_ordinal \
         FOR XML PATH('') \
     ), 1, 1, '') \
     FROM sys.indexes i \
     JOIN sys.tables tb ON i.object_id = tb.object_id \
     JOIN sys.schemas s ON tb.schema_id = s.schema_id";

/// [`MaskTarget`] that renders T-SQL and runs it through a [`Database`].
pub struct SqlServerTarget<D: Database> {
    db: D,
}

impl<D: Database> SqlServerTarget<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    fn load_columns(&self, table: &TableName) -> Result<Vec<ColumnInfo>> {
        let sql = format!(
            "{COLUMNS_QUERY} WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} ORDER BY ORDINAL_POSITION;",
            quote_literal(&table.schema, true),
            quote_literal(&table.name, true)
        );
        let rows = self.db.execute_query(&sql)?;
        rows.iter()
            .map(|row| -> Result<ColumnInfo> {
                Ok(ColumnInfo {
                    name: text_at(row, 0)
                        .ok_or_else(|| DbError::query("column row without a name", sql.clone()))?,
                    data_type: text_at(row, 1).unwrap_or_default(),
                    max_length: int_at(row, 2)
                        .filter(|length| *length > 0)
                        .map(|length| length as i32),
                    numeric_precision: int_at(row, 3).map(|value| value as i32),
                    numeric_scale: int_at(row, 4).map(|value| value as i32),
                    is_nullable: flag_at(row, 5),
                    is_identity: flag_at(row, 6),
                    is_computed: flag_at(row, 7),
                })
            })
            .collect()
    }

    fn load_indexes(&self, table: &TableName) -> Result<Vec<IndexInfo>> {
        let sql = format!(
            "{INDEXES_QUERY} WHERE s.name = {} AND tb.name = {} AND i.type > 0 ORDER BY i.name;",
            quote_literal(&table.schema, true),
            quote_literal(&table.name, true)
        );
        let rows = self.db.execute_query(&sql)?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let name = text_at(row, 0)?;
                let columns = text_at(row, 3)
                    .map(|list| {
                        list.split(',')
                            .filter(|column| !column.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                Some(IndexInfo {
                    name,
                    columns,
                    is_unique: flag_at(row, 1),
                    is_primary_key: flag_at(row, 2),
                })
            })
            .collect())
    }
}

impl<D: Database> MaskTarget for SqlServerTarget<D> {
    fn describe_table(&self, table: &TableName) -> Result<Option<TableInfo>> {
        let columns = self.load_columns(table)?;
        if columns.is_empty() {
            return Ok(None);
        }
        let indexes = self.load_indexes(table)?;
        debug!(
            table = %table,
            columns = columns.len(),
            indexes = indexes.len(),
            "table described"
        );
        Ok(Some(TableInfo {
            name: table.clone(),
            columns,
            indexes,
        }))
    }

    fn add_ordinal_column(&self, table: &TableName, column: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} ADD {} BIGINT IDENTITY(1,1) NOT NULL;",
            qualify(table)?,
            quote_ident(column)?
        );
        self.db.execute_non_query(&sql)?;
        Ok(())
    }

    fn drop_column(&self, table: &TableName, column: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {};",
            qualify(table)?,
            quote_ident(column)?
        );
        self.db.execute_non_query(&sql)?;
        Ok(())
    }

    fn create_index(&self, table: &TableName, index: &str, column: &str) -> Result<()> {
        let sql = format!(
            "CREATE NONCLUSTERED INDEX {} ON {} ({});",
            quote_ident(index)?,
            qualify(table)?,
            quote_ident(column)?
        );
        self.db.execute_non_query(&sql)?;
        Ok(())
    }

    fn drop_index(&self, table: &TableName, index: &str) -> Result<()> {
        let qualified = qualify(table)?;
        let sql = format!(
            "IF EXISTS (SELECT 1 FROM sys.indexes WHERE name = {} AND object_id = OBJECT_ID({})) \
             DROP INDEX {} ON {qualified};",
            quote_literal(index, true),
            quote_literal(&qualified, true),
            quote_ident(index)?
        );
        self.db.execute_non_query(&sql)?;
        Ok(())
    }

    fn read_rows(
        &self,
        table: &TableName,
        ordinal: &str,
        columns: &[String],
        filter: Option<&str>,
    ) -> Result<RowSet> {
        let ordinal_ident = quote_ident(ordinal)?;
        let mut select = vec![ordinal_ident.clone()];
        for column in columns {
            select.push(quote_ident(column)?);
        }
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {ordinal_ident};",
            select.join(", "),
            qualify(table)?,
            where_clause(filter)
        );
        let rows = self.db.execute_query(&sql)?;
        let rows = rows
            .into_iter()
            .map(|row| -> Result<SourceRow> {
                let mut values = row.into_values();
                if values.is_empty() {
                    return Err(DbError::query("row without an ordinal", sql.clone()));
                }
                let ordinal = values.remove(0).as_i64().ok_or_else(|| {
                    DbError::query("ordinal column is not an integer", sql.clone())
                })?;
                Ok(SourceRow { ordinal, values })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RowSet {
            columns: columns.to_vec(),
            rows,
        })
    }

    fn execute_batch(
        &self,
        table: &TableName,
        ordinal: &str,
        updates: &[RowUpdate],
    ) -> Result<u64> {
        let sql = render_batch(table, ordinal, updates)?;
        if sql.is_empty() {
            return Ok(0);
        }
        self.db.execute_non_query(&sql)
    }

    fn apply_assignments(
        &self,
        table: &TableName,
        assignments: &[ColumnAssignment],
        filter: Option<&str>,
    ) -> Result<u64> {
        if assignments.is_empty() {
            return Ok(0);
        }
        let sql = render_assignments(table, assignments, filter)?;
        self.db.execute_non_query(&sql)
    }
}

/// One `UPDATE ... WHERE ordinal = n;` statement per row, newline separated.
pub fn render_batch(table: &TableName, ordinal: &str, updates: &[RowUpdate]) -> Result<String> {
    let qualified = qualify(table)?;
    let ordinal = quote_ident(ordinal)?;
    let mut statements = Vec::with_capacity(updates.len());
    for update in updates {
        if update.values.is_empty() {
            continue;
        }
        let sets = update
            .values
            .iter()
            .map(|(column, value)| -> Result<String> {
                Ok(format!("{} = {}", quote_ident(column)?, sql_literal(value)))
            })
            .collect::<Result<Vec<_>>>()?;
        statements.push(format!(
            "UPDATE {qualified} SET {} WHERE {ordinal} = {};",
            sets.join(", "),
            update.ordinal
        ));
    }
    Ok(statements.join("\n"))
}

/// A single set-based `UPDATE` covering every assignment.
pub fn render_assignments(
    table: &TableName,
    assignments: &[ColumnAssignment],
    filter: Option<&str>,
) -> Result<String> {
    let sets = assignments
        .iter()
        .map(|assignment| -> Result<String> {
            let column = quote_ident(&assignment.column)?;
            let expr = render_expr(&column, &assignment.expr)?;
            Ok(format!("{column} = {expr}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "UPDATE {} SET {}{};",
        qualify(table)?,
        sets.join(", "),
        where_clause(filter)
    ))
}

fn render_expr(column: &str, expr: &AssignmentExpr) -> Result<String> {
    let rendered = match expr {
        AssignmentExpr::Null => "NULL".to_string(),
        AssignmentExpr::Literal(value) => sql_literal(value),
        AssignmentExpr::DateAdd { part, amount } => {
            format!("DATEADD({}, {amount}, {column})", part.keyword())
        }
        AssignmentExpr::Arithmetic { op, operand } => {
            format!("{column} {} {}", op.symbol(), number_literal(*operand))
        }
        AssignmentExpr::CopyColumn(source) => quote_ident(source)?,
        AssignmentExpr::Concat(parts) => {
            let mut args = parts
                .iter()
                .map(|part| match part {
                    ConcatPart::Literal(text) => Ok(quote_literal(text, true)),
                    ConcatPart::Column(name) => quote_ident(name),
                })
                .collect::<Result<Vec<_>>>()?;
            // CONCAT takes at least two arguments.
            if args.len() < 2 {
                args.push("N''".to_string());
            }
            format!("CONCAT({})", args.join(", "))
        }
    };
    Ok(rendered)
}

/// Literal for a typed value.
pub fn sql_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(flag) => if *flag { "1" } else { "0" }.to_string(),
        SqlValue::Int(number) => number.to_string(),
        SqlValue::Float(number) => number_literal(*number),
        SqlValue::Decimal(text) => {
            parse_decimal_value(text).unwrap_or_else(|| quote_literal(text, false))
        }
        SqlValue::Text(text) => quote_literal(text, true),
        SqlValue::Uuid(text) => quote_literal(text, false),
        SqlValue::Date(date) => format!("'{}'", date.format("%Y-%m-%d")),
        SqlValue::Time(time) => format!("'{}'", time.format("%H:%M:%S%.3f")),
        SqlValue::DateTime(value) => format!("'{}'", value.format("%Y-%m-%dT%H:%M:%S%.3f")),
    }
}

fn number_literal(number: f64) -> String {
    if !number.is_finite() {
        return "NULL".to_string();
    }
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

fn where_clause(filter: Option<&str>) -> String {
    match filter.map(str::trim).filter(|filter| !filter.is_empty()) {
        Some(filter) => format!(" WHERE ({filter})"),
        None => String::new(),
    }
}

fn text_at(row: &Row, idx: usize) -> Option<String> {
    match row.get(idx)? {
        SqlValue::Text(text) | SqlValue::Uuid(text) => Some(text.clone()),
        _ => None,
    }
}

fn int_at(row: &Row, idx: usize) -> Option<i64> {
    row.get(idx).and_then(|value| match value {
        SqlValue::Float(_) | SqlValue::Decimal(_) => value.as_f64().map(|number| number as i64),
        other => other.as_i64(),
    })
}

fn flag_at(row: &Row, idx: usize) -> bool {
    int_at(row, idx).is_some_and(|value| value != 0)
}
