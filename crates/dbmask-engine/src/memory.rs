//! In-memory [`MaskTarget`] used by tests and dry runs.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, Months, NaiveDate, NaiveDateTime};

use dbmask_core::{
    ColumnInfo, DbError, IndexInfo, Result, SqlType, SqlValue, TableInfo, TableName, TypeFamily,
};

use crate::target::{
    ArithmeticOp, AssignmentExpr, ColumnAssignment, ConcatPart, DatePart, MaskTarget, RowSet,
    RowUpdate, SourceRow,
};

/// Read-only view of one stored row, handed to filter predicates.
pub struct RowView<'a> {
    columns: &'a [ColumnInfo],
    values: &'a [SqlValue],
}

impl RowView<'_> {
    pub fn get(&self, column: &str) -> &SqlValue {
        self.columns
            .iter()
            .position(|info| info.name.eq_ignore_ascii_case(column))
            .and_then(|pos| self.values.get(pos))
            .unwrap_or(&SqlValue::Null)
    }
}

type FilterFn = Box<dyn Fn(&RowView<'_>) -> bool>;

/// One flushed per-row batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    pub table: TableName,
    pub statements: usize,
    pub affected: u64,
}

#[derive(Debug, Clone)]
struct MemoryTable {
    info: TableInfo,
    rows: Vec<Vec<SqlValue>>,
}

impl MemoryTable {
    fn position(&self, column: &str) -> Option<usize> {
        self.info
            .columns
            .iter()
            .position(|info| info.name.eq_ignore_ascii_case(column))
    }

    /// Unique index whose key row `idx` now shares with another row.
    ///
    /// Keys compare like the default collation: case-insensitive, trailing
    /// spaces ignored, NULLs equal.
    fn duplicate_key(&self, idx: usize) -> Option<&str> {
        let row = self.rows.get(idx)?;
        self.info.unique_indexes().find_map(|index| {
            let positions: Vec<usize> = index
                .columns
                .iter()
                .filter_map(|column| self.position(column))
                .collect();
            let key = |values: &[SqlValue]| -> Vec<Option<String>> {
                positions
                    .iter()
                    .map(|pos| {
                        values
                            .get(*pos)
                            .and_then(SqlValue::canonical)
                            .map(|text| text.trim_end_matches(' ').to_lowercase())
                    })
                    .collect()
            };
            let own = key(row);
            self.rows
                .iter()
                .enumerate()
                .any(|(other, values)| other != idx && key(values) == own)
                .then_some(index.name.as_str())
        })
    }
}

fn duplicate_key_error(table: &TableName, index: &str) -> DbError {
    DbError::query(
        format!("Cannot insert duplicate key row in object '{table}' with unique index '{index}'."),
        String::new(),
    )
}

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, MemoryTable>,
    filters: HashMap<String, FilterFn>,
    batches: Vec<BatchRecord>,
    assignments: Vec<(TableName, Vec<ColumnAssignment>)>,
    batch_counts: HashMap<String, u64>,
    failing_batches: HashSet<(String, u64)>,
    lost_connections: HashSet<String>,
}

/// Tables held in memory.
///
/// Filter predicates are registered by their SQL text; reading with an
/// unregistered predicate fails the same way an invalid one would on a server.
#[derive(Default)]
pub struct MemoryTarget {
    state: RefCell<MemoryState>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; each row holds one value per column in declaration order.
    pub fn insert_table(&self, info: TableInfo, rows: Vec<Vec<SqlValue>>) {
        let key = info.name.key();
        self.state
            .borrow_mut()
            .tables
            .insert(key, MemoryTable { info, rows });
    }

    pub fn register_filter<F>(&self, predicate: impl Into<String>, filter: F)
    where
        F: Fn(&RowView<'_>) -> bool + 'static,
    {
        self.state
            .borrow_mut()
            .filters
            .insert(predicate.into(), Box::new(filter));
    }

    /// Make the `batch`-th flush (1-based) for `table` fail.
    pub fn fail_batch(&self, table: &TableName, batch: u64) {
        self.state
            .borrow_mut()
            .failing_batches
            .insert((table.key(), batch));
    }

    /// Make every write to `table` fail as if the connection dropped.
    pub fn lose_connection_on(&self, table: &TableName) {
        self.state
            .borrow_mut()
            .lost_connections
            .insert(table.key());
    }

    pub fn column_values(&self, table: &TableName, column: &str) -> Vec<SqlValue> {
        let state = self.state.borrow();
        let Some(stored) = state.tables.get(&table.key()) else {
            return Vec::new();
        };
        let Some(pos) = stored.position(column) else {
            return Vec::new();
        };
        stored
            .rows
            .iter()
            .map(|row| row.get(pos).cloned().unwrap_or(SqlValue::Null))
            .collect()
    }

    pub fn table_info(&self, table: &TableName) -> Option<TableInfo> {
        self.state
            .borrow()
            .tables
            .get(&table.key())
            .map(|stored| stored.info.clone())
    }

    pub fn has_column(&self, table: &TableName, column: &str) -> bool {
        self.table_info(table)
            .is_some_and(|info| info.column(column).is_some())
    }

    pub fn index_names(&self, table: &TableName) -> Vec<String> {
        self.table_info(table)
            .map(|info| info.indexes.into_iter().map(|index| index.name).collect())
            .unwrap_or_default()
    }

    pub fn batches(&self) -> Vec<BatchRecord> {
        self.state.borrow().batches.clone()
    }

    pub fn batches_for(&self, table: &TableName) -> Vec<BatchRecord> {
        self.batches()
            .into_iter()
            .filter(|batch| &batch.table == table)
            .collect()
    }

    /// Set-based passes applied to `table`, in order.
    pub fn assignment_passes(&self, table: &TableName) -> Vec<Vec<ColumnAssignment>> {
        self.state
            .borrow()
            .assignments
            .iter()
            .filter(|(name, _)| name == table)
            .map(|(_, pass)| pass.clone())
            .collect()
    }

    fn check_connection(state: &MemoryState, table: &TableName) -> Result<()> {
        if state.lost_connections.contains(&table.key()) {
            return Err(DbError::Connection(format!("connection lost while writing {table}")));
        }
        Ok(())
    }
}

fn missing_table(table: &TableName) -> DbError {
    DbError::query(format!("Invalid object name '{table}'"), String::new())
}

fn missing_column(column: &str) -> DbError {
    DbError::query(format!("Invalid column name '{column}'"), String::new())
}

fn selected_rows(
    state: &MemoryState,
    stored: &MemoryTable,
    filter: Option<&str>,
) -> Result<Vec<usize>> {
    let predicate = match filter.map(str::trim).filter(|filter| !filter.is_empty()) {
        Some(text) => Some(state.filters.get(text).ok_or_else(|| {
            DbError::Unsupported(format!("filter predicate is not registered: {text}"))
        })?),
        None => None,
    };
    Ok(stored
        .rows
        .iter()
        .enumerate()
        .filter(|(_, values)| {
            predicate.is_none_or(|predicate| {
                predicate(&RowView {
                    columns: &stored.info.columns,
                    values,
                })
            })
        })
        .map(|(idx, _)| idx)
        .collect())
}

impl MaskTarget for MemoryTarget {
    fn describe_table(&self, table: &TableName) -> Result<Option<TableInfo>> {
        Ok(self.table_info(table))
    }

    fn add_ordinal_column(&self, table: &TableName, column: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .tables
            .get_mut(&table.key())
            .ok_or_else(|| missing_table(table))?;
        if stored.position(column).is_some() {
            return Err(DbError::query(
                format!("Column names in each table must be unique: '{column}'"),
                String::new(),
            ));
        }
        if stored.info.identity_column().is_some() {
            return Err(DbError::query(
                format!("Multiple identity columns specified for table '{table}'"),
                String::new(),
            ));
        }
        stored.info.columns.push(ColumnInfo {
            name: column.to_string(),
            data_type: "bigint".to_string(),
            max_length: None,
            numeric_precision: Some(19),
            numeric_scale: Some(0),
            is_nullable: false,
            is_identity: true,
            is_computed: false,
        });
        for (idx, row) in stored.rows.iter_mut().enumerate() {
            row.push(SqlValue::Int(idx as i64 + 1));
        }
        Ok(())
    }

    fn drop_column(&self, table: &TableName, column: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .tables
            .get_mut(&table.key())
            .ok_or_else(|| missing_table(table))?;
        let pos = stored
            .position(column)
            .ok_or_else(|| missing_column(column))?;
        stored.info.columns.remove(pos);
        for row in &mut stored.rows {
            if pos < row.len() {
                row.remove(pos);
            }
        }
        Ok(())
    }

    fn create_index(&self, table: &TableName, index: &str, column: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .tables
            .get_mut(&table.key())
            .ok_or_else(|| missing_table(table))?;
        if stored.position(column).is_none() {
            return Err(missing_column(column));
        }
        if stored.info.indexes.iter().any(|existing| existing.name == index) {
            return Err(DbError::query(
                format!("index '{index}' already exists on {table}"),
                String::new(),
            ));
        }
        stored.info.indexes.push(IndexInfo {
            name: index.to_string(),
            columns: vec![column.to_string()],
            is_unique: false,
            is_primary_key: false,
        });
        Ok(())
    }

    fn drop_index(&self, table: &TableName, index: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .tables
            .get_mut(&table.key())
            .ok_or_else(|| missing_table(table))?;
        stored.info.indexes.retain(|existing| existing.name != index);
        Ok(())
    }

    fn read_rows(
        &self,
        table: &TableName,
        ordinal: &str,
        columns: &[String],
        filter: Option<&str>,
    ) -> Result<RowSet> {
        let state = self.state.borrow();
        let stored = state
            .tables
            .get(&table.key())
            .ok_or_else(|| missing_table(table))?;
        let ordinal_pos = stored
            .position(ordinal)
            .ok_or_else(|| missing_column(ordinal))?;
        let positions = columns
            .iter()
            .map(|column| stored.position(column).ok_or_else(|| missing_column(column)))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::new();
        for idx in selected_rows(&state, stored, filter)? {
            let values = &stored.rows[idx];
            let ordinal = values
                .get(ordinal_pos)
                .and_then(SqlValue::as_i64)
                .ok_or_else(|| DbError::query("ordinal column is not an integer", String::new()))?;
            rows.push(SourceRow {
                ordinal,
                values: positions
                    .iter()
                    .map(|pos| values.get(*pos).cloned().unwrap_or(SqlValue::Null))
                    .collect(),
            });
        }
        rows.sort_by_key(|row| row.ordinal);
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
        let mut state = self.state.borrow_mut();
        Self::check_connection(&state, table)?;
        let key = table.key();
        let count = state.batch_counts.entry(key.clone()).or_insert(0);
        *count += 1;
        let batch = *count;
        if state.failing_batches.contains(&(key.clone(), batch)) {
            return Err(DbError::query(
                format!("batch {batch} rejected for {table}"),
                String::new(),
            ));
        }

        let stored = state
            .tables
            .get_mut(&key)
            .ok_or_else(|| missing_table(table))?;
        let ordinal_pos = stored
            .position(ordinal)
            .ok_or_else(|| missing_column(ordinal))?;
        let mut affected = 0_u64;
        for update in updates {
            let positions = update
                .values
                .iter()
                .map(|(column, _)| stored.position(column).ok_or_else(|| missing_column(column)))
                .collect::<Result<Vec<_>>>()?;
            // Each row is its own statement, so the index is checked per row.
            for idx in 0..stored.rows.len() {
                if stored.rows[idx].get(ordinal_pos).and_then(SqlValue::as_i64)
                    != Some(update.ordinal)
                {
                    continue;
                }
                let before = stored.rows[idx].clone();
                for (pos, (_, value)) in positions.iter().zip(&update.values) {
                    stored.rows[idx][*pos] = value.clone();
                }
                if let Some(index) = stored.duplicate_key(idx) {
                    let err = duplicate_key_error(table, index);
                    stored.rows[idx] = before;
                    return Err(err);
                }
                affected += 1;
            }
        }
        state.batches.push(BatchRecord {
            table: table.clone(),
            statements: updates.len(),
            affected,
        });
        Ok(affected)
    }

    fn apply_assignments(
        &self,
        table: &TableName,
        assignments: &[ColumnAssignment],
        filter: Option<&str>,
    ) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        Self::check_connection(&state, table)?;
        let key = table.key();
        let selected = {
            let stored = state.tables.get(&key).ok_or_else(|| missing_table(table))?;
            selected_rows(&state, stored, filter)?
        };
        let stored = state
            .tables
            .get_mut(&key)
            .ok_or_else(|| missing_table(table))?;
        let targets = assignments
            .iter()
            .map(|assignment| {
                stored
                    .position(&assignment.column)
                    .ok_or_else(|| missing_column(&assignment.column))
            })
            .collect::<Result<Vec<_>>>()?;

        let snapshot = stored.rows.clone();
        for idx in &selected {
            // Every expression sees the row as it was before the statement.
            let before = stored.rows[*idx].clone();
            let view = RowView {
                columns: &stored.info.columns,
                values: &before,
            };
            let mut computed = Vec::with_capacity(assignments.len());
            for (assignment, pos) in assignments.iter().zip(&targets) {
                let current = before.get(*pos).unwrap_or(&SqlValue::Null);
                computed.push(evaluate(assignment, current, &view)?);
            }
            for (pos, value) in targets.iter().zip(computed) {
                stored.rows[*idx][*pos] = value;
            }
        }
        // A set-based statement is checked once, after every row changed.
        if let Some(index) = selected.iter().find_map(|idx| stored.duplicate_key(*idx)) {
            let err = duplicate_key_error(table, index);
            stored.rows = snapshot;
            return Err(err);
        }
        state
            .assignments
            .push((table.clone(), assignments.to_vec()));
        Ok(selected.len() as u64)
    }
}

fn evaluate(
    assignment: &ColumnAssignment,
    current: &SqlValue,
    row: &RowView<'_>,
) -> Result<SqlValue> {
    let value = match &assignment.expr {
        AssignmentExpr::Null => SqlValue::Null,
        AssignmentExpr::Literal(value) => value.clone(),
        AssignmentExpr::CopyColumn(source) => row.get(source).clone(),
        AssignmentExpr::DateAdd { part, amount } => {
            if current.is_null() {
                SqlValue::Null
            } else {
                date_add(current, *part, *amount).ok_or_else(|| {
                    DbError::query(
                        format!("DATEADD {} overflowed for '{}'", part.keyword(), assignment.column),
                        String::new(),
                    )
                })?
            }
        }
        AssignmentExpr::Arithmetic { op, operand } => {
            arithmetic(current, *op, *operand, assignment.sql_type)?
        }
        AssignmentExpr::Concat(parts) => {
            let text = parts
                .iter()
                .map(|part| match part {
                    ConcatPart::Literal(text) => text.clone(),
                    ConcatPart::Column(name) => row.get(name).canonical().unwrap_or_default(),
                })
                .collect::<String>();
            SqlValue::Text(text)
        }
    };
    Ok(value)
}

fn arithmetic(
    current: &SqlValue,
    op: ArithmeticOp,
    operand: f64,
    sql_type: SqlType,
) -> Result<SqlValue> {
    if current.is_null() {
        return Ok(SqlValue::Null);
    }
    if op == ArithmeticOp::Divide && operand == 0.0 {
        return Err(DbError::query("Divide by zero error encountered.", String::new()));
    }
    if let (SqlValue::Int(value), true) = (current, operand.fract() == 0.0) {
        let operand = operand as i64;
        let result = match op {
            ArithmeticOp::Add => value.checked_add(operand),
            ArithmeticOp::Subtract => value.checked_sub(operand),
            ArithmeticOp::Multiply => value.checked_mul(operand),
            ArithmeticOp::Divide => value.checked_div(operand),
        };
        return result
            .map(SqlValue::Int)
            .ok_or_else(|| DbError::query("Arithmetic overflow error", String::new()));
    }
    let value = current
        .as_f64()
        .ok_or_else(|| DbError::query("arithmetic on a non-numeric value", String::new()))?;
    let result = match op {
        ArithmeticOp::Add => value + operand,
        ArithmeticOp::Subtract => value - operand,
        ArithmeticOp::Multiply => value * operand,
        ArithmeticOp::Divide => value / operand,
    };
    if sql_type.family() == TypeFamily::Integer {
        Ok(SqlValue::Int(result.trunc() as i64))
    } else {
        Ok(SqlValue::Float(result))
    }
}

fn date_add(value: &SqlValue, part: DatePart, amount: i64) -> Option<SqlValue> {
    let base = NaiveDate::from_ymd_opt(1900, 1, 1)?;
    match value {
        SqlValue::DateTime(value) => shift(*value, part, amount).map(SqlValue::DateTime),
        SqlValue::Date(value) => shift(value.and_hms_opt(0, 0, 0)?, part, amount)
            .map(|shifted| SqlValue::Date(shifted.date())),
        SqlValue::Time(value) => {
            shift(base.and_time(*value), part, amount).map(|shifted| SqlValue::Time(shifted.time()))
        }
        _ => None,
    }
}

fn shift(value: NaiveDateTime, part: DatePart, amount: i64) -> Option<NaiveDateTime> {
    match part {
        DatePart::Year => add_months(value, amount.checked_mul(12)?),
        DatePart::Quarter => add_months(value, amount.checked_mul(3)?),
        DatePart::Month => add_months(value, amount),
        DatePart::DayOfYear | DatePart::Day => value.checked_add_signed(Duration::try_days(amount)?),
        DatePart::Week => value.checked_add_signed(Duration::try_weeks(amount)?),
        DatePart::Hour => value.checked_add_signed(Duration::try_hours(amount)?),
        DatePart::Minute => value.checked_add_signed(Duration::try_minutes(amount)?),
        DatePart::Second => value.checked_add_signed(Duration::try_seconds(amount)?),
        DatePart::Millisecond => value.checked_add_signed(Duration::try_milliseconds(amount)?),
    }
}

fn add_months(value: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        value.checked_add_months(count)
    } else {
        value.checked_sub_months(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, identity: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_nullable: true,
            is_identity: identity,
            is_computed: false,
        }
    }

    fn orders() -> (MemoryTarget, TableName) {
        let name = TableName::new("sales", "Orders");
        let target = MemoryTarget::new();
        target.insert_table(
            TableInfo {
                name: name.clone(),
                columns: vec![
                    column("Region", "varchar", false),
                    column("Total", "int", false),
                    column("ShippedAt", "datetime2", false),
                ],
                indexes: Vec::new(),
            },
            vec![
                vec![
                    SqlValue::Text("EU".to_string()),
                    SqlValue::Int(10),
                    SqlValue::DateTime(
                        NaiveDate::from_ymd_opt(2024, 1, 31)
                            .and_then(|date| date.and_hms_opt(12, 0, 0))
                            .unwrap_or_default(),
                    ),
                ],
                vec![
                    SqlValue::Text("US".to_string()),
                    SqlValue::Int(7),
                    SqlValue::Null,
                ],
            ],
        );
        (target, name)
    }

    #[test]
    fn ordinal_column_numbers_rows_and_can_be_dropped() {
        let (target, name) = orders();
        target.add_ordinal_column(&name, "rownr").expect("add");
        assert_eq!(
            target.column_values(&name, "rownr"),
            vec![SqlValue::Int(1), SqlValue::Int(2)]
        );
        assert!(target.add_ordinal_column(&name, "other").is_err());
        target.drop_column(&name, "rownr").expect("drop");
        assert!(!target.has_column(&name, "rownr"));
    }

    #[test]
    fn filters_must_be_registered() {
        let (target, name) = orders();
        target.add_ordinal_column(&name, "rownr").expect("add");
        let columns = vec!["Region".to_string()];
        assert!(
            target
                .read_rows(&name, "rownr", &columns, Some("Region = 'EU'"))
                .is_err()
        );

        target.register_filter("Region = 'EU'", |row| {
            row.get("Region").as_str() == Some("EU")
        });
        let rows = target
            .read_rows(&name, "rownr", &columns, Some("Region = 'EU'"))
            .expect("read");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0].ordinal, 1);
    }

    #[test]
    fn assignments_see_pre_update_values() {
        let (target, name) = orders();
        let assignments = vec![
            ColumnAssignment {
                column: "Total".to_string(),
                sql_type: SqlType::Int,
                expr: AssignmentExpr::Arithmetic {
                    op: ArithmeticOp::Divide,
                    operand: 2.0,
                },
            },
            ColumnAssignment {
                column: "Region".to_string(),
                sql_type: SqlType::VarChar,
                expr: AssignmentExpr::Concat(vec![
                    ConcatPart::Literal("R-".to_string()),
                    ConcatPart::Column("Total".to_string()),
                ]),
            },
            ColumnAssignment {
                column: "ShippedAt".to_string(),
                sql_type: SqlType::DateTime2,
                expr: AssignmentExpr::DateAdd {
                    part: DatePart::Month,
                    amount: 1,
                },
            },
        ];
        assert_eq!(target.apply_assignments(&name, &assignments, None).expect("apply"), 2);
        assert_eq!(
            target.column_values(&name, "Total"),
            vec![SqlValue::Int(5), SqlValue::Int(3)]
        );
        assert_eq!(
            target.column_values(&name, "Region"),
            vec![
                SqlValue::Text("R-10".to_string()),
                SqlValue::Text("R-7".to_string())
            ]
        );
        let shipped = target.column_values(&name, "ShippedAt");
        assert_eq!(
            shipped[0],
            SqlValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 2, 29)
                    .and_then(|date| date.and_hms_opt(12, 0, 0))
                    .unwrap_or_default()
            )
        );
        assert_eq!(shipped[1], SqlValue::Null);
        assert_eq!(target.assignment_passes(&name).len(), 1);
    }

    #[test]
    fn injected_batch_failure_is_reported() {
        let (target, name) = orders();
        target.add_ordinal_column(&name, "rownr").expect("add");
        target.fail_batch(&name, 2);
        let update = |ordinal| RowUpdate {
            ordinal,
            values: vec![("Total".to_string(), SqlValue::Int(0))],
        };
        assert_eq!(
            target
                .execute_batch(&name, "rownr", &[update(1)])
                .expect("first batch"),
            1
        );
        assert!(target.execute_batch(&name, "rownr", &[update(2)]).is_err());
        assert_eq!(target.batches_for(&name).len(), 1);

        target.lose_connection_on(&name);
        let err = target
            .execute_batch(&name, "rownr", &[update(2)])
            .expect_err("connection lost");
        assert!(err.is_connection());
    }

    #[test]
    fn unique_indexes_are_checked_per_statement() {
        let name = TableName::new("dbo", "Voucher");
        let target = MemoryTarget::new();
        target.insert_table(
            TableInfo {
                name: name.clone(),
                columns: vec![column("Code", "varchar", false)],
                indexes: vec![IndexInfo {
                    name: "ux_code".to_string(),
                    columns: vec!["Code".to_string()],
                    is_unique: true,
                    is_primary_key: false,
                }],
            },
            vec![
                vec![SqlValue::Text("A".to_string())],
                vec![SqlValue::Text("B".to_string())],
            ],
        );
        target.add_ordinal_column(&name, "rownr").expect("add");
        let update = |ordinal, code: &str| RowUpdate {
            ordinal,
            values: vec![("Code".to_string(), SqlValue::Text(code.to_string()))],
        };

        // Swapping row by row collides with the row not yet updated.
        let err = target
            .execute_batch(&name, "rownr", &[update(1, "b "), update(2, "A")])
            .expect_err("duplicate key");
        assert!(err.to_string().contains("ux_code"));
        assert_eq!(
            target.column_values(&name, "Code"),
            vec![SqlValue::Text("A".to_string()), SqlValue::Text("B".to_string())]
        );

        target
            .execute_batch(&name, "rownr", &[update(1, "C"), update(2, "D")])
            .expect("distinct keys");
        let err = target
            .apply_assignments(
                &name,
                &[ColumnAssignment {
                    column: "Code".to_string(),
                    sql_type: SqlType::VarChar,
                    expr: AssignmentExpr::Literal(SqlValue::Text("E".to_string())),
                }],
                None,
            )
            .expect_err("both rows would hold E");
        assert!(err.to_string().contains("duplicate key"));
        assert_eq!(
            target.column_values(&name, "Code"),
            vec![SqlValue::Text("C".to_string()), SqlValue::Text("D".to_string())]
        );
    }
}
