use std::collections::{HashMap, HashSet};

use rand::Rng;
use tracing::debug;

use dbmask_core::{SqlValue, TableName};

use crate::errors::{MaskingError, Result};
use crate::generators::ColumnGenerator;
use crate::target::RowSet;

/// Key columns of one unique index on the live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndexPlan {
    pub name: String,
    pub columns: Vec<String>,
}

/// Pre-computed values for every masked column that takes part in a unique
/// index, addressed by `RowNr` (1-based position in the row set).
#[derive(Debug, Clone, Default)]
pub struct UniqueAssignments {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    retries: u64,
}

impl UniqueAssignments {
    pub fn get(&self, row_nr: usize, column: &str) -> Option<&SqlValue> {
        let pos = self
            .columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))?;
        row_nr
            .checked_sub(1)
            .and_then(|idx| self.rows.get(idx))
            .and_then(|row| row.get(pos))
    }

    pub fn covers(&self, column: &str) -> bool {
        self.columns
            .iter()
            .any(|name| name.eq_ignore_ascii_case(column))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn retries(&self) -> u64 {
        self.retries
    }
}

/// Generate collision-free values for the masked columns of unique indexes.
///
/// `generators` is keyed by lowercased column name; index columns without a
/// generator keep their current value and still take part in each tuple.
/// `occupied` holds the current index columns of every row in the table,
/// including rows outside the filter. New tuples never repeat an occupied
/// one, so each single-row `UPDATE` passes the index check on its own.
/// The retry budget is shared by every row of the table.
pub fn build_unique_assignments<R: Rng>(
    table: &TableName,
    indexes: &[UniqueIndexPlan],
    rows: &RowSet,
    occupied: &RowSet,
    generators: &HashMap<String, ColumnGenerator>,
    retry_limit: u64,
    rng: &mut R,
) -> Result<UniqueAssignments> {
    let mut columns: Vec<String> = Vec::new();
    for index in indexes {
        for column in &index.columns {
            let key = column.to_lowercase();
            if generators.contains_key(&key) && !columns.contains(&key) {
                columns.push(key);
            }
        }
    }

    let mut seen: Vec<HashSet<Vec<Option<String>>>> = vec![HashSet::new(); indexes.len()];
    for row_idx in 0..occupied.len() {
        for (index, set) in indexes.iter().zip(seen.iter_mut()) {
            set.insert(index_tuple(index, &[], &[], occupied, row_idx));
        }
    }
    let mut assigned = Vec::with_capacity(rows.len());
    let mut retries = 0_u64;

    for row_idx in 0..rows.len() {
        loop {
            let mut candidate = Vec::with_capacity(columns.len());
            for column in &columns {
                let generator = generators.get(column).ok_or_else(|| {
                    MaskingError::configuration(format!("no generator for unique column {column}"))
                })?;
                let value = generator
                    .generate(rows.value(row_idx, column), rng)
                    .map_err(|err| MaskingError::generation(column.clone(), err))?;
                candidate.push(value);
            }

            let tuples: Vec<Vec<Option<String>>> = indexes
                .iter()
                .map(|index| index_tuple(index, &columns, &candidate, rows, row_idx))
                .collect();
            let collides = tuples
                .iter()
                .zip(seen.iter())
                .any(|(tuple, set)| set.contains(tuple));

            if !collides {
                for (tuple, set) in tuples.into_iter().zip(seen.iter_mut()) {
                    set.insert(tuple);
                }
                assigned.push(candidate);
                break;
            }

            retries += 1;
            if retries > retry_limit {
                return Err(MaskingError::UniquenessExhausted {
                    table: table.to_string(),
                    attempts: retries,
                    limit: retry_limit,
                });
            }
        }
    }

    debug!(
        table = %table,
        rows = assigned.len(),
        occupied = occupied.len(),
        columns = columns.len(),
        retries,
        "unique assignments built"
    );

    Ok(UniqueAssignments {
        columns,
        rows: assigned,
        retries,
    })
}

fn index_tuple(
    index: &UniqueIndexPlan,
    masked: &[String],
    candidate: &[SqlValue],
    rows: &RowSet,
    row_idx: usize,
) -> Vec<Option<String>> {
    index
        .columns
        .iter()
        .map(|column| {
            let value = masked
                .iter()
                .position(|name| name.eq_ignore_ascii_case(column))
                .and_then(|pos| candidate.get(pos))
                .unwrap_or_else(|| rows.value(row_idx, column));
            comparison_key(value)
        })
        .collect()
}

/// Key that mirrors the default case-insensitive collation, which also
/// ignores trailing spaces.
fn comparison_key(value: &SqlValue) -> Option<String> {
    value
        .canonical()
        .map(|text| text.trim_end_matches(' ').to_lowercase())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use dbmask_config::Bound;
    use dbmask_core::SqlType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::generators::{Constraints, GeneratorKind, LocaleKey, RandomKind};
    use crate::target::SourceRow;

    fn number_generator(min: i64, max: i64) -> ColumnGenerator {
        let mut constraints = Constraints::new(
            SqlType::Int,
            LocaleKey::EnUs,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default(),
        );
        constraints.min = Some(Bound::Int(min));
        constraints.max = Some(Bound::Int(max));
        ColumnGenerator::from_kind(GeneratorKind::Random(RandomKind::Number), constraints)
            .expect("generator")
    }

    fn rows(count: usize) -> RowSet {
        RowSet {
            columns: vec!["Code".to_string(), "Tenant".to_string()],
            rows: (0..count)
                .map(|idx| SourceRow {
                    ordinal: idx as i64 + 1,
                    values: vec![SqlValue::Int(0), SqlValue::Int((idx % 2) as i64)],
                })
                .collect(),
        }
    }

    #[test]
    fn tuples_are_distinct_per_index() {
        let table = TableName::new("dbo", "Voucher");
        let indexes = vec![UniqueIndexPlan {
            name: "ux_code".to_string(),
            columns: vec!["Code".to_string()],
        }];
        let mut generators = HashMap::new();
        generators.insert("code".to_string(), number_generator(1, 60));
        let mut rng = ChaCha8Rng::seed_from_u64(41);
        let rows = rows(50);

        let assignments =
            build_unique_assignments(&table, &indexes, &rows, &rows, &generators, 1000, &mut rng)
                .expect("assignments");
        assert_eq!(assignments.len(), 50);
        let values: HashSet<i64> = (1..=50)
            .filter_map(|row_nr| assignments.get(row_nr, "Code").and_then(SqlValue::as_i64))
            .collect();
        assert_eq!(values.len(), 50);
        assert!(assignments.get(0, "Code").is_none());
        assert!(assignments.get(51, "Code").is_none());
    }

    #[test]
    fn unmasked_index_columns_take_part_in_tuples() {
        let table = TableName::new("dbo", "Voucher");
        let indexes = vec![UniqueIndexPlan {
            name: "ux_tenant_code".to_string(),
            columns: vec!["Tenant".to_string(), "Code".to_string()],
        }];
        let mut generators = HashMap::new();
        generators.insert("code".to_string(), number_generator(1, 5));
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let rows = rows(10);

        // Two tenants with five codes each fill the space exactly.
        let assignments =
            build_unique_assignments(&table, &indexes, &rows, &rows, &generators, 10_000, &mut rng)
                .expect("assignments");
        assert_eq!(assignments.len(), 10);
    }

    #[test]
    fn exhausted_budget_is_reported() {
        let table = TableName::new("dbo", "Voucher");
        let indexes = vec![UniqueIndexPlan {
            name: "ux_code".to_string(),
            columns: vec!["Code".to_string()],
        }];
        let mut generators = HashMap::new();
        generators.insert("code".to_string(), number_generator(1, 3));
        let mut rng = ChaCha8Rng::seed_from_u64(43);

        let rows = rows(4);
        let err = build_unique_assignments(&table, &indexes, &rows, &rows, &generators, 25, &mut rng)
            .expect_err("only three distinct values exist");
        match err {
            MaskingError::UniquenessExhausted {
                attempts, limit, ..
            } => {
                assert_eq!(limit, 25);
                assert_eq!(attempts, 26);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn occupied_values_are_never_assigned() {
        let table = TableName::new("dbo", "Voucher");
        let indexes = vec![UniqueIndexPlan {
            name: "ux_code".to_string(),
            columns: vec!["Code".to_string()],
        }];
        let mut generators = HashMap::new();
        generators.insert("code".to_string(), number_generator(1, 8));
        let mut rng = ChaCha8Rng::seed_from_u64(44);

        let code_rows = |codes: &[i64]| RowSet {
            columns: vec!["Code".to_string()],
            rows: codes
                .iter()
                .enumerate()
                .map(|(idx, code)| SourceRow {
                    ordinal: idx as i64 + 1,
                    values: vec![SqlValue::Int(*code)],
                })
                .collect(),
        };
        // Rows 1..=3 are masked; the row holding 4 sits outside the filter.
        let selected = code_rows(&[1, 2, 3]);
        let occupied = code_rows(&[1, 2, 3, 4]);

        let assignments = build_unique_assignments(
            &table,
            &indexes,
            &selected,
            &occupied,
            &generators,
            10_000,
            &mut rng,
        )
        .expect("assignments");
        let values: HashSet<i64> = (1..=3)
            .filter_map(|row_nr| assignments.get(row_nr, "Code").and_then(SqlValue::as_i64))
            .collect();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|code| (5..=8).contains(code)));
    }
}
