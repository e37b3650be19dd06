use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use dbmask_config::{
    ActionCategory, ActionKind, ActionRule, Bound, CompositeKind, CompositePart, GeneratedRule,
    MaskMode, ResolvedColumn, ResolvedConfig, ResolvedTable,
};
use dbmask_core::{ColumnInfo, SqlType, SqlValue, TableInfo, TableName, TypeFamily};

use crate::cache::{DeterministicCache, value_key};
use crate::cursor::{RowCursor, ScaffoldNames};
use crate::errors::{ErrorScope, GenerationError, MaskingError, Result};
use crate::generators::{ColumnGenerator, Constraints, LocaleKey};
use crate::model::{MaskOptions, MaskingReport, TableResult, TableStatus};
use crate::scratch::ScratchStore;
use crate::target::{
    ArithmeticOp, AssignmentExpr, ColumnAssignment, ConcatPart, DatePart, MaskTarget, RowSet,
    RowUpdate,
};
use crate::unique::{UniqueAssignments, UniqueIndexPlan, build_unique_assignments};

/// Asked once per table before anything is written to it.
pub trait ConfirmGate {
    fn confirm(&mut self, table: &TableName) -> bool;
}

impl<F> ConfirmGate for F
where
    F: FnMut(&TableName) -> bool,
{
    fn confirm(&mut self, table: &TableName) -> bool {
        self(table)
    }
}

/// Gate that approves every table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl ConfirmGate for AutoConfirm {
    fn confirm(&mut self, _table: &TableName) -> bool {
        true
    }
}

/// Entry point for masking a database from a resolved configuration.
#[derive(Debug, Clone)]
pub struct MaskingEngine {
    options: MaskOptions,
    locale: LocaleKey,
    run_id: String,
    today: NaiveDate,
}

impl MaskingEngine {
    pub fn new(options: MaskOptions) -> Result<Self> {
        let locale = LocaleKey::parse(&options.locale).ok_or_else(|| {
            MaskingError::configuration(format!("unsupported locale '{}'", options.locale))
        })?;
        if options.batch_size == 0 {
            return Err(MaskingError::configuration("batch_size must be at least 1"));
        }
        Ok(Self {
            options,
            locale,
            run_id: uuid::Uuid::new_v4().to_string(),
            today: chrono::Local::now().date_naive(),
        })
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Anchor for relative date windows.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn options(&self) -> &MaskOptions {
        &self.options
    }

    pub fn scaffold_names(&self, database: &str) -> ScaffoldNames {
        ScaffoldNames::new(&self.run_id, database)
    }

    /// Mask every table of `config` in order.
    ///
    /// Table-scoped failures are recorded in the report and the run goes on.
    /// A fatal failure stops the run after the dictionary has been exported
    /// (when requested) and dropped, and comes back as
    /// [`MaskingError::Aborted`] carrying the partial report.
    pub fn run<T, S>(
        &self,
        config: &ResolvedConfig,
        target: &T,
        cache: &mut DeterministicCache<S>,
        gate: &mut dyn ConfirmGate,
    ) -> Result<MaskingReport>
    where
        T: MaskTarget,
        S: ScratchStore,
    {
        let start = Instant::now();
        let seed = self.options.seed.unwrap_or_else(rand::random);
        let names = self.scaffold_names(&config.database);
        let mut report = MaskingReport::new(self.run_id.clone(), config.database.clone());

        info!(
            run_id = %self.run_id,
            database = %config.database,
            tables = config.tables.len(),
            seed,
            locale = %self.locale,
            "masking started"
        );

        let mut outcome = self.open_dictionary(cache);
        if outcome.is_ok() {
            outcome = self.mask_tables(config, target, cache, gate, &names, seed, &mut report);
        }
        let finished = self.close_dictionary(cache, &config.database, &mut report);
        if outcome.is_ok() {
            outcome = finished;
        }
        report.duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                info!(
                    run_id = %self.run_id,
                    successful = report.count(TableStatus::Successful),
                    failed = report.count(TableStatus::Failed),
                    skipped = report.count(TableStatus::Skipped),
                    cache_entries = report.cache_entries,
                    duration_ms = report.duration_ms,
                    "masking completed"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(run_id = %self.run_id, error = %err, "masking aborted");
                Err(MaskingError::Aborted {
                    report: Box::new(report),
                    source: Box::new(err),
                })
            }
        }
    }

    fn open_dictionary<S: ScratchStore>(&self, cache: &mut DeterministicCache<S>) -> Result<()> {
        cache.open()?;
        for path in &self.options.dictionary_import {
            cache.import_csv(path)?;
        }
        Ok(())
    }

    fn close_dictionary<S: ScratchStore>(
        &self,
        cache: &mut DeterministicCache<S>,
        database: &str,
        report: &mut MaskingReport,
    ) -> Result<()> {
        report.cache_entries = cache.len().unwrap_or_else(|err| {
            warn!(error = %err, "failed to count dictionary entries");
            0
        });
        let mut result = Ok(());
        if let Some(dir) = &self.options.dictionary_export_dir {
            let path = dir.join(format!("{database}.dictionary.csv"));
            match cache.export_csv(&path) {
                Ok(_) => report.exported_dictionary = Some(path),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "dictionary export failed");
                    result = Err(err);
                }
            }
        }
        if let Err(err) = cache.close() {
            warn!(error = %err, "failed to drop dictionary store");
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn mask_tables<T: MaskTarget, S: ScratchStore>(
        &self,
        config: &ResolvedConfig,
        target: &T,
        cache: &mut DeterministicCache<S>,
        gate: &mut dyn ConfirmGate,
        names: &ScaffoldNames,
        seed: u64,
        report: &mut MaskingReport,
    ) -> Result<()> {
        for table in &config.tables {
            if !gate.confirm(&table.name) {
                info!(table = %table.name, "table skipped by operator");
                report.tables.push(table_result(
                    &config.database,
                    table,
                    0,
                    0,
                    TableStatus::Skipped,
                    None,
                ));
                continue;
            }

            let table_start = Instant::now();
            info!(
                table = %table.name,
                columns = table.columns.len(),
                filtered = table.filter_query.is_some(),
                "masking table"
            );
            let outcome = self.mask_table(table, target, cache, names, seed);
            let elapsed_ms = table_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(rows) => {
                    info!(
                        table = %table.name,
                        rows_processed = rows,
                        duration_ms = elapsed_ms,
                        "table masked"
                    );
                    report.tables.push(table_result(
                        &config.database,
                        table,
                        rows,
                        elapsed_ms,
                        TableStatus::Successful,
                        None,
                    ));
                }
                Err(err) => {
                    let scope = err.scope();
                    warn!(
                        table = %table.name,
                        error = %err,
                        fatal = scope == ErrorScope::Fatal,
                        "table failed"
                    );
                    report.tables.push(table_result(
                        &config.database,
                        table,
                        0,
                        elapsed_ms,
                        TableStatus::Failed,
                        Some(err.to_string()),
                    ));
                    if scope == ErrorScope::Fatal {
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    fn mask_table<T: MaskTarget, S: ScratchStore>(
        &self,
        table: &ResolvedTable,
        target: &T,
        cache: &mut DeterministicCache<S>,
        names: &ScaffoldNames,
        run_seed: u64,
    ) -> Result<u64> {
        let info = target
            .describe_table(&table.name)?
            .ok_or_else(|| MaskingError::schema(&table.name, "table does not exist"))?;
        let mut plan = self.prepare(table, &info)?;
        plan.value_seed = hash_seed(run_seed, VALUE_SEED_KEY);
        let mut rng = ChaCha8Rng::seed_from_u64(hash_seed(run_seed, &table.name.key()));

        let cursor = RowCursor::open(target, &info, names)?;
        let outcome = self.mask_rows(
            table,
            &info,
            &plan,
            target,
            cache,
            cursor.ordinal(),
            &mut rng,
        );
        let closed = cursor.close();
        match (outcome, closed) {
            (Ok(rows), Ok(())) => Ok(rows),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), _) => Err(err),
        }
    }

    /// Check the live table against the configuration and build generators.
    /// Nothing is written to the database before this succeeds.
    fn prepare<'c>(&self, table: &'c ResolvedTable, info: &TableInfo) -> Result<TablePlan<'c>> {
        let mut plan = TablePlan::default();
        for column in &table.columns {
            let live = info.column(&column.name).ok_or_else(|| {
                MaskingError::schema(&table.name, format!("column '{}' does not exist", column.name))
            })?;
            if live.is_identity || live.is_computed {
                return Err(MaskingError::schema(
                    &table.name,
                    format!("column '{}' is an identity or computed column", column.name),
                ));
            }

            match &column.mode {
                MaskMode::Generated(rule) => {
                    let generator = self
                        .column_generator(column.sql_type, Some(live), rule)
                        .map_err(|err| MaskingError::generation(&column.name, err))?;
                    plan.generators.insert(column.name.to_lowercase(), generator);
                    plan.row_columns.push(RowColumn {
                        column,
                        value: RowValue::Generated,
                    });
                }
                MaskMode::Static(text) => {
                    let value = SqlValue::parse_typed(text, column.sql_type).ok_or_else(|| {
                        MaskingError::schema(
                            &table.name,
                            format!("static value '{text}' does not fit column '{}'", column.name),
                        )
                    })?;
                    plan.row_columns.push(RowColumn {
                        column,
                        value: RowValue::Static(value),
                    });
                }
                MaskMode::Action(action) => {
                    plan.actions.push(ColumnAssignment {
                        column: column.name.clone(),
                        sql_type: column.sql_type,
                        expr: action_expr(&table.name, info, column, action)?,
                    });
                }
                MaskMode::Composite(parts) => {
                    let parts = self.composite_sources(&table.name, info, column, parts)?;
                    plan.composites.push(CompositeColumn { column, parts });
                }
            }
        }
        Ok(plan)
    }

    fn column_generator(
        &self,
        sql_type: SqlType,
        live: Option<&ColumnInfo>,
        rule: &GeneratedRule,
    ) -> std::result::Result<ColumnGenerator, GenerationError> {
        let mut constraints = Constraints::new(sql_type, self.locale, self.today);
        constraints.exact_length = self.options.exact_length;
        if let Some(live) = live {
            match sql_type.family() {
                TypeFamily::Text => {
                    constraints.declared_length =
                        live.max_length.and_then(|len| usize::try_from(len).ok());
                }
                TypeFamily::Decimal => {
                    constraints.numeric_scale =
                        live.numeric_scale.and_then(|scale| u32::try_from(scale).ok());
                }
                _ => {}
            }
        }
        ColumnGenerator::new(rule, constraints)
    }

    fn composite_sources(
        &self,
        table: &TableName,
        info: &TableInfo,
        column: &ResolvedColumn,
        parts: &[CompositePart],
    ) -> Result<Vec<CompositeSource>> {
        let mut sources = Vec::with_capacity(parts.len());
        for part in parts {
            let source = match part.kind {
                CompositeKind::Static => {
                    CompositeSource::Literal(part.value.clone().unwrap_or_default())
                }
                CompositeKind::Column => {
                    let name = part.value.clone().unwrap_or_default();
                    let live = info.column(&name).ok_or_else(|| {
                        MaskingError::schema(
                            table,
                            format!("composite column '{}' refers to missing column '{name}'", column.name),
                        )
                    })?;
                    CompositeSource::Column(live.name.clone())
                }
                CompositeKind::Generated => {
                    let rule = GeneratedRule {
                        masking_type: part.masking_type.clone().unwrap_or_default(),
                        sub_type: part.sub_type.clone(),
                        format: None,
                        separator: None,
                        character_string: None,
                        min: None,
                        max: None,
                    };
                    let generator = self
                        .column_generator(column.sql_type, None, &rule)
                        .map_err(|err| MaskingError::generation(&column.name, err))?;
                    CompositeSource::Generated(generator)
                }
            };
            sources.push(source);
        }
        Ok(sources)
    }

    #[allow(clippy::too_many_arguments)]
    fn mask_rows<T: MaskTarget, S: ScratchStore>(
        &self,
        table: &ResolvedTable,
        info: &TableInfo,
        plan: &TablePlan<'_>,
        target: &T,
        cache: &mut DeterministicCache<S>,
        ordinal: &str,
        rng: &mut ChaCha8Rng,
    ) -> Result<u64> {
        let filter = table.filter_query.as_deref();
        let indexes = unique_index_plans(table, info, plan);
        let columns = read_columns(plan, &indexes);
        let rows = target.read_rows(&table.name, ordinal, &columns, filter)?;
        debug!(table = %table.name, rows = rows.len(), "rows read");

        let unique = if indexes.is_empty() {
            UniqueAssignments::default()
        } else {
            // Rows outside the filter keep their values and still hold index slots.
            let unfiltered = match filter {
                Some(_) => Some(target.read_rows(
                    &table.name,
                    ordinal,
                    &index_columns(&indexes),
                    None,
                )?),
                None => None,
            };
            build_unique_assignments(
                &table.name,
                &indexes,
                &rows,
                unfiltered.as_ref().unwrap_or(&rows),
                &plan.generators,
                self.options.retry,
                rng,
            )?
        };

        let mut batches =
            self.row_pass(table, plan, &rows, &unique, target, cache, ordinal, rng)?;
        drop(unique);

        if rows.is_empty() {
            return Ok(0);
        }

        if !plan.actions.is_empty() {
            batches += 1;
            let affected = target
                .apply_assignments(&table.name, &plan.actions, filter)
                .map_err(|source| MaskingError::BatchExecution {
                    table: table.name.to_string(),
                    batch: batches,
                    source,
                })?;
            debug!(
                table = %table.name,
                columns = plan.actions.len(),
                affected,
                "action pass applied"
            );
        }

        if !plan.composites.is_empty() {
            let assignments = composite_assignments(plan, rng)?;
            batches += 1;
            let affected = target
                .apply_assignments(&table.name, &assignments, filter)
                .map_err(|source| MaskingError::BatchExecution {
                    table: table.name.to_string(),
                    batch: batches,
                    source,
                })?;
            debug!(
                table = %table.name,
                columns = assignments.len(),
                affected,
                "composite pass applied"
            );
        }

        Ok(rows.len() as u64)
    }

    /// Per-row pass; returns the number of batches flushed.
    #[allow(clippy::too_many_arguments)]
    fn row_pass<T: MaskTarget, S: ScratchStore>(
        &self,
        table: &ResolvedTable,
        plan: &TablePlan<'_>,
        rows: &RowSet,
        unique: &UniqueAssignments,
        target: &T,
        cache: &mut DeterministicCache<S>,
        ordinal: &str,
        rng: &mut ChaCha8Rng,
    ) -> Result<u64> {
        if plan.row_columns.is_empty() || rows.is_empty() {
            return Ok(0);
        }
        let batch_size = self.options.batch_size.max(1);
        let mut batch: Vec<RowUpdate> = Vec::with_capacity(batch_size.min(rows.len()));
        let mut batches = 0_u64;
        let mut nulls = NullInjector::new(self.options.modulus_factor);

        for (idx, row) in rows.rows.iter().enumerate() {
            let row_nr = idx + 1;
            let mut values = Vec::with_capacity(plan.row_columns.len());
            for row_column in &plan.row_columns {
                let column = row_column.column;
                let value = match &row_column.value {
                    RowValue::Static(value) => value.clone(),
                    RowValue::Generated => {
                        let source = rows.value(idx, &column.name);
                        if column.keep_null && source.is_null() {
                            SqlValue::Null
                        } else if nulls.applies(column, unique) && nulls.next() {
                            SqlValue::Null
                        } else if let Some(value) = unique.get(row_nr, &column.name) {
                            value.clone()
                        } else {
                            let generator = plan.generator(&table.name, column)?;
                            generated_value(
                                column,
                                generator,
                                source,
                                cache,
                                plan.value_seed,
                                rng,
                            )?
                        }
                    }
                };
                values.push((column.name.clone(), value));
            }
            batch.push(RowUpdate {
                ordinal: row.ordinal,
                values,
            });

            if batch.len() >= batch_size {
                batches += 1;
                flush(target, &table.name, ordinal, &batch, batches)?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            batches += 1;
            flush(target, &table.name, ordinal, &batch, batches)?;
        }
        Ok(batches)
    }
}

#[derive(Default)]
struct TablePlan<'c> {
    /// Seeds the per-value fallback for deterministic columns.
    value_seed: u64,
    row_columns: Vec<RowColumn<'c>>,
    /// Keyed by lowercased column name.
    generators: HashMap<String, ColumnGenerator>,
    actions: Vec<ColumnAssignment>,
    composites: Vec<CompositeColumn<'c>>,
}

impl TablePlan<'_> {
    fn generator(&self, table: &TableName, column: &ResolvedColumn) -> Result<&ColumnGenerator> {
        self.generators
            .get(&column.name.to_lowercase())
            .ok_or_else(|| {
                MaskingError::schema(table, format!("no generator prepared for '{}'", column.name))
            })
    }
}

struct RowColumn<'c> {
    column: &'c ResolvedColumn,
    value: RowValue,
}

enum RowValue {
    Static(SqlValue),
    Generated,
}

struct CompositeColumn<'c> {
    column: &'c ResolvedColumn,
    parts: Vec<CompositeSource>,
}

enum CompositeSource {
    Literal(String),
    Column(String),
    Generated(ColumnGenerator),
}

/// Every `modulus`-th eligible evaluation in a table yields NULL.
struct NullInjector {
    modulus: u64,
    counter: u64,
}

impl NullInjector {
    fn new(modulus: u64) -> Self {
        Self {
            modulus,
            counter: 0,
        }
    }

    fn applies(&self, column: &ResolvedColumn, unique: &UniqueAssignments) -> bool {
        self.modulus > 0
            && column.nullable
            && !column.keep_null
            && !column.deterministic
            && !unique.covers(&column.name)
    }

    fn next(&mut self) -> bool {
        self.counter += 1;
        self.counter % self.modulus == 0
    }
}

/// Value for one generated cell.
///
/// Deterministic columns reuse the dictionary entry for the source value
/// when it fits the column. Otherwise the value is drawn from an RNG seeded
/// by the source value, so a source maps to one masked value per column
/// shape even when the recorded entry belongs to a column it cannot fit.
fn generated_value<S: ScratchStore>(
    column: &ResolvedColumn,
    generator: &ColumnGenerator,
    source: &SqlValue,
    cache: &mut DeterministicCache<S>,
    value_seed: u64,
    rng: &mut ChaCha8Rng,
) -> Result<SqlValue> {
    if column.deterministic
        && let Some(key) = value_key(source)
    {
        let recorded = cache.lookup(&key)?;
        if let Some(value) = recorded
            .as_deref()
            .and_then(|text| generator.accept_recorded(text))
        {
            return Ok(value);
        }
        let mut keyed = ChaCha8Rng::seed_from_u64(hash_seed(value_seed, &key));
        let value = generator
            .generate(source, &mut keyed)
            .map_err(|err| MaskingError::generation(&column.name, err))?;
        if recorded.is_none()
            && let Some(text) = value.canonical()
        {
            cache.insert(&key, &text)?;
        }
        return Ok(value);
    }
    generator
        .generate(source, rng)
        .map_err(|err| MaskingError::generation(&column.name, err))
}

fn flush<T: MaskTarget>(
    target: &T,
    table: &TableName,
    ordinal: &str,
    batch: &[RowUpdate],
    number: u64,
) -> Result<()> {
    let affected = target
        .execute_batch(table, ordinal, batch)
        .map_err(|source| MaskingError::BatchExecution {
            table: table.to_string(),
            batch: number,
            source,
        })?;
    debug!(table = %table, batch = number, rows = batch.len(), affected, "batch flushed");
    Ok(())
}

/// Unique indexes with at least one generated column, when the table asks
/// for uniqueness handling.
fn unique_index_plans(
    table: &ResolvedTable,
    info: &TableInfo,
    plan: &TablePlan<'_>,
) -> Vec<UniqueIndexPlan> {
    if !table.has_unique_index {
        return Vec::new();
    }
    info.unique_indexes()
        .filter(|index| {
            index
                .columns
                .iter()
                .any(|column| plan.generators.contains_key(&column.to_lowercase()))
        })
        .map(|index| UniqueIndexPlan {
            name: index.name.clone(),
            columns: index.columns.clone(),
        })
        .collect()
}

fn index_columns(indexes: &[UniqueIndexPlan]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for name in indexes.iter().flat_map(|index| index.columns.iter()) {
        if !columns.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
            columns.push(name.clone());
        }
    }
    columns
}

/// Source columns the row pass needs: generated columns plus every column
/// of the unique indexes in play.
fn read_columns(plan: &TablePlan<'_>, indexes: &[UniqueIndexPlan]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let generated = plan
        .row_columns
        .iter()
        .filter(|row_column| matches!(row_column.value, RowValue::Generated))
        .map(|row_column| &row_column.column.name);
    let indexed = indexes.iter().flat_map(|index| index.columns.iter());
    for name in generated.chain(indexed) {
        if !columns.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
            columns.push(name.clone());
        }
    }
    columns
}

fn composite_assignments(
    plan: &TablePlan<'_>,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<ColumnAssignment>> {
    let mut assignments = Vec::with_capacity(plan.composites.len());
    for composite in &plan.composites {
        let mut parts = Vec::with_capacity(composite.parts.len());
        for source in &composite.parts {
            let part = match source {
                CompositeSource::Literal(text) => ConcatPart::Literal(text.clone()),
                CompositeSource::Column(name) => ConcatPart::Column(name.clone()),
                CompositeSource::Generated(generator) => {
                    let value = generator
                        .generate(&SqlValue::Null, rng)
                        .map_err(|err| MaskingError::generation(&composite.column.name, err))?;
                    ConcatPart::Literal(value.canonical().unwrap_or_default())
                }
            };
            parts.push(part);
        }
        assignments.push(ColumnAssignment {
            column: composite.column.name.clone(),
            sql_type: composite.column.sql_type,
            expr: AssignmentExpr::Concat(parts),
        });
    }
    Ok(assignments)
}

fn action_expr(
    table: &TableName,
    info: &TableInfo,
    column: &ResolvedColumn,
    action: &ActionRule,
) -> Result<AssignmentExpr> {
    let invalid = |message: String| MaskingError::schema(table, message);
    let value = action.value.as_ref();
    let arithmetic = |op: ArithmeticOp| -> Result<AssignmentExpr> {
        let operand = value.and_then(Bound::as_f64).ok_or_else(|| {
            invalid(format!("action on '{}' needs a numeric Value", column.name))
        })?;
        Ok(AssignmentExpr::Arithmetic { op, operand })
    };

    let expr = match (action.category, action.kind) {
        (_, ActionKind::Nullify) => AssignmentExpr::Null,
        (ActionCategory::DateTime, ActionKind::Add | ActionKind::Subtract) => {
            let part = action
                .sub_category
                .as_deref()
                .and_then(DatePart::parse)
                .ok_or_else(|| invalid(format!("action on '{}' needs a date part", column.name)))?;
            let amount = value.and_then(Bound::as_i64).ok_or_else(|| {
                invalid(format!("action on '{}' needs an integer Value", column.name))
            })?;
            let amount = if action.kind == ActionKind::Subtract {
                amount.checked_neg().ok_or_else(|| {
                    invalid(format!("date offset for '{}' overflows", column.name))
                })?
            } else {
                amount
            };
            AssignmentExpr::DateAdd { part, amount }
        }
        (ActionCategory::DateTime | ActionCategory::Number, ActionKind::Set) => {
            let text = value.map(ToString::to_string).unwrap_or_default();
            let literal = SqlValue::parse_typed(&text, column.sql_type).ok_or_else(|| {
                invalid(format!("'{text}' does not fit column '{}'", column.name))
            })?;
            AssignmentExpr::Literal(literal)
        }
        (ActionCategory::Number, ActionKind::Add) => arithmetic(ArithmeticOp::Add)?,
        (ActionCategory::Number, ActionKind::Subtract) => arithmetic(ArithmeticOp::Subtract)?,
        (ActionCategory::Number, ActionKind::Multiply) => arithmetic(ArithmeticOp::Multiply)?,
        (ActionCategory::Number, ActionKind::Divide) => arithmetic(ArithmeticOp::Divide)?,
        (ActionCategory::Column, ActionKind::Set) => {
            let name = value.map(ToString::to_string).unwrap_or_default();
            let live = info.column(&name).ok_or_else(|| {
                invalid(format!("action on '{}' copies missing column '{name}'", column.name))
            })?;
            AssignmentExpr::CopyColumn(live.name.clone())
        }
        (category, kind) => {
            return Err(invalid(format!(
                "{kind:?} is not supported for {category:?} actions on '{}'",
                column.name
            )));
        }
    };
    Ok(expr)
}

fn table_result(
    database: &str,
    table: &ResolvedTable,
    rows_processed: u64,
    elapsed_ms: u64,
    status: TableStatus,
    error: Option<String>,
) -> TableResult {
    TableResult {
        database: database.to_string(),
        schema: table.name.schema.clone(),
        table: table.name.name.clone(),
        columns: table.columns.iter().map(|column| column.name.clone()).collect(),
        rows_processed,
        elapsed_ms,
        status,
        error,
    }
}

const VALUE_SEED_KEY: &str = "dbmask:value";

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_seeds_differ_per_table_and_repeat_per_seed() {
        let a = hash_seed(7, "dbo.customer");
        assert_eq!(a, hash_seed(7, "dbo.customer"));
        assert_ne!(a, hash_seed(7, "dbo.orders"));
        assert_ne!(a, hash_seed(8, "dbo.customer"));
    }

    #[test]
    fn null_injection_counts_eligible_evaluations() {
        let column = ResolvedColumn {
            name: "Phone".to_string(),
            sql_type: SqlType::VarChar,
            nullable: true,
            keep_null: false,
            deterministic: false,
            mode: MaskMode::Static("x".to_string()),
        };
        let unique = UniqueAssignments::default();
        let mut nulls = NullInjector::new(3);
        assert!(nulls.applies(&column, &unique));
        let hits: Vec<bool> = (0..6).map(|_| nulls.next()).collect();
        assert_eq!(hits, vec![false, false, true, false, false, true]);

        let disabled = NullInjector::new(0);
        assert!(!disabled.applies(&column, &unique));

        let deterministic = ResolvedColumn {
            deterministic: true,
            ..column
        };
        assert!(!NullInjector::new(3).applies(&deterministic, &unique));
    }
}
