use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use dbmask_core::{
    SqlType, SqlValue, TableName, TypeFamily, parse_date_value, parse_datetime_value,
    validate_identifier,
};
use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::debug;

use crate::errors::{ConfigError, ValidationIssue, ValidationReport};
use crate::model::{
    ActionCategory, ActionKind, ActionRule, Bound, CONFIG_TYPE, ColumnRule, CompositeKind,
    CompositePart, MaskingConfiguration, TableRule,
};
use crate::resolved::{GeneratedRule, MaskMode, ResolvedColumn, ResolvedConfig, ResolvedTable};
use crate::schema::config_json_schema;

/// Date parts accepted by `DateTime` actions.
pub const DATE_PARTS: &[&str] = &[
    "year",
    "quarter",
    "month",
    "dayofyear",
    "day",
    "week",
    "hour",
    "minute",
    "second",
    "millisecond",
];

/// Validated configuration with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: ResolvedConfig,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a configuration JSON document against the configuration JSON Schema.
pub fn validate_config_json(
    config_json: &Value,
    config_schema: &Value,
) -> Result<ValidationReport, ConfigError> {
    let compiled =
        JSONSchema::compile(config_schema).map_err(|err| ConfigError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(config_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error(
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Validate the configuration end-to-end, returning structured issues on failure.
pub fn validate_config(
    config_json: &Value,
    config_schema: &Value,
) -> Result<ValidatedConfig, ValidationReport> {
    let structural = match validate_config_json(config_json, config_schema) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error(
                "schema_validation_error",
                "/",
                err.to_string(),
                None,
            ));
            return Err(report);
        }
    };
    if !structural.is_ok() {
        return Err(structural);
    }

    let config: MaskingConfiguration = match serde_json::from_value(config_json.clone()) {
        Ok(config) => config,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error(
                "invalid_config_json",
                "/",
                err.to_string(),
                None,
            ));
            return Err(report);
        }
    };

    let (resolved, report) = resolve_config(&config);
    match resolved {
        Some(config) if report.is_ok() => Ok(ValidatedConfig {
            config,
            warnings: report.warnings,
        }),
        _ => Err(report),
    }
}

/// Read a configuration file and validate it against the generated schema.
pub fn load_config(path: &Path) -> Result<ValidatedConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config_json: Value = serde_json::from_str(&contents)?;
    let schema = serde_json::to_value(config_json_schema())?;
    debug!(path = %path.display(), "validating masking configuration");
    validate_config(&config_json, &schema).map_err(ConfigError::Invalid)
}

/// Semantic validation of a parsed configuration.
///
/// Returns the resolved configuration when no errors were found, alongside
/// the report holding every error and warning.
pub fn resolve_config(config: &MaskingConfiguration) -> (Option<ResolvedConfig>, ValidationReport) {
    let mut report = ValidationReport::default();

    if config.name.trim().is_empty() {
        report.push(ValidationIssue::error(
            "database_name_empty",
            "/Name",
            "configuration must name the database it applies to",
            None,
        ));
    }

    if config.config_type != CONFIG_TYPE {
        report.push(ValidationIssue::error(
            "config_type_mismatch",
            "/Type",
            format!(
                "expected Type '{CONFIG_TYPE}', found '{}'",
                config.config_type
            ),
            None,
        ));
    }

    if config.tables.is_empty() {
        report.push(ValidationIssue::warning(
            "tables_empty",
            "/Tables",
            "configuration lists no tables, nothing will be masked",
            None,
        ));
    }

    let mut seen = HashSet::new();
    let mut tables = Vec::with_capacity(config.tables.len());
    for (idx, table) in config.tables.iter().enumerate() {
        let base_path = format!("/Tables/{idx}");
        let name = TableName::new(table.schema.clone(), table.name.clone());
        if !seen.insert(name.key()) {
            report.push(ValidationIssue::error(
                "duplicate_table",
                &base_path,
                format!("table '{name}' is listed more than once"),
                Some("merge duplicate table entries into one".to_string()),
            ));
        }
        if let Some(resolved) = resolve_table(table, &base_path, &mut report) {
            tables.push(resolved);
        }
    }

    if !report.is_ok() {
        return (None, report);
    }

    let resolved = ResolvedConfig {
        database: config.name.clone(),
        tables,
    };
    (Some(resolved), report)
}

fn resolve_table(
    table: &TableRule,
    base_path: &str,
    report: &mut ValidationReport,
) -> Option<ResolvedTable> {
    let errors_before = report.errors.len();

    for (field, value) in [("Schema", &table.schema), ("Name", &table.name)] {
        if let Err(err) = validate_identifier(value) {
            report.push(ValidationIssue::error(
                "invalid_identifier",
                format!("{base_path}/{field}"),
                err.to_string(),
                None,
            ));
        }
    }

    if let Some(filter) = &table.filter_query {
        if filter.trim().is_empty() {
            report.push(ValidationIssue::error(
                "filter_empty",
                format!("{base_path}/FilterQuery"),
                "FilterQuery must not be blank",
                Some("remove FilterQuery to mask every row".to_string()),
            ));
        } else if filter.contains(';') {
            report.push(ValidationIssue::error(
                "filter_multiple_statements",
                format!("{base_path}/FilterQuery"),
                "FilterQuery must be a single boolean predicate",
                Some("remove the ';' and any trailing statement".to_string()),
            ));
        }
    }

    if table.columns.is_empty() {
        report.push(ValidationIssue::error(
            "columns_empty",
            format!("{base_path}/Columns"),
            format!("table '{}.{}' has no column rules", table.schema, table.name),
            None,
        ));
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(table.columns.len());
    for (idx, column) in table.columns.iter().enumerate() {
        let column_path = format!("{base_path}/Columns/{idx}");
        if !seen.insert(column.name.to_lowercase()) {
            report.push(ValidationIssue::error(
                "duplicate_column",
                &column_path,
                format!("column '{}' is listed more than once", column.name),
                None,
            ));
        }
        if let Some(resolved) = resolve_column(column, &column_path, report) {
            columns.push(resolved);
        }
    }

    if table.has_unique_index
        && !columns
            .iter()
            .any(|column| matches!(column.mode, MaskMode::Generated(_)))
    {
        report.push(ValidationIssue::warning(
            "unique_index_without_generated",
            format!("{base_path}/HasUniqueIndex"),
            "HasUniqueIndex is set but no column uses a generated mode",
            None,
        ));
    }

    if report.errors.len() > errors_before {
        return None;
    }

    Some(ResolvedTable {
        name: TableName::new(table.schema.clone(), table.name.clone()),
        has_unique_index: table.has_unique_index,
        filter_query: table.filter_query.clone(),
        columns,
    })
}

fn resolve_column(
    column: &ColumnRule,
    base_path: &str,
    report: &mut ValidationReport,
) -> Option<ResolvedColumn> {
    let errors_before = report.errors.len();

    if let Err(err) = validate_identifier(&column.name) {
        report.push(ValidationIssue::error(
            "invalid_identifier",
            format!("{base_path}/Name"),
            err.to_string(),
            None,
        ));
    }

    let sql_type = SqlType::parse(&column.column_type);
    if sql_type.is_none() {
        report.push(ValidationIssue::error(
            "unsupported_column_type",
            format!("{base_path}/ColumnType"),
            format!(
                "column '{}' has unsupported type '{}'",
                column.name, column.column_type
            ),
            Some("remove the column from the configuration".to_string()),
        ));
    }

    let modes = [
        column.masking_type.is_some(),
        column.static_value.is_some(),
        column.action.is_some(),
        column.composite.is_some(),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();
    if modes != 1 {
        report.push(ValidationIssue::error(
            if modes == 0 { "mode_missing" } else { "mode_conflict" },
            base_path,
            format!(
                "column '{}' must use exactly one of MaskingType, StaticValue, Action, Composite (found {modes})",
                column.name
            ),
            None,
        ));
    }

    if column.keep_null && !column.nullable {
        report.push(ValidationIssue::warning(
            "keep_null_not_nullable",
            format!("{base_path}/KeepNull"),
            format!("column '{}' sets KeepNull but is not nullable", column.name),
            None,
        ));
    }

    if column.deterministic && column.masking_type.is_none() {
        report.push(ValidationIssue::warning(
            "deterministic_ignored",
            format!("{base_path}/Deterministic"),
            format!(
                "column '{}' is Deterministic but does not generate values",
                column.name
            ),
            None,
        ));
    }

    let sql_type = sql_type?;
    if modes != 1 {
        return None;
    }

    let mode = if let Some(masking_type) = &column.masking_type {
        validate_generated(column, masking_type, sql_type, base_path, report);
        MaskMode::Generated(GeneratedRule {
            masking_type: masking_type.clone(),
            sub_type: column.sub_type.clone(),
            format: column.format.clone(),
            separator: column.separator.clone(),
            character_string: column.character_string.clone(),
            min: column.min_value.clone(),
            max: column.max_value.clone(),
        })
    } else if let Some(value) = &column.static_value {
        if SqlValue::parse_typed(value, sql_type).is_none() {
            report.push(ValidationIssue::error(
                "static_value_type",
                format!("{base_path}/StaticValue"),
                format!(
                    "StaticValue '{value}' is not a valid {} value",
                    column.column_type
                ),
                None,
            ));
        }
        MaskMode::Static(value.clone())
    } else if let Some(action) = &column.action {
        validate_action(column, action, sql_type, base_path, report);
        MaskMode::Action(action.clone())
    } else if let Some(parts) = &column.composite {
        validate_composite(parts, sql_type, base_path, report);
        MaskMode::Composite(parts.clone())
    } else {
        return None;
    };

    if report.errors.len() > errors_before {
        return None;
    }

    Some(ResolvedColumn {
        name: column.name.clone(),
        sql_type,
        nullable: column.nullable,
        keep_null: column.keep_null,
        deterministic: column.deterministic && matches!(mode, MaskMode::Generated(_)),
        mode,
    })
}

fn validate_generated(
    column: &ColumnRule,
    masking_type: &str,
    sql_type: SqlType,
    base_path: &str,
    report: &mut ValidationReport,
) {
    if masking_type.trim().is_empty() {
        report.push(ValidationIssue::error(
            "masking_type_empty",
            format!("{base_path}/MaskingType"),
            "MaskingType must not be blank",
            None,
        ));
    }
    if column.sub_type.is_none() && !masking_type.eq_ignore_ascii_case("shuffle") {
        report.push(ValidationIssue::error(
            "sub_type_missing",
            format!("{base_path}/SubType"),
            format!("column '{}' sets MaskingType without SubType", column.name),
            None,
        ));
    }
    if let Some(characters) = &column.character_string {
        if characters.is_empty() {
            report.push(ValidationIssue::error(
                "character_string_empty",
                format!("{base_path}/CharacterString"),
                "CharacterString must contain at least one character",
                None,
            ));
        }
    }

    if let (Some(min), Some(max)) = (&column.min_value, &column.max_value) {
        if bounds_inverted(min, max, sql_type) {
            report.push(ValidationIssue::error(
                "min_greater_than_max",
                format!("{base_path}/MinValue"),
                format!("MinValue {min} is greater than MaxValue {max}"),
                None,
            ));
        }
    }
}

fn bounds_inverted(min: &Bound, max: &Bound, sql_type: SqlType) -> bool {
    match sql_type.family() {
        TypeFamily::Date | TypeFamily::DateTime => {
            match (bound_date(min), bound_date(max)) {
                (Some(min), Some(max)) => min > max,
                _ => false,
            }
        }
        _ => match (min.as_f64(), max.as_f64()) {
            (Some(min), Some(max)) => min > max,
            _ => false,
        },
    }
}

fn bound_date(bound: &Bound) -> Option<NaiveDate> {
    let text = bound.as_text()?.trim();
    parse_date_value(text).or_else(|| parse_datetime_value(text).map(|value| value.date()))
}

fn validate_action(
    column: &ColumnRule,
    action: &ActionRule,
    sql_type: SqlType,
    base_path: &str,
    report: &mut ValidationReport,
) {
    let action_path = format!("{base_path}/Action");
    let family = sql_type.family();

    if action.kind == ActionKind::Nullify {
        if !column.nullable {
            report.push(ValidationIssue::error(
                "nullify_not_nullable",
                format!("{action_path}/Type"),
                format!("column '{}' is not nullable and cannot be nullified", column.name),
                None,
            ));
        }
        return;
    }

    let Some(value) = &action.value else {
        report.push(ValidationIssue::error(
            "action_value_missing",
            format!("{action_path}/Value"),
            format!("{:?} action requires a Value", action.kind),
            None,
        ));
        return;
    };

    match action.category {
        ActionCategory::DateTime => {
            if !matches!(family, TypeFamily::Date | TypeFamily::DateTime | TypeFamily::Time) {
                report.push(ValidationIssue::error(
                    "action_category_type",
                    format!("{action_path}/Category"),
                    format!("DateTime action on non-temporal type '{}'", column.column_type),
                    None,
                ));
            }
            match action.kind {
                ActionKind::Add | ActionKind::Subtract => {
                    let part_ok = action
                        .sub_category
                        .as_deref()
                        .is_some_and(|part| DATE_PARTS.contains(&part.to_lowercase().as_str()));
                    if !part_ok {
                        report.push(ValidationIssue::error(
                            "action_date_part",
                            format!("{action_path}/SubCategory"),
                            "DateTime Add/Subtract requires a SubCategory date part",
                            Some(format!("use one of: {}", DATE_PARTS.join(", "))),
                        ));
                    }
                    if value.as_i64().is_none() {
                        report.push(ValidationIssue::error(
                            "action_value_type",
                            format!("{action_path}/Value"),
                            format!("date offset '{value}' must be an integer"),
                            None,
                        ));
                    }
                }
                ActionKind::Set => {
                    let text = value.to_string();
                    if SqlValue::parse_typed(&text, sql_type).is_none() {
                        report.push(ValidationIssue::error(
                            "action_value_type",
                            format!("{action_path}/Value"),
                            format!("'{text}' is not a valid {} value", column.column_type),
                            None,
                        ));
                    }
                }
                ActionKind::Multiply | ActionKind::Divide => {
                    report.push(ValidationIssue::error(
                        "action_kind_unsupported",
                        format!("{action_path}/Type"),
                        format!("{:?} is not defined for DateTime actions", action.kind),
                        None,
                    ));
                }
                ActionKind::Nullify => {}
            }
        }
        ActionCategory::Number => {
            if !matches!(
                family,
                TypeFamily::Integer | TypeFamily::Decimal | TypeFamily::Float
            ) {
                report.push(ValidationIssue::error(
                    "action_category_type",
                    format!("{action_path}/Category"),
                    format!("Number action on non-numeric type '{}'", column.column_type),
                    None,
                ));
            }
            match value.as_f64() {
                None => report.push(ValidationIssue::error(
                    "action_value_type",
                    format!("{action_path}/Value"),
                    format!("'{value}' is not a number"),
                    None,
                )),
                Some(number) if number == 0.0 && action.kind == ActionKind::Divide => {
                    report.push(ValidationIssue::error(
                        "action_divide_by_zero",
                        format!("{action_path}/Value"),
                        "Divide action with Value 0",
                        None,
                    ));
                }
                Some(_) => {}
            }
        }
        ActionCategory::Column => {
            if action.kind != ActionKind::Set {
                report.push(ValidationIssue::error(
                    "action_kind_unsupported",
                    format!("{action_path}/Type"),
                    "Column actions support only Set (copy from another column) and Nullify",
                    None,
                ));
            } else if let Err(err) = validate_identifier(&value.to_string()) {
                report.push(ValidationIssue::error(
                    "invalid_identifier",
                    format!("{action_path}/Value"),
                    err.to_string(),
                    None,
                ));
            }
        }
    }
}

fn validate_composite(
    parts: &[CompositePart],
    sql_type: SqlType,
    base_path: &str,
    report: &mut ValidationReport,
) {
    let composite_path = format!("{base_path}/Composite");
    if sql_type.family() != TypeFamily::Text {
        report.push(ValidationIssue::error(
            "composite_type",
            &composite_path,
            "Composite values can only be written to character columns",
            None,
        ));
    }
    if parts.is_empty() {
        report.push(ValidationIssue::error(
            "composite_empty",
            &composite_path,
            "Composite requires at least one part",
            None,
        ));
    }

    for (idx, part) in parts.iter().enumerate() {
        let part_path = format!("{composite_path}/{idx}");
        match part.kind {
            CompositeKind::Static => {
                if part.value.is_none() {
                    report.push(ValidationIssue::error(
                        "composite_part_value",
                        format!("{part_path}/Value"),
                        "Static composite part requires a Value",
                        None,
                    ));
                }
            }
            CompositeKind::Column => match &part.value {
                Some(name) => {
                    if let Err(err) = validate_identifier(name) {
                        report.push(ValidationIssue::error(
                            "invalid_identifier",
                            format!("{part_path}/Value"),
                            err.to_string(),
                            None,
                        ));
                    }
                }
                None => report.push(ValidationIssue::error(
                    "composite_part_value",
                    format!("{part_path}/Value"),
                    "Column composite part requires the source column name in Value",
                    None,
                )),
            },
            CompositeKind::Generated => {
                if part.masking_type.is_none() || part.sub_type.is_none() {
                    report.push(ValidationIssue::error(
                        "composite_part_generator",
                        &part_path,
                        "Generated composite part requires MaskingType and SubType",
                        None,
                    ));
                }
            }
        }
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
