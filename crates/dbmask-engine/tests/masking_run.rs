use std::collections::HashSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use dbmask_config::{ResolvedConfig, config_json_schema, validate_config};
use dbmask_core::{ColumnInfo, IndexInfo, SqlValue, TableInfo, TableName};
use dbmask_engine::{
    AutoConfirm, DeterministicCache, MaskOptions, MaskingEngine, MaskingError, MaskingReport,
    MemoryScratchStore, MemoryTarget, TableStatus,
};
use serde_json::{Value, json};

const RUN_ID: &str = "ab12cd34-0000-4000-8000-000000000001";
const ORDINAL: &str = "dbmask_rownr_ab12cd34";
const SCAFFOLD_INDEX: &str = "ix_dbmask_ab12cd34";

fn resolve(config: Value) -> ResolvedConfig {
    let schema = serde_json::to_value(config_json_schema()).expect("serialize schema");
    match validate_config(&config, &schema) {
        Ok(validated) => validated.config,
        Err(report) => panic!("config should validate: {:?}", report.errors),
    }
}

fn engine(options: MaskOptions) -> MaskingEngine {
    MaskingEngine::new(options)
        .expect("engine")
        .with_run_id(RUN_ID)
        .with_today(NaiveDate::from_ymd_opt(2024, 6, 1).expect("date"))
}

fn seeded(seed: u64) -> MaskOptions {
    MaskOptions {
        seed: Some(seed),
        ..MaskOptions::default()
    }
}

fn run(
    engine: &MaskingEngine,
    config: &ResolvedConfig,
    target: &MemoryTarget,
) -> (MaskingReport, DeterministicCache<MemoryScratchStore>) {
    let mut cache = DeterministicCache::new(MemoryScratchStore::new("dict"));
    let report = engine
        .run(config, target, &mut cache, &mut AutoConfirm)
        .expect("run");
    (report, cache)
}

fn column(name: &str, data_type: &str, max_length: Option<i32>, nullable: bool) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
        max_length,
        numeric_precision: None,
        numeric_scale: None,
        is_nullable: nullable,
        is_identity: false,
        is_computed: false,
    }
}

fn identity(name: &str) -> ColumnInfo {
    ColumnInfo {
        is_identity: true,
        ..column(name, "int", None, false)
    }
}

fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("dbmask_engine_{label}_{}", uuid::Uuid::new_v4()))
}

fn customer_target() -> MemoryTarget {
    let names = ["Ann Lee", "Bob Stone", "Cid Moss"];
    let rows = (1..=12)
        .map(|idx| {
            vec![
                SqlValue::Int(idx),
                text(names[(idx as usize) % names.len()]),
                text(&format!("user{idx}@example.com")),
            ]
        })
        .collect();
    let target = MemoryTarget::new();
    target.insert_table(
        TableInfo {
            name: TableName::new("dbo", "Customer"),
            columns: vec![
                identity("Id"),
                column("Name", "nvarchar", Some(100), false),
                column("Email", "varchar", Some(255), true),
            ],
            indexes: vec![IndexInfo {
                name: "ux_customer_email".to_string(),
                columns: vec!["Email".to_string()],
                is_unique: true,
                is_primary_key: false,
            }],
        },
        rows,
    );
    target
}

fn customer_config() -> ResolvedConfig {
    resolve(json!({
        "Name": "Shop",
        "Type": "DataMaskingConfiguration",
        "Tables": [{
            "Name": "Customer",
            "HasUniqueIndex": true,
            "Columns": [
                {
                    "Name": "Name",
                    "ColumnType": "nvarchar(100)",
                    "MaskingType": "Name",
                    "SubType": "FullName",
                    "Deterministic": true
                },
                {
                    "Name": "Email",
                    "ColumnType": "varchar(255)",
                    "MaskingType": "Internet",
                    "SubType": "Email",
                    "Nullable": true
                }
            ]
        }]
    }))
}

fn distinct_emails(target: &MemoryTarget, table: &TableName) -> usize {
    target
        .column_values(table, "Email")
        .iter()
        .filter_map(SqlValue::canonical)
        .map(|email| email.to_lowercase())
        .collect::<HashSet<_>>()
        .len()
}

#[test]
fn customer_dictionary_reproduces_names_across_runs() {
    let table = TableName::new("dbo", "Customer");
    let config = customer_config();
    let export_dir = temp_dir("export");

    let first_target = customer_target();
    let first = engine(MaskOptions {
        dictionary_export_dir: Some(export_dir.clone()),
        ..seeded(7)
    });
    let (report, cache) = run(&first, &config, &first_target);

    let result = report.table("dbo", "Customer").expect("customer result");
    assert_eq!(result.status, TableStatus::Successful);
    assert_eq!(result.rows_processed, 12);
    assert_eq!(report.cache_entries, 3);
    assert!(cache.store().is_dropped());

    let first_names = first_target.column_values(&table, "Name");
    for (idx, name) in first_names.iter().enumerate() {
        assert_eq!(name, &first_names[idx % 3], "same source must map to same mask");
        assert!(!name.is_null());
    }
    assert_eq!(distinct_emails(&first_target, &table), 12);
    assert_eq!(
        first_target.index_names(&table),
        vec!["ux_customer_email".to_string()]
    );

    let exported = report.exported_dictionary.clone().expect("dictionary exported");
    assert_eq!(exported, export_dir.join("Shop.dictionary.csv"));

    let second_target = customer_target();
    let second = engine(MaskOptions {
        dictionary_import: vec![exported],
        ..seeded(99)
    });
    let (report, _) = run(&second, &config, &second_target);
    assert_eq!(report.count(TableStatus::Successful), 1);
    assert_eq!(second_target.column_values(&table, "Name"), first_names);
    assert_eq!(distinct_emails(&second_target, &table), 12);
}

#[test]
fn fixed_seed_reproduces_output() {
    let table = TableName::new("dbo", "Customer");
    let config = customer_config();
    let a = customer_target();
    let b = customer_target();
    run(&engine(seeded(42)), &config, &a);
    run(&engine(seeded(42)), &config, &b);
    assert_eq!(
        a.column_values(&table, "Email"),
        b.column_values(&table, "Email")
    );
    assert_eq!(a.column_values(&table, "Name"), b.column_values(&table, "Name"));
}

fn codes_target(rows: usize) -> (MemoryTarget, TableName) {
    let table = TableName::new("dbo", "Codes");
    let target = MemoryTarget::new();
    target.insert_table(
        TableInfo {
            name: table.clone(),
            columns: vec![column("Code", "varchar", Some(10), false)],
            indexes: Vec::new(),
        },
        (0..rows).map(|idx| vec![text(&format!("c{idx}"))]).collect(),
    );
    (target, table)
}

fn codes_config() -> ResolvedConfig {
    resolve(json!({
        "Name": "Shop",
        "Tables": [{
            "Name": "Codes",
            "Columns": [{
                "Name": "Code",
                "ColumnType": "varchar(10)",
                "MaskingType": "Random",
                "SubType": "String",
                "MaxValue": 6
            }]
        }]
    }))
}

#[test]
fn batch_size_controls_flushes() {
    let (target, table) = codes_target(5);
    run(
        &engine(MaskOptions {
            batch_size: 1,
            ..seeded(1)
        }),
        &codes_config(),
        &target,
    );
    let batches = target.batches_for(&table);
    assert_eq!(batches.len(), 5);
    assert!(batches.iter().all(|batch| batch.statements == 1));

    let (target, table) = codes_target(5);
    run(
        &engine(MaskOptions {
            batch_size: 10,
            ..seeded(1)
        }),
        &codes_config(),
        &target,
    );
    let batches = target.batches_for(&table);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].statements, 5);
    assert!(
        target
            .column_values(&table, "Code")
            .iter()
            .all(|value| value.as_str().is_some_and(|code| code.chars().count() <= 6))
    );
}

#[test]
fn scaffolding_is_removed_after_success() {
    let (target, table) = codes_target(3);
    let (report, _) = run(&engine(seeded(3)), &codes_config(), &target);
    assert_eq!(report.count(TableStatus::Successful), 1);
    assert!(!target.has_column(&table, ORDINAL));
    assert!(!target.index_names(&table).contains(&SCAFFOLD_INDEX.to_string()));
}

#[test]
fn zero_row_table_succeeds_without_batches() {
    let (target, table) = codes_target(0);
    let (report, _) = run(&engine(seeded(4)), &codes_config(), &target);
    let result = report.table("dbo", "Codes").expect("result");
    assert_eq!(result.status, TableStatus::Successful);
    assert_eq!(result.rows_processed, 0);
    assert!(target.batches().is_empty());
    assert!(!target.has_column(&table, ORDINAL));
}

#[test]
fn missing_column_fails_only_its_table() {
    let (target, codes) = codes_target(2);
    let table = TableName::new("dbo", "Other");
    target.insert_table(
        TableInfo {
            name: table.clone(),
            columns: vec![column("Code", "varchar", Some(10), false)],
            indexes: Vec::new(),
        },
        vec![vec![text("a")], vec![text("b")]],
    );
    let config = resolve(json!({
        "Name": "Shop",
        "Tables": [
            {
                "Name": "Codes",
                "Columns": [{
                    "Name": "Nope",
                    "ColumnType": "varchar(10)",
                    "MaskingType": "Random",
                    "SubType": "String"
                }]
            },
            {
                "Name": "Other",
                "Columns": [{
                    "Name": "Code",
                    "ColumnType": "varchar(10)",
                    "StaticValue": "X"
                }]
            }
        ]
    }));

    let (report, _) = run(&engine(seeded(5)), &config, &target);
    assert_eq!(report.tables.len(), 2);
    assert_eq!(report.tables[0].status, TableStatus::Failed);
    assert!(
        report.tables[0]
            .error
            .as_deref()
            .is_some_and(|error| error.contains("Nope"))
    );
    assert_eq!(report.tables[1].status, TableStatus::Successful);
    assert_eq!(
        target.column_values(&codes, "Code"),
        vec![text("c0"), text("c1")]
    );
    assert_eq!(
        target.column_values(&table, "Code"),
        vec![text("X"), text("X")]
    );
}

#[test]
fn unsupported_generator_fails_before_any_write() {
    let (target, table) = codes_target(2);
    let config = resolve(json!({
        "Name": "Shop",
        "Tables": [{
            "Name": "Codes",
            "Columns": [{
                "Name": "Code",
                "ColumnType": "varchar(10)",
                "MaskingType": "Vehicle",
                "SubType": "Model"
            }]
        }]
    }));
    let (report, _) = run(&engine(seeded(6)), &config, &target);
    let result = report.table("dbo", "Codes").expect("result");
    assert_eq!(result.status, TableStatus::Failed);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|error| error.contains("unsupported generation type"))
    );
    assert!(target.batches().is_empty());
    assert!(!target.has_column(&table, ORDINAL));
    assert_eq!(
        target.column_values(&table, "Code"),
        vec![text("c0"), text("c1")]
    );
}

#[test]
fn uniqueness_exhaustion_aborts_the_run_and_cleans_up() {
    let voucher = TableName::new("dbo", "Voucher");
    let target = MemoryTarget::new();
    target.insert_table(
        TableInfo {
            name: voucher.clone(),
            columns: vec![column("Code", "int", None, false)],
            indexes: vec![IndexInfo {
                name: "ux_voucher_code".to_string(),
                columns: vec!["Code".to_string()],
                is_unique: true,
                is_primary_key: false,
            }],
        },
        (0..5).map(|idx| vec![SqlValue::Int(idx)]).collect(),
    );
    let codes_table = TableName::new("dbo", "Codes");
    let config = resolve(json!({
        "Name": "Shop",
        "Tables": [
            {
                "Name": "Voucher",
                "HasUniqueIndex": true,
                "Columns": [{
                    "Name": "Code",
                    "ColumnType": "int",
                    "MaskingType": "Random",
                    "SubType": "Number",
                    "MinValue": 1,
                    "MaxValue": 3
                }]
            },
            {
                "Name": "Codes",
                "Columns": [{
                    "Name": "Code",
                    "ColumnType": "varchar(10)",
                    "StaticValue": "X"
                }]
            }
        ]
    }));

    let engine = engine(MaskOptions {
        retry: 10,
        ..seeded(8)
    });
    let mut cache = DeterministicCache::new(MemoryScratchStore::new("dict"));
    let err = engine
        .run(&config, &target, &mut cache, &mut AutoConfirm)
        .expect_err("three values cannot cover five rows");

    let report = err.report().expect("partial report").clone();
    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].status, TableStatus::Failed);
    match err {
        MaskingError::Aborted { source, .. } => {
            assert!(matches!(*source, MaskingError::UniquenessExhausted { limit: 10, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(cache.store().is_dropped());
    assert!(!target.has_column(&voucher, ORDINAL));
    assert_eq!(
        target.index_names(&voucher),
        vec!["ux_voucher_code".to_string()]
    );
    assert!(target.batches().is_empty());
    assert!(report.table(&codes_table.schema, &codes_table.name).is_none());
}

fn numbered_vouchers(rows: i64) -> (MemoryTarget, TableName) {
    let table = TableName::new("dbo", "Voucher");
    let target = MemoryTarget::new();
    target.insert_table(
        TableInfo {
            name: table.clone(),
            columns: vec![identity("Id"), column("Code", "int", None, false)],
            indexes: vec![IndexInfo {
                name: "ux_code".to_string(),
                columns: vec!["Code".to_string()],
                is_unique: true,
                is_primary_key: false,
            }],
        },
        (1..=rows)
            .map(|idx| vec![SqlValue::Int(idx), SqlValue::Int(idx)])
            .collect(),
    );
    (target, table)
}

fn voucher_config(filter: Option<&str>) -> ResolvedConfig {
    let mut table = json!({
        "Name": "Voucher",
        "HasUniqueIndex": true,
        "Columns": [{
            "Name": "Code",
            "ColumnType": "int",
            "MaskingType": "Random",
            "SubType": "Number",
            "MinValue": 1,
            "MaxValue": 40
        }]
    });
    if let Some(filter) = filter {
        table["FilterQuery"] = json!(filter);
    }
    resolve(json!({ "Name": "Shop", "Tables": [table] }))
}

fn distinct_codes(target: &MemoryTarget, table: &TableName) -> usize {
    target
        .column_values(table, "Code")
        .iter()
        .filter_map(SqlValue::as_i64)
        .collect::<HashSet<_>>()
        .len()
}

#[test]
fn unique_codes_never_collide_with_rows_not_yet_updated() {
    let (target, table) = numbered_vouchers(20);
    let (report, _) = run(&engine(seeded(1)), &voucher_config(None), &target);

    let result = report.table("dbo", "Voucher").expect("result");
    assert_eq!(result.status, TableStatus::Successful, "{:?}", result.error);
    assert_eq!(result.rows_processed, 20);
    assert_eq!(distinct_codes(&target, &table), 20);
    assert!(!target.batches_for(&table).is_empty());
}

#[test]
fn unique_codes_avoid_rows_outside_the_filter() {
    let (target, table) = numbered_vouchers(20);
    target.register_filter("[Id] <= 10", |row| {
        row.get("Id").as_i64().is_some_and(|id| id <= 10)
    });
    let (report, _) = run(
        &engine(seeded(2)),
        &voucher_config(Some("[Id] <= 10")),
        &target,
    );

    let result = report.table("dbo", "Voucher").expect("result");
    assert_eq!(result.status, TableStatus::Successful, "{:?}", result.error);
    assert_eq!(result.rows_processed, 10);
    let codes = target.column_values(&table, "Code");
    let kept: Vec<SqlValue> = (11..=20).map(SqlValue::Int).collect();
    assert_eq!(codes[10..].to_vec(), kept);
    assert_eq!(distinct_codes(&target, &table), 20);
}

#[test]
fn deterministic_source_stays_stable_when_the_recorded_value_does_not_fit() {
    let people = TableName::new("dbo", "People");
    let handles = TableName::new("dbo", "Handles");
    let target = MemoryTarget::new();
    target.insert_table(
        TableInfo {
            name: people.clone(),
            columns: vec![column("Name", "nvarchar", Some(100), false)],
            indexes: Vec::new(),
        },
        vec![vec![text("Ann Lee")]],
    );
    target.insert_table(
        TableInfo {
            name: handles.clone(),
            columns: vec![column("Nick", "varchar", Some(3), false)],
            indexes: Vec::new(),
        },
        vec![vec![text("Ann Lee")]; 4],
    );
    let config = resolve(json!({
        "Name": "Shop",
        "Tables": [
            {
                "Name": "People",
                "Columns": [{
                    "Name": "Name",
                    "ColumnType": "nvarchar(100)",
                    "MaskingType": "Name",
                    "SubType": "FullName",
                    "Deterministic": true
                }]
            },
            {
                "Name": "Handles",
                "Columns": [{
                    "Name": "Nick",
                    "ColumnType": "varchar(3)",
                    "MaskingType": "Random",
                    "SubType": "String",
                    "MaxValue": 3,
                    "Deterministic": true
                }]
            }
        ]
    }));

    let (report, cache) = run(&engine(seeded(3)), &config, &target);
    assert_eq!(report.count(TableStatus::Successful), 2);
    assert_eq!(report.cache_entries, 1);
    drop(cache);

    let name = target.column_values(&people, "Name");
    assert_ne!(name, vec![text("Ann Lee")]);
    let nicks: HashSet<String> = target
        .column_values(&handles, "Nick")
        .iter()
        .filter_map(SqlValue::canonical)
        .collect();
    assert_eq!(nicks.len(), 1, "same source masked to different values: {nicks:?}");
    assert!(nicks.iter().all(|nick| nick.chars().count() <= 3));
}

#[test]
fn declined_tables_are_skipped_untouched() {
    let table = TableName::new("dbo", "Customer");
    let target = customer_target();
    let before = target.column_values(&table, "Name");
    let mut cache = DeterministicCache::new(MemoryScratchStore::new("dict"));
    let mut decline = |_: &TableName| false;
    let report = engine(seeded(9))
        .run(&customer_config(), &target, &mut cache, &mut decline)
        .expect("run");
    assert_eq!(report.count(TableStatus::Skipped), 1);
    assert_eq!(target.column_values(&table, "Name"), before);
    assert!(target.batches().is_empty());
}

#[test]
fn keep_null_and_null_injection() {
    let table = TableName::new("dbo", "Contact");
    let target = MemoryTarget::new();
    target.insert_table(
        TableInfo {
            name: table.clone(),
            columns: vec![
                identity("Id"),
                column("Phone", "varchar", Some(30), true),
                column("Email", "varchar", Some(100), true),
            ],
            indexes: Vec::new(),
        },
        (1..=4)
            .map(|idx| {
                let email = if idx % 2 == 1 {
                    SqlValue::Null
                } else {
                    text("someone@example.com")
                };
                vec![SqlValue::Int(idx), text("555-0100"), email]
            })
            .collect(),
    );
    let config = resolve(json!({
        "Name": "Shop",
        "Tables": [{
            "Name": "Contact",
            "Columns": [
                {
                    "Name": "Phone",
                    "ColumnType": "varchar(30)",
                    "MaskingType": "Phone",
                    "SubType": "PhoneNumber",
                    "Nullable": true
                },
                {
                    "Name": "Email",
                    "ColumnType": "varchar(100)",
                    "MaskingType": "Internet",
                    "SubType": "SafeEmail",
                    "Nullable": true,
                    "KeepNull": true
                }
            ]
        }]
    }));

    run(
        &engine(MaskOptions {
            modulus_factor: 2,
            ..seeded(10)
        }),
        &config,
        &target,
    );
    let phones = target.column_values(&table, "Phone");
    let nulls: Vec<bool> = phones.iter().map(SqlValue::is_null).collect();
    assert_eq!(nulls, vec![false, true, false, true]);

    let emails = target.column_values(&table, "Email");
    assert!(emails[0].is_null() && emails[2].is_null());
    assert!(!emails[1].is_null() && !emails[3].is_null());
}

#[test]
fn action_and_composite_passes_run_set_based() {
    let table = TableName::new("sales", "Orders");
    let shipped = |day| {
        SqlValue::DateTime(
            NaiveDate::from_ymd_opt(2024, 1, day)
                .and_then(|date| date.and_hms_opt(9, 0, 0))
                .expect("datetime"),
        )
    };
    let target = MemoryTarget::new();
    target.insert_table(
        TableInfo {
            name: table.clone(),
            columns: vec![
                column("OrderId", "int", None, false),
                column("ShippedAt", "datetime2", None, true),
                column("Reference", "nvarchar", Some(50), true),
            ],
            indexes: Vec::new(),
        },
        vec![
            vec![SqlValue::Int(1), shipped(1), text("a")],
            vec![SqlValue::Int(2), shipped(15), text("b")],
        ],
    );
    let config = resolve(json!({
        "Name": "Shop",
        "Tables": [{
            "Name": "Orders",
            "Schema": "sales",
            "Columns": [
                {
                    "Name": "ShippedAt",
                    "ColumnType": "datetime2",
                    "Action": { "Category": "DateTime", "Type": "Subtract", "SubCategory": "Day", "Value": 1 }
                },
                {
                    "Name": "Reference",
                    "ColumnType": "nvarchar(50)",
                    "Composite": [
                        { "Type": "Static", "Value": "ORD-" },
                        { "Type": "Column", "Value": "OrderId" }
                    ]
                }
            ]
        }]
    }));

    let (report, _) = run(&engine(seeded(11)), &config, &target);
    let result = report.table("sales", "Orders").expect("result");
    assert_eq!(result.status, TableStatus::Successful);
    assert_eq!(result.rows_processed, 2);
    assert!(target.batches().is_empty());
    assert_eq!(target.assignment_passes(&table).len(), 2);
    assert_eq!(
        target.column_values(&table, "ShippedAt"),
        vec![
            SqlValue::DateTime(
                NaiveDate::from_ymd_opt(2023, 12, 31)
                    .and_then(|date| date.and_hms_opt(9, 0, 0))
                    .expect("datetime")
            ),
            shipped(14)
        ]
    );
    assert_eq!(
        target.column_values(&table, "Reference"),
        vec![text("ORD-1"), text("ORD-2")]
    );
    assert!(!target.has_column(&table, ORDINAL));
}

#[test]
fn failed_batch_fails_its_table_and_the_run_continues() {
    let (target, table) = codes_target(4);
    target.fail_batch(&table, 2);
    let other = TableName::new("dbo", "Other");
    target.insert_table(
        TableInfo {
            name: other.clone(),
            columns: vec![column("Code", "varchar", Some(10), false)],
            indexes: Vec::new(),
        },
        vec![vec![text("x")]],
    );
    let config = resolve(json!({
        "Name": "Shop",
        "Tables": [
            {
                "Name": "Codes",
                "Columns": [{ "Name": "Code", "ColumnType": "varchar(10)", "StaticValue": "Y" }]
            },
            {
                "Name": "Other",
                "Columns": [{ "Name": "Code", "ColumnType": "varchar(10)", "StaticValue": "Z" }]
            }
        ]
    }));

    let (report, _) = run(
        &engine(MaskOptions {
            batch_size: 2,
            ..seeded(12)
        }),
        &config,
        &target,
    );
    let codes = report.table("dbo", "Codes").expect("codes");
    assert_eq!(codes.status, TableStatus::Failed);
    assert!(codes.error.as_deref().is_some_and(|error| error.contains("batch 2")));
    assert_eq!(
        report.table("dbo", "Other").map(|result| result.status),
        Some(TableStatus::Successful)
    );
    assert_eq!(
        target.column_values(&table, "Code"),
        vec![text("Y"), text("Y"), text("c2"), text("c3")]
    );
    assert!(!target.has_column(&table, ORDINAL));
}

#[test]
fn filter_query_limits_masked_rows() {
    let table = TableName::new("dbo", "Customer");
    let target = MemoryTarget::new();
    target.insert_table(
        TableInfo {
            name: table.clone(),
            columns: vec![
                identity("Id"),
                column("Country", "char", Some(2), false),
                column("Tier", "tinyint", None, false),
            ],
            indexes: Vec::new(),
        },
        vec![
            vec![SqlValue::Int(1), text("NL"), SqlValue::Int(1)],
            vec![SqlValue::Int(2), text("DE"), SqlValue::Int(1)],
            vec![SqlValue::Int(3), text("NL"), SqlValue::Int(1)],
        ],
    );
    target.register_filter("[Country] = 'NL'", |row| {
        row.get("Country").as_str() == Some("NL")
    });
    let config = resolve(json!({
        "Name": "Shop",
        "Tables": [{
            "Name": "Customer",
            "FilterQuery": "[Country] = 'NL'",
            "Columns": [{ "Name": "Tier", "ColumnType": "tinyint", "StaticValue": "3" }]
        }]
    }));

    let (report, _) = run(&engine(seeded(13)), &config, &target);
    assert_eq!(
        report.table("dbo", "Customer").map(|result| result.rows_processed),
        Some(2)
    );
    assert_eq!(
        target.column_values(&table, "Tier"),
        vec![SqlValue::Int(3), SqlValue::Int(1), SqlValue::Int(3)]
    );
}

#[test]
fn lost_connection_is_fatal() {
    let (target, table) = codes_target(3);
    target.lose_connection_on(&table);
    let config = resolve(json!({
        "Name": "Shop",
        "Tables": [
            {
                "Name": "Codes",
                "Columns": [{ "Name": "Code", "ColumnType": "varchar(10)", "StaticValue": "Y" }]
            },
            {
                "Name": "Later",
                "Columns": [{ "Name": "Code", "ColumnType": "varchar(10)", "StaticValue": "Z" }]
            }
        ]
    }));

    let mut cache = DeterministicCache::new(MemoryScratchStore::new("dict"));
    let err = engine(seeded(14))
        .run(&config, &target, &mut cache, &mut AutoConfirm)
        .expect_err("connection loss stops the run");
    let report = err.report().expect("partial report");
    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].status, TableStatus::Failed);
    assert!(cache.store().is_dropped());
}
