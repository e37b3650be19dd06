use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options for the masking engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskOptions {
    /// Rows per flushed UPDATE batch.
    pub batch_size: usize,
    /// Cumulative retry budget for unique value generation per table.
    pub retry: u64,
    /// Every Nth nullable evaluation becomes NULL; 0 disables injection.
    pub modulus_factor: u64,
    /// Command timeout applied by the database adapter.
    pub command_timeout_secs: u64,
    /// Pad generated text to the declared column length.
    pub exact_length: bool,
    /// Locale used by semantic generators (`en_US`, `pt_BR`, `fr_FR`).
    pub locale: String,
    /// Seed for reproducible runs; random when unset.
    pub seed: Option<u64>,
    /// Database hosting the dictionary scratch table.
    pub scratch_database: String,
    /// Dictionary CSV files loaded into the cache before masking.
    pub dictionary_import: Vec<PathBuf>,
    /// Directory that receives `<database>.dictionary.csv` after the run.
    pub dictionary_export_dir: Option<PathBuf>,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            retry: 1000,
            modulus_factor: 10,
            command_timeout_secs: 300,
            exact_length: false,
            locale: "en_US".to_string(),
            seed: None,
            scratch_database: "tempdb".to_string(),
            dictionary_import: Vec::new(),
            dictionary_export_dir: None,
        }
    }
}

/// Outcome of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Successful,
    Failed,
    Skipped,
}

/// Per-table result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableResult {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    pub rows_processed: u64,
    pub elapsed_ms: u64,
    pub status: TableStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report for a masking run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingReport {
    pub run_id: String,
    pub database: String,
    pub started_at: String,
    pub tables: Vec<TableResult>,
    pub cache_entries: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_dictionary: Option<PathBuf>,
    pub duration_ms: u64,
}

impl MaskingReport {
    pub fn new(run_id: String, database: String) -> Self {
        Self {
            run_id,
            database,
            started_at: chrono::Utc::now().to_rfc3339(),
            tables: Vec::new(),
            cache_entries: 0,
            exported_dictionary: None,
            duration_ms: 0,
        }
    }

    pub fn count(&self, status: TableStatus) -> usize {
        self.tables
            .iter()
            .filter(|table| table.status == status)
            .count()
    }

    pub fn table(&self, schema: &str, table: &str) -> Option<&TableResult> {
        self.tables.iter().find(|result| {
            result.schema.eq_ignore_ascii_case(schema) && result.table.eq_ignore_ascii_case(table)
        })
    }
}
