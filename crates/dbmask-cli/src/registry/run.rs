use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dbmask_core::RedactedConnection;
use dbmask_engine::{MaskOptions, MaskingReport};

use super::{RegistryError, RegistryResult};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub database: String,
    pub config_path: PathBuf,
    pub run_dir: PathBuf,
    pub options: MaskOptions,
    pub connection: RedactedConnection,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub database: String,
    pub masking_config: String,
    pub options: MaskOptions,
    pub connection: RedactedConnection,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub masking_config_path: PathBuf,
    pub logs_path: PathBuf,
    pub report_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let paths = RunPaths {
        config_path: root.join("config.json"),
        masking_config_path: root.join("masking.json"),
        logs_path: root.join("logs.ndjson"),
        report_path: root.join("report.json"),
        root,
    };

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        database: ctx.database.clone(),
        masking_config: ctx.config_path.display().to_string(),
        options: ctx.options.clone(),
        connection: ctx.connection.clone(),
        git: collect_git_info(),
    };

    write_json(&paths.config_path, &config)?;
    std::fs::copy(&ctx.config_path, &paths.masking_config_path)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.logs_path)?;

    Ok(paths)
}

pub fn write_report(paths: &RunPaths, report: &MaskingReport) -> RegistryResult<()> {
    write_json(&paths.report_path, report)
}

pub fn collect_git_info() -> GitInfo {
    let commit = git(&["rev-parse", "HEAD"])
        .map(|stdout| String::from_utf8_lossy(&stdout).trim().to_string())
        .filter(|commit| !commit.is_empty());
    let dirty = git(&["status", "--porcelain"]).map(|stdout| !stdout.is_empty());
    GitInfo { commit, dirty }
}

/// Stdout of a successful git invocation.
fn git(args: &[&str]) -> Option<Vec<u8>> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| output.stdout)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use dbmask_core::redact_connection_string;
    use dbmask_engine::TableStatus;

    use super::*;

    fn context(root: &Path) -> RunContext {
        let config_path = root.join("shop.json");
        std::fs::write(&config_path, r#"{"Name":"Shop","Tables":[]}"#).expect("write config");
        RunContext {
            run_id: "ab12cd34".to_string(),
            started_at: DateTime::parse_from_rfc3339("2024-06-01T10:20:30Z")
                .expect("timestamp")
                .with_timezone(&Utc),
            database: "Shop".to_string(),
            config_path,
            run_dir: root.join("runs"),
            options: MaskOptions::default(),
            connection: redact_connection_string(
                "Server=tcp:db01,1433;Database=Shop;User Id=sa;Password=hunter2",
            ),
        }
    }

    #[test]
    fn run_directory_holds_config_copy_and_redacted_connection() {
        let root = std::env::temp_dir().join(format!("dbmask_registry_{}", uuid::Uuid::new_v4()));
        create_dir_all(&root).expect("temp dir");
        let ctx = context(&root);

        let paths = start_run(&ctx).expect("start run");
        assert!(paths.root.ends_with("2024-06-01T10-20-30Z__run_ab12cd34"));
        assert!(paths.logs_path.exists());
        assert_eq!(
            std::fs::read_to_string(&paths.masking_config_path).expect("copy"),
            r#"{"Name":"Shop","Tables":[]}"#
        );

        let config = std::fs::read_to_string(&paths.config_path).expect("config.json");
        assert!(!config.contains("hunter2"));
        let config: serde_json::Value = serde_json::from_str(&config).expect("json");
        assert_eq!(config["database"], "Shop");
        assert_eq!(config["options"]["batch_size"], 1000);

        let mut report = MaskingReport::new("ab12cd34".to_string(), "Shop".to_string());
        report.cache_entries = 4;
        write_report(&paths, &report).expect("report");
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.report_path).expect("report"))
                .expect("json");
        assert_eq!(written["cache_entries"], 4);
        assert_eq!(report.count(TableStatus::Failed), 0);

        std::fs::remove_dir_all(&root).ok();
    }
}
