use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const OPERATION_LOG_FILE: &str = "operation_log.txt";

/// Directory where app data is stored
fn app_data_dir() -> PathBuf {
    match dirs::config_dir() {
        Some(config_dir) => config_dir.join("savegas"),
        None => PathBuf::from("."),
    }
}

fn log_path() -> PathBuf {
    app_data_dir().join(OPERATION_LOG_FILE)
}

/// Full path to the operation log, for display
pub fn log_file_path() -> String {
    log_path().display().to_string()
}

/// Append an entry describing a submitted operation (mint, bulk transfer).
pub fn append_log(operation: &str, network: &str, details: impl AsRef<str>) -> Result<()> {
    append_log_to(&log_path(), operation, network, details.as_ref())
}

fn append_log_to(path: &Path, operation: &str, network: &str, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let timestamp = Utc::now().to_rfc3339();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    writeln!(file, "[{}] network={} operation={}", timestamp, network, operation)?;

    if body.trim().is_empty() {
        writeln!(file, "  (no additional details)")?;
    } else {
        for line in body.lines() {
            if line.trim().is_empty() {
                writeln!(file)?;
            } else {
                writeln!(file, "  {}", line)?;
            }
        }
    }

    writeln!(file)?;
    Ok(())
}

/// Entire log content; empty when nothing has been logged yet.
pub fn read_log() -> Result<String> {
    read_log_from(&log_path())
}

fn read_log_from(path: &Path) -> Result<String> {
    if path.exists() {
        Ok(fs::read_to_string(path)?)
    } else {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("savegas-log-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir.join(OPERATION_LOG_FILE)
    }

    #[test]
    fn test_append_and_read() {
        let path = temp_log("append");
        assert_eq!(read_log_from(&path).unwrap(), "");

        append_log_to(&path, "bulk_transfer", "nile.trongrid.io", "recipients=2\n\ntx=abc").unwrap();
        append_log_to(&path, "mint", "nile.trongrid.io", "").unwrap();

        let content = read_log_from(&path).unwrap();
        assert!(content.contains("network=nile.trongrid.io operation=bulk_transfer"));
        assert!(content.contains("  recipients=2\n\n  tx=abc\n"));
        assert!(content.contains("operation=mint"));
        assert!(content.contains("  (no additional details)"));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
