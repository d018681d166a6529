//! Console logging plus the JSON audit log of delivered messages

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use torbit_broadcaster::AUDIT_TARGET;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Open the audit log for appending, creating it and its directory if needed
pub fn open_audit_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            torbit_paths::ensure_dir(parent).context("Failed to create log directory")?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// One flattened JSON object per line, audit events only
pub fn audit_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(Mutex::new(file))
        .with_filter(Targets::new().with_target(AUDIT_TARGET, Level::INFO))
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` for the console; audit records
/// never go to the console.
pub fn init(level: &str, audit_log: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level))
        .add_directive(
            format!("{}=off", AUDIT_TARGET)
                .parse()
                .context("Invalid audit filter directive")?,
        );

    let console = fmt::layer()
        .with_target(false)
        .with_level(true)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let file = open_audit_log(audit_log)?;

    tracing_subscriber::registry()
        .with(console)
        .with(audit_layer(file))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use tempfile::tempdir;

    #[test]
    fn test_audit_log_records_only_deliveries() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("logs").join("chat.log");
        let file = open_audit_log(&path).unwrap();

        let subscriber = tracing_subscriber::registry().with(audit_layer(file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("not an audit record");
            tracing::info!(
                target: AUDIT_TARGET,
                sender = "alice",
                text = "hello",
                recipient = "bob",
                "message delivered"
            );
        });

        let lines: Vec<String> = BufReader::new(File::open(&path).unwrap())
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 1);

        let record: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["sender"], "alice");
        assert_eq!(record["text"], "hello");
        assert_eq!(record["recipient"], "bob");
        assert_eq!(record["target"], AUDIT_TARGET);
    }

    #[test]
    fn test_audit_log_appends() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("chat.log");
        std::fs::write(&path, "{\"existing\":true}\n").unwrap();

        let file = open_audit_log(&path).unwrap();
        let subscriber = tracing_subscriber::registry().with(audit_layer(file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: AUDIT_TARGET, sender = "a", text = "b", "message delivered");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("{\"existing\":true}\n"));
        assert_eq!(contents.lines().count(), 2);
    }
}
