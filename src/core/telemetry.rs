//! Forwarding of unexpected failures.
//!
//! User mistakes (bad input, denied access, expired sessions) are printed and
//! forgotten. Anything else reaches an [`ErrorReporter`] with enough context
//! to replay the command.

use crate::core::error::CrmError;
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub operation: &'a str,
    pub actor: Option<&'a str>,
    pub arguments: &'a [String],
}

pub trait ErrorReporter {
    fn report(&self, err: &CrmError, context: &ReportContext<'_>);
}

#[derive(Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &CrmError, context: &ReportContext<'_>) {
        error!(
            operation = context.operation,
            actor = context.actor.unwrap_or("-"),
            code = err.error_code(),
            "{err}"
        );
    }
}

#[derive(Debug, Serialize)]
struct ReportLine<'a> {
    timestamp: String,
    operation: &'a str,
    actor: Option<&'a str>,
    arguments: &'a [String],
    code: &'static str,
    message: String,
}

/// Appends one JSON object per report. Write failures are logged and dropped
/// so reporting never masks the original error.
#[derive(Debug, Clone)]
pub struct FileReporter {
    path: PathBuf,
}

impl FileReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, line: &ReportLine<'_>) -> std::io::Result<()> {
        let mut json = serde_json::to_string(line).map_err(std::io::Error::other)?;
        json.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(json.as_bytes())
    }
}

impl ErrorReporter for FileReporter {
    fn report(&self, err: &CrmError, context: &ReportContext<'_>) {
        let line = ReportLine {
            timestamp: Utc::now().to_rfc3339(),
            operation: context.operation,
            actor: context.actor,
            arguments: context.arguments,
            code: err.error_code(),
            message: err.to_string(),
        };
        if let Err(e) = self.append(&line) {
            warn!(path = %self.path.display(), "failed to write error report: {e}");
        }
    }
}

/// Fans a report out to several sinks.
#[derive(Default)]
pub struct Reporters {
    sinks: Vec<Box<dyn ErrorReporter>>,
}

impl Reporters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ErrorReporter + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ErrorReporter for Reporters {
    fn report(&self, err: &CrmError, context: &ReportContext<'_>) {
        for sink in &self.sinks {
            sink.report(err, context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recording(Rc<RefCell<Vec<String>>>);

    impl ErrorReporter for Recording {
        fn report(&self, err: &CrmError, context: &ReportContext<'_>) {
            self.0
                .borrow_mut()
                .push(format!("{}:{}", context.operation, err.error_code()));
        }
    }

    #[test]
    fn test_file_reporter_appends_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("errors.jsonl");
        let reporter = FileReporter::new(&path);
        let args = vec!["customer".to_string(), "list".to_string()];
        let context = ReportContext {
            operation: "customer list",
            actor: Some("EMP0001"),
            arguments: &args,
        };

        reporter.report(&CrmError::Database("disk I/O error".into()), &context);
        reporter.report(&CrmError::Config("bad".into()), &context);

        let content = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["code"], "database_error");
        assert_eq!(lines[0]["actor"], "EMP0001");
        assert_eq!(lines[1]["arguments"][1], "list");
    }

    #[test]
    fn test_file_reporter_swallows_write_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reporter = FileReporter::new(dir.path().join("missing").join("errors.jsonl"));
        reporter.report(
            &CrmError::Database("boom".into()),
            &ReportContext {
                operation: "event list",
                actor: None,
                arguments: &[],
            },
        );
    }

    #[test]
    fn test_reporters_fan_out() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let reporters = Reporters::new()
            .with(Recording(seen.clone()))
            .with(Recording(seen.clone()));
        reporters.report(
            &CrmError::Database("locked".into()),
            &ReportContext {
                operation: "login",
                actor: None,
                arguments: &[],
            },
        );
        assert_eq!(reporters.len(), 2);
        assert_eq!(seen.borrow().as_slice(), ["login:database_error", "login:database_error"]);
    }
}
