//! Logging sinks
//!
//! The composer and the table facade report SQL text and failures through a
//! [`Logger`]. The process-wide logger defaults to [`TracingLogger`]; a
//! different one can be installed once at startup with [`set_logger`].

use std::fmt::Arguments;
use std::io::Write;
use std::sync::{Arc, OnceLock};

/// A sink for the library's log lines.
pub trait Logger: Send + Sync {
    fn info(&self, args: Arguments<'_>);
    fn warning(&self, args: Arguments<'_>);
    fn error(&self, args: Arguments<'_>);
}

/// Forwards to `tracing` under the `dbkit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, args: Arguments<'_>) {
        tracing::info!(target: "dbkit", "{}", args);
    }

    fn warning(&self, args: Arguments<'_>) {
        tracing::warn!(target: "dbkit", "{}", args);
    }

    fn error(&self, args: Arguments<'_>) {
        tracing::error!(target: "dbkit", "{}", args);
    }
}

/// Writes timestamped lines to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl StderrLogger {
    fn write(level: &str, args: Arguments<'_>) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        // Nowhere to report a failed write to stderr.
        let _ = writeln!(std::io::stderr().lock(), "{now} [{level}] {args}");
    }
}

impl Logger for StderrLogger {
    fn info(&self, args: Arguments<'_>) {
        Self::write("INFO", args);
    }

    fn warning(&self, args: Arguments<'_>) {
        Self::write("WARN", args);
    }

    fn error(&self, args: Arguments<'_>) {
        Self::write("ERROR", args);
    }
}

static LOGGER: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Install the process-wide logger.
///
/// Only the first call takes effect; returns `false` when a logger was
/// already installed (or the default was already handed out).
pub fn set_logger(logger: Arc<dyn Logger>) -> bool {
    LOGGER.set(logger).is_ok()
}

/// The process-wide logger.
pub fn logger() -> &'static dyn Logger {
    LOGGER.get_or_init(|| Arc::new(TracingLogger)).as_ref()
}

/// `local` when given, otherwise the process-wide logger.
pub(crate) fn resolve(local: Option<&Arc<dyn Logger>>) -> &dyn Logger {
    match local {
        Some(logger) => logger.as_ref(),
        None => logger(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Collects lines for assertions.
    #[derive(Default)]
    pub(crate) struct Capture {
        pub(crate) lines: Mutex<Vec<String>>,
    }

    impl Capture {
        fn push(&self, level: &str, args: Arguments<'_>) {
            self.lines.lock().unwrap().push(format!("{level} {args}"));
        }
    }

    impl Logger for Capture {
        fn info(&self, args: Arguments<'_>) {
            self.push("INFO", args);
        }

        fn warning(&self, args: Arguments<'_>) {
            self.push("WARN", args);
        }

        fn error(&self, args: Arguments<'_>) {
            self.push("ERROR", args);
        }
    }

    #[test]
    fn test_resolve_prefers_local() {
        let capture = Arc::new(Capture::default());
        let local: Arc<dyn Logger> = capture.clone();
        resolve(Some(&local)).info(format_args!("hello {}", 1));
        assert_eq!(capture.lines.lock().unwrap().as_slice(), ["INFO hello 1"]);
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_logger_target() {
        let sink = Sink::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("dbkit=warn")
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            TracingLogger.info(format_args!("hidden"));
            TracingLogger.warning(format_args!("shown {}", 2));
        });
        let out = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("WARN dbkit: shown 2"));
        assert!(!out.contains("hidden"));
    }

    #[test]
    fn test_composer_logs_origin() {
        let capture = Arc::new(Capture::default());
        let mut q = crate::Query::new("SELECT 1", &[]);
        q.set_print_log(true).set_logger(capture.clone());
        let sql = q.sql_str();
        assert_eq!(sql, "SELECT 1;");
        let lines = capture.lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("INFO ("));
        assert!(lines[0].contains("log.rs:"));
        assert!(lines[0].ends_with(") SELECT 1;"));
    }
}
