//! Delivering serialized reports
//!
//! A [`TriggerHandler`] runs on the thread that raised the trigger and blocks it until
//! delivery finishes. Handlers are shared between threads and must be thread-safe.

use crate::error::Result;
use crate::trigger::TriggerKind;
use std::io::Write;
use std::sync::Arc;

/// Receives serialized reports
pub trait TriggerHandler: Send + Sync {
    fn on_error(&self, serialized_error: &str) -> Result<()>;

    fn on_timeout(&self, serialized_timeout: &str) -> Result<()>;
}

/// Writes every report to standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutWriter;

impl StdoutWriter {
    fn write(report: &str) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", report)?;
        out.flush()?;
        Ok(())
    }
}

impl TriggerHandler for StdoutWriter {
    fn on_error(&self, serialized_error: &str) -> Result<()> {
        Self::write(serialized_error)
    }

    fn on_timeout(&self, serialized_timeout: &str) -> Result<()> {
        Self::write(serialized_timeout)
    }
}

/// Emits reports as `tracing` events with target `snaperr`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWriter;

impl TriggerHandler for LogWriter {
    fn on_error(&self, serialized_error: &str) -> Result<()> {
        tracing::error!(target: "snaperr", "{}", serialized_error);
        Ok(())
    }

    fn on_timeout(&self, serialized_timeout: &str) -> Result<()> {
        tracing::warn!(target: "snaperr", "{}", serialized_timeout);
        Ok(())
    }
}

/// Discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTriggerHandler;

impl TriggerHandler for NoopTriggerHandler {
    fn on_error(&self, _serialized_error: &str) -> Result<()> {
        Ok(())
    }

    fn on_timeout(&self, _serialized_timeout: &str) -> Result<()> {
        Ok(())
    }
}

/// Type alias for report callback functions
pub type ReportCallback = Arc<dyn Fn(TriggerKind, &str) + Send + Sync>;

/// Hands every report to a callback
#[derive(Clone)]
pub struct CallbackHandler {
    callback: ReportCallback,
}

impl CallbackHandler {
    pub fn new(callback: ReportCallback) -> Self {
        Self { callback }
    }
}

impl TriggerHandler for CallbackHandler {
    fn on_error(&self, serialized_error: &str) -> Result<()> {
        (self.callback)(TriggerKind::Error, serialized_error);
        Ok(())
    }

    fn on_timeout(&self, serialized_timeout: &str) -> Result<()> {
        (self.callback)(TriggerKind::Timeout, serialized_timeout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_callback_handler_receives_kind_and_text() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);

        let handler = CallbackHandler::new(Arc::new(move |kind: TriggerKind, text: &str| {
            received_clone.lock().unwrap().push((kind, text.to_string()));
        }));

        handler.on_error("error report").unwrap();
        handler.on_timeout("timeout report").unwrap();

        let received = received.lock().unwrap();
        assert_eq!(
            *received,
            vec![
                (TriggerKind::Error, "error report".to_string()),
                (TriggerKind::Timeout, "timeout report".to_string()),
            ]
        );
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoopTriggerHandler;
        assert!(handler.on_error("ignored").is_ok());
        assert!(handler.on_timeout("ignored").is_ok());
    }

    #[test]
    fn test_stdout_writer() {
        let handler = StdoutWriter;
        assert!(handler.on_error("snaperr stdout writer test").is_ok());
        assert!(handler.on_timeout("snaperr stdout writer test").is_ok());
    }

    #[test]
    fn test_log_writer_without_subscriber() {
        let handler = LogWriter;
        assert!(handler.on_error("logged error").is_ok());
        assert!(handler.on_timeout("logged timeout").is_ok());
    }
}
