//! Compiler warning interception.
//!
//! Each request gets its own [`WarningCollector`]; the backend reports into it
//! while evaluating and the result protocol resolves it once, on delivery.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::ReplError;
use crate::protocol::EvalResult;

/// A warning as emitted by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerWarning {
    /// Warning type, e.g. `undeclared-var` or `redef`.
    pub kind: String,
    pub message: String,
    pub line: Option<usize>,
    pub file: Option<String>,
}

impl CompilerWarning {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            line: None,
            file: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// `<message> at line <n> <file>`, dropping whatever location is unknown.
    pub fn render(&self) -> String {
        let mut out = self.message.clone();
        if let Some(line) = self.line {
            out.push_str(&format!(" at line {}", line));
        }
        if let Some(file) = &self.file {
            out.push(' ');
            out.push_str(file);
        }
        out
    }
}

/// Per-request warning slot. Clones share the slot; only the latest warning
/// is kept.
#[derive(Debug, Clone, Default)]
pub struct WarningCollector {
    slot: Arc<Mutex<Option<String>>>,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the backend, synchronously, while it evaluates.
    pub fn warn(&self, warning: &CompilerWarning) {
        tracing::debug!(kind = %warning.kind, "compiler warning: {}", warning.message);
        *self.slot.lock() = Some(warning.render());
    }

    pub fn pending(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    /// Take the pending warning, leaving the slot empty.
    pub fn take(&self) -> Option<String> {
        self.slot.lock().take()
    }
}

/// Fold a pending warning into a result.
///
/// Errors win over warnings. A successful result either carries the warning
/// as an advisory or, with `warning_as_error`, is replaced by an error whose
/// message is the warning text.
pub fn resolve_warning(
    warning_as_error: bool,
    pending: Option<String>,
    result: EvalResult,
) -> EvalResult {
    let Some(message) = pending else {
        return result;
    };
    if !result.is_success() {
        return result;
    }
    if warning_as_error {
        tracing::warn!("warning escalated to error: {}", message);
        EvalResult::failure(result.form, None, ReplError::warning(message))
    } else {
        tracing::warn!("{}", message);
        EvalResult {
            warning: Some(message),
            ..result
        }
    }
}
