//! Reval error handling.
//!
//! Every recoverable failure travels to the caller inside an
//! [`EvalResult`](crate::protocol::EvalResult) as a `ReplError`. Only a broken
//! caller-side precondition in [`Repl::reset_env`](crate::Repl::reset_env) is
//! returned directly.

use miette::{Diagnostic, SourceSpan};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

use crate::syntax::Form;

/// The structured error carried by failed results and stored in `*e`.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ReplError {
    /// Malformed input text.
    #[error("{message}")]
    #[diagnostic(code(reval::reader))]
    Reader {
        message: String,
        #[source_code]
        src: String,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    /// A special form's argument has the wrong shape.
    #[error("{message}")]
    #[diagnostic(code(reval::argument))]
    Argument { message: String },

    #[error("The {keyword} keyword is not supported at the moment")]
    #[diagnostic(code(reval::unsupported))]
    Unsupported { keyword: String },

    /// Options that cannot be normalized into a working request.
    #[error("{message}")]
    #[diagnostic(code(reval::config))]
    Config { message: String },

    /// A compiler warning promoted to an error by `warning-as-error`.
    #[error("{message}")]
    #[diagnostic(code(reval::warning))]
    Warning { message: String },

    /// Failure reported by the evaluation backend.
    #[error("{message}")]
    #[diagnostic(code(reval::eval))]
    Eval {
        message: String,
        #[source]
        cause: Option<Box<ReplError>>,
        stack: Option<String>,
        data: Option<Form>,
    },

    /// The caller broke an invariant; never delivered as a result.
    #[error("{message}")]
    #[diagnostic(
        code(reval::precondition),
        help("purge every dependent namespace before resetting the environment")
    )]
    Precondition { message: String },
}

impl ReplError {
    pub fn reader(message: impl Into<String>, src: &str, offset: Option<usize>) -> Self {
        ReplError::Reader {
            message: message.into(),
            src: src.to_string(),
            span: offset.map(|o| SourceSpan::from(o..o)),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        ReplError::Argument {
            message: message.into(),
        }
    }

    pub fn unsupported(keyword: impl Into<String>) -> Self {
        ReplError::Unsupported {
            keyword: keyword.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ReplError::Config {
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        ReplError::Warning {
            message: message.into(),
        }
    }

    /// A plain backend error with no cause, stack or data.
    pub fn eval(message: impl Into<String>) -> Self {
        ReplError::Eval {
            message: message.into(),
            cause: None,
            stack: None,
            data: None,
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        ReplError::Precondition {
            message: message.into(),
        }
    }

    /// Attach a cause to a backend error. Other kinds are returned unchanged.
    pub fn with_cause(self, cause: ReplError) -> Self {
        match self {
            ReplError::Eval {
                message,
                stack,
                data,
                ..
            } => ReplError::Eval {
                message,
                cause: Some(Box::new(cause)),
                stack,
                data,
            },
            other => other,
        }
    }

    /// Attach stack trace text to a backend error. Other kinds are returned unchanged.
    pub fn with_stack(self, stack: impl Into<String>) -> Self {
        match self {
            ReplError::Eval {
                message,
                cause,
                data,
                ..
            } => ReplError::Eval {
                message,
                cause,
                stack: Some(stack.into()),
                data,
            },
            other => other,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn cause(&self) -> Option<&ReplError> {
        match self {
            ReplError::Eval { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }

    pub fn stack(&self) -> Option<&str> {
        match self {
            ReplError::Eval { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&Form> {
        match self {
            ReplError::Eval { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    /// Short kind name, also the suffix of the diagnostic code.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            ReplError::Reader { .. } => "reader",
            ReplError::Argument { .. } => "argument",
            ReplError::Unsupported { .. } => "unsupported",
            ReplError::Config { .. } => "config",
            ReplError::Warning { .. } => "warning",
            ReplError::Eval { .. } => "eval",
            ReplError::Precondition { .. } => "precondition",
        }
    }

    /// Message, cause chain and stack, the layout `pst` prints.
    pub fn to_trace_string(&self) -> String {
        let mut out = self.message();
        if let Some(stack) = self.stack() {
            out.push('\n');
            out.push_str(stack.trim_end());
        }
        let mut cause = self.cause();
        while let Some(err) = cause {
            out.push_str("\nCaused by: ");
            out.push_str(&err.message());
            if let Some(stack) = err.stack() {
                out.push('\n');
                out.push_str(stack.trim_end());
            }
            cause = err.cause();
        }
        out
    }
}

/// `{kind, code, message, stack?, data?, cause?}`, causes nested alike.
impl Serialize for ReplError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let stack = self.stack();
        let data = self.data();
        let cause = self.cause();
        let fields = 3
            + usize::from(stack.is_some())
            + usize::from(data.is_some())
            + usize::from(cause.is_some());
        let mut state = serializer.serialize_struct("ReplError", fields)?;
        state.serialize_field("kind", self.kind_name())?;
        state.serialize_field("code", &format!("reval::{}", self.kind_name()))?;
        state.serialize_field("message", &self.message())?;
        if let Some(stack) = stack {
            state.serialize_field("stack", stack)?;
        }
        if let Some(data) = data {
            state.serialize_field("data", &data.to_string())?;
        }
        if let Some(cause) = cause {
            state.serialize_field("cause", cause)?;
        }
        state.end()
    }
}
