//! Boundaries to the external collaborators.
//!
//! The compiler/evaluator, the module loader and the file reader are not part
//! of this crate. They plug in through the async traits below; everything the
//! core needs from them is named here.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::config::Target;
use crate::errors::ReplError;
use crate::session::History;
use crate::syntax::{Form, Symbol};
use crate::warnings::WarningCollector;

// ============================================================================
// VALUES
// ============================================================================

/// What an evaluation produces. Error objects are values too, so `*e` can be
/// evaluated and handed to `pst`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Data(Form),
    Error(Box<ReplError>),
}

impl Value {
    pub const NIL: Value = Value::Data(Form::Nil);

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Data(form) => form.is_truthy(),
            Value::Error(_) => true,
        }
    }

    /// Text without `pr-str` quoting.
    pub fn to_raw_string(&self) -> String {
        match self {
            Value::Data(form) => form.to_raw_string(),
            Value::Error(err) => err.message(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Data(form) => write!(f, "{}", form),
            Value::Error(err) => write!(
                f,
                "#error {{:message {}}}",
                Form::Str(err.message())
            ),
        }
    }
}

impl From<Form> for Value {
    fn from(form: Form) -> Self {
        Value::Data(form)
    }
}

/// A successful evaluation: the value and the namespace the backend ended in.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub value: Value,
    pub ns: Symbol,
}

// ============================================================================
// EVALUATION OPTIONS
// ============================================================================

/// Position of the evaluated code, as the compiler understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalContext {
    Expr,
    Statement,
    Return,
}

/// The option bundle handed to the backend for every evaluation.
#[derive(Clone)]
pub struct EvalOptions {
    pub ns: Symbol,
    pub context: EvalContext,
    pub source_map: bool,
    pub def_emits_var: bool,
    pub static_fns: bool,
    pub verbose: bool,
    pub target: Target,
    pub loader: Arc<dyn Loader>,
    /// Compiler warnings raised during this request go here.
    pub warnings: WarningCollector,
    /// Snapshot of `*1`, `*2`, `*3` and `*e`.
    pub history: History,
}

impl fmt::Debug for EvalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalOptions")
            .field("ns", &self.ns)
            .field("context", &self.context)
            .field("source_map", &self.source_map)
            .field("def_emits_var", &self.def_emits_var)
            .field("static_fns", &self.static_fns)
            .field("verbose", &self.verbose)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ANALYSIS METADATA
// ============================================================================

/// Analyzer metadata of a var or macro.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarInfo {
    /// Fully qualified name.
    pub name: Symbol,
    pub ns: Symbol,
    pub doc: Option<String>,
    /// Printed arglists, e.g. `([x] [x y])`.
    pub arglists: Option<String>,
    pub is_macro: bool,
    pub private: bool,
    pub file: Option<String>,
    pub line: Option<usize>,
}

/// Analyzer metadata of a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceInfo {
    pub name: Symbol,
    pub doc: Option<String>,
}

// ============================================================================
// EVALUATOR
// ============================================================================

/// The language compiler/evaluator.
///
/// Warnings are not part of the return value; the backend reports them through
/// `opts.warnings` while it evaluates.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate an already-read form.
    async fn eval_form(&self, form: &Form, opts: &EvalOptions) -> Result<Evaluated, ReplError>;

    /// Evaluate source text; `source` doubles as the source name.
    async fn eval_source(&self, source: &str, opts: &EvalOptions)
        -> Result<Evaluated, ReplError>;

    fn namespace_exists(&self, ns: &Symbol) -> bool;

    fn namespace_info(&self, ns: &Symbol) -> Option<NamespaceInfo>;

    /// Resolve `sym` as seen from namespace `ns`.
    fn resolve_var(&self, ns: &Symbol, sym: &Symbol) -> Option<VarInfo>;

    /// Every var and macro interned in `ns`, private ones included.
    fn public_vars(&self, ns: &Symbol) -> Vec<VarInfo>;

    /// The loader's loaded-set.
    fn loaded_namespaces(&self) -> Vec<Symbol>;

    /// Drop `ns` from the analysis cache and the loaded-set.
    fn purge_namespace(&self, ns: &Symbol);
}

// ============================================================================
// LOADER
// ============================================================================

/// A module load request, as issued by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub name: Symbol,
    pub macros: bool,
    /// Relative path without extension, e.g. `foo/bar_baz` or `goog/string/string`.
    pub path: String,
}

impl LoadRequest {
    pub fn for_ns(name: Symbol, macros: bool) -> Self {
        let path = name.to_ns_path();
        Self { name, macros, path }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Clj,
    Js,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub lang: Lang,
    pub source: String,
    /// File the source came from, when there is one.
    pub file: Option<String>,
}

/// Resolves a module to its source text. `Ok(None)` means not found.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, request: &LoadRequest) -> Result<Option<LoadedSource>, ReplError>;
}

/// Reads a file. `None` means the file could not be read.
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read_file(&self, path: &str) -> Option<String>;
}
