//! # Reval Test Harness
//!
//! An in-memory evaluator standing in for the compiler, plus a file reader
//! backed by a map. Both record what they were asked so tests can check the
//! calls the pipeline makes.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;

use reval::backend::{
    EvalOptions, Evaluated, Evaluator, FileReader, Lang, LoadRequest, NamespaceInfo, Value,
    VarInfo,
};
use reval::errors::ReplError;
use reval::syntax::{read_all, read_form, Form, Symbol};
use reval::warnings::CompilerWarning;
use reval::{EvalResult, Repl, ReplOptions};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MOCK EVALUATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
struct NsData {
    doc: Option<String>,
    vars: BTreeMap<String, (VarInfo, Value)>,
}

#[derive(Debug, Default)]
struct MockState {
    namespaces: BTreeMap<Symbol, NsData>,
    loaded: BTreeSet<Symbol>,
    purged: Vec<Symbol>,
    calls: Vec<EvalOptions>,
    sources: Vec<String>,
    fail_ns: BTreeSet<Symbol>,
}

/// A toy evaluator: literals, `def`, `ns` with requires, `+`, `do`, `throw`,
/// `symbol`, `set!` and var lookup. Undeclared symbols raise a warning and
/// evaluate to nil.
#[derive(Debug)]
pub struct MockEvaluator {
    state: Mutex<MockState>,
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEvaluator {
    pub fn new() -> Self {
        let mock = Self {
            state: Mutex::new(MockState::default()),
        };
        mock.define_ns("cljs.user", None);
        mock.define_ns("cljs.core", Some("Fundamental library of the language."));
        mock.define_var(
            VarInfo {
                name: Symbol::new("cljs.core/map"),
                ns: Symbol::new("cljs.core"),
                doc: Some("Returns a lazy sequence of f applied to coll.".into()),
                arglists: Some("([f] [f coll])".into()),
                file: Some("cljs/core.cljs".into()),
                line: Some(3),
                ..VarInfo::default()
            },
            Value::NIL,
        );
        mock.define_var(
            VarInfo {
                name: Symbol::new("cljs.core/when"),
                ns: Symbol::new("cljs.core"),
                doc: Some("Evaluates test.".into()),
                arglists: Some("([test & body])".into()),
                is_macro: true,
                ..VarInfo::default()
            },
            Value::NIL,
        );
        mock
    }

    pub fn define_ns(&self, name: &str, doc: Option<&str>) {
        self.state
            .lock()
            .namespaces
            .entry(Symbol::new(name))
            .or_default()
            .doc = doc.map(str::to_string);
    }

    /// Intern a var; `info.name` must be qualified.
    pub fn define_var(&self, info: VarInfo, value: Value) {
        let name = info.name.name().to_string();
        self.state
            .lock()
            .namespaces
            .entry(info.ns.clone())
            .or_default()
            .vars
            .insert(name, (info, value));
    }

    /// Make `(ns <name>)` fail for this namespace.
    pub fn fail_ns(&self, name: &str) {
        self.state.lock().fail_ns.insert(Symbol::new(name));
    }

    pub fn mark_loaded(&self, name: &str) {
        self.state.lock().loaded.insert(Symbol::new(name));
    }

    pub fn loaded(&self) -> Vec<Symbol> {
        self.state.lock().loaded.iter().cloned().collect()
    }

    pub fn purged(&self) -> Vec<Symbol> {
        self.state.lock().purged.clone()
    }

    /// Options of every evaluation, in call order.
    pub fn calls(&self) -> Vec<EvalOptions> {
        self.state.lock().calls.clone()
    }

    /// Source texts handed to `eval_source`.
    pub fn sources(&self) -> Vec<String> {
        self.state.lock().sources.clone()
    }

    pub fn var_value(&self, ns: &str, name: &str) -> Option<Value> {
        let state = self.state.lock();
        let data = state.namespaces.get(&Symbol::new(ns))?;
        data.vars.get(name).map(|(_, v)| v.clone())
    }

    fn lookup(&self, ns: &Symbol, sym: &Symbol) -> Option<(VarInfo, Value)> {
        let state = self.state.lock();
        let find = |ns: &Symbol, name: &str| {
            state
                .namespaces
                .get(ns)
                .and_then(|data| data.vars.get(name).cloned())
        };
        match sym.namespace() {
            Some(owner) => find(&Symbol::new(owner), sym.name()),
            None => find(ns, sym.name()).or_else(|| find(&Symbol::new("cljs.core"), sym.name())),
        }
    }

    fn eval<'a>(
        &'a self,
        form: &'a Form,
        opts: &'a EvalOptions,
    ) -> BoxFuture<'a, Result<Evaluated, ReplError>> {
        async move {
            let here = |value: Value| Evaluated {
                value,
                ns: opts.ns.clone(),
            };
            match form {
                Form::Symbol(sym) => {
                    if let Some(value) = opts.history.lookup(sym) {
                        return Ok(here(value));
                    }
                    match self.lookup(&opts.ns, sym) {
                        Some((_, value)) => Ok(here(value)),
                        None => {
                            opts.warnings.warn(
                                &CompilerWarning::new(
                                    "undeclared-var",
                                    format!("Use of undeclared Var {}/{}", opts.ns, sym),
                                )
                                .at_line(1),
                            );
                            Ok(here(Value::NIL))
                        }
                    }
                }
                Form::List(items) if !items.is_empty() => self.eval_call(form, items, opts).await,
                other => Ok(here(Value::Data(other.clone()))),
            }
        }
        .boxed()
    }

    async fn eval_call(
        &self,
        form: &Form,
        items: &[Form],
        opts: &EvalOptions,
    ) -> Result<Evaluated, ReplError> {
        let here = |value: Value| Evaluated {
            value,
            ns: opts.ns.clone(),
        };
        let args = form.args();
        let head = items[0].as_symbol().map(Symbol::as_str).unwrap_or("");
        match head {
            "quote" => Ok(here(Value::Data(args.first().cloned().unwrap_or(Form::Nil)))),
            "def" => {
                let name = args.first().and_then(Form::as_symbol).cloned().unwrap_or_default();
                let value = match args.get(1) {
                    Some(init) => self.eval(init, opts).await?.value,
                    None => Value::NIL,
                };
                self.define_var(
                    VarInfo {
                        name: Symbol::qualified(opts.ns.as_str(), name.as_str()),
                        ns: opts.ns.clone(),
                        ..VarInfo::default()
                    },
                    value,
                );
                Ok(here(Value::Data(Form::symbol(format!(
                    "#'{}/{}",
                    opts.ns, name
                )))))
            }
            "do" => {
                let mut last = here(Value::NIL);
                for arg in args {
                    last = self.eval(arg, opts).await?;
                }
                Ok(last)
            }
            "+" => {
                let mut sum = 0;
                for arg in args {
                    match self.eval(arg, opts).await?.value {
                        Value::Data(Form::Int(n)) => sum += n,
                        other => {
                            return Err(ReplError::eval(format!("{} is not a number", other)))
                        }
                    }
                }
                Ok(here(Value::Data(Form::Int(sum))))
            }
            "symbol" => match args.first() {
                Some(Form::Str(s)) => Ok(here(Value::Data(Form::symbol(s.clone())))),
                _ => Err(ReplError::eval("symbol expects a string")),
            },
            "throw" => {
                let message = args
                    .first()
                    .map(Form::to_raw_string)
                    .unwrap_or_else(|| "nil".into());
                let mut err = ReplError::eval(message).with_stack("at eval (<repl>:1)");
                if let Some(cause) = args.get(1) {
                    err = err.with_cause(ReplError::eval(cause.to_raw_string()));
                }
                Err(err)
            }
            "set!" => Ok(here(Value::NIL)),
            "ns" => self.eval_ns(args, opts).await,
            other => Err(ReplError::eval(format!("{} is not a function", other))),
        }
    }

    async fn eval_ns(&self, args: &[Form], opts: &EvalOptions) -> Result<Evaluated, ReplError> {
        let Some(name) = args.first().and_then(Form::as_symbol).cloned() else {
            return Err(ReplError::eval("ns expects a symbol"));
        };
        let failing = self.state.lock().fail_ns.contains(&name);
        if failing {
            return Err(ReplError::eval(format!("Cannot create namespace {}", name)));
        }
        self.state.lock().namespaces.entry(name.clone()).or_default();

        for clause in &args[1..] {
            let Form::List(parts) = clause else { continue };
            let Some(Form::Keyword(kind)) = parts.first() else {
                continue;
            };
            let macros = kind == "require-macros";
            for spec in &parts[1..] {
                for dep in spec_deps(kind == "import", spec) {
                    self.require_ns(&dep, macros, opts).await?;
                }
            }
        }

        Ok(Evaluated {
            value: Value::NIL,
            ns: name,
        })
    }

    async fn require_ns(
        &self,
        dep: &Symbol,
        macros: bool,
        opts: &EvalOptions,
    ) -> Result<(), ReplError> {
        let already = self.state.lock().loaded.contains(dep);
        if already {
            return Ok(());
        }
        let request = LoadRequest::for_ns(dep.clone(), macros);
        let Some(loaded) = opts.loader.load(&request).await? else {
            return Err(ReplError::eval(format!(
                "No such namespace: {}, could not locate {}.cljs",
                dep, request.path
            )));
        };
        if loaded.lang == Lang::Clj {
            let forms = read_all(&loaded.source)?;
            let mut file_opts = opts.clone();
            file_opts.ns = dep.clone();
            for form in &forms {
                let evaluated = self.eval(form, &file_opts).await?;
                file_opts.ns = evaluated.ns;
            }
        }
        self.state.lock().loaded.insert(dep.clone());
        Ok(())
    }
}

/// Namespaces a spec depends on. Import lists name classes under a prefix.
fn spec_deps(import: bool, spec: &Form) -> Vec<Symbol> {
    match spec {
        Form::Symbol(sym) => vec![sym.clone()],
        Form::Vector(items) | Form::List(items) => {
            let Some(first) = items.first().and_then(Form::as_symbol) else {
                return Vec::new();
            };
            if !import || items.len() == 1 {
                return vec![first.clone()];
            }
            items[1..]
                .iter()
                .filter_map(Form::as_symbol)
                .map(|class| Symbol::new(format!("{}.{}", first, class)))
                .collect()
        }
        _ => Vec::new(),
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    async fn eval_form(&self, form: &Form, opts: &EvalOptions) -> Result<Evaluated, ReplError> {
        self.state.lock().calls.push(opts.clone());
        self.eval(form, opts).await
    }

    async fn eval_source(&self, source: &str, opts: &EvalOptions) -> Result<Evaluated, ReplError> {
        {
            let mut state = self.state.lock();
            state.calls.push(opts.clone());
            state.sources.push(source.to_string());
        }
        let form = read_form(source)?;
        self.eval(&form, opts).await
    }

    fn namespace_exists(&self, ns: &Symbol) -> bool {
        self.state.lock().namespaces.contains_key(ns)
    }

    fn namespace_info(&self, ns: &Symbol) -> Option<NamespaceInfo> {
        let state = self.state.lock();
        state.namespaces.get(ns).map(|data| NamespaceInfo {
            name: ns.clone(),
            doc: data.doc.clone(),
        })
    }

    fn resolve_var(&self, ns: &Symbol, sym: &Symbol) -> Option<VarInfo> {
        self.lookup(ns, sym).map(|(info, _)| info)
    }

    fn public_vars(&self, ns: &Symbol) -> Vec<VarInfo> {
        let state = self.state.lock();
        state
            .namespaces
            .get(ns)
            .map(|data| data.vars.values().map(|(info, _)| info.clone()).collect())
            .unwrap_or_default()
    }

    fn loaded_namespaces(&self) -> Vec<Symbol> {
        self.loaded()
    }

    fn purge_namespace(&self, ns: &Symbol) {
        let mut state = self.state.lock();
        state.loaded.remove(ns);
        state.purged.push(ns.clone());
        if ns.as_str() != "cljs.user" {
            state.namespaces.remove(ns);
        }
    }
}

// ============================================================================
// MAP READER
// ============================================================================

/// File reader over an in-memory map. Records every path it was asked for.
#[derive(Debug, Default)]
pub struct MapReader {
    files: HashMap<String, String>,
    reads: Mutex<Vec<String>>,
}

impl MapReader {
    pub fn new<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().clone()
    }
}

#[async_trait]
impl FileReader for MapReader {
    async fn read_file(&self, path: &str) -> Option<String> {
        self.reads.lock().push(path.to_string());
        self.files.get(path).cloned()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub fn repl() -> (Repl, Arc<MockEvaluator>) {
    init_tracing();
    let mock = Arc::new(MockEvaluator::new());
    let repl = Repl::new(Arc::clone(&mock) as Arc<dyn Evaluator>);
    (repl, mock)
}

/// Evaluate with default options and return the result.
pub async fn eval(repl: &Repl, source: &str) -> EvalResult {
    repl.read_eval(&ReplOptions::default(), source).await
}

/// Assert the result is a success and return its value text.
pub fn value_of(result: &EvalResult) -> String {
    match &result.outcome {
        Ok(value) => value.clone(),
        Err(e) => panic!("expected success for {}, got error: {}", result.form, e),
    }
}

/// Assert the result is a failure and return its message.
pub fn error_of(result: &EvalResult) -> String {
    match &result.outcome {
        Ok(value) => panic!("expected error for {}, got value: {}", result.form, value),
        Err(e) => e.message(),
    }
}
