//! Reval REPL - the read-eval-call pipeline.
//!
//! A [`Repl`] owns one session and one evaluator. Each call to
//! [`Repl::read_eval_call`] reads a single form, makes sure the environment is
//! initialized, routes the form to a special-form handler or the evaluator,
//! and delivers exactly one [`EvalResult`] to the caller's callback.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{EvalContext, EvalOptions, Evaluated, Evaluator, Loader};
use crate::config::{InitData, ReplOptions, RequestOptions};
use crate::errors::ReplError;
use crate::loader::discover_module_index;
use crate::protocol::{deliver, Delivery, Effects, EvalResult};
use crate::session::{Claim, History, InitState, ModuleIndex, Session, DEFAULT_NS};
use crate::special::SpecialForm;
use crate::syntax::{read_form, Form, Symbol};
use crate::warnings::WarningCollector;

// ============================================================================
// PREDICATES
// ============================================================================

/// A call whose head is one of the REPL special symbols.
pub fn is_repl_special(form: &Form) -> bool {
    SpecialForm::classify(form).is_some()
}

/// `(ns ...)`
pub fn is_ns_form(form: &Form) -> bool {
    form.head_symbol().is_some_and(|head| head.as_str() == "ns")
}

/// A bare `*1`, `*2`, `*3` or `*e`.
pub fn is_history_ref(form: &Form) -> bool {
    form.as_symbol().is_some_and(History::is_history_var)
}

/// Drop `ns` from the evaluator's caches and loaded-set.
pub(crate) fn purge(evaluator: &dyn Evaluator, ns: &Symbol) {
    tracing::debug!(ns = %ns, "purging namespace");
    evaluator.purge_namespace(ns);
}

// ============================================================================
// REQUEST
// ============================================================================

/// Everything a handler needs to serve one request.
pub(crate) struct Request<'a> {
    pub form: Form,
    pub source: &'a str,
    /// Current namespace when the request started.
    pub ns: Symbol,
    pub opts: &'a RequestOptions,
    pub warnings: WarningCollector,
    pub loader: Arc<dyn Loader>,
    pub evaluator: &'a dyn Evaluator,
    pub history: History,
}

impl Request<'_> {
    /// Backend options for evaluating in `ns`.
    pub(crate) fn eval_options(&self, ns: &Symbol) -> EvalOptions {
        EvalOptions {
            ns: ns.clone(),
            context: EvalContext::Expr,
            source_map: false,
            def_emits_var: true,
            static_fns: false,
            verbose: self.opts.verbose(),
            target: self.opts.target(),
            loader: Arc::clone(&self.loader),
            warnings: self.warnings.clone(),
            history: self.history.clone(),
        }
    }
}

// ============================================================================
// REPL
// ============================================================================

pub struct Repl {
    evaluator: Arc<dyn Evaluator>,
    session: Mutex<Session>,
}

impl Repl {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            session: Mutex::new(Session::new()),
        }
    }

    pub fn current_ns(&self) -> Symbol {
        self.session.lock().current_ns().clone()
    }

    /// `cljs.user=> `
    pub fn prompt(&self) -> String {
        format!("{}=> ", self.current_ns())
    }

    pub fn history(&self) -> History {
        self.session.lock().history().clone()
    }

    pub fn last_eval_warning(&self) -> Option<String> {
        self.session.lock().last_eval_warning().map(str::to_string)
    }

    pub fn init_state(&self) -> InitState {
        self.session.lock().init_state()
    }

    pub fn module_index(&self) -> ModuleIndex {
        self.session.lock().module_index()
    }

    /// Make the next request initialize again.
    pub fn force_init(&self) {
        tracing::debug!("initialization forced");
        self.session.lock().force_init();
    }

    /// [`read_eval_call`](Self::read_eval_call) returning the result itself.
    pub async fn read_eval(&self, options: &ReplOptions, source: &str) -> EvalResult {
        self.read_eval_call(options, |result| result, source).await
    }

    /// Read, evaluate and deliver one form. `callback` runs exactly once,
    /// after every session change of the request is visible.
    pub async fn read_eval_call<F, R>(&self, options: &ReplOptions, callback: F, source: &str) -> R
    where
        F: FnOnce(EvalResult) -> R,
    {
        let strict = options.config.warning_as_error;
        let form = match read_form(source) {
            Ok(form) => form,
            Err(e) => {
                tracing::debug!(error = %e, "read failed");
                let delivery = Delivery::error(Form::Nil, e);
                return deliver(&self.session, strict, &WarningCollector::new(), delivery, callback);
            }
        };

        let opts = match options.normalize() {
            Ok(opts) => opts,
            Err(e) => {
                let delivery = Delivery::error(form, e);
                return deliver(&self.session, strict, &WarningCollector::new(), delivery, callback);
            }
        };

        self.ensure_init(&opts, &form).await;

        let warnings = WarningCollector::new();
        let (ns, index, history) = {
            let session = self.session.lock();
            (
                session.current_ns().clone(),
                session.module_index(),
                session.history().clone(),
            )
        };
        if opts.verbose() {
            tracing::info!(ns = %ns, "evaluating {}", source.trim());
        }

        let request = Request {
            form,
            source,
            ns,
            opts: &opts,
            warnings: warnings.clone(),
            loader: opts.loader(index),
            evaluator: self.evaluator.as_ref(),
            history,
        };

        let delivery = match SpecialForm::classify(&request.form) {
            Some(special) => special.dispatch(&request).await,
            None => self.eval_ordinary(&request).await,
        };
        deliver(
            &self.session,
            opts.warning_as_error(),
            &warnings,
            delivery,
            callback,
        )
    }

    async fn eval_ordinary(&self, req: &Request<'_>) -> Delivery {
        let opts = req.eval_options(&req.ns);
        match self.evaluator.eval_source(req.source, &opts).await {
            Ok(Evaluated { value, ns }) => {
                let remember = !is_history_ref(&req.form) && !is_ns_form(&req.form);
                let recorded = value.clone();
                Delivery::new(req.form.clone(), Ok(value)).with_effects(Effects::on_success(
                    move |session| {
                        if remember {
                            session.push_history(recorded);
                        }
                        session.switch_ns(ns);
                    },
                ))
            }
            Err(e) => Delivery::error(req.form.clone(), e),
        }
    }

    /// Run the init actions and module discovery once. A request arriving
    /// while another one initializes goes ahead without waiting.
    async fn ensure_init(&self, opts: &RequestOptions, form: &Form) {
        let (claim, ns) = {
            let mut session = self.session.lock();
            (session.claim_init(), session.current_ns().clone())
        };
        match claim {
            Claim::Owner => {}
            Claim::InFlight => {
                tracing::debug!("initialization in flight, not waiting");
                return;
            }
            Claim::Done => return,
        }

        tracing::debug!(init_fns = opts.init_fns.len(), "initializing");
        let data = InitData {
            form: form.clone(),
            ns,
            target: opts.target(),
        };
        for init in &opts.init_fns {
            init(data.clone()).await;
        }

        let pairs = match &opts.reader {
            Some(reader) => discover_module_index(reader.as_ref(), opts.src_paths()).await,
            None => Vec::new(),
        };

        let mut session = self.session.lock();
        session.merge_module_index(pairs);
        session.finish_init();
    }

    /// [`reset_env_with`](Self::reset_env_with) using default options.
    pub async fn reset_env(&self, namespaces: &[Symbol]) -> Result<(), ReplError> {
        self.reset_env_with(&ReplOptions::default(), namespaces).await
    }

    /// Purge `namespaces`, then clear `*e` and go back to the default namespace.
    ///
    /// Fails without touching the session if anything is still loaded after
    /// the purge.
    pub async fn reset_env_with(
        &self,
        options: &ReplOptions,
        namespaces: &[Symbol],
    ) -> Result<(), ReplError> {
        for ns in namespaces {
            purge(self.evaluator.as_ref(), ns);
        }

        let remaining = self.evaluator.loaded_namespaces();
        if !remaining.is_empty() {
            let names: Vec<String> = remaining.iter().map(Symbol::to_string).collect();
            return Err(ReplError::precondition(format!(
                "Namespaces still loaded after purge: {}",
                names.join(", ")
            )));
        }

        self.session.lock().clear_warning();
        self.read_eval(options, "(set! *e nil)").await;
        self.read_eval(options, &format!("(in-ns '{})", DEFAULT_NS))
            .await;
        Ok(())
    }
}
