//! `require`, `require-macros` and `import`.
//!
//! Each is turned into an `ns` form carrying the matching clause and
//! evaluated in the current namespace. Only quoted specs are accepted; an
//! unquoted `(require foo.bar)` is rejected rather than guessed at.

use crate::backend::Value;
use crate::errors::ReplError;
use crate::protocol::{Delivery, Effects};
use crate::repl::{purge, Request};
use crate::session::DEFAULT_NS;
use crate::special::RequireKind;
use crate::syntax::{Form, Symbol};

/// Reload modifier of a `require`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    /// `:reload`, the named namespaces only.
    Named,
    /// `:reload-all`, everything currently loaded.
    All,
}

impl Reload {
    fn from_form(form: &Form) -> Option<Self> {
        if form.is_keyword("reload") {
            Some(Reload::Named)
        } else if form.is_keyword("reload-all") {
            Some(Reload::All)
        } else {
            None
        }
    }
}

/// Canonical specs plus the reload modifier found among them.
#[derive(Debug, Clone, PartialEq)]
pub struct Specs {
    pub specs: Vec<Form>,
    pub reload: Option<Reload>,
}

/// Strip quotes, turn bare symbols into `[sym]`, and pull reload keywords out,
/// whether they stand alone or trail a vector spec.
pub fn canonicalize(kind: RequireKind, args: &[Form]) -> Result<Specs, ReplError> {
    let bad_argument = || ReplError::argument(format!("Argument to {} must be a symbol", kind.name()));
    if args.is_empty() {
        return Err(bad_argument());
    }

    let mut specs = Vec::with_capacity(args.len());
    let mut reload = None;
    for arg in args {
        if let Some(flag) = Reload::from_form(arg) {
            reload = reload.max_with(flag);
            continue;
        }
        let quoted = arg.unquoted().ok_or_else(bad_argument)?;
        match quoted {
            Form::Symbol(sym) => specs.push(Form::Vector(vec![Form::Symbol(sym.clone())])),
            Form::Vector(items) => {
                let mut items = items.clone();
                while let Some(flag) = items.last().and_then(Reload::from_form) {
                    reload = reload.max_with(flag);
                    items.pop();
                }
                specs.push(Form::Vector(items));
            }
            other => specs.push(other.clone()),
        }
    }
    Ok(Specs { specs, reload })
}

trait MaxWith {
    fn max_with(self, flag: Reload) -> Self;
}

impl MaxWith for Option<Reload> {
    /// `:reload-all` wins over `:reload`.
    fn max_with(self, flag: Reload) -> Self {
        match (self, flag) {
            (Some(Reload::All), _) | (_, Reload::All) => Some(Reload::All),
            _ => Some(Reload::Named),
        }
    }
}

/// Namespace named by a canonical spec.
pub fn spec_ns(spec: &Form) -> Option<&Symbol> {
    match spec {
        Form::Vector(items) | Form::List(items) => items.first().and_then(Form::as_symbol),
        Form::Symbol(sym) => Some(sym),
        _ => None,
    }
}

/// `(ns <target> (:<kind> specs...))`
pub fn ns_form(target: &Symbol, kind: RequireKind, specs: &[Form]) -> Form {
    let mut clause = Vec::with_capacity(specs.len() + 1);
    clause.push(Form::keyword(kind.name()));
    clause.extend(specs.iter().cloned());
    Form::List(vec![
        Form::symbol("ns"),
        Form::Symbol(target.clone()),
        Form::List(clause),
    ])
}

pub(crate) async fn require(req: &Request<'_>, kind: RequireKind) -> Delivery {
    let form = req.form.clone();
    let Specs { specs, reload } = match canonicalize(kind, req.form.args()) {
        Ok(specs) => specs,
        Err(e) => return Delivery::error(form, e),
    };

    if kind == RequireKind::Require {
        match reload {
            Some(Reload::Named) => {
                for ns in specs.iter().filter_map(spec_ns) {
                    purge(req.evaluator, ns);
                }
            }
            Some(Reload::All) => {
                for ns in req.evaluator.loaded_namespaces() {
                    purge(req.evaluator, &ns);
                }
            }
            None => {}
        }
    }

    let current = req.ns.clone();
    let self_require =
        kind == RequireKind::Require && specs.iter().filter_map(spec_ns).any(|ns| *ns == current);
    let target = if self_require {
        tracing::debug!(ns = %current, "self-require, evaluating in scratch namespace");
        Symbol::new(DEFAULT_NS)
    } else {
        current.clone()
    };

    let opts = req.eval_options(&target);
    let outcome = req
        .evaluator
        .eval_form(&ns_form(&target, kind, &specs), &opts)
        .await
        .map(|_| Value::NIL);

    let delivery = Delivery::new(form, outcome);
    if self_require {
        delivery.with_effects(Effects::always(move |s| s.switch_ns(current)))
    } else {
        delivery
    }
}
