//! `(dir some.ns)`

use crate::backend::{Value, VarInfo};
use crate::errors::ReplError;
use crate::protocol::Delivery;
use crate::repl::Request;
use crate::syntax::Form;

/// Sorted public names, one per line, or `nil` when there are none.
pub fn listing(vars: &[VarInfo]) -> String {
    let mut names: Vec<&str> = vars
        .iter()
        .filter(|v| !v.private)
        .map(|v| v.name.name())
        .collect();
    if names.is_empty() {
        return "nil".to_string();
    }
    names.sort_unstable();
    names.dedup();
    names.join("\n")
}

pub(crate) fn dir(req: &Request<'_>) -> Delivery {
    let form = req.form.clone();
    let Some(ns) = req.form.args().first().and_then(Form::as_symbol) else {
        return Delivery::error(form, ReplError::argument("Argument to dir must be a symbol"));
    };
    let text = listing(&req.evaluator.public_vars(ns));
    Delivery::new(form, Ok(Value::Data(Form::Str(text)))).raw()
}
