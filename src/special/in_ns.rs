//! `(in-ns 'some.ns)`

use crate::backend::Value;
use crate::errors::ReplError;
use crate::protocol::{Delivery, Effects};
use crate::repl::Request;
use crate::syntax::{Form, Symbol};

const BAD_ARGUMENT: &str = "Argument to in-ns must be a symbol.";

pub(crate) async fn in_ns(req: &Request<'_>) -> Delivery {
    let form = req.form.clone();
    let target = match target_ns(req).await {
        Ok(sym) => sym,
        Err(e) => return Delivery::error(form, e),
    };

    if req.evaluator.namespace_exists(&target) {
        return Delivery::new(form, Ok(Value::NIL))
            .with_effects(Effects::always(move |s| s.switch_ns(target)));
    }

    tracing::debug!(ns = %target, "creating namespace for in-ns");
    let ns_form = Form::List(vec![Form::symbol("ns"), Form::Symbol(target.clone())]);
    let opts = req.eval_options(&req.ns);
    match req.evaluator.eval_form(&ns_form, &opts).await {
        Ok(_) => Delivery::new(form, Ok(Value::NIL))
            .with_effects(Effects::on_success(move |s| s.switch_ns(target))),
        Err(e) => Delivery::error(form, e),
    }
}

/// The argument must be a quoted symbol or something that evaluates to one.
async fn target_ns(req: &Request<'_>) -> Result<Symbol, ReplError> {
    let [arg] = req.form.args() else {
        return Err(ReplError::argument(BAD_ARGUMENT));
    };
    if let Some(quoted) = arg.unquoted() {
        return match quoted {
            Form::Symbol(sym) => Ok(sym.clone()),
            _ => Err(ReplError::argument(BAD_ARGUMENT)),
        };
    }
    if !matches!(arg, Form::Symbol(_) | Form::List(_)) {
        return Err(ReplError::argument(BAD_ARGUMENT));
    }

    let opts = req.eval_options(&req.ns);
    let evaluated = req.evaluator.eval_form(arg, &opts).await?;
    match evaluated.value {
        Value::Data(Form::Symbol(sym)) => Ok(sym),
        _ => Err(ReplError::argument(BAD_ARGUMENT)),
    }
}
