//! `(pst)` and `(pst e)`

use crate::backend::Value;
use crate::protocol::Delivery;
use crate::repl::Request;
use crate::syntax::Form;

/// Text `pst` prints for an evaluated value.
pub fn trace_text(value: &Value) -> String {
    match value {
        Value::Error(err) => err.to_trace_string(),
        other if !other.is_truthy() => "nil".to_string(),
        other => other.to_string(),
    }
}

pub(crate) async fn pst(req: &Request<'_>) -> Delivery {
    let form = req.form.clone();
    let expr = match req.form.args().first() {
        Some(Form::Nil | Form::Bool(false)) => return Delivery::new(form, Ok(Value::NIL)),
        Some(arg) => arg.clone(),
        None => Form::symbol("*e"),
    };

    let opts = req.eval_options(&req.ns);
    match req.evaluator.eval_form(&expr, &opts).await {
        Ok(evaluated) => {
            let text = trace_text(&evaluated.value);
            Delivery::new(form, Ok(Value::Data(Form::Str(text)))).raw()
        }
        Err(e) => Delivery::error(form, e),
    }
}
