//! `(source sym)`

use crate::backend::{LoadRequest, Value, VarInfo};
use crate::errors::ReplError;
use crate::loader::{file_paths, read_first};
use crate::protocol::Delivery;
use crate::repl::Request;
use crate::syntax::{read_form_text, Form};

/// Text of the form starting at 1-based `line` of `text`.
pub fn source_at_line(text: &str, line: usize) -> Option<String> {
    let skip = line.saturating_sub(1);
    let offset = if skip == 0 {
        0
    } else {
        text.match_indices('\n').nth(skip - 1).map(|(i, _)| i + 1)?
    };
    read_form_text(&text[offset..]).ok()
}

/// The text of the file or module that defines `var`.
async fn defining_text(req: &Request<'_>, var: &VarInfo) -> Option<String> {
    if let Some(file) = &var.file {
        let reader = req.opts.reader.as_deref()?;
        let candidates = if req.opts.src_paths().is_empty() {
            vec![file.clone()]
        } else {
            file_paths(req.opts.src_paths(), file)
        };
        return read_first(reader, &candidates, req.opts.verbose())
            .await
            .map(|loaded| loaded.source);
    }

    let request = LoadRequest::for_ns(var.ns.clone(), false);
    match req.loader.load(&request).await {
        Ok(loaded) => loaded.map(|l| l.source),
        Err(e) => {
            tracing::debug!(ns = %var.ns, error = %e, "source lookup failed");
            None
        }
    }
}

pub(crate) async fn source(req: &Request<'_>) -> Delivery {
    let form = req.form.clone();
    let Some(sym) = req.form.args().first().and_then(Form::as_symbol) else {
        return Delivery::error(form, ReplError::argument("Argument to source must be a symbol"));
    };

    let mut text = None;
    if let Some(var) = req.evaluator.resolve_var(&req.ns, sym) {
        if let Some(defining) = defining_text(req, &var).await {
            text = source_at_line(&defining, var.line.unwrap_or(1));
        }
    }
    let text = text.unwrap_or_else(|| "nil".to_string());
    Delivery::new(form, Ok(Value::Data(Form::Str(text)))).raw()
}
