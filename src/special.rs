//! REPL special forms.
//!
//! A closed set of directives intercepted before the evaluator sees them.
//! Each variant has one handler; dispatch is an exhaustive `match`.

use crate::protocol::Delivery;
use crate::repl::Request;
use crate::syntax::Form;

pub mod dir;
pub mod doc;
pub mod in_ns;
pub mod pst;
pub mod require;
pub mod source;

/// Flavours of the require family, each mapping to an `ns` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequireKind {
    Require,
    RequireMacros,
    Import,
}

impl RequireKind {
    pub fn name(self) -> &'static str {
        match self {
            RequireKind::Require => "require",
            RequireKind::RequireMacros => "require-macros",
            RequireKind::Import => "import",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    InNs,
    Require(RequireKind),
    Doc,
    Source,
    Pst,
    Dir,
    LoadFile,
}

impl SpecialForm {
    /// Recognize a call form whose head is one of the special symbols.
    pub fn classify(form: &Form) -> Option<Self> {
        let head = form.head_symbol()?;
        let special = match head.as_str() {
            "in-ns" => SpecialForm::InNs,
            "require" => SpecialForm::Require(RequireKind::Require),
            "require-macros" => SpecialForm::Require(RequireKind::RequireMacros),
            "import" => SpecialForm::Require(RequireKind::Import),
            "doc" => SpecialForm::Doc,
            "source" => SpecialForm::Source,
            "pst" => SpecialForm::Pst,
            "dir" => SpecialForm::Dir,
            "load-file" => SpecialForm::LoadFile,
            _ => return None,
        };
        Some(special)
    }

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::InNs => "in-ns",
            SpecialForm::Require(kind) => kind.name(),
            SpecialForm::Doc => "doc",
            SpecialForm::Source => "source",
            SpecialForm::Pst => "pst",
            SpecialForm::Dir => "dir",
            SpecialForm::LoadFile => "load-file",
        }
    }

    pub(crate) async fn dispatch(self, req: &Request<'_>) -> Delivery {
        tracing::debug!(special = self.name(), "dispatching special form");
        match self {
            SpecialForm::InNs => in_ns::in_ns(req).await,
            SpecialForm::Require(kind) => require::require(req, kind).await,
            SpecialForm::Doc => doc::doc(req),
            SpecialForm::Source => source::source(req).await,
            SpecialForm::Pst => pst::pst(req).await,
            SpecialForm::Dir => dir::dir(req),
            SpecialForm::LoadFile => Delivery::error(
                req.form.clone(),
                crate::errors::ReplError::unsupported(self.name()),
            ),
        }
    }
}
