//! `(doc sym)`
//!
//! Lookup order is special forms, REPL specials, namespaces, then vars and
//! macros resolved by the backend. Output follows the `clojure.repl/doc`
//! layout.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::backend::{Value, VarInfo};
use crate::errors::ReplError;
use crate::protocol::Delivery;
use crate::repl::Request;
use crate::syntax::{Form, Symbol};

const RULE: &str = "-------------------------";

/// Static documentation for a form the evaluator does not describe itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticDoc {
    pub arglists: &'static str,
    pub doc: &'static str,
}

static SPECIAL_FORM_DOCS: Lazy<HashMap<&'static str, StaticDoc>> = Lazy::new(|| {
    HashMap::from([
        ("def", StaticDoc {
            arglists: "([symbol doc-string? init?])",
            doc: "Creates and interns a global var with the name\n  of symbol in the current namespace (*ns*) or locates such a var if\n  it already exists.  If init is supplied, it is evaluated, and the\n  root binding of the var is set to the resulting value.  If init is\n  not supplied, the root binding of the var is unaffected.",
        }),
        ("if", StaticDoc {
            arglists: "([test then else?])",
            doc: "Evaluates test. If not the singular values nil or false,\n  evaluates and yields then, otherwise, evaluates and yields else. If\n  else is not supplied it defaults to nil.",
        }),
        ("do", StaticDoc {
            arglists: "([exprs*])",
            doc: "Evaluates the expressions in order and returns the value of\n  the last. If no expressions are supplied, returns nil.",
        }),
        ("let*", StaticDoc {
            arglists: "([bindings* exprs*])",
            doc: "binding => binding-form init-expr\n\n  Evaluates the exprs in a lexical context in which the symbols in\n  the binding-forms are bound to their respective init-exprs or parts\n  therein.",
        }),
        ("quote", StaticDoc {
            arglists: "([form])",
            doc: "Yields the unevaluated form.",
        }),
        ("var", StaticDoc {
            arglists: "([symbol])",
            doc: "The symbol must resolve to a var, and the Var object\nitself (not its value) is returned. The reader macro #'x expands to (var x).",
        }),
        ("fn*", StaticDoc {
            arglists: "([params* exprs*])",
            doc: "Defines a function.",
        }),
        ("loop*", StaticDoc {
            arglists: "([bindings* exprs*])",
            doc: "Evaluates the exprs in a lexical context in which the symbols in\n  the binding-forms are bound to their respective init-exprs or parts\n  therein. Acts as a recur target.",
        }),
        ("recur", StaticDoc {
            arglists: "([exprs*])",
            doc: "Evaluates the exprs in order, then, in parallel, rebinds\n  the bindings of the recursion point to the values of the exprs.\n  Execution then jumps back to the recursion point, a loop or fn method.",
        }),
        ("throw", StaticDoc {
            arglists: "([expr])",
            doc: "The expr is evaluated and thrown.",
        }),
        ("try", StaticDoc {
            arglists: "([expr* catch-clause* finally-clause?])",
            doc: "catch-clause => (catch classname name expr*)\n  finally-clause => (finally expr*)\n  Catches and handles JavaScript exceptions.",
        }),
        ("set!", StaticDoc {
            arglists: "([var-symbol expr] [[. instance-expr instanceFieldName-symbol] expr])",
            doc: "Used to set vars and JavaScript object fields",
        }),
        ("new", StaticDoc {
            arglists: "([Constructor. args*] [new Constructor args*])",
            doc: "The args, if any, are evaluated from left to right, and\n  passed to the JavaScript constructor. The constructed object is\n  returned.",
        }),
        (".", StaticDoc {
            arglists: "([.instanceMethod instance args*] [.-instanceField instance])",
            doc: "The instance member form works for methods and fields.\n  They all expand into calls to the dot operator at macroexpansion time.",
        }),
        ("ns", StaticDoc {
            arglists: "([name docstring? attr-map? references*])",
            doc: "You must currently use the ns form only with the following caveats\n\n    * You must use the :only form of :use\n    * :require supports :as, :refer, and :rename\n    * :require-macros supports :refer-macros, :as, and :rename",
        }),
    ])
});

static REPL_SPECIAL_DOCS: Lazy<HashMap<&'static str, StaticDoc>> = Lazy::new(|| {
    HashMap::from([
        ("in-ns", StaticDoc {
            arglists: "([name])",
            doc: "Sets *cljs-ns* to the namespace named by the symbol, creating it if needed.",
        }),
        ("require", StaticDoc {
            arglists: "([& args])",
            doc: "Loads libs, skipping any that are already loaded. Each argument is\n  either a libspec that identifies a lib or a flag that modifies how all the identified\n  libs are loaded. Use :require in the ns macro in preference to calling this\n  directly.\n\n  Recognized flags: :reload, :reload-all",
        }),
        ("require-macros", StaticDoc {
            arglists: "([& args])",
            doc: "Similar to the require REPL special function but\n  only for macros.",
        }),
        ("import", StaticDoc {
            arglists: "([& import-symbols-or-lists])",
            doc: "import-list => (closure-namespace constructor-name-symbols*)\n\n  For each name in constructor-name-symbols, adds a mapping from name to the\n  constructor named by closure-namespace to the current namespace.",
        }),
        ("doc", StaticDoc {
            arglists: "([name])",
            doc: "Prints documentation for a var or special form given its name",
        }),
        ("source", StaticDoc {
            arglists: "([n])",
            doc: "Prints the source code for the given symbol, if it can find it.\n  This requires that the symbol resolve to a Var defined in a\n  namespace for which the source is available.",
        }),
        ("pst", StaticDoc {
            arglists: "([] [e])",
            doc: "Prints a stack trace of the exception. Defaults to *e.",
        }),
        ("dir", StaticDoc {
            arglists: "([ns])",
            doc: "Prints a sorted directory of public vars in a namespace",
        }),
        ("load-file", StaticDoc {
            arglists: "([name])",
            doc: "Sequentially read and evaluate the set of forms contained in the file.",
        }),
    ])
});

pub fn special_form_doc(name: &str) -> Option<StaticDoc> {
    SPECIAL_FORM_DOCS.get(name).copied()
}

pub fn repl_special_doc(name: &str) -> Option<StaticDoc> {
    REPL_SPECIAL_DOCS.get(name).copied()
}

// ============================================================================
// RENDERING
// ============================================================================

/// What a doc entry describes; decides the marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    SpecialForm,
    ReplSpecial,
    Namespace,
    Macro,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocEntry {
    pub name: String,
    pub kind: DocKind,
    pub arglists: Option<String>,
    pub doc: Option<String>,
}

impl DocEntry {
    fn from_static(name: &str, kind: DocKind, entry: StaticDoc) -> Self {
        Self {
            name: name.to_string(),
            kind,
            arglists: Some(entry.arglists.to_string()),
            doc: Some(entry.doc.to_string()),
        }
    }

    fn from_var(var: VarInfo) -> Self {
        Self {
            name: var.name.to_string(),
            kind: if var.is_macro { DocKind::Macro } else { DocKind::Var },
            arglists: var.arglists,
            doc: var.doc,
        }
    }

    pub fn render(&self) -> String {
        let mut lines = vec![RULE.to_string(), self.name.clone()];
        if let Some(arglists) = &self.arglists {
            lines.push(arglists.clone());
        }
        match self.kind {
            DocKind::SpecialForm => lines.push("Special Form".into()),
            DocKind::ReplSpecial => lines.push("REPL Special Function".into()),
            DocKind::Macro => lines.push("Macro".into()),
            DocKind::Namespace | DocKind::Var => {}
        }
        if let Some(doc) = &self.doc {
            lines.push(format!("  {}", doc));
        }
        if self.kind == DocKind::SpecialForm {
            lines.push(String::new());
            lines.push(format!(
                "  Please see http://clojure.org/special_forms#{}",
                self.name
            ));
        }
        lines.join("\n")
    }
}

/// Find documentation for `sym` as seen from the request's namespace.
pub(crate) fn lookup(req: &Request<'_>, sym: &Symbol) -> Option<DocEntry> {
    let name = sym.as_str();
    if let Some(entry) = special_form_doc(name) {
        return Some(DocEntry::from_static(name, DocKind::SpecialForm, entry));
    }
    if let Some(entry) = repl_special_doc(name) {
        return Some(DocEntry::from_static(name, DocKind::ReplSpecial, entry));
    }
    if let Some(ns) = req.evaluator.namespace_info(sym) {
        return Some(DocEntry {
            name: ns.name.to_string(),
            kind: DocKind::Namespace,
            arglists: None,
            doc: ns.doc,
        });
    }
    req.evaluator.resolve_var(&req.ns, sym).map(DocEntry::from_var)
}

pub(crate) fn doc(req: &Request<'_>) -> Delivery {
    let form = req.form.clone();
    let Some(sym) = req.form.args().first().and_then(Form::as_symbol) else {
        return Delivery::error(form, ReplError::argument("Argument to doc must be a symbol"));
    };
    let text = match lookup(req, sym) {
        Some(entry) => entry.render(),
        None => "nil".to_string(),
    };
    Delivery::new(form, Ok(Value::Data(Form::Str(text)))).raw()
}
