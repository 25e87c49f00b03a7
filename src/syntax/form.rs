//! Reader data: the forms a REPL line is read into.
//!
//! `Display` prints forms the way `pr-str` would, so a synthesized form can be
//! handed to the backend as text and read back unchanged.

use std::fmt;

use serde::Serialize;

// ============================================================================
// SYMBOLS
// ============================================================================

/// A possibly namespace-qualified symbol, stored as its printed text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Builds `ns/name`.
    pub fn qualified(ns: &str, name: &str) -> Self {
        Self(format!("{}/{}", ns, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace part of a qualified symbol. `/` on its own is a name.
    pub fn namespace(&self) -> Option<&str> {
        if self.0 == "/" {
            return None;
        }
        self.0.split_once('/').map(|(ns, _)| ns)
    }

    /// The name part, without any namespace qualifier.
    pub fn name(&self) -> &str {
        if self.0 == "/" {
            return &self.0;
        }
        match self.0.split_once('/') {
            Some((_, name)) => name,
            None => &self.0,
        }
    }

    /// Relative path of the source file that defines this namespace, without
    /// an extension: `foo.bar-baz` becomes `foo/bar_baz`.
    pub fn to_ns_path(&self) -> String {
        self.0.replace('.', "/").replace('-', "_")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

// ============================================================================
// FORMS
// ============================================================================

/// A single piece of read data.
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    /// Keyword text without the leading colon.
    Keyword(String),
    Symbol(Symbol),
    List(Vec<Form>),
    Vector(Vec<Form>),
    Map(Vec<(Form, Form)>),
    Set(Vec<Form>),
    /// `#"..."`, pattern text as written.
    Regex(String),
    /// `#(...)` body.
    AnonFn(Vec<Form>),
    /// `^meta target`; metadata is kept as written, not expanded.
    Meta(Box<Form>, Box<Form>),
    /// `#tag form`, e.g. `#js {...}` or `#inst "..."`. Auto-resolved
    /// namespaced maps keep their `::alias` prefix as the tag.
    Tagged(String, Box<Form>),
}

impl Form {
    pub fn symbol(text: impl Into<String>) -> Self {
        Form::Symbol(Symbol::new(text))
    }

    pub fn keyword(text: impl Into<String>) -> Self {
        Form::Keyword(text.into())
    }

    /// `(quote <form>)`
    pub fn quote(form: Form) -> Self {
        Form::List(vec![Form::symbol("quote"), form])
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self.strip_meta() {
            Form::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    /// The form under any `^meta` annotations.
    pub fn strip_meta(&self) -> &Form {
        match self {
            Form::Meta(_, target) => target.strip_meta(),
            other => other,
        }
    }

    pub fn is_keyword(&self, name: &str) -> bool {
        matches!(self, Form::Keyword(k) if k == name)
    }

    /// Nil and false are the only falsy values.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Form::Nil | Form::Bool(false))
    }

    /// Head symbol of a list form, if any.
    pub fn head_symbol(&self) -> Option<&Symbol> {
        match self.strip_meta() {
            Form::List(items) => items.first().and_then(Form::as_symbol),
            _ => None,
        }
    }

    /// Arguments of a list form, i.e. everything after the head.
    pub fn args(&self) -> &[Form] {
        match self.strip_meta() {
            Form::List(items) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }

    /// The form wrapped by `(quote x)`, if this is a quote form.
    pub fn unquoted(&self) -> Option<&Form> {
        match self {
            Form::List(items) if items.len() == 2 && items[0] == Form::symbol("quote") => {
                Some(&items[1])
            }
            _ => None,
        }
    }

    /// Text of the form as `str` would produce it: strings lose their quotes.
    pub fn to_raw_string(&self) -> String {
        match self {
            Form::Str(s) => s.clone(),
            Form::Char(c) => c.to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Nil => f.write_str("nil"),
            Form::Bool(b) => write!(f, "{}", b),
            Form::Int(n) => write!(f, "{}", n),
            Form::Float(n) if n.is_nan() => f.write_str("##NaN"),
            Form::Float(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "##Inf" } else { "##-Inf" })
            }
            Form::Float(n) if n.fract() == 0.0 => write!(f, "{:.1}", n),
            Form::Float(n) => write!(f, "{}", n),
            Form::Str(s) => write_escaped(f, s),
            Form::Char(c) => write_char(f, *c),
            Form::Keyword(k) => write!(f, ":{}", k),
            Form::Symbol(sym) => write!(f, "{}", sym),
            Form::List(items) => write_seq(f, "(", items, ")"),
            Form::Vector(items) => write_seq(f, "[", items, "]"),
            Form::Set(items) => write_seq(f, "#{", items, "}"),
            Form::AnonFn(items) => write_seq(f, "#(", items, ")"),
            Form::Regex(pattern) => write!(f, "#\"{}\"", pattern),
            Form::Meta(meta, target) => write!(f, "^{} {}", meta, target),
            Form::Tagged(tag, form) if tag.starts_with(':') => write!(f, "#{}{}", tag, form),
            Form::Tagged(tag, form) => write!(f, "#{} {}", tag, form),
            Form::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Form], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

fn write_char(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    match c {
        '\n' => f.write_str("\\newline"),
        ' ' => f.write_str("\\space"),
        '\t' => f.write_str("\\tab"),
        '\r' => f.write_str("\\return"),
        c => write!(f, "\\{}", c),
    }
}
