//! Reval Reader - reads Clojure-style text into [`Form`]s.
//!
//! Purely syntactic: no namespace resolution, no evaluation. Syntax problems
//! surface as [`ReplError::Reader`] values, never as panics.

use pest::{error::InputLocation, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::errors::ReplError;
use crate::syntax::Form;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct FormParser;

/// Features a reader conditional can select, in addition to `:default`.
const FEATURES: &[&str] = &["cljs", "default"];

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Read the first form of `text`. Anything after it is ignored.
pub fn read_form(text: &str) -> Result<Form, ReplError> {
    read_first(text).map(|(_, form)| form)
}

/// Read every form of `text`.
pub fn read_all(text: &str) -> Result<Vec<Form>, ReplError> {
    let mut pairs = FormParser::parse(Rule::program, text).map_err(|e| convert_error(e, text))?;
    let Some(program) = pairs.next() else {
        return Ok(Vec::new());
    };
    let mut forms = Vec::new();
    for pair in program.into_inner().filter(|p| p.as_rule() != Rule::EOI) {
        push_item(pair, text, Position::TopLevel, &mut forms)?;
    }
    Ok(forms)
}

/// Source text of the first form of `text`, exactly as written.
pub fn read_form_text(text: &str) -> Result<String, ReplError> {
    read_first(text).map(|(raw, _)| raw.to_string())
}

/// The first item of `text` that yields a form, with its source text.
fn read_first(text: &str) -> Result<(&str, Form), ReplError> {
    if is_blank(text) {
        return Err(ReplError::reader("EOF while reading", text, Some(text.len())));
    }
    let mut pairs =
        FormParser::parse(Rule::first_form, text).map_err(|e| convert_error(e, text))?;
    let items = pairs.next().map(Pair::into_inner).into_iter().flatten();
    for pair in items {
        let raw = pair.as_str();
        let mut forms = Vec::new();
        push_item(pair, text, Position::TopLevel, &mut forms)?;
        if let Some(form) = forms.into_iter().next() {
            return Ok((raw, form));
        }
    }
    Err(ReplError::reader("EOF while reading", text, Some(text.len())))
}

/// Only whitespace and comments.
fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim_matches(|c: char| c.is_whitespace() || c == ',');
        line.is_empty() || line.starts_with(';')
    })
}

// ============================================================================
// FORM BUILDERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    TopLevel,
    Nested,
}

/// Append the forms an item reads as: none for `#_` and unmatched reader
/// conditionals, the spliced elements for `#?@`, otherwise exactly one.
fn push_item(
    pair: Pair<Rule>,
    src: &str,
    position: Position,
    out: &mut Vec<Form>,
) -> Result<(), ReplError> {
    let offset = pair.as_span().start();
    match pair.as_rule() {
        Rule::discard => {}
        Rule::reader_cond => out.extend(select_branch(pair, src)?),
        Rule::reader_cond_splicing => {
            if position == Position::TopLevel {
                return Err(ReplError::reader(
                    "Reader conditional splicing not allowed at the top level.",
                    src,
                    Some(offset),
                ));
            }
            match select_branch(pair, src)? {
                None => {}
                Some(Form::List(items) | Form::Vector(items)) => out.extend(items),
                Some(_) => {
                    return Err(ReplError::reader(
                        "Spliced form list in read-cond-splicing must implement ISequential",
                        src,
                        Some(offset),
                    ))
                }
            }
        }
        _ => out.push(build_form(pair, src)?),
    }
    Ok(())
}

/// The branch of `#?(...)` whose feature matches first, if any.
fn select_branch(pair: Pair<Rule>, src: &str) -> Result<Option<Form>, ReplError> {
    let offset = pair.as_span().start();
    let clauses = build_children(pair, src)?;
    if clauses.len() % 2 != 0 {
        return Err(ReplError::reader(
            "read-cond requires an even number of forms",
            src,
            Some(offset),
        ));
    }
    let mut iter = clauses.into_iter();
    while let (Some(feature), Some(branch)) = (iter.next(), iter.next()) {
        match feature {
            Form::Keyword(name) if FEATURES.contains(&name.as_str()) => return Ok(Some(branch)),
            Form::Keyword(_) => {}
            _ => {
                return Err(ReplError::reader(
                    "Feature should be a keyword",
                    src,
                    Some(offset),
                ))
            }
        }
    }
    Ok(None)
}

fn build_form(pair: Pair<Rule>, src: &str) -> Result<Form, ReplError> {
    let offset = pair.as_span().start();
    match pair.as_rule() {
        Rule::number => parse_number(pair.as_str(), src, offset),
        Rule::symbolic => Ok(Form::Float(match pair.as_str() {
            "##Inf" => f64::INFINITY,
            "##-Inf" => f64::NEG_INFINITY,
            _ => f64::NAN,
        })),
        Rule::string => {
            let inner = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Form::Str(unescape(inner, src, offset)?))
        }
        Rule::regex => {
            let pattern = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Form::Regex(pattern.to_string()))
        }
        Rule::character => parse_character(pair.as_str(), src, offset),
        Rule::keyword => Ok(Form::Keyword(pair.as_str()[1..].to_string())),
        Rule::symbol => Ok(match pair.as_str() {
            "nil" => Form::Nil,
            "true" => Form::Bool(true),
            "false" => Form::Bool(false),
            text => Form::symbol(text),
        }),
        Rule::quoted => wrap_single(pair, "quote", src),
        Rule::syntax_quote => wrap_single(pair, "syntax-quote", src),
        Rule::unquote => wrap_single(pair, "clojure.core/unquote", src),
        Rule::unquote_splicing => wrap_single(pair, "clojure.core/unquote-splicing", src),
        Rule::var_quote => wrap_single(pair, "var", src),
        Rule::deref => wrap_single(pair, "deref", src),
        Rule::meta => {
            let mut parts = datums(pair);
            let (Some(meta), Some(target)) = (parts.next(), parts.next()) else {
                return Err(ReplError::reader("EOF while reading", src, Some(offset)));
            };
            Ok(Form::Meta(
                Box::new(build_form(meta, src)?),
                Box::new(build_form(target, src)?),
            ))
        }
        Rule::tagged => {
            let mut parts = pair.into_inner();
            let tag = parts.next().map(|p| p.as_str().to_string()).unwrap_or_default();
            let Some(inner) = parts.find(|p| p.as_rule() != Rule::discard) else {
                return Err(ReplError::reader("EOF while reading", src, Some(offset)));
            };
            Ok(Form::Tagged(tag, Box::new(build_form(inner, src)?)))
        }
        Rule::namespaced_map => {
            let mut parts = pair.into_inner();
            let (Some(prefix), Some(map)) = (parts.next(), parts.next()) else {
                return Err(ReplError::reader("EOF while reading", src, Some(offset)));
            };
            let prefix = prefix.as_str().to_string();
            let map = build_form(map, src)?;
            // `#::alias{}` needs the current namespace to resolve.
            Ok(if prefix.starts_with(':') {
                Form::Tagged(format!(":{}", prefix), Box::new(map))
            } else {
                qualify_keys(&prefix, map)
            })
        }
        Rule::reader_cond => select_branch(pair, src)?.ok_or_else(|| {
            ReplError::reader("No reader conditional branch for :cljs", src, Some(offset))
        }),
        Rule::reader_cond_splicing => Err(ReplError::reader(
            "Reader conditional splicing not allowed here",
            src,
            Some(offset),
        )),
        Rule::list => Ok(Form::List(build_children(pair, src)?)),
        Rule::vector => Ok(Form::Vector(build_children(pair, src)?)),
        Rule::set => Ok(Form::Set(build_children(pair, src)?)),
        Rule::anon_fn => Ok(Form::AnonFn(build_children(pair, src)?)),
        Rule::map => {
            let items = build_children(pair, src)?;
            if items.len() % 2 != 0 {
                return Err(ReplError::reader(
                    "Map literal must contain an even number of forms",
                    src,
                    Some(offset),
                ));
            }
            let mut entries = Vec::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                entries.push((k, v));
            }
            Ok(Form::Map(entries))
        }
        rule => Err(ReplError::reader(
            format!("Unexpected reader rule: {:?}", rule),
            src,
            Some(offset),
        )),
    }
}

fn build_children(pair: Pair<Rule>, src: &str) -> Result<Vec<Form>, ReplError> {
    let mut forms = Vec::new();
    for child in pair.into_inner() {
        push_item(child, src, Position::Nested, &mut forms)?;
    }
    Ok(forms)
}

/// Inner pairs of a prefix form, without any `#_` discards.
fn datums<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
    pair.into_inner().filter(|p| p.as_rule() != Rule::discard)
}

fn wrap_single(pair: Pair<Rule>, head: &str, src: &str) -> Result<Form, ReplError> {
    let offset = pair.as_span().start();
    let inner = datums(pair)
        .next()
        .ok_or_else(|| ReplError::reader("EOF while reading", src, Some(offset)))?;
    Ok(Form::List(vec![Form::symbol(head), build_form(inner, src)?]))
}

/// `#:ns{:a 1}` reads as `{:ns/a 1}`; `:_/a` opts a key out.
fn qualify_keys(ns: &str, map: Form) -> Form {
    let qualify = |name: &str| match name.split_once('/') {
        Some(("_", bare)) => bare.to_string(),
        Some(_) => name.to_string(),
        None => format!("{}/{}", ns, name),
    };
    match map {
        Form::Map(entries) => Form::Map(
            entries
                .into_iter()
                .map(|(key, value)| {
                    let key = match key {
                        Form::Keyword(k) if !k.starts_with(':') => Form::Keyword(qualify(&k)),
                        Form::Symbol(sym) => Form::symbol(qualify(sym.as_str())),
                        other => other,
                    };
                    (key, value)
                })
                .collect(),
        ),
        other => other,
    }
}

fn parse_number(text: &str, src: &str, offset: usize) -> Result<Form, ReplError> {
    let invalid = || ReplError::reader(format!("Invalid number: {}", text), src, Some(offset));
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.trim_start_matches('+')),
    };
    let signed = |n: i64| Form::Int(if negative { -n } else { n });
    let lower = body.to_ascii_lowercase();

    if let Some(digits) = lower.strip_prefix("0x") {
        let digits = digits.trim_end_matches('n');
        return i64::from_str_radix(digits, 16).map(signed).map_err(|_| invalid());
    }
    if let Some((radix, digits)) = lower.split_once('r') {
        let radix = radix
            .parse::<u32>()
            .ok()
            .filter(|r| (2..=36).contains(r))
            .ok_or_else(invalid)?;
        return i64::from_str_radix(digits, radix).map(signed).map_err(|_| invalid());
    }
    if let Some((num, den)) = body.split_once('/') {
        let num = num.parse::<f64>().map_err(|_| invalid())?;
        let den = den.parse::<f64>().map_err(|_| invalid())?;
        if den == 0.0 {
            return Err(ReplError::reader("Divide by zero", src, Some(offset)));
        }
        let value = if negative { -num / den } else { num / den };
        return Ok(if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
            Form::Int(value as i64)
        } else {
            Form::Float(value)
        });
    }

    // Arbitrary-precision suffixes read as plain numbers.
    let digits = body.trim_end_matches(['N', 'M']);
    let float = || {
        digits
            .parse::<f64>()
            .map(|n| Form::Float(if negative { -n } else { n }))
            .map_err(|_| invalid())
    };
    if digits.contains(['.', 'e', 'E']) {
        return float();
    }
    match digits.parse::<i64>() {
        Ok(n) => Ok(signed(n)),
        // Past i64 the host number type is a double anyway.
        Err(_) => float(),
    }
}

fn parse_character(text: &str, src: &str, offset: usize) -> Result<Form, ReplError> {
    let body = &text[1..];
    let c = match body {
        "newline" => '\n',
        "space" => ' ',
        "tab" => '\t',
        "return" => '\r',
        "backspace" => '\u{8}',
        "formfeed" => '\u{c}',
        _ if body.len() == 5 && body.starts_with('u') => u32::from_str_radix(&body[1..], 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                ReplError::reader(format!("Invalid unicode character: {}", text), src, Some(offset))
            })?,
        _ if body.len() > 1 && body.starts_with('o') => u32::from_str_radix(&body[1..], 8)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                ReplError::reader(format!("Invalid octal escape: {}", text), src, Some(offset))
            })?,
        _ => {
            let mut chars = body.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(ReplError::reader(
                        format!("Unsupported character: {}", text),
                        src,
                        Some(offset),
                    ))
                }
            }
        }
    };
    Ok(Form::Char(c))
}

fn unescape(raw: &str, src: &str, offset: usize) -> Result<String, ReplError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                let c = u32::from_str_radix(&code, 16)
                    .ok()
                    .filter(|_| code.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        ReplError::reader(
                            format!("Invalid unicode escape: \\u{}", code),
                            src,
                            Some(offset),
                        )
                    })?;
                out.push(c);
            }
            Some(other) => {
                return Err(ReplError::reader(
                    format!("Unsupported escape character: \\{}", other),
                    src,
                    Some(offset),
                ))
            }
            None => return Err(ReplError::reader("EOF while reading string", src, Some(offset))),
        }
    }
    Ok(out)
}

fn convert_error(err: pest::error::Error<Rule>, src: &str) -> ReplError {
    let offset = match err.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };
    let message = if offset >= src.trim_end().len() {
        "EOF while reading".to_string()
    } else {
        format!("Unexpected input at position {}", offset)
    };
    ReplError::reader(message, src, Some(offset))
}
