//! Session state owned by a [`Repl`](crate::Repl).
//!
//! Fields are private; the state only changes through the transitions below.

use im::HashMap;
use serde::Serialize;

use crate::backend::Value;
use crate::errors::ReplError;
use crate::syntax::Symbol;

/// Namespace a fresh session starts in, also the scratch namespace for
/// self-requires.
pub const DEFAULT_NS: &str = "cljs.user";

// ============================================================================
// HISTORY
// ============================================================================

/// `*1`, `*2`, `*3` and `*e`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub one: Option<Value>,
    pub two: Option<Value>,
    pub three: Option<Value>,
    pub error: Option<ReplError>,
}

impl History {
    /// Names of the history variables.
    pub const VARS: [&'static str; 4] = ["*1", "*2", "*3", "*e"];

    pub fn is_history_var(sym: &Symbol) -> bool {
        Self::VARS.contains(&sym.as_str())
    }

    /// Current value of a history variable; unset slots read as nil.
    pub fn lookup(&self, sym: &Symbol) -> Option<Value> {
        let slot = match sym.as_str() {
            "*1" => self.one.clone(),
            "*2" => self.two.clone(),
            "*3" => self.three.clone(),
            "*e" => self.error.clone().map(|e| Value::Error(Box::new(e))),
            _ => return None,
        };
        Some(slot.unwrap_or(Value::NIL))
    }

    fn push(&mut self, value: Value) {
        self.three = self.two.take();
        self.two = self.one.take();
        self.one = Some(value);
    }
}

// ============================================================================
// INITIALIZATION STATE
// ============================================================================

/// Outcome of trying to claim initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns initialization and must call `finish`.
    Owner,
    /// Someone else is initializing; nothing to do.
    InFlight,
    /// Already initialized; nothing to do.
    Done,
}

/// The two-flag initialization state machine. `initializing` implies
/// `needs_init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitState {
    needs_init: bool,
    initializing: bool,
}

impl Default for InitState {
    fn default() -> Self {
        Self {
            needs_init: true,
            initializing: false,
        }
    }
}

impl InitState {
    pub fn needs_init(&self) -> bool {
        self.needs_init
    }

    pub fn initializing(&self) -> bool {
        self.initializing
    }

    /// Test-and-set. Never blocks.
    pub fn claim(&mut self) -> Claim {
        if self.initializing {
            return Claim::InFlight;
        }
        if self.needs_init {
            self.initializing = true;
            return Claim::Owner;
        }
        Claim::Done
    }

    pub fn finish(&mut self) {
        self.initializing = false;
        self.needs_init = false;
    }

    pub fn force(&mut self) {
        self.initializing = false;
        self.needs_init = true;
    }
}

// ============================================================================
// MODULE INDEX
// ============================================================================

/// Closure-style provide name to source path, e.g. `goog.string` to
/// `goog/string/string.js`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleIndex(HashMap<Symbol, String>);

impl ModuleIndex {
    pub fn get(&self, provide: &Symbol) -> Option<&String> {
        self.0.get(provide)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&mut self, pairs: impl IntoIterator<Item = (Symbol, String)>) {
        for (provide, path) in pairs {
            self.0.insert(provide, path);
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone)]
pub struct Session {
    current_ns: Symbol,
    last_eval_warning: Option<String>,
    init: InitState,
    module_index: ModuleIndex,
    history: History,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            current_ns: Symbol::new(DEFAULT_NS),
            last_eval_warning: None,
            init: InitState::default(),
            module_index: ModuleIndex::default(),
            history: History::default(),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_ns(&self) -> &Symbol {
        &self.current_ns
    }

    pub fn last_eval_warning(&self) -> Option<&str> {
        self.last_eval_warning.as_deref()
    }

    pub fn init_state(&self) -> InitState {
        self.init
    }

    /// Cheap snapshot; the index is a persistent map.
    pub fn module_index(&self) -> ModuleIndex {
        self.module_index.clone()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn switch_ns(&mut self, ns: Symbol) {
        if ns != self.current_ns {
            tracing::debug!(from = %self.current_ns, to = %ns, "switching namespace");
        }
        self.current_ns = ns;
    }

    pub fn record_warning(&mut self, warning: Option<String>) {
        self.last_eval_warning = warning;
    }

    pub fn clear_warning(&mut self) {
        self.last_eval_warning = None;
    }

    pub fn push_history(&mut self, value: Value) {
        self.history.push(value);
    }

    pub fn set_last_error(&mut self, error: Option<ReplError>) {
        self.history.error = error;
    }

    pub fn claim_init(&mut self) -> Claim {
        self.init.claim()
    }

    pub fn finish_init(&mut self) {
        self.init.finish();
    }

    pub fn force_init(&mut self) {
        self.init.force();
    }

    pub fn merge_module_index(&mut self, pairs: impl IntoIterator<Item = (Symbol, String)>) {
        self.module_index.merge(pairs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Form;

    fn int(n: i64) -> Value {
        Value::Data(Form::Int(n))
    }

    #[test]
    fn history_rotates_newest_first() {
        let mut session = Session::new();
        session.push_history(int(1));
        session.push_history(int(2));
        session.push_history(int(3));
        let h = session.history();
        assert_eq!(h.one, Some(int(3)));
        assert_eq!(h.two, Some(int(2)));
        assert_eq!(h.three, Some(int(1)));
    }

    #[test]
    fn unset_history_reads_as_nil() {
        let h = History::default();
        assert_eq!(h.lookup(&Symbol::new("*2")), Some(Value::NIL));
        assert_eq!(h.lookup(&Symbol::new("*e")), Some(Value::NIL));
        assert_eq!(h.lookup(&Symbol::new("x")), None);
    }

    #[test]
    fn claim_is_granted_once() {
        let mut init = InitState::default();
        assert_eq!(init.claim(), Claim::Owner);
        assert!(init.initializing() && init.needs_init());
        assert_eq!(init.claim(), Claim::InFlight);
        assert!(init.needs_init());
        init.finish();
        assert_eq!(init.claim(), Claim::Done);
        assert!(!init.needs_init());
    }

    #[test]
    fn force_reopens_initialization() {
        let mut init = InitState::default();
        init.claim();
        init.finish();
        init.force();
        assert_eq!(init.claim(), Claim::Owner);
    }

    #[test]
    fn module_index_snapshots_are_independent() {
        let mut session = Session::new();
        let before = session.module_index();
        session.merge_module_index([(Symbol::new("goog.string"), "goog/string/string.js".into())]);
        assert!(before.is_empty());
        assert_eq!(
            session.module_index().get(&Symbol::new("goog.string")).map(String::as_str),
            Some("goog/string/string.js")
        );
    }

    #[test]
    fn module_index_serializes_as_a_map() {
        let mut index = ModuleIndex::default();
        index.merge([(Symbol::new("goog.dom"), "goog/dom/dom.js".to_string())]);
        assert_eq!(
            serde_json::to_string(&index).unwrap(),
            r#"{"goog.dom":"goog/dom/dom.js"}"#
        );
    }
}
