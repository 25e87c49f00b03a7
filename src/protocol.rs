//! The result protocol.
//!
//! Every request ends in exactly one [`EvalResult`], produced by [`deliver`].
//! Handlers never call back themselves: they return a [`Delivery`] describing
//! the outcome and the session effects that go with it.

use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::backend::Value;
use crate::errors::ReplError;
use crate::session::Session;
use crate::syntax::Form;
use crate::warnings::{resolve_warning, WarningCollector};

// ============================================================================
// RESULT SHAPE
// ============================================================================

/// The uniform result of one request.
///
/// `outcome` holds either the value text or the error, never both, so
/// `success`, "value present" and "error absent" always agree.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    pub form: Form,
    /// Advisory compiler warning on a successful result.
    pub warning: Option<String>,
    pub outcome: Result<String, ReplError>,
}

impl EvalResult {
    pub fn success(form: Form, warning: Option<String>, value: String) -> Self {
        Self {
            form,
            warning,
            outcome: Ok(value),
        }
    }

    pub fn failure(form: Form, warning: Option<String>, error: ReplError) -> Self {
        Self {
            form,
            warning,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&str> {
        self.outcome.as_ref().ok().map(String::as_str)
    }

    pub fn error(&self) -> Option<&ReplError> {
        self.outcome.as_ref().err()
    }

    /// Value text, or the error message with its stack when `print_stack` is set.
    pub fn to_display_string(&self, print_stack: bool) -> String {
        match &self.outcome {
            Ok(value) => value.clone(),
            Err(err) if print_stack => err.to_trace_string(),
            Err(err) => err.message(),
        }
    }

    pub fn to_json(&self) -> Result<String, ReplError> {
        serde_json::to_string(self)
            .map_err(|e| ReplError::config(format!("Cannot serialize result: {}", e)))
    }
}

impl Serialize for EvalResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = 3 + usize::from(self.warning.is_some());
        let mut state = serializer.serialize_struct("EvalResult", fields)?;
        state.serialize_field("success", &self.is_success())?;
        state.serialize_field("form", &self.form.to_string())?;
        match &self.outcome {
            Ok(value) => state.serialize_field("value", value)?,
            Err(err) => state.serialize_field("error", err)?,
        }
        if let Some(warning) = &self.warning {
            state.serialize_field("warning", warning)?;
        }
        state.end()
    }
}

// ============================================================================
// BUILDERS
// ============================================================================

/// How a success value is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Printing {
    /// `pr-str` display string.
    PrStr,
    /// Text delivered as is.
    Raw,
}

pub fn build_success(
    printing: Printing,
    form: Form,
    warning: Option<String>,
    value: &Value,
) -> EvalResult {
    let text = match printing {
        Printing::PrStr => value.to_string(),
        Printing::Raw => value.to_raw_string(),
    };
    EvalResult::success(form, warning, text)
}

pub fn build_error(form: Form, warning: Option<String>, error: ReplError) -> EvalResult {
    EvalResult::failure(form, warning, error)
}

// ============================================================================
// DELIVERY
// ============================================================================

pub(crate) type Effect = Box<dyn FnOnce(&mut Session) + Send>;

/// Session changes that accompany a result. At most one effect runs.
#[derive(Default)]
pub(crate) enum Effects {
    #[default]
    None,
    /// Runs whatever the outcome.
    Always(Effect),
    /// Picks a branch from the final outcome, after warning resolution.
    Outcome {
        on_success: Option<Effect>,
        on_error: Option<Effect>,
    },
}

impl Effects {
    pub(crate) fn always(effect: impl FnOnce(&mut Session) + Send + 'static) -> Self {
        Effects::Always(Box::new(effect))
    }

    pub(crate) fn on_success(effect: impl FnOnce(&mut Session) + Send + 'static) -> Self {
        Effects::Outcome {
            on_success: Some(Box::new(effect)),
            on_error: None,
        }
    }

    fn run(self, session: &mut Session, success: bool) {
        let effect = match self {
            Effects::None => None,
            Effects::Always(effect) => Some(effect),
            Effects::Outcome {
                on_success,
                on_error,
            } => {
                if success {
                    on_success
                } else {
                    on_error
                }
            }
        };
        if let Some(effect) = effect {
            effect(session);
        }
    }
}

/// A handler's finished work, waiting to be delivered.
pub(crate) struct Delivery {
    pub form: Form,
    pub outcome: Result<Value, ReplError>,
    pub printing: Printing,
    pub effects: Effects,
}

impl Delivery {
    pub(crate) fn new(form: Form, outcome: Result<Value, ReplError>) -> Self {
        Self {
            form,
            outcome,
            printing: Printing::PrStr,
            effects: Effects::None,
        }
    }

    pub(crate) fn error(form: Form, error: ReplError) -> Self {
        Self::new(form, Err(error))
    }

    pub(crate) fn raw(mut self) -> Self {
        self.printing = Printing::Raw;
        self
    }

    pub(crate) fn with_effects(mut self, effects: Effects) -> Self {
        self.effects = effects;
        self
    }
}

/// The single exit point of a request.
///
/// Resolves the pending warning, runs one effect, clears the warning slot,
/// records `*e`, then hands the final result to `callback` and returns what
/// it returns. Side effects are visible to the callback.
pub(crate) fn deliver<F, R>(
    session: &Mutex<Session>,
    warning_as_error: bool,
    warnings: &WarningCollector,
    delivery: Delivery,
    callback: F,
) -> R
where
    F: FnOnce(EvalResult) -> R,
{
    let Delivery {
        form,
        outcome,
        printing,
        effects,
    } = delivery;

    let built = match outcome {
        Ok(value) => build_success(printing, form, None, &value),
        Err(error) => build_error(form, None, error),
    };
    let pending = warnings.take();
    let result = resolve_warning(warning_as_error, pending.clone(), built);

    {
        let mut session = session.lock();
        session.record_warning(pending);
        effects.run(&mut session, result.is_success());
        session.clear_warning();
        session.set_last_error(result.error().cloned());
    }

    callback(result)
}
