pub use crate::backend::{Evaluated, EvalOptions, Evaluator, FileReader, Loader, Value};
pub use crate::config::{ReplConfig, ReplOptions, Target};
pub use crate::errors::ReplError;
pub use crate::protocol::EvalResult;
pub use crate::repl::Repl;
pub use crate::syntax::{Form, Symbol};

pub mod backend;
pub mod config;
pub mod errors;
pub mod loader;
pub mod protocol;
pub mod repl;
pub mod session;
pub mod special;
pub mod syntax;
pub mod warnings;
