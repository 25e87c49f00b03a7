//! Syntax module for reval
//!
//! Reader data types and the reader itself. The rest of the crate only ever
//! sees [`Form`]s.

pub mod form;
pub mod parser;

pub use form::{Form, Symbol};
pub use parser::{read_all, read_form, read_form_text};
