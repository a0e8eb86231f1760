//! Tree walking interpreter.
//!
//! Alternate execution path over the same tree model the compiler
//! consumes, bypassing code generation entirely. Observable behavior
//! matches compiled programs: implicit assignment conversions,
//! inclusive `for` ranges, division by zero as a runtime fault, and
//! `print` output format.
mod interp;
mod value;

pub use interp::{interpret, Interpreter};
pub use value::{RuntimeError, Value};
