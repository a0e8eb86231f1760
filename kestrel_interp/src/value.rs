//! Runtime values and errors of the tree walking interpreter.
use smol_str::SmolStr;
use std::cell::RefCell;
use std::fmt::{self, Write as FmtWrite};
use std::rc::Rc;

/// Dynamically typed runtime value.
///
/// Composites are reference handles; copies of a record or array
/// value alias the same storage, matching the by-value-handle calling
/// convention of compiled code.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(SmolStr),
    Array(Rc<RefCell<Vec<Value>>>),
    Record(Rc<RefCell<Vec<(SmolStr, Value)>>>),
    /// Unset reference, the default for nested composite storage.
    Null,
}

impl Value {
    /// Render the value the way compiled formatting routines do:
    /// booleans as their 0/1 encoding, reals always with a decimal
    /// point, records as brace-wrapped field lists, arrays as
    /// bracket-wrapped element lists.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Value::Int(v) => write!(out, "{}", v).unwrap(),
            Value::Real(v) => write!(out, "{:?}", v).unwrap(),
            Value::Bool(v) => write!(out, "{}", *v as i64).unwrap(),
            Value::Str(v) => out.push_str(v),
            Value::Null => out.push_str("null"),
            Value::Record(record) => {
                out.push('{');
                let record = record.borrow();
                for (i, (name, value)) in record.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write!(out, "\"{}\": ", name).unwrap();
                    value.render_into(out);
                }
                out.push('}');
            }
            Value::Array(array) => {
                out.push('[');
                let array = array.borrow();
                for (i, value) in array.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    value.render_into(out);
                }
                out.push(']');
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    DivisionByZero,
    Undefined(SmolStr),
    UndefinedFunction(SmolStr),
    IndexOutOfRange { index: i64, len: usize },
    UnknownField(SmolStr),
    NullReference,
    ReturnOutsideFunction,
    ArityMismatch(SmolStr),
    CallDepthExceeded,
    TypeError(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use RuntimeError as E;
        match self {
            E::DivisionByZero => write!(f, "division by zero"),
            E::Undefined(name) => write!(f, "variable '{}' is not declared", name),
            E::UndefinedFunction(name) => write!(f, "function '{}' is not declared", name),
            E::IndexOutOfRange { index, len } => {
                write!(f, "array index {} out of range for length {}", index, len)
            }
            E::UnknownField(name) => write!(f, "field '{}' does not exist in record", name),
            E::NullReference => write!(f, "null reference"),
            E::ReturnOutsideFunction => write!(f, "'return' statement not inside a function"),
            E::ArityMismatch(name) => write!(f, "wrong number of arguments for '{}'", name),
            E::CallDepthExceeded => write!(f, "call depth exceeded"),
            E::TypeError(msg) => write!(f, "type error: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}
