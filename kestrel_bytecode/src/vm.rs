//! Reference interpreter for generated artifacts.
//!
//! Executes modules directly so the toolchain can be exercised without
//! a real target runtime. Faithful to the abstract machine contract:
//! typed slots, wide values occupying two units, label-based branches,
//! guarded faults.
use crate::instr::{Instr, Label, ValueKind};
use crate::module::{Artifact, FunctionDef};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Write as FmtWrite};
use std::rc::Rc;

pub type VmResult<T> = std::result::Result<T, VmError>;

/// Runtime value. Booleans exist only as the 0/1 integer encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Record(Rc<RefCell<RecordObj>>),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordObj {
    pub type_name: SmolStr,
    pub fields: Vec<(SmolStr, Value)>,
}

impl Value {
    fn default_for(kind: ValueKind) -> Value {
        match kind {
            ValueKind::Int => Value::Int(0),
            ValueKind::Real => Value::Real(0.0),
            ValueKind::Str => Value::Str(Rc::from("")),
            ValueKind::Ref => Value::Null,
        }
    }
}

#[derive(Debug)]
pub enum VmError {
    /// Raised by an executed `fault` instruction.
    Fault(String),
    DivideByZero,
    IndexOutOfRange { index: i64, len: usize },
    NullReference,
    UnknownFunction(SmolStr),
    UnknownRecord(SmolStr),
    UnknownField(SmolStr),
    UnknownLabel(Label),
    StackUnderflow,
    TypeMismatch(&'static str),
    CallDepthExceeded,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use VmError as E;
        match self {
            E::Fault(msg) => write!(f, "fault: {}", msg),
            E::DivideByZero => write!(f, "division by zero"),
            E::IndexOutOfRange { index, len } => {
                write!(f, "array index {} out of range for length {}", index, len)
            }
            E::NullReference => write!(f, "null reference"),
            E::UnknownFunction(name) => write!(f, "unknown function '{}'", name),
            E::UnknownRecord(name) => write!(f, "unknown record type '{}'", name),
            E::UnknownField(name) => write!(f, "unknown record field '{}'", name),
            E::UnknownLabel(label) => write!(f, "branch to undefined label {}", label),
            E::StackUnderflow => write!(f, "operand stack underflow"),
            E::TypeMismatch(context) => write!(f, "operand type mismatch in {}", context),
            E::CallDepthExceeded => write!(f, "call depth exceeded"),
        }
    }
}

impl std::error::Error for VmError {}

/// Maximum call nesting before execution is aborted.
const MAX_CALL_DEPTH: usize = 256;

/// Executes one artifact. Program output produced by `write`
/// instructions is captured in an internal buffer.
pub struct Vm<'a> {
    artifact: &'a Artifact,
    out: String,
    depth: usize,
}

impl<'a> Vm<'a> {
    pub fn new(artifact: &'a Artifact) -> Self {
        Self {
            artifact,
            out: String::new(),
            depth: 0,
        }
    }

    /// Run the synthetic entry routine generated for globals and
    /// top-level statements.
    pub fn run_entry(&mut self) -> VmResult<Option<Value>> {
        self.call("entry", vec![])
    }

    /// Call an entry point by its source-level name.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> VmResult<Option<Value>> {
        let func = self
            .artifact
            .function(name)
            .ok_or_else(|| VmError::UnknownFunction(SmolStr::new(name)))?;
        self.exec(func, args)
    }

    /// Captured program output.
    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.out)
    }

    fn exec(&mut self, func: &'a FunctionDef, args: Vec<Value>) -> VmResult<Option<Value>> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(VmError::CallDepthExceeded);
        }
        self.depth += 1;
        let result = self.exec_frame(func, args);
        self.depth -= 1;
        result
    }

    fn exec_frame(&mut self, func: &'a FunctionDef, args: Vec<Value>) -> VmResult<Option<Value>> {
        let labels = scan_labels(&func.code);
        let mut locals = vec![Value::Null; func.locals as usize];
        let mut stack: Vec<Value> = Vec::new();

        // Arguments land in the leading slots, in declaration order.
        let mut slot = 0usize;
        for (arg, kind) in args.into_iter().zip(func.params.iter()) {
            locals[slot] = arg;
            slot += slot_width(*kind);
        }

        let mut pc = 0usize;
        while pc < func.code.len() {
            let instr = &func.code[pc];
            pc += 1;

            use Instr as I;
            match instr {
                I::ConstInt(v) => stack.push(Value::Int(*v)),
                I::ConstReal(v) => stack.push(Value::Real(*v)),
                I::ConstStr(v) => stack.push(Value::Str(Rc::from(v.as_str()))),
                I::ConstNull => stack.push(Value::Null),

                I::LoadInt(s) => match &locals[*s as usize] {
                    Value::Int(v) => stack.push(Value::Int(*v)),
                    _ => return Err(VmError::TypeMismatch("load.i")),
                },
                I::StoreInt(s) => {
                    let v = pop_int(&mut stack)?;
                    locals[*s as usize] = Value::Int(v);
                }
                I::LoadReal(s) => match &locals[*s as usize] {
                    Value::Real(v) => stack.push(Value::Real(*v)),
                    _ => return Err(VmError::TypeMismatch("load.r")),
                },
                I::StoreReal(s) => {
                    let v = pop_real(&mut stack)?;
                    locals[*s as usize] = Value::Real(v);
                }
                I::LoadRef(s) => match &locals[*s as usize] {
                    Value::Str(_) | Value::Array(_) | Value::Record(_) | Value::Null => {
                        stack.push(locals[*s as usize].clone())
                    }
                    _ => return Err(VmError::TypeMismatch("load.ref")),
                },
                I::StoreRef(s) => {
                    let v = pop(&mut stack)?;
                    locals[*s as usize] = v;
                }

                I::AddInt => int_binop(&mut stack, i64::wrapping_add)?,
                I::SubInt => int_binop(&mut stack, i64::wrapping_sub)?,
                I::MulInt => int_binop(&mut stack, i64::wrapping_mul)?,
                I::DivInt => {
                    let rhs = pop_int(&mut stack)?;
                    let lhs = pop_int(&mut stack)?;
                    if rhs == 0 {
                        return Err(VmError::DivideByZero);
                    }
                    stack.push(Value::Int(lhs.wrapping_div(rhs)));
                }
                I::NegInt => {
                    let v = pop_int(&mut stack)?;
                    stack.push(Value::Int(v.wrapping_neg()));
                }

                I::AddReal => real_binop(&mut stack, |a, b| a + b)?,
                I::SubReal => real_binop(&mut stack, |a, b| a - b)?,
                I::MulReal => real_binop(&mut stack, |a, b| a * b)?,
                I::DivReal => real_binop(&mut stack, |a, b| a / b)?,
                I::NegReal => {
                    let v = pop_real(&mut stack)?;
                    stack.push(Value::Real(-v));
                }

                I::AndInt => int_binop(&mut stack, |a, b| a & b)?,
                I::OrInt => int_binop(&mut stack, |a, b| a | b)?,
                I::XorInt => int_binop(&mut stack, |a, b| a ^ b)?,

                I::CmpReal => {
                    let rhs = pop_real(&mut stack)?;
                    let lhs = pop_real(&mut stack)?;
                    // Unordered operands collapse to -1.
                    let ord = if lhs.is_nan() || rhs.is_nan() {
                        -1
                    } else if lhs < rhs {
                        -1
                    } else if lhs == rhs {
                        0
                    } else {
                        1
                    };
                    stack.push(Value::Int(ord));
                }

                I::RealToInt => {
                    let v = pop_real(&mut stack)?;
                    stack.push(Value::Int(v as i64));
                }
                I::IntToReal => {
                    let v = pop_int(&mut stack)?;
                    stack.push(Value::Real(v as f64));
                }

                I::Jump(l) => pc = branch_target(&labels, *l)?,
                I::BranchZero(l) => {
                    if pop_int(&mut stack)? == 0 {
                        pc = branch_target(&labels, *l)?;
                    }
                }
                I::BranchNonZero(l) => {
                    if pop_int(&mut stack)? != 0 {
                        pc = branch_target(&labels, *l)?;
                    }
                }
                I::BranchNeg(l) => {
                    if pop_int(&mut stack)? < 0 {
                        pc = branch_target(&labels, *l)?;
                    }
                }
                I::BranchPos(l) => {
                    if pop_int(&mut stack)? > 0 {
                        pc = branch_target(&labels, *l)?;
                    }
                }
                I::BranchIntEq(l) => {
                    let rhs = pop_int(&mut stack)?;
                    let lhs = pop_int(&mut stack)?;
                    if lhs == rhs {
                        pc = branch_target(&labels, *l)?;
                    }
                }
                I::BranchIntLt(l) => {
                    let rhs = pop_int(&mut stack)?;
                    let lhs = pop_int(&mut stack)?;
                    if lhs < rhs {
                        pc = branch_target(&labels, *l)?;
                    }
                }
                I::BranchIntGt(l) => {
                    let rhs = pop_int(&mut stack)?;
                    let lhs = pop_int(&mut stack)?;
                    if lhs > rhs {
                        pc = branch_target(&labels, *l)?;
                    }
                }
                I::BranchNull(l) => {
                    if matches!(pop(&mut stack)?, Value::Null) {
                        pc = branch_target(&labels, *l)?;
                    }
                }
                I::Mark(_) => { /* position only */ }

                I::NewArray(kind) => {
                    let len = pop_int(&mut stack)?;
                    if len < 0 {
                        return Err(VmError::IndexOutOfRange { index: len, len: 0 });
                    }
                    let elems = vec![Value::default_for(*kind); len as usize];
                    stack.push(Value::Array(Rc::new(RefCell::new(elems))));
                }
                I::ArrayLoad(_) => {
                    let index = pop_int(&mut stack)?;
                    let array = pop_array(&mut stack)?;
                    let array = array.borrow();
                    let value = checked_index(&array, index)?;
                    stack.push(value);
                }
                I::ArrayStore(_) => {
                    let value = pop(&mut stack)?;
                    let index = pop_int(&mut stack)?;
                    let array = pop_array(&mut stack)?;
                    let mut array = array.borrow_mut();
                    let len = array.len();
                    if index < 0 || index as usize >= len {
                        return Err(VmError::IndexOutOfRange { index, len });
                    }
                    array[index as usize] = value;
                }
                I::ArrayLen => {
                    let array = pop_array(&mut stack)?;
                    let len = array.borrow().len();
                    stack.push(Value::Int(len as i64));
                }

                I::NewRecord(name) => {
                    let module = self
                        .artifact
                        .record(name)
                        .ok_or_else(|| VmError::UnknownRecord(name.clone()))?;
                    let fields = module
                        .fields
                        .iter()
                        .map(|field| (field.name.clone(), Value::default_for(field.kind)))
                        .collect();
                    stack.push(Value::Record(Rc::new(RefCell::new(RecordObj {
                        type_name: name.clone(),
                        fields,
                    }))));
                }
                I::GetField { field, .. } => {
                    let record = pop_record(&mut stack)?;
                    let record = record.borrow();
                    let value = record
                        .fields
                        .iter()
                        .find(|(name, _)| name == field)
                        .map(|(_, value)| value.clone())
                        .ok_or_else(|| VmError::UnknownField(field.clone()))?;
                    stack.push(value);
                }
                I::PutField { field, .. } => {
                    let value = pop(&mut stack)?;
                    let record = pop_record(&mut stack)?;
                    let mut record = record.borrow_mut();
                    let slot = record
                        .fields
                        .iter_mut()
                        .find(|(name, _)| name == field)
                        .ok_or_else(|| VmError::UnknownField(field.clone()))?;
                    slot.1 = value;
                }

                I::Call(name) => {
                    let callee = self
                        .artifact
                        .function(name)
                        .ok_or_else(|| VmError::UnknownFunction(name.clone()))?;
                    let argc = callee.params.len();
                    if stack.len() < argc {
                        return Err(VmError::StackUnderflow);
                    }
                    let args = stack.split_off(stack.len() - argc);
                    if let Some(value) = self.exec(callee, args)? {
                        stack.push(value);
                    }
                }
                I::RetInt => {
                    let v = pop_int(&mut stack)?;
                    return Ok(Some(Value::Int(v)));
                }
                I::RetReal => {
                    let v = pop_real(&mut stack)?;
                    return Ok(Some(Value::Real(v)));
                }
                I::RetRef => {
                    let v = pop(&mut stack)?;
                    return Ok(Some(v));
                }
                I::Ret => return Ok(None),

                I::Dup => {
                    let top = stack.last().cloned().ok_or(VmError::StackUnderflow)?;
                    stack.push(top);
                }
                I::Pop => {
                    pop(&mut stack)?;
                }

                I::Fault(msg) => return Err(VmError::Fault(msg.to_string())),
                I::Write(kind) => {
                    let value = pop(&mut stack)?;
                    self.write_value(*kind, value)?;
                }
            }
        }

        Ok(None)
    }

    fn write_value(&mut self, kind: ValueKind, value: Value) -> VmResult<()> {
        match (kind, value) {
            (ValueKind::Int, Value::Int(v)) => write!(self.out, "{}", v).unwrap(),
            (ValueKind::Real, Value::Real(v)) => write!(self.out, "{:?}", v).unwrap(),
            (ValueKind::Str, Value::Str(v)) => self.out.push_str(&v),
            (ValueKind::Ref, Value::Null) => self.out.push_str("null"),
            (ValueKind::Ref, Value::Record(record)) => {
                write!(self.out, "<{}>", record.borrow().type_name).unwrap()
            }
            (ValueKind::Ref, Value::Array(_)) => self.out.push_str("<array>"),
            (ValueKind::Ref, Value::Str(v)) => self.out.push_str(&v),
            _ => return Err(VmError::TypeMismatch("write")),
        }
        Ok(())
    }
}

fn scan_labels(code: &[Instr]) -> HashMap<Label, usize> {
    code.iter()
        .enumerate()
        .filter_map(|(pc, instr)| match instr {
            Instr::Mark(label) => Some((*label, pc)),
            _ => None,
        })
        .collect()
}

#[inline]
fn branch_target(labels: &HashMap<Label, usize>, label: Label) -> VmResult<usize> {
    labels.get(&label).copied().ok_or(VmError::UnknownLabel(label))
}

#[inline]
fn slot_width(kind: ValueKind) -> usize {
    match kind {
        ValueKind::Real => 2,
        _ => 1,
    }
}

fn pop(stack: &mut Vec<Value>) -> VmResult<Value> {
    stack.pop().ok_or(VmError::StackUnderflow)
}

fn pop_int(stack: &mut Vec<Value>) -> VmResult<i64> {
    match pop(stack)? {
        Value::Int(v) => Ok(v),
        _ => Err(VmError::TypeMismatch("integer operand")),
    }
}

fn pop_real(stack: &mut Vec<Value>) -> VmResult<f64> {
    match pop(stack)? {
        Value::Real(v) => Ok(v),
        _ => Err(VmError::TypeMismatch("real operand")),
    }
}

fn pop_array(stack: &mut Vec<Value>) -> VmResult<Rc<RefCell<Vec<Value>>>> {
    match pop(stack)? {
        Value::Array(array) => Ok(array),
        Value::Null => Err(VmError::NullReference),
        _ => Err(VmError::TypeMismatch("array operand")),
    }
}

fn pop_record(stack: &mut Vec<Value>) -> VmResult<Rc<RefCell<RecordObj>>> {
    match pop(stack)? {
        Value::Record(record) => Ok(record),
        Value::Null => Err(VmError::NullReference),
        _ => Err(VmError::TypeMismatch("record operand")),
    }
}

fn checked_index(array: &[Value], index: i64) -> VmResult<Value> {
    if index < 0 || index as usize >= array.len() {
        return Err(VmError::IndexOutOfRange {
            index,
            len: array.len(),
        });
    }
    Ok(array[index as usize].clone())
}

fn int_binop(stack: &mut Vec<Value>, f: impl Fn(i64, i64) -> i64) -> VmResult<()> {
    let rhs = pop_int(stack)?;
    let lhs = pop_int(stack)?;
    stack.push(Value::Int(f(lhs, rhs)));
    Ok(())
}

fn real_binop(stack: &mut Vec<Value>, f: impl Fn(f64, f64) -> f64) -> VmResult<()> {
    let rhs = pop_real(stack)?;
    let lhs = pop_real(stack)?;
    stack.push(Value::Real(f(lhs, rhs)));
    Ok(())
}
