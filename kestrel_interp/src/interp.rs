//! Statement execution and expression evaluation.
use crate::value::{RuntimeError, Value};
use kestrel_compiler::types::{Ty, TypeTable};
use kestrel_tree::{BinOp, Expr, NodeId, NodeKind, Stmt, Tree, UnOp};
use log::debug;
use smol_str::SmolStr;
use std::collections::HashMap;

/// Maximum call nesting before execution is aborted.
const MAX_CALL_DEPTH: usize = 256;

/// Interpret a program tree and return its printed output.
pub fn interpret(tree: &Tree) -> Result<String, RuntimeError> {
    let mut interp = Interpreter::new(tree);
    interp.run()?;
    Ok(interp.take_output())
}

/// Function-local bindings. `None` outside of any call, where the
/// active scope is the globals.
type Frame = Option<HashMap<SmolStr, Value>>;

/// Control signal propagated out of statement execution.
enum Flow {
    Normal,
    Return(Option<Value>),
}

/// Interpreter context: global bindings, the function list and the
/// captured output. Built fresh per run.
pub struct Interpreter<'t> {
    tree: &'t Tree,
    types: TypeTable,
    funcs: HashMap<SmolStr, NodeId>,
    globals: HashMap<SmolStr, Value>,
    out: String,
    depth: usize,
}

impl<'t> Interpreter<'t> {
    pub fn new(tree: &'t Tree) -> Self {
        Self {
            tree,
            types: TypeTable::build(tree),
            funcs: HashMap::new(),
            globals: HashMap::new(),
            out: String::new(),
            depth: 0,
        }
    }

    /// Execute global declarations and top-level statements in source
    /// order.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let tree = self.tree;
        let Some(program) = tree.as_program(tree.root()) else {
            return Err(RuntimeError::TypeError("tree root is not a program".into()));
        };

        for &item in &program.items {
            if let Some(func) = tree.as_function(item) {
                self.funcs.insert(func.name.clone(), item);
            }
        }

        let mut frame: Frame = None;
        for &item in &program.items {
            match tree.kind(item) {
                NodeKind::Decl(_) => self.exec_decl(item, &mut frame)?,
                NodeKind::Stmt(_) => match self.exec_stmt(item, &mut frame)? {
                    Flow::Normal => {}
                    Flow::Return(_) => return Err(RuntimeError::ReturnOutsideFunction),
                },
                NodeKind::Function(_) | NodeKind::TypeAlias(_) => {}
                _ => {
                    return Err(RuntimeError::TypeError(
                        "unexpected node at program level".into(),
                    ))
                }
            }
        }
        Ok(())
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.out)
    }

    fn resolve_type(&self, id: NodeId) -> Result<Ty, RuntimeError> {
        self.types
            .resolve(self.tree, id)
            .map_err(|err| RuntimeError::TypeError(err.to_string()))
    }

    /// Default value for a declared type. Nested composite storage
    /// starts as an unset reference.
    fn default_for(&self, ty: &Ty) -> Value {
        match ty {
            Ty::Int => Value::Int(0),
            Ty::Real => Value::Real(0.0),
            Ty::Bool => Value::Bool(false),
            Ty::Str => Value::Str(SmolStr::new("")),
            Ty::Array { len, elem } => {
                let fill = match elem.as_ref() {
                    Ty::Array { .. } | Ty::Record(_) => Value::Null,
                    other => self.default_for(other),
                };
                Value::Array(std::rc::Rc::new(std::cell::RefCell::new(vec![fill; *len])))
            }
            Ty::Record(record) => {
                let fields = record
                    .fields
                    .iter()
                    .map(|(name, field_ty)| {
                        let value = match field_ty {
                            Ty::Array { .. } | Ty::Record(_) => Value::Null,
                            other => self.default_for(other),
                        };
                        (name.clone(), value)
                    })
                    .collect();
                Value::Record(std::rc::Rc::new(std::cell::RefCell::new(fields)))
            }
        }
    }

    fn exec_decl(&mut self, id: NodeId, frame: &mut Frame) -> Result<(), RuntimeError> {
        let tree = self.tree;
        let Some(decl) = tree.as_decl(id) else {
            return Err(RuntimeError::TypeError("expected a declaration".into()));
        };

        let ty = self.resolve_type(decl.ty)?;
        let default = self.default_for(&ty);
        let value = match decl.init {
            // Composite declarations are structural; an initializer
            // only applies to scalars.
            Some(init) if !matches!(ty, Ty::Array { .. } | Ty::Record(_)) => {
                let value = self.eval(init, frame)?;
                coerce(&default, value)?
            }
            _ => default,
        };

        let scope = frame.as_mut().unwrap_or(&mut self.globals);
        scope.insert(decl.name.clone(), value);
        Ok(())
    }

    fn exec_stmt(&mut self, id: NodeId, frame: &mut Frame) -> Result<Flow, RuntimeError> {
        let tree = self.tree;
        let Some(stmt) = tree.as_stmt(id) else {
            // Local declarations in statement position.
            self.exec_decl(id, frame)?;
            return Ok(Flow::Normal);
        };

        match stmt.clone() {
            Stmt::Assign { target, value } => {
                self.exec_assign(target, value, frame)?;
                Ok(Flow::Normal)
            }
            Stmt::Return { value } => {
                let value = match value {
                    Some(value) => Some(self.eval(value, frame)?),
                    None => None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If { cond, then_body, else_body } => {
                if self.eval_condition(cond, frame)? {
                    self.exec_stmt(then_body, frame)
                } else if let Some(else_body) = else_body {
                    self.exec_stmt(else_body, frame)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_condition(cond, frame)? {
                    if let Flow::Return(value) = self.exec_stmt(body, frame)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For { iter, start, end, body } => {
                let start = self.eval_int(start, frame, "'for' start bound")?;
                let end = self.eval_int(end, frame, "'for' end bound")?;

                // The iterator exists for the duration of the loop.
                let scope = frame.as_mut().unwrap_or(&mut self.globals);
                scope.insert(iter.clone(), Value::Int(start));

                let mut i = start;
                let mut flow = Flow::Normal;
                while i <= end {
                    let scope = frame.as_mut().unwrap_or(&mut self.globals);
                    scope.insert(iter.clone(), Value::Int(i));
                    if let Flow::Return(value) = self.exec_stmt(body, frame)? {
                        flow = Flow::Return(value);
                        break;
                    }
                    i += 1;
                }

                let scope = frame.as_mut().unwrap_or(&mut self.globals);
                scope.remove(&iter);
                Ok(flow)
            }
            Stmt::Block { stmts } => {
                for stmt in stmts {
                    if let Flow::Return(value) = self.exec_stmt(stmt, frame)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Print { value } => {
                let value = self.eval(value, frame)?;
                self.out.push_str(&value.render());
                self.out.push('\n');
                Ok(Flow::Normal)
            }
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    fn exec_assign(&mut self, target: NodeId, value: NodeId, frame: &mut Frame) -> Result<(), RuntimeError> {
        let tree = self.tree;
        match tree.as_expr(target) {
            Some(Expr::Ident(name)) => {
                let name = name.clone();
                let new = self.eval(value, frame)?;
                let scope = if frame.as_ref().is_some_and(|scope| scope.contains_key(&name)) {
                    frame.as_mut().unwrap()
                } else if self.globals.contains_key(&name) {
                    &mut self.globals
                } else {
                    return Err(RuntimeError::Undefined(name));
                };
                let existing = scope.get(&name).unwrap();
                let coerced = coerce(existing, new)?;
                scope.insert(name, coerced);
                Ok(())
            }
            Some(Expr::Index { array, index }) => {
                let (array, index) = (*array, *index);
                let array = self.eval_array(array, frame)?;
                let index = self.eval_int(index, frame, "array index")?;
                let new = self.eval(value, frame)?;

                let mut array = array.borrow_mut();
                let len = array.len();
                if index < 0 || index as usize >= len {
                    return Err(RuntimeError::IndexOutOfRange { index, len });
                }
                array[index as usize] = coerce(&array[index as usize], new)?;
                Ok(())
            }
            Some(Expr::Field { record, field }) => {
                let (record, field) = (*record, field.clone());
                let record = self.eval_record(record, frame)?;
                let new = self.eval(value, frame)?;

                let mut record = record.borrow_mut();
                let slot = record
                    .iter_mut()
                    .find(|(name, _)| *name == field)
                    .ok_or(RuntimeError::UnknownField(field))?;
                slot.1 = coerce(&slot.1, new)?;
                Ok(())
            }
            _ => Err(RuntimeError::TypeError("invalid assignment target".into())),
        }
    }

    fn eval(&mut self, id: NodeId, frame: &mut Frame) -> Result<Value, RuntimeError> {
        let tree = self.tree;
        let Some(expr) = tree.as_expr(id) else {
            return Err(RuntimeError::TypeError(
                "unexpected node in expression position".into(),
            ));
        };

        match expr.clone() {
            Expr::Int(value) => Ok(Value::Int(value)),
            Expr::Real(value) => Ok(Value::Real(value)),
            Expr::Bool(value) => Ok(Value::Bool(value)),
            Expr::Str(value) => Ok(Value::Str(value)),
            Expr::Ident(name) => frame
                .as_ref()
                .and_then(|scope| scope.get(&name))
                .or_else(|| self.globals.get(&name))
                .cloned()
                .ok_or(RuntimeError::Undefined(name)),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, frame)?;
                let rhs = self.eval(rhs, frame)?;
                eval_binary(op, lhs, rhs)
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr, frame)?;
                eval_unary(op, value)
            }
            Expr::Index { array, index } => {
                let array = self.eval_array(array, frame)?;
                let index = self.eval_int(index, frame, "array index")?;
                let array = array.borrow();
                if index < 0 || index as usize >= array.len() {
                    return Err(RuntimeError::IndexOutOfRange {
                        index,
                        len: array.len(),
                    });
                }
                Ok(array[index as usize].clone())
            }
            Expr::Field { record, field } => {
                let record = self.eval_record(record, frame)?;
                let record = record.borrow();
                record
                    .iter()
                    .find(|(name, _)| *name == field)
                    .map(|(_, value)| value.clone())
                    .ok_or(RuntimeError::UnknownField(field))
            }
            Expr::Call { name, args } => self.eval_call(name, &args, frame),
        }
    }

    fn eval_call(&mut self, name: SmolStr, args: &[NodeId], frame: &mut Frame) -> Result<Value, RuntimeError> {
        let tree = self.tree;
        let func_id = *self
            .funcs
            .get(&name)
            .ok_or_else(|| RuntimeError::UndefinedFunction(name.clone()))?;
        let func = tree
            .as_function(func_id)
            .ok_or_else(|| RuntimeError::UndefinedFunction(name.clone()))?;

        if args.len() != func.params.len() {
            return Err(RuntimeError::ArityMismatch(name));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded);
        }

        // Arguments evaluate left to right in the caller's frame and
        // bind like assignments to the parameters.
        let mut callee_frame: Frame = Some(HashMap::new());
        for (&arg, &param) in args.iter().zip(&func.params) {
            let decl = tree
                .as_decl(param)
                .ok_or_else(|| RuntimeError::TypeError("malformed function parameter".into()))?;
            let ty = self.resolve_type(decl.ty)?;
            let default = self.default_for(&ty);
            let value = self.eval(arg, frame)?;
            let bound = coerce(&default, value)?;
            callee_frame.as_mut().unwrap().insert(decl.name.clone(), bound);
        }

        debug!("calling function '{}'", name);
        self.depth += 1;
        let flow = self.exec_stmt(func.body, &mut callee_frame);
        self.depth -= 1;

        let ret_ty = match func.ret {
            Some(ret) => Some(self.resolve_type(ret)?),
            None => None,
        };
        let Some(ret_ty) = ret_ty else {
            return Err(RuntimeError::TypeError(format!(
                "function '{}' does not produce a value",
                name
            )));
        };

        match flow? {
            Flow::Return(Some(value)) => coerce(&self.default_for(&ret_ty), value),
            // Falling off the end, or a bare return, yields the
            // default value for the declared return type.
            Flow::Return(None) | Flow::Normal => Ok(self.default_for(&ret_ty)),
        }
    }

    fn eval_condition(&mut self, id: NodeId, frame: &mut Frame) -> Result<bool, RuntimeError> {
        match self.eval(id, frame)? {
            Value::Bool(value) => Ok(value),
            other => Err(RuntimeError::TypeError(format!(
                "condition must be Boolean, found {}",
                other.render()
            ))),
        }
    }

    fn eval_int(&mut self, id: NodeId, frame: &mut Frame, context: &str) -> Result<i64, RuntimeError> {
        match self.eval(id, frame)? {
            Value::Int(value) => Ok(value),
            other => Err(RuntimeError::TypeError(format!(
                "{} must be Integer, found {}",
                context,
                other.render()
            ))),
        }
    }

    fn eval_array(
        &mut self,
        id: NodeId,
        frame: &mut Frame,
    ) -> Result<std::rc::Rc<std::cell::RefCell<Vec<Value>>>, RuntimeError> {
        match self.eval(id, frame)? {
            Value::Array(array) => Ok(array),
            Value::Null => Err(RuntimeError::NullReference),
            other => Err(RuntimeError::TypeError(format!(
                "cannot index {}",
                other.render()
            ))),
        }
    }

    fn eval_record(
        &mut self,
        id: NodeId,
        frame: &mut Frame,
    ) -> Result<std::rc::Rc<std::cell::RefCell<Vec<(SmolStr, Value)>>>, RuntimeError> {
        match self.eval(id, frame)? {
            Value::Record(record) => Ok(record),
            Value::Null => Err(RuntimeError::NullReference),
            other => Err(RuntimeError::TypeError(format!(
                "cannot access a field of {}",
                other.render()
            ))),
        }
    }
}

/// Store `new` into a location currently holding `existing`, applying
/// the implicit conversions of the language: Real narrows (truncating)
/// into an Integer location, an Integer widens into a Real location,
/// and an Integer collapses to its truth value in a Boolean location.
fn coerce(existing: &Value, new: Value) -> Result<Value, RuntimeError> {
    match (existing, new) {
        (Value::Int(_), Value::Int(v)) => Ok(Value::Int(v)),
        (Value::Int(_), Value::Real(v)) => Ok(Value::Int(v as i64)),
        (Value::Real(_), Value::Real(v)) => Ok(Value::Real(v)),
        (Value::Real(_), Value::Int(v)) => Ok(Value::Real(v as f64)),
        (Value::Bool(_), Value::Bool(v)) => Ok(Value::Bool(v)),
        (Value::Bool(_), Value::Int(v)) => Ok(Value::Bool(v != 0)),
        (Value::Str(_), Value::Str(v)) => Ok(Value::Str(v)),
        (Value::Array(_), new @ Value::Array(_)) => Ok(new),
        (Value::Record(_), new @ Value::Record(_)) => Ok(new),
        (Value::Null, new @ (Value::Array(_) | Value::Record(_) | Value::Null)) => Ok(new),
        (existing, new) => Err(RuntimeError::TypeError(format!(
            "cannot assign {} to a location holding {}",
            new.render(),
            existing.render()
        ))),
    }
}

/// Binary operators over runtime values. Mixed Integer/Real operands
/// promote to Real before arithmetic or comparison.
fn eval_binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    use BinOp as B;
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => match op {
            B::Add => Ok(Value::Int(a.wrapping_add(b))),
            B::Sub => Ok(Value::Int(a.wrapping_sub(b))),
            B::Mul => Ok(Value::Int(a.wrapping_mul(b))),
            B::Div => {
                if b == 0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    Ok(Value::Int(a.wrapping_div(b)))
                }
            }
            B::Eq => Ok(Value::Bool(a == b)),
            B::Lt => Ok(Value::Bool(a < b)),
            B::Gt => Ok(Value::Bool(a > b)),
            B::And | B::Or | B::Xor => Err(RuntimeError::TypeError(
                "boolean operations require Boolean types".into(),
            )),
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            B::And => Ok(Value::Bool(a && b)),
            B::Or => Ok(Value::Bool(a || b)),
            B::Xor => Ok(Value::Bool(a ^ b)),
            _ => Err(RuntimeError::TypeError(
                "operation requires numeric types".into(),
            )),
        },
        (lhs, rhs) => {
            // Any remaining pair must be numeric; mixed operands
            // promote to Real.
            let (a, b) = match (lhs, rhs) {
                (Value::Real(a), Value::Real(b)) => (a, b),
                (Value::Real(a), Value::Int(b)) => (a, b as f64),
                (Value::Int(a), Value::Real(b)) => (a as f64, b),
                _ => {
                    return Err(RuntimeError::TypeError(
                        "operation requires numeric types".into(),
                    ))
                }
            };
            match op {
                B::Add => Ok(Value::Real(a + b)),
                B::Sub => Ok(Value::Real(a - b)),
                B::Mul => Ok(Value::Real(a * b)),
                B::Div => Ok(Value::Real(a / b)),
                B::Eq => Ok(Value::Bool(a == b)),
                B::Lt => Ok(Value::Bool(a < b)),
                B::Gt => Ok(Value::Bool(a > b)),
                B::And | B::Or | B::Xor => Err(RuntimeError::TypeError(
                    "boolean operations require Boolean types".into(),
                )),
            }
        }
    }
}

fn eval_unary(op: UnOp, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
        (UnOp::Neg, Value::Real(v)) => Ok(Value::Real(-v)),
        (UnOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnOp::Neg, _) => Err(RuntimeError::TypeError(
            "unary minus requires a numeric type".into(),
        )),
        (UnOp::Not, _) => Err(RuntimeError::TypeError(
            "'NOT' operator requires Boolean type".into(),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kestrel_tree::TreeBuilder;

    #[test]
    fn test_for_loop_sums_inclusive_range() {
        // total: Integer; for i := 1 .. 5 { total := total + i }; print total
        let mut b = TreeBuilder::new();
        let ty = b.ty_int();
        let decl = b.decl("total", ty, None);
        let total = b.ident("total");
        let i = b.ident("i");
        let sum = b.binary(BinOp::Add, total, i);
        let target = b.ident("total");
        let assign = b.assign(target, sum);
        let one = b.int(1);
        let five = b.int(5);
        let body = b.block(vec![assign]);
        let for_loop = b.for_loop("i", one, five, body);
        let total_again = b.ident("total");
        let print = b.print(total_again);
        b.program(vec![decl, for_loop, print]);
        let tree = b.finish();

        assert_eq!(interpret(&tree).unwrap(), "15\n");
    }

    #[test]
    fn test_truncating_assignment() {
        let mut b = TreeBuilder::new();
        let ty = b.ty_int();
        let init = b.real(3.9);
        let decl = b.decl("x", ty, Some(init));
        let x = b.ident("x");
        let print = b.print(x);
        b.program(vec![decl, print]);
        let tree = b.finish();

        assert_eq!(interpret(&tree).unwrap(), "3\n");
    }

    #[test]
    fn test_division_by_zero_faults() {
        let mut b = TreeBuilder::new();
        let ty = b.ty_int();
        let one = b.int(1);
        let zero = b.int(0);
        let div = b.binary(BinOp::Div, one, zero);
        let decl = b.decl("x", ty, Some(div));
        b.program(vec![decl]);
        let tree = b.finish();

        assert_eq!(interpret(&tree), Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_record_field_roundtrip() {
        // type Point = Record { x: Integer, y: Real }
        // p: Point; p.x := 4; print p
        let mut b = TreeBuilder::new();
        let int = b.ty_int();
        let real = b.ty_real();
        let rec = b.ty_record(vec![("x", int), ("y", real)]);
        let alias = b.type_alias("Point", rec);
        let named = b.ty_named("Point");
        let decl = b.decl("p", named, None);
        let p = b.ident("p");
        let field = b.field(p, "x");
        let four = b.int(4);
        let assign = b.assign(field, four);
        let p_again = b.ident("p");
        let print = b.print(p_again);
        b.program(vec![alias, decl, assign, print]);
        let tree = b.finish();

        assert_eq!(interpret(&tree).unwrap(), "{\"x\": 4, \"y\": 0.0}\n");
    }

    #[test]
    fn test_function_default_return_on_fall_through() {
        // fn f() -> Integer { }  ... print f()
        let mut b = TreeBuilder::new();
        let ret = b.ty_int();
        let body = b.block(vec![]);
        let func = b.function("f", vec![], Some(ret), body);
        let call = b.call("f", vec![]);
        let print = b.print(call);
        b.program(vec![func, print]);
        let tree = b.finish();

        assert_eq!(interpret(&tree).unwrap(), "0\n");
    }
}
