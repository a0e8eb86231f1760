//! Code generator.
//!
//! Walks the checked, optimized tree and emits one primary module
//! (every source function plus a synthetic entry routine for globals
//! and top-level statements) and one auxiliary module per synthesized
//! record type. Unlike the checker, the generator is the enforcement
//! point of last resort: any inconsistency that reaches it aborts
//! artifact production with a fatal error, and no partially built
//! artifact escapes.
mod builtins;
mod records;
mod slots;

use crate::symbol::{FunSig, FunctionTable};
use crate::types::{identical, Ty, TypeTable};
use builtins::Builtins;
use kestrel_bytecode::{Artifact, FunctionDef, Instr, Label, Module, RetWidth, ValueKind};
use kestrel_tree::{BinOp, Expr, NodeId, NodeKind, Stmt, Tree, UnOp};
use records::{value_kind, RecordRegistry};
use slots::SlotTable;
use smol_str::SmolStr;
use std::fmt;

pub type GenResult<T> = std::result::Result<T, GenError>;

/// Fatal code generation failure. The checker reports these
/// conditions as non-fatal diagnostics; if one survives to generation
/// the artifact is abandoned instead.
#[derive(Debug, Clone, PartialEq)]
pub enum GenError {
    TypeMismatch(String),
    Undeclared(SmolStr),
    UndeclaredFunction(SmolStr),
    UndefinedType(String),
    UnknownField { record: String, field: SmolStr },
    InvalidAssignmentTarget,
    DuplicateFunction(SmolStr),
    ArityMismatch { name: SmolStr, expected: usize, found: usize },
    UnsupportedConstruct(String),
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use GenError as E;
        match self {
            E::TypeMismatch(msg) => write!(f, "type mismatch: {}", msg),
            E::Undeclared(name) => write!(f, "variable '{}' is not declared", name),
            E::UndeclaredFunction(name) => write!(f, "function '{}' is not declared", name),
            E::UndefinedType(msg) => write!(f, "{}", msg),
            E::UnknownField { record, field } => {
                write!(f, "field '{}' not found in {}", field, record)
            }
            E::InvalidAssignmentTarget => write!(f, "unsupported assignment target"),
            E::DuplicateFunction(name) => write!(f, "function '{}' is already declared", name),
            E::ArityMismatch { name, expected, found } => write!(
                f,
                "function '{}' expects {} argument(s), found {}",
                name, expected, found
            ),
            E::UnsupportedConstruct(msg) => write!(f, "unsupported construct: {}", msg),
        }
    }
}

impl std::error::Error for GenError {}

/// Generate an artifact from a program tree.
pub fn generate(tree: &Tree) -> GenResult<Artifact> {
    Generator::new(tree).generate()
}

/// Generator context. Owns every table and output buffer; consumed by
/// the final assemble step so a failure leaves nothing observable.
pub struct Generator<'t> {
    tree: &'t Tree,
    types: TypeTable,
    funcs: FunctionTable,
    records: RecordRegistry,
    builtins: Builtins,
    slots: SlotTable,
    code: Vec<Instr>,
    next_label: u16,
    current_ret: Option<Ty>,
    functions: Vec<FunctionDef>,
}

impl<'t> Generator<'t> {
    pub fn new(tree: &'t Tree) -> Self {
        Self {
            tree,
            types: TypeTable::build(tree),
            funcs: FunctionTable::new(),
            records: RecordRegistry::new(),
            builtins: Builtins::new(),
            slots: SlotTable::new(),
            code: Vec::new(),
            next_label: 0,
            current_ret: None,
            functions: Vec::new(),
        }
    }

    pub fn generate(mut self) -> GenResult<Artifact> {
        let tree = self.tree;
        let program = tree
            .as_program(tree.root())
            .ok_or_else(|| GenError::UnsupportedConstruct("tree root is not a program".into()))?;

        // Populate the function table before generating any body so
        // forward and mutual recursion link.
        self.collect_functions(&program.items)?;

        for &item in &program.items {
            if tree.as_function(item).is_some() {
                self.gen_function(item)?;
            }
        }

        self.gen_entry(&program.items)?;

        // Assemble only after every function generated cleanly.
        let mut primary = Module {
            name: SmolStr::new("main"),
            fields: vec![],
            functions: self.functions,
        };
        primary.functions.extend(self.builtins.into_functions());

        Ok(Artifact {
            primary,
            records: self.records.into_modules(),
        })
    }

    fn collect_functions(&mut self, items: &[NodeId]) -> GenResult<()> {
        let tree = self.tree;
        for &item in items {
            let Some(func) = tree.as_function(item) else {
                continue;
            };
            let mut params = Vec::with_capacity(func.params.len());
            for &param in &func.params {
                let decl = tree.as_decl(param).ok_or_else(|| {
                    GenError::UnsupportedConstruct(format!(
                        "malformed parameter of function '{}'",
                        func.name
                    ))
                })?;
                params.push(self.resolve_type(decl.ty)?);
            }
            let ret = match func.ret {
                Some(ret) => Some(self.resolve_type(ret)?),
                None => None,
            };
            if self.funcs.insert(&func.name, FunSig { params, ret }).is_err() {
                return Err(GenError::DuplicateFunction(func.name.clone()));
            }
        }
        Ok(())
    }

    fn resolve_type(&self, id: NodeId) -> GenResult<Ty> {
        self.types
            .resolve(self.tree, id)
            .map_err(|err| GenError::UndefinedType(err.to_string()))
    }

    #[inline]
    fn emit(&mut self, instr: Instr) {
        self.code.push(instr);
    }

    #[inline]
    fn fresh_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Begin a fresh function body: slots, labels and the code buffer
    /// all reset.
    fn reset_function(&mut self, ret: Option<Ty>) {
        self.slots.reset();
        self.code.clear();
        self.next_label = 0;
        self.current_ret = ret;
    }

    fn finish_function(&mut self, name: SmolStr, params: Vec<ValueKind>) {
        let def = FunctionDef {
            name,
            params,
            ret: ret_width(self.current_ret.as_ref()),
            locals: self.slots.count(),
            code: std::mem::take(&mut self.code),
        };
        self.functions.push(def);
    }

    fn gen_function(&mut self, id: NodeId) -> GenResult<()> {
        let tree = self.tree;
        let func = tree
            .as_function(id)
            .ok_or_else(|| GenError::UnsupportedConstruct("expected a function".into()))?;

        let ret = match func.ret {
            Some(ret) => Some(self.resolve_type(ret)?),
            None => None,
        };
        self.reset_function(ret);

        // Parameters claim the leading slots in declaration order.
        let mut param_kinds = Vec::with_capacity(func.params.len());
        for &param in &func.params {
            let decl = tree.as_decl(param).ok_or_else(|| {
                GenError::UnsupportedConstruct("malformed function parameter".into())
            })?;
            let ty = self.resolve_type(decl.ty)?;
            param_kinds.push(value_kind(&ty));
            self.slots.declare(&decl.name, ty);
        }

        self.gen_stmt(func.body)?;

        // A body that completes without an explicit return produces
        // the default value for the declared return type.
        self.emit_default_return();
        self.finish_function(func.name.clone(), param_kinds);
        Ok(())
    }

    /// Synthetic entry routine holding global declarations and
    /// top-level statements.
    fn gen_entry(&mut self, items: &[NodeId]) -> GenResult<()> {
        let tree = self.tree;
        self.reset_function(None);

        for &item in items {
            match tree.kind(item) {
                NodeKind::Decl(_) => self.gen_decl(item)?,
                NodeKind::Stmt(_) => self.gen_stmt(item)?,
                NodeKind::Function(_) | NodeKind::TypeAlias(_) => {}
                _ => {
                    return Err(GenError::UnsupportedConstruct(
                        "unexpected node at program level".into(),
                    ))
                }
            }
        }

        self.emit(Instr::Ret);
        self.finish_function(SmolStr::new("entry"), vec![]);
        Ok(())
    }

    fn gen_decl(&mut self, id: NodeId) -> GenResult<()> {
        let tree = self.tree;
        let decl = tree
            .as_decl(id)
            .ok_or_else(|| GenError::UnsupportedConstruct("expected a declaration".into()))?;

        let ty = self.resolve_type(decl.ty)?;
        let slot = self.slots.declare(&decl.name, ty.clone());

        match &ty {
            Ty::Array { len, elem } => {
                // Arrays are allocated structurally at declaration.
                self.emit(Instr::ConstInt(*len as i64));
                self.emit(Instr::NewArray(value_kind(elem)));
                self.emit(Instr::StoreRef(slot));
            }
            Ty::Record(record) => {
                let name = self.records.ensure(record);
                self.emit(Instr::NewRecord(name));
                self.emit(Instr::StoreRef(slot));
            }
            _ => match decl.init {
                Some(init) => {
                    let source = self.gen_expr(init)?;
                    self.emit_conversion(&ty, &source)?;
                    self.emit_store(slot, &ty);
                }
                None => {
                    self.emit_default_value(&ty);
                    self.emit_store(slot, &ty);
                }
            },
        }
        Ok(())
    }

    fn gen_stmt(&mut self, id: NodeId) -> GenResult<()> {
        let tree = self.tree;
        let Some(stmt) = tree.as_stmt(id) else {
            // Local declarations appear in statement position.
            if tree.as_decl(id).is_some() {
                return self.gen_decl(id);
            }
            return Err(GenError::UnsupportedConstruct(
                "unexpected node in statement position".into(),
            ));
        };

        match stmt.clone() {
            Stmt::Assign { target, value } => self.gen_assign(target, value),
            Stmt::Return { value } => self.gen_return(value),
            Stmt::If { cond, then_body, else_body } => {
                let else_label = self.fresh_label();
                let end_label = self.fresh_label();

                self.gen_condition(cond, "'if' condition")?;
                self.emit(Instr::BranchZero(else_label));
                self.gen_stmt(then_body)?;
                self.emit(Instr::Jump(end_label));
                self.emit(Instr::Mark(else_label));
                if let Some(else_body) = else_body {
                    self.gen_stmt(else_body)?;
                }
                self.emit(Instr::Mark(end_label));
                Ok(())
            }
            Stmt::While { cond, body } => {
                let head = self.fresh_label();
                let end = self.fresh_label();

                self.emit(Instr::Mark(head));
                self.gen_condition(cond, "'while' condition")?;
                self.emit(Instr::BranchZero(end));
                self.gen_stmt(body)?;
                self.emit(Instr::Jump(head));
                self.emit(Instr::Mark(end));
                Ok(())
            }
            Stmt::For { iter, start, end, body } => {
                // The iterator slot is claimed for the whole function;
                // slots are never reused.
                let slot = self.slots.declare(&iter, Ty::Int);

                let start_ty = self.gen_expr(start)?;
                self.require_int(&start_ty, "'for' start bound")?;
                self.emit(Instr::StoreInt(slot));

                let head = self.fresh_label();
                let exit = self.fresh_label();

                self.emit(Instr::Mark(head));
                self.emit(Instr::LoadInt(slot));
                let end_ty = self.gen_expr(end)?;
                self.require_int(&end_ty, "'for' end bound")?;
                // Inclusive range: leave the loop once the iterator
                // exceeds the end bound.
                self.emit(Instr::BranchIntGt(exit));

                self.gen_stmt(body)?;

                self.emit(Instr::LoadInt(slot));
                self.emit(Instr::ConstInt(1));
                self.emit(Instr::AddInt);
                self.emit(Instr::StoreInt(slot));
                self.emit(Instr::Jump(head));
                self.emit(Instr::Mark(exit));
                Ok(())
            }
            Stmt::Block { stmts } => {
                for stmt in stmts {
                    self.gen_stmt(stmt)?;
                }
                Ok(())
            }
            Stmt::Print { value } => self.gen_print(value),
            Stmt::Empty => Ok(()),
        }
    }

    fn gen_assign(&mut self, target: NodeId, value: NodeId) -> GenResult<()> {
        let tree = self.tree;
        match tree.as_expr(target) {
            Some(Expr::Ident(name)) => {
                let var = self
                    .slots
                    .get(name)
                    .cloned()
                    .ok_or_else(|| GenError::Undeclared(name.clone()))?;
                let source = self.gen_expr(value)?;
                self.emit_conversion(&var.ty, &source)?;
                self.emit_store(var.slot, &var.ty);
                Ok(())
            }
            Some(Expr::Index { array, index }) => {
                let (array, index) = (*array, *index);
                let array_ty = self.gen_expr(array)?;
                let elem = match array_ty {
                    Ty::Array { elem, .. } => elem,
                    other => {
                        return Err(GenError::TypeMismatch(format!(
                            "cannot index a value of type {}",
                            other
                        )))
                    }
                };
                let index_ty = self.gen_expr(index)?;
                self.require_int(&index_ty, "array index")?;
                let source = self.gen_expr(value)?;
                self.emit_conversion(&elem, &source)?;
                self.emit(Instr::ArrayStore(value_kind(&elem)));
                Ok(())
            }
            Some(Expr::Field { record, field }) => {
                let (record, field) = (*record, field.clone());
                let record_ty = self.gen_expr(record)?;
                let record_ty = match record_ty {
                    Ty::Record(record_ty) => record_ty,
                    other => {
                        return Err(GenError::TypeMismatch(format!(
                            "cannot access a field of type {}",
                            other
                        )))
                    }
                };
                let field_ty = record_ty
                    .field(&field)
                    .cloned()
                    .ok_or_else(|| GenError::UnknownField {
                        record: Ty::Record(record_ty.clone()).to_string(),
                        field: field.clone(),
                    })?;
                let record_name = self.records.ensure(&record_ty);
                let source = self.gen_expr(value)?;
                self.emit_conversion(&field_ty, &source)?;
                self.emit(Instr::PutField {
                    record: record_name,
                    field,
                    kind: value_kind(&field_ty),
                });
                Ok(())
            }
            _ => Err(GenError::InvalidAssignmentTarget),
        }
    }

    fn gen_return(&mut self, value: Option<NodeId>) -> GenResult<()> {
        match (self.current_ret.clone(), value) {
            (Some(ret), Some(value)) => {
                let source = self.gen_expr(value)?;
                self.emit_conversion(&ret, &source)?;
                self.emit_typed_return(&ret);
                Ok(())
            }
            (Some(_), None) => {
                self.emit_default_return();
                Ok(())
            }
            (None, Some(_)) => Err(GenError::UnsupportedConstruct(
                "'return' with a value in a routine without a return type".into(),
            )),
            (None, None) => {
                self.emit(Instr::Ret);
                Ok(())
            }
        }
    }

    fn gen_print(&mut self, value: NodeId) -> GenResult<()> {
        let ty = self.gen_expr(value)?;
        let routine = match &ty {
            // Booleans print through the integer routine, as their
            // 0/1 encoding.
            Ty::Int | Ty::Bool => self.builtins.print_int(),
            Ty::Real => self.builtins.print_real(),
            Ty::Str => self.builtins.print_str(),
            Ty::Record(record) => self.builtins.print_record(&mut self.records, record),
            Ty::Array { elem, .. } => self.builtins.print_array(elem),
        };
        self.emit(Instr::Call(routine));
        self.emit(Instr::ConstStr(SmolStr::new("\n")));
        self.emit(Instr::Write(ValueKind::Str));
        Ok(())
    }

    /// Generate an expression and return its static type. Instruction
    /// forms are selected by the static type of the left operand.
    fn gen_expr(&mut self, id: NodeId) -> GenResult<Ty> {
        let tree = self.tree;
        let Some(expr) = tree.as_expr(id) else {
            return Err(GenError::UnsupportedConstruct(
                "unexpected node in expression position".into(),
            ));
        };

        match expr.clone() {
            Expr::Int(value) => {
                self.emit(Instr::ConstInt(value));
                Ok(Ty::Int)
            }
            Expr::Real(value) => {
                self.emit(Instr::ConstReal(value));
                Ok(Ty::Real)
            }
            Expr::Bool(value) => {
                self.emit(Instr::ConstInt(value as i64));
                Ok(Ty::Bool)
            }
            Expr::Str(value) => {
                self.emit(Instr::ConstStr(value));
                Ok(Ty::Str)
            }
            Expr::Ident(name) => {
                let var = self
                    .slots
                    .get(&name)
                    .cloned()
                    .ok_or(GenError::Undeclared(name))?;
                self.emit_load(var.slot, &var.ty);
                Ok(var.ty)
            }
            Expr::Binary { op, lhs, rhs } => self.gen_binary(op, lhs, rhs),
            Expr::Unary { op, expr } => self.gen_unary(op, expr),
            Expr::Index { array, index } => {
                let array_ty = self.gen_expr(array)?;
                let elem = match array_ty {
                    Ty::Array { elem, .. } => elem,
                    other => {
                        return Err(GenError::TypeMismatch(format!(
                            "cannot index a value of type {}",
                            other
                        )))
                    }
                };
                let index_ty = self.gen_expr(index)?;
                self.require_int(&index_ty, "array index")?;
                self.emit(Instr::ArrayLoad(value_kind(&elem)));
                Ok(*elem)
            }
            Expr::Field { record, field } => {
                let record_ty = self.gen_expr(record)?;
                let record_ty = match record_ty {
                    Ty::Record(record_ty) => record_ty,
                    other => {
                        return Err(GenError::TypeMismatch(format!(
                            "cannot access a field of type {}",
                            other
                        )))
                    }
                };
                let field_ty = record_ty
                    .field(&field)
                    .cloned()
                    .ok_or_else(|| GenError::UnknownField {
                        record: Ty::Record(record_ty.clone()).to_string(),
                        field: field.clone(),
                    })?;
                let record_name = self.records.ensure(&record_ty);
                self.emit(Instr::GetField {
                    record: record_name,
                    field,
                    kind: value_kind(&field_ty),
                });
                Ok(field_ty)
            }
            Expr::Call { name, args } => {
                let sig = self
                    .funcs
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| GenError::UndeclaredFunction(name.clone()))?;
                if args.len() != sig.params.len() {
                    return Err(GenError::ArityMismatch {
                        name,
                        expected: sig.params.len(),
                        found: args.len(),
                    });
                }
                // Arguments evaluate left to right and bind like
                // assignments to the parameters.
                for (&arg, param_ty) in args.iter().zip(&sig.params) {
                    let arg_ty = self.gen_expr(arg)?;
                    self.emit_conversion(param_ty, &arg_ty)?;
                }
                let ret = sig.ret.ok_or_else(|| {
                    GenError::TypeMismatch(format!(
                        "function '{}' does not produce a value",
                        name
                    ))
                })?;
                self.emit(Instr::Call(name));
                Ok(ret)
            }
        }
    }

    fn gen_binary(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId) -> GenResult<Ty> {
        let lhs_ty = self.gen_expr(lhs)?;
        let _rhs_ty = self.gen_expr(rhs)?;

        use BinOp as B;
        match &lhs_ty {
            Ty::Int | Ty::Bool => {
                match op {
                    B::Add => self.emit(Instr::AddInt),
                    B::Sub => self.emit(Instr::SubInt),
                    B::Mul => self.emit(Instr::MulInt),
                    B::Div => self.emit_guarded_div(),
                    B::Eq => return self.emit_int_compare(Instr::BranchIntEq),
                    B::Lt => return self.emit_int_compare(Instr::BranchIntLt),
                    B::Gt => return self.emit_int_compare(Instr::BranchIntGt),
                    B::And => self.emit(Instr::AndInt),
                    B::Or => self.emit(Instr::OrInt),
                    B::Xor => self.emit(Instr::XorInt),
                }
                if op.is_logical() {
                    Ok(Ty::Bool)
                } else {
                    Ok(lhs_ty)
                }
            }
            Ty::Real => match op {
                B::Add => {
                    self.emit(Instr::AddReal);
                    Ok(Ty::Real)
                }
                B::Sub => {
                    self.emit(Instr::SubReal);
                    Ok(Ty::Real)
                }
                B::Mul => {
                    self.emit(Instr::MulReal);
                    Ok(Ty::Real)
                }
                B::Div => {
                    self.emit(Instr::DivReal);
                    Ok(Ty::Real)
                }
                // Ordered three-way compare, then branch and
                // materialize a Boolean.
                B::Eq => self.emit_real_compare(Instr::BranchZero),
                B::Lt => self.emit_real_compare(Instr::BranchNeg),
                B::Gt => self.emit_real_compare(Instr::BranchPos),
                B::And | B::Or | B::Xor => Err(GenError::UnsupportedConstruct(format!(
                    "operator '{}' on Real operands",
                    op
                ))),
            },
            other => Err(GenError::UnsupportedConstruct(format!(
                "binary operation on operands of type {}",
                other
            ))),
        }
    }

    fn gen_unary(&mut self, op: UnOp, expr: NodeId) -> GenResult<Ty> {
        let ty = self.gen_expr(expr)?;
        match op {
            UnOp::Not => {
                if !matches!(ty, Ty::Bool | Ty::Int) {
                    return Err(GenError::TypeMismatch(format!(
                        "'NOT' requires a Boolean operand, found {}",
                        ty
                    )));
                }
                // Flip the low bit of the 0/1 encoding.
                self.emit(Instr::ConstInt(1));
                self.emit(Instr::XorInt);
                Ok(ty)
            }
            UnOp::Neg => match ty {
                Ty::Int => {
                    self.emit(Instr::NegInt);
                    Ok(Ty::Int)
                }
                Ty::Real => {
                    self.emit(Instr::NegReal);
                    Ok(Ty::Real)
                }
                other => Err(GenError::TypeMismatch(format!(
                    "unary minus requires a numeric operand, found {}",
                    other
                ))),
            },
        }
    }

    /// Integer division with its runtime divisor guard.
    fn emit_guarded_div(&mut self) {
        let ok = self.fresh_label();
        self.emit(Instr::Dup);
        self.emit(Instr::BranchNonZero(ok));
        self.emit(Instr::Fault(SmolStr::new("division by zero")));
        self.emit(Instr::Mark(ok));
        self.emit(Instr::DivInt);
    }

    /// Pop two integers, branch on the comparison and materialize the
    /// resulting Boolean.
    fn emit_int_compare(&mut self, branch: fn(Label) -> Instr) -> GenResult<Ty> {
        let hit = self.fresh_label();
        let end = self.fresh_label();
        self.emit(branch(hit));
        self.emit(Instr::ConstInt(0));
        self.emit(Instr::Jump(end));
        self.emit(Instr::Mark(hit));
        self.emit(Instr::ConstInt(1));
        self.emit(Instr::Mark(end));
        Ok(Ty::Bool)
    }

    /// Three-way compare two reals, then branch on the sign of the
    /// ordering and materialize the resulting Boolean.
    fn emit_real_compare(&mut self, branch: fn(Label) -> Instr) -> GenResult<Ty> {
        self.emit(Instr::CmpReal);
        let hit = self.fresh_label();
        let end = self.fresh_label();
        self.emit(branch(hit));
        self.emit(Instr::ConstInt(0));
        self.emit(Instr::Jump(end));
        self.emit(Instr::Mark(hit));
        self.emit(Instr::ConstInt(1));
        self.emit(Instr::Mark(end));
        Ok(Ty::Bool)
    }

    /// Generate a branch condition. Conditions must carry the 0/1
    /// integer encoding on the stack.
    fn gen_condition(&mut self, cond: NodeId, context: &str) -> GenResult<()> {
        let ty = self.gen_expr(cond)?;
        match ty {
            Ty::Bool | Ty::Int => Ok(()),
            other => Err(GenError::TypeMismatch(format!(
                "{} must be Boolean, found {}",
                context, other
            ))),
        }
    }

    fn require_int(&self, ty: &Ty, context: &str) -> GenResult<()> {
        if *ty == Ty::Int {
            Ok(())
        } else {
            Err(GenError::TypeMismatch(format!(
                "{} must be Integer, found {}",
                context, ty
            )))
        }
    }

    /// Emit the conversion required to store a `source`-typed value
    /// into a `target`-typed location. Identical representations need
    /// none; every other pairing outside the conversion lattice is a
    /// fatal mismatch.
    fn emit_conversion(&mut self, target: &Ty, source: &Ty) -> GenResult<()> {
        match (target, source) {
            (Ty::Bool, Ty::Int) => {
                // Collapse an integer to its truth value: nonzero
                // becomes one.
                let zero = self.fresh_label();
                let end = self.fresh_label();
                self.emit(Instr::BranchZero(zero));
                self.emit(Instr::ConstInt(1));
                self.emit(Instr::Jump(end));
                self.emit(Instr::Mark(zero));
                self.emit(Instr::ConstInt(0));
                self.emit(Instr::Mark(end));
                Ok(())
            }
            (Ty::Int, Ty::Real) => {
                self.emit(Instr::RealToInt);
                Ok(())
            }
            (Ty::Real, Ty::Int) => {
                self.emit(Instr::IntToReal);
                Ok(())
            }
            (target, source) if identical(target, source) => Ok(()),
            (target, source) => Err(GenError::TypeMismatch(format!(
                "cannot assign {} to {}",
                source, target
            ))),
        }
    }

    fn emit_load(&mut self, slot: u16, ty: &Ty) {
        match ty {
            Ty::Int | Ty::Bool => self.emit(Instr::LoadInt(slot)),
            Ty::Real => self.emit(Instr::LoadReal(slot)),
            Ty::Str | Ty::Array { .. } | Ty::Record(_) => self.emit(Instr::LoadRef(slot)),
        }
    }

    fn emit_store(&mut self, slot: u16, ty: &Ty) {
        match ty {
            Ty::Int | Ty::Bool => self.emit(Instr::StoreInt(slot)),
            Ty::Real => self.emit(Instr::StoreReal(slot)),
            Ty::Str | Ty::Array { .. } | Ty::Record(_) => self.emit(Instr::StoreRef(slot)),
        }
    }

    fn emit_default_value(&mut self, ty: &Ty) {
        match ty {
            Ty::Int | Ty::Bool => self.emit(Instr::ConstInt(0)),
            Ty::Real => self.emit(Instr::ConstReal(0.0)),
            Ty::Str => self.emit(Instr::ConstStr(SmolStr::new(""))),
            Ty::Array { .. } | Ty::Record(_) => self.emit(Instr::ConstNull),
        }
    }

    /// Zero/default value followed by the typed return for the current
    /// function's declared return type.
    fn emit_default_return(&mut self) {
        match self.current_ret.clone() {
            None => self.emit(Instr::Ret),
            Some(ty) => {
                self.emit_default_value(&ty);
                self.emit_typed_return(&ty);
            }
        }
    }

    fn emit_typed_return(&mut self, ty: &Ty) {
        match ty {
            Ty::Int | Ty::Bool => self.emit(Instr::RetInt),
            Ty::Real => self.emit(Instr::RetReal),
            Ty::Str | Ty::Array { .. } | Ty::Record(_) => self.emit(Instr::RetRef),
        }
    }
}

#[inline]
fn ret_width(ty: Option<&Ty>) -> RetWidth {
    match ty {
        None => RetWidth::None,
        Some(Ty::Int) | Some(Ty::Bool) => RetWidth::Narrow,
        Some(Ty::Real) => RetWidth::Wide,
        Some(Ty::Str) | Some(Ty::Array { .. }) | Some(Ty::Record(_)) => RetWidth::Ref,
    }
}
