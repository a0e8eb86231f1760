//! Semantic checker.
//!
//! One recursive pass over the tree that validates scoping and types
//! and accumulates diagnostics. Diagnostics are non-fatal by contract:
//! the checker keeps traversing after every finding, and a diagnosed
//! program may still be handed to the code generator, which is the
//! enforcement point of last resort.
use crate::diag::{Diagnostic, DiagnosticKind};
use crate::symbol::{FunSig, FunctionTable, SymbolTable};
use crate::types::{assignable, Ty, TypeTable};
use kestrel_tree::{BinOp, Expr, NodeId, NodeKind, Stmt, Tree, UnOp};
use smol_str::SmolStr;
use std::collections::HashSet;

/// Run the semantic checker over a program tree.
pub fn check(tree: &Tree) -> Vec<Diagnostic> {
    Checker::new(tree).run()
}

/// Checker context. Owns every table it needs, built fresh per
/// compilation and discarded afterwards.
pub struct Checker<'t> {
    tree: &'t Tree,
    types: TypeTable,
    funcs: FunctionTable,
    symbols: SymbolTable,
    used: HashSet<SmolStr>,
    diags: Vec<Diagnostic>,
    in_function: bool,
}

impl<'t> Checker<'t> {
    pub fn new(tree: &'t Tree) -> Self {
        Self {
            tree,
            types: TypeTable::build(tree),
            funcs: FunctionTable::new(),
            symbols: SymbolTable::new(),
            used: HashSet::new(),
            diags: Vec::new(),
            in_function: false,
        }
    }

    pub fn run(mut self) -> Vec<Diagnostic> {
        let tree = self.tree;
        let Some(program) = tree.as_program(tree.root()) else {
            self.report(
                DiagnosticKind::UnsupportedConstruct,
                "tree root is not a program",
            );
            return self.diags;
        };

        // The function table is fully populated before any body is
        // checked, so forward and mutual recursion resolve.
        self.collect_functions(&program.items);

        for &item in &program.items {
            match tree.kind(item) {
                NodeKind::TypeAlias(alias) => {
                    // Surface unresolvable aliases even when unused.
                    let ty = alias.ty;
                    let _ = self.resolve_type(ty);
                }
                NodeKind::Decl(_) => self.check_decl(item),
                NodeKind::Function(_) => self.check_function(item),
                NodeKind::Stmt(_) => self.check_stmt(item),
                _ => self.report(
                    DiagnosticKind::UnsupportedConstruct,
                    "unexpected node at program level",
                ),
            }
        }

        log::debug!(
            "checked program: {} name(s) referenced, {} diagnostic(s)",
            self.used.len(),
            self.diags.len()
        );
        self.diags
    }

    fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.diags.push(Diagnostic::new(kind, message));
    }

    /// Resolve a type node, reporting a diagnostic on failure.
    fn resolve_type(&mut self, id: NodeId) -> Option<Ty> {
        match self.types.resolve(self.tree, id) {
            Ok(ty) => Some(ty),
            Err(err) => {
                self.report(DiagnosticKind::UndefinedType, err.to_string());
                None
            }
        }
    }

    fn collect_functions(&mut self, items: &[NodeId]) {
        let tree = self.tree;
        for &item in items {
            let Some(func) = tree.as_function(item) else {
                continue;
            };
            let mut params = Vec::with_capacity(func.params.len());
            for &param in &func.params {
                let Some(decl) = tree.as_decl(param) else {
                    self.report(
                        DiagnosticKind::UnsupportedConstruct,
                        format!("malformed parameter of function '{}'", func.name),
                    );
                    continue;
                };
                // Unresolvable parameter types degrade to Integer so
                // the signature keeps its arity.
                let ty = decl.ty;
                params.push(self.resolve_type(ty).unwrap_or(Ty::Int));
            }
            let ret = func.ret.and_then(|ret| self.resolve_type(ret));
            let name = func.name.clone();
            if self.funcs.insert(&name, FunSig { params, ret }).is_err() {
                self.report(
                    DiagnosticKind::DuplicateDeclaration,
                    format!("function '{}' is already declared", name),
                );
            }
        }
    }

    fn check_decl(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(decl) = tree.as_decl(id) else { return };
        let name = decl.name.clone();
        let init = decl.init;

        let ty = self.resolve_type(decl.ty).unwrap_or(Ty::Int);
        if self.symbols.declare(&name, ty.clone()).is_err() {
            self.report(
                DiagnosticKind::DuplicateDeclaration,
                format!("variable '{}' is already declared", name),
            );
        }

        if let Some(init) = init {
            self.check_expr(init);
            if let Some(init_ty) = self.type_of(init) {
                if !assignable(&ty, &init_ty) {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "cannot assign expression of type {} to variable '{}' of type {}",
                            init_ty, name, ty
                        ),
                    );
                }
            }
        }
    }

    fn check_function(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(func) = tree.as_function(id) else { return };
        let params = func.params.clone();
        let body = func.body;

        self.symbols.enter_function();
        let previous = self.in_function;
        self.in_function = true;

        for param in params {
            self.check_decl(param);
        }
        self.check_stmt(body);

        self.in_function = previous;
        self.symbols.exit_function();
    }

    fn check_stmt(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(stmt) = tree.as_stmt(id) else {
            // Declarations may appear in statement position inside
            // blocks.
            if tree.as_decl(id).is_some() {
                self.check_decl(id);
            } else {
                self.report(
                    DiagnosticKind::UnsupportedConstruct,
                    "unexpected node in statement position",
                );
            }
            return;
        };

        match stmt.clone() {
            Stmt::Assign { target, value } => self.check_assign(target, value),
            Stmt::Return { value } => {
                if !self.in_function {
                    self.report(
                        DiagnosticKind::ReturnOutsideFunction,
                        "'return' statement not inside a function",
                    );
                }
                if let Some(value) = value {
                    self.check_expr(value);
                }
            }
            Stmt::If { cond, then_body, else_body } => {
                self.check_expr(cond);
                if let Some(ty) = self.type_of(cond) {
                    if ty != Ty::Bool {
                        self.report(
                            DiagnosticKind::TypeMismatch,
                            "condition in 'if' statement must be Boolean",
                        );
                    }
                }
                self.check_stmt(then_body);
                if let Some(else_body) = else_body {
                    self.check_stmt(else_body);
                }
            }
            Stmt::While { cond, body } => {
                self.check_expr(cond);
                if let Some(ty) = self.type_of(cond) {
                    if ty != Ty::Bool {
                        self.report(
                            DiagnosticKind::TypeMismatch,
                            "condition in 'while' loop must be Boolean",
                        );
                    }
                }
                self.check_stmt(body);
            }
            Stmt::For { iter, start, end, body } => {
                // The iterator is implicitly an Integer for the
                // duration of the loop.
                let declared = self.symbols.declare(&iter, Ty::Int).is_ok();
                if !declared {
                    self.report(
                        DiagnosticKind::DuplicateDeclaration,
                        format!("variable '{}' is already declared", iter),
                    );
                }

                self.check_expr(start);
                self.check_expr(end);
                let start_ty = self.type_of(start);
                let end_ty = self.type_of(end);
                if start_ty.is_some_and(|ty| ty != Ty::Int)
                    || end_ty.is_some_and(|ty| ty != Ty::Int)
                {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        "start and end expressions in 'for' loop must be Integer",
                    );
                }

                self.check_stmt(body);

                if declared {
                    self.symbols.remove(&iter);
                }
            }
            Stmt::Block { stmts } => {
                for stmt in stmts {
                    self.check_stmt(stmt);
                }
            }
            Stmt::Print { value } => self.check_expr(value),
            Stmt::Empty => {}
        }
    }

    fn check_assign(&mut self, target: NodeId, value: NodeId) {
        let tree = self.tree;
        match tree.as_expr(target) {
            Some(Expr::Ident(_)) | Some(Expr::Index { .. }) | Some(Expr::Field { .. }) => {
                self.check_expr(target);
            }
            _ => self.report(
                DiagnosticKind::InvalidAssignmentTarget,
                "invalid assignment target",
            ),
        }

        self.check_expr(value);

        if let (Some(target_ty), Some(value_ty)) = (self.type_of(target), self.type_of(value)) {
            if !assignable(&target_ty, &value_ty) {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    format!(
                        "cannot assign expression of type {} to target of type {}",
                        value_ty, target_ty
                    ),
                );
            }
        }
    }

    fn check_expr(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(expr) = tree.as_expr(id) else {
            self.report(
                DiagnosticKind::UnsupportedConstruct,
                "unexpected node in expression position",
            );
            return;
        };

        match expr.clone() {
            Expr::Int(_) | Expr::Real(_) | Expr::Bool(_) | Expr::Str(_) => {}
            Expr::Ident(name) => {
                if self.symbols.lookup(&name).is_none() {
                    self.report(
                        DiagnosticKind::UndeclaredVariable,
                        format!("variable '{}' is not declared", name),
                    );
                } else {
                    self.used.insert(name);
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                self.check_expr(lhs);
                self.check_expr(rhs);
                self.check_operator(op, lhs, rhs);
            }
            Expr::Unary { op, expr } => {
                self.check_expr(expr);
                if let Some(ty) = self.type_of(expr) {
                    match op {
                        UnOp::Not if ty != Ty::Bool => self.report(
                            DiagnosticKind::TypeMismatch,
                            "'NOT' operator requires Boolean type",
                        ),
                        UnOp::Neg if !ty.is_numeric() => self.report(
                            DiagnosticKind::TypeMismatch,
                            "unary minus requires a numeric type",
                        ),
                        _ => {}
                    }
                }
            }
            Expr::Index { array, index } => {
                self.check_expr(array);
                self.check_expr(index);
                match self.type_of(array) {
                    Some(Ty::Array { len, .. }) => {
                        if let Some(index_ty) = self.type_of(index) {
                            if index_ty != Ty::Int {
                                self.report(
                                    DiagnosticKind::TypeMismatch,
                                    "array index must be of Integer type",
                                );
                            }
                        }
                        // Static bounds check, literal indices only.
                        if let Some(Expr::Int(value)) = tree.as_expr(index) {
                            if *value < 0 || *value >= len as i64 {
                                self.report(
                                    DiagnosticKind::IndexOutOfRange,
                                    format!("array index {} out of bounds for size {}", value, len),
                                );
                            }
                        }
                    }
                    Some(other) => self.report(
                        DiagnosticKind::TypeMismatch,
                        format!("attempting to index a value of type {}", other),
                    ),
                    None => {}
                }
            }
            Expr::Field { record, field } => {
                self.check_expr(record);
                match self.type_of(record) {
                    Some(Ty::Record(record_ty)) => {
                        if record_ty.field(&field).is_none() {
                            self.report(
                                DiagnosticKind::UnknownField,
                                format!("field '{}' does not exist in record", field),
                            );
                        }
                    }
                    Some(other) => self.report(
                        DiagnosticKind::TypeMismatch,
                        format!("attempting to access a field of type {}", other),
                    ),
                    None => {}
                }
            }
            Expr::Call { name, args } => {
                if self.funcs.get(&name).is_none() {
                    self.report(
                        DiagnosticKind::UndeclaredFunction,
                        format!("function '{}' is not declared", name),
                    );
                }
                for arg in args {
                    self.check_expr(arg);
                }
            }
        }
    }

    fn check_operator(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId) {
        let (Some(lhs_ty), Some(rhs_ty)) = (self.type_of(lhs), self.type_of(rhs)) else {
            return;
        };

        if !(assignable(&lhs_ty, &rhs_ty) && assignable(&rhs_ty, &lhs_ty)) {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!(
                    "mismatched types in binary operation: {} and {}",
                    lhs_ty, rhs_ty
                ),
            );
            return;
        }

        if op.is_arithmetic() && !lhs_ty.is_numeric() {
            self.report(
                DiagnosticKind::TypeMismatch,
                "arithmetic operations require numeric types",
            );
        } else if op.is_comparison() && !lhs_ty.is_numeric() {
            self.report(
                DiagnosticKind::TypeMismatch,
                "comparison operations require numeric types",
            );
        } else if op.is_logical() && lhs_ty != Ty::Bool {
            self.report(
                DiagnosticKind::TypeMismatch,
                "boolean operations require Boolean types",
            );
        }
    }

    /// Static type of an expression, or `None` when it cannot be
    /// determined. Never reports; the recursive checks above own the
    /// diagnostics.
    fn type_of(&self, id: NodeId) -> Option<Ty> {
        let expr = self.tree.as_expr(id)?;
        match expr {
            Expr::Int(_) => Some(Ty::Int),
            Expr::Real(_) => Some(Ty::Real),
            Expr::Bool(_) => Some(Ty::Bool),
            Expr::Str(_) => Some(Ty::Str),
            Expr::Ident(name) => self.symbols.lookup(name).cloned(),
            Expr::Binary { op, lhs, .. } => {
                if op.is_comparison() || op.is_logical() {
                    Some(Ty::Bool)
                } else {
                    self.type_of(*lhs)
                }
            }
            Expr::Unary { expr, .. } => self.type_of(*expr),
            Expr::Index { array, .. } => match self.type_of(*array)? {
                Ty::Array { elem, .. } => Some(*elem),
                _ => None,
            },
            Expr::Field { record, field } => match self.type_of(*record)? {
                Ty::Record(record_ty) => record_ty.field(field).cloned(),
                _ => None,
            },
            Expr::Call { name, .. } => self.funcs.get(name)?.ret.clone(),
        }
    }
}
