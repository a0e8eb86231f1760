//! Tree-rewriting optimizer.
//!
//! Second pass over the tree, structurally mutating it in place
//! through parent-link rewrites: constant folding, dead-branch and
//! dead-loop elimination, unreachable-statement pruning and unused
//! top-level declaration removal. Running the pass twice yields the
//! same tree as running it once.
use kestrel_tree::{BinOp, Expr, NodeId, NodeKind, Stmt, Tree, UnOp};
use log::debug;
use smol_str::SmolStr;
use std::collections::HashSet;

/// Optimize a program tree in place.
pub fn optimize(tree: &mut Tree) {
    Optimizer { tree }.run()
}

struct Optimizer<'t> {
    tree: &'t mut Tree,
}

impl<'t> Optimizer<'t> {
    fn run(&mut self) {
        let root = self.tree.root();
        let items = match self.tree.as_program(root) {
            Some(program) => program.items.clone(),
            None => return,
        };

        for &item in &items {
            match self.tree.kind(item) {
                NodeKind::Decl(_) => self.opt_decl(item),
                NodeKind::Function(_) => self.opt_function(item),
                NodeKind::Stmt(_) => self.opt_stmt(item),
                _ => {}
            }
        }

        self.prune_program(root);
    }

    fn opt_decl(&mut self, id: NodeId) {
        if let Some(decl) = self.tree.as_decl(id) {
            if let Some(init) = decl.init {
                self.fold_expr(init);
            }
        }
    }

    fn opt_function(&mut self, id: NodeId) {
        if let Some(func) = self.tree.as_function(id) {
            let body = func.body;
            self.opt_stmt(body);
        }
    }

    fn opt_stmt(&mut self, id: NodeId) {
        let Some(stmt) = self.tree.as_stmt(id).cloned() else {
            // Local declarations sit in statement position.
            self.opt_decl(id);
            return;
        };

        match stmt {
            Stmt::Assign { value, .. } => self.fold_expr(value),
            Stmt::Return { value } => {
                if let Some(value) = value {
                    self.fold_expr(value);
                }
            }
            Stmt::If { cond, then_body, else_body } => {
                self.fold_expr(cond);
                self.opt_stmt(then_body);
                if let Some(else_body) = else_body {
                    self.opt_stmt(else_body);
                }

                // Folding and branch optimization may have replaced
                // the child nodes; read the current edges before
                // rewriting.
                let Some(Stmt::If { cond, then_body, else_body }) = self.tree.as_stmt(id) else {
                    return;
                };
                let (cond, then_body, else_body) = (*cond, *then_body, *else_body);

                // A condition folded to a literal selects its branch
                // statically.
                let cond_value = match self.tree.as_expr(cond) {
                    Some(Expr::Bool(value)) => Some(*value),
                    _ => None,
                };
                match cond_value {
                    Some(true) => {
                        debug!("simplified 'if' with constant true condition");
                        self.tree.replace(id, then_body);
                    }
                    Some(false) => {
                        if let Some(else_body) = else_body {
                            debug!("simplified 'if' with constant false condition");
                            self.tree.replace(id, else_body);
                        } else {
                            debug!("removed 'if' with constant false condition and no else branch");
                            let empty = self.tree.alloc(NodeKind::Stmt(Stmt::Empty));
                            self.tree.replace(id, empty);
                        }
                    }
                    None => {}
                }
            }
            Stmt::While { cond, body } => {
                self.fold_expr(cond);
                self.opt_stmt(body);

                let Some(Stmt::While { cond, .. }) = self.tree.as_stmt(id) else {
                    return;
                };
                let cond = *cond;

                let dead = matches!(self.tree.as_expr(cond), Some(Expr::Bool(false)));
                if dead {
                    debug!("removed 'while' loop with constant false condition");
                    let empty = self.tree.alloc(NodeKind::Stmt(Stmt::Empty));
                    self.tree.replace(id, empty);
                }
            }
            Stmt::For { start, end, body, .. } => {
                self.fold_expr(start);
                self.fold_expr(end);
                self.opt_stmt(body);
            }
            Stmt::Block { stmts } => {
                for &stmt in &stmts {
                    self.opt_stmt(stmt);
                }
                self.prune_block(id);
            }
            Stmt::Print { value } => self.fold_expr(value),
            Stmt::Empty => {}
        }
    }

    /// Rebuild a block's statement list: drop rewrite placeholders and
    /// discard everything after an unconditional return. The list is
    /// re-read from the node because child rewrites may have replaced
    /// statements.
    fn prune_block(&mut self, id: NodeId) {
        let Some(Stmt::Block { stmts }) = self.tree.as_stmt(id).cloned() else {
            return;
        };
        let mut kept = Vec::with_capacity(stmts.len());
        let mut returned = false;
        let mut unreachable = 0usize;

        for stmt in stmts {
            if returned {
                unreachable += 1;
                continue;
            }
            match self.tree.as_stmt(stmt) {
                Some(Stmt::Empty) => continue,
                Some(Stmt::Return { .. }) => {
                    returned = true;
                    kept.push(stmt);
                }
                _ => kept.push(stmt),
            }
        }

        if unreachable > 0 {
            debug!("removed {} unreachable statement(s) after 'return'", unreachable);
        }

        if let NodeKind::Stmt(Stmt::Block { stmts }) = self.tree.kind_mut(id) {
            *stmts = kept;
        }
    }

    /// Drop empty placeholders and never-referenced top-level
    /// declarations from the program item list.
    fn prune_program(&mut self, root: NodeId) {
        let used = self.referenced_names(root);
        let items = match self.tree.as_program(root) {
            Some(program) => program.items.clone(),
            None => return,
        };

        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            match self.tree.kind(item) {
                NodeKind::Stmt(Stmt::Empty) => continue,
                NodeKind::Decl(decl) if !used.contains(&decl.name) => {
                    debug!("removed unused variable '{}'", decl.name);
                    continue;
                }
                _ => kept.push(item),
            }
        }

        if let NodeKind::Program(program) = self.tree.kind_mut(root) {
            program.items = kept;
        }
    }

    /// Every identifier name referenced anywhere in the remaining
    /// tree, including assignment targets and function bodies.
    fn referenced_names(&self, root: NodeId) -> HashSet<SmolStr> {
        let mut used = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(Expr::Ident(name)) = self.tree.as_expr(id) {
                used.insert(name.clone());
            }
            stack.extend(self.tree.children(id));
        }
        used
    }

    /// Fold an expression subtree bottom-up, replacing every
    /// constant-operand operation with its literal result. Folding an
    /// already-folded subtree is a no-op, and a literal integer
    /// division by zero is left unfolded so the emitted runtime guard
    /// stays in the code.
    fn fold_expr(&mut self, id: NodeId) {
        let Some(expr) = self.tree.as_expr(id).cloned() else {
            return;
        };

        match expr {
            Expr::Int(_) | Expr::Real(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Ident(_) => {}
            Expr::Binary { op, lhs, rhs } => {
                self.fold_expr(lhs);
                self.fold_expr(rhs);

                // Child folds rewired this node's edges; re-read them.
                let Some(Expr::Binary { lhs, rhs, .. }) = self.tree.as_expr(id) else {
                    return;
                };
                let (Some(lhs), Some(rhs)) = (self.tree.as_expr(*lhs), self.tree.as_expr(*rhs)) else {
                    return;
                };
                if let Some(folded) = fold_binary(op, lhs, rhs) {
                    debug!("folded constant binary operation '{}'", op);
                    let new = self.tree.alloc(NodeKind::Expr(folded));
                    self.tree.replace(id, new);
                }
            }
            Expr::Unary { op, expr } => {
                self.fold_expr(expr);

                let Some(Expr::Unary { expr, .. }) = self.tree.as_expr(id) else {
                    return;
                };
                let Some(operand) = self.tree.as_expr(*expr) else {
                    return;
                };
                if let Some(folded) = fold_unary(op, operand) {
                    debug!("folded constant unary operation '{}'", op);
                    let new = self.tree.alloc(NodeKind::Expr(folded));
                    self.tree.replace(id, new);
                }
            }
            Expr::Index { array, index } => {
                self.fold_expr(array);
                self.fold_expr(index);
            }
            Expr::Field { record, .. } => self.fold_expr(record),
            Expr::Call { args, .. } => {
                for arg in args {
                    self.fold_expr(arg);
                }
            }
        }
    }
}

/// Compute a binary operation over two literals, using the same
/// per-type arithmetic rules as the backend's instruction set.
/// Returns `None` when the pair stays unfolded.
fn fold_binary(op: BinOp, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
    use BinOp as B;
    match (lhs, rhs) {
        (Expr::Int(a), Expr::Int(b)) => {
            let (a, b) = (*a, *b);
            match op {
                B::Add => Some(Expr::Int(a.wrapping_add(b))),
                B::Sub => Some(Expr::Int(a.wrapping_sub(b))),
                B::Mul => Some(Expr::Int(a.wrapping_mul(b))),
                // Division by a literal zero keeps its runtime guard.
                B::Div if b != 0 => Some(Expr::Int(a.wrapping_div(b))),
                B::Div => None,
                B::Eq => Some(Expr::Bool(a == b)),
                B::Lt => Some(Expr::Bool(a < b)),
                B::Gt => Some(Expr::Bool(a > b)),
                B::And | B::Or | B::Xor => None,
            }
        }
        (Expr::Real(a), Expr::Real(b)) => {
            let (a, b) = (*a, *b);
            match op {
                B::Add => Some(Expr::Real(a + b)),
                B::Sub => Some(Expr::Real(a - b)),
                B::Mul => Some(Expr::Real(a * b)),
                B::Div => Some(Expr::Real(a / b)),
                B::Eq => Some(Expr::Bool(a == b)),
                B::Lt => Some(Expr::Bool(a < b)),
                B::Gt => Some(Expr::Bool(a > b)),
                B::And | B::Or | B::Xor => None,
            }
        }
        (Expr::Bool(a), Expr::Bool(b)) => {
            let (a, b) = (*a, *b);
            match op {
                B::And => Some(Expr::Bool(a && b)),
                B::Or => Some(Expr::Bool(a || b)),
                B::Xor => Some(Expr::Bool(a ^ b)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn fold_unary(op: UnOp, operand: &Expr) -> Option<Expr> {
    match (op, operand) {
        (UnOp::Neg, Expr::Int(v)) => Some(Expr::Int(v.wrapping_neg())),
        (UnOp::Neg, Expr::Real(v)) => Some(Expr::Real(-v)),
        (UnOp::Not, Expr::Bool(v)) => Some(Expr::Bool(!v)),
        _ => None,
    }
}
