//! Convenience API for constructing trees programmatically.
//!
//! The parser is the production producer of trees; the builder covers
//! everything else that needs one: tests, demo programs and benches.
//! Every composite constructor wires parent links immediately, so a
//! built tree satisfies the parent-consistency invariant from the
//! start.
use crate::nodes::{BinOp, Decl, Expr, FieldDef, Function, NodeKind, Program, Stmt, TypeAlias, TypeExpr, UnOp};
use crate::tree::{NodeId, Tree};
use smol_str::SmolStr;

#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: Tree,
}

impl TreeBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish building. The root must have been set with [`TreeBuilder::program`].
    #[inline]
    pub fn finish(self) -> Tree {
        self.tree
    }

    fn adopt_all(&mut self, parent: NodeId, children: &[NodeId]) {
        for &child in children {
            self.tree.adopt(parent, child);
        }
    }

    pub fn program(&mut self, items: Vec<NodeId>) -> NodeId {
        let id = self.tree.alloc(NodeKind::Program(Program { items: items.clone() }));
        self.adopt_all(id, &items);
        self.tree.set_root(id);
        id
    }

    pub fn type_alias(&mut self, name: &str, ty: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::TypeAlias(TypeAlias {
            name: SmolStr::new(name),
            ty,
        }));
        self.tree.adopt(id, ty);
        id
    }

    pub fn decl(&mut self, name: &str, ty: NodeId, init: Option<NodeId>) -> NodeId {
        let id = self.tree.alloc(NodeKind::Decl(Decl {
            name: SmolStr::new(name),
            ty,
            init,
        }));
        self.tree.adopt(id, ty);
        if let Some(init) = init {
            self.tree.adopt(id, init);
        }
        id
    }

    pub fn function(&mut self, name: &str, params: Vec<NodeId>, ret: Option<NodeId>, body: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::Function(Function {
            name: SmolStr::new(name),
            params: params.clone(),
            ret,
            body,
        }));
        self.adopt_all(id, &params);
        if let Some(ret) = ret {
            self.tree.adopt(id, ret);
        }
        self.tree.adopt(id, body);
        id
    }

    /* Statements */

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::Stmt(Stmt::Assign { target, value }));
        self.adopt_all(id, &[target, value]);
        id
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        let id = self.tree.alloc(NodeKind::Stmt(Stmt::Return { value }));
        if let Some(value) = value {
            self.tree.adopt(id, value);
        }
        id
    }

    pub fn if_else(&mut self, cond: NodeId, then_body: NodeId, else_body: Option<NodeId>) -> NodeId {
        let id = self.tree.alloc(NodeKind::Stmt(Stmt::If {
            cond,
            then_body,
            else_body,
        }));
        self.adopt_all(id, &[cond, then_body]);
        if let Some(else_body) = else_body {
            self.tree.adopt(id, else_body);
        }
        id
    }

    pub fn while_loop(&mut self, cond: NodeId, body: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::Stmt(Stmt::While { cond, body }));
        self.adopt_all(id, &[cond, body]);
        id
    }

    pub fn for_loop(&mut self, iter: &str, start: NodeId, end: NodeId, body: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::Stmt(Stmt::For {
            iter: SmolStr::new(iter),
            start,
            end,
            body,
        }));
        self.adopt_all(id, &[start, end, body]);
        id
    }

    pub fn block(&mut self, stmts: Vec<NodeId>) -> NodeId {
        let id = self.tree.alloc(NodeKind::Stmt(Stmt::Block { stmts: stmts.clone() }));
        self.adopt_all(id, &stmts);
        id
    }

    pub fn print(&mut self, value: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::Stmt(Stmt::Print { value }));
        self.tree.adopt(id, value);
        id
    }

    pub fn empty(&mut self) -> NodeId {
        self.tree.alloc(NodeKind::Stmt(Stmt::Empty))
    }

    /* Expressions */

    pub fn int(&mut self, value: i64) -> NodeId {
        self.tree.alloc(NodeKind::Expr(Expr::Int(value)))
    }

    pub fn real(&mut self, value: f64) -> NodeId {
        self.tree.alloc(NodeKind::Expr(Expr::Real(value)))
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.tree.alloc(NodeKind::Expr(Expr::Bool(value)))
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        self.tree.alloc(NodeKind::Expr(Expr::Str(SmolStr::new(value))))
    }

    pub fn ident(&mut self, name: &str) -> NodeId {
        self.tree.alloc(NodeKind::Expr(Expr::Ident(SmolStr::new(name))))
    }

    pub fn binary(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::Expr(Expr::Binary { op, lhs, rhs }));
        self.adopt_all(id, &[lhs, rhs]);
        id
    }

    pub fn unary(&mut self, op: UnOp, expr: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::Expr(Expr::Unary { op, expr }));
        self.tree.adopt(id, expr);
        id
    }

    pub fn index(&mut self, array: NodeId, index: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::Expr(Expr::Index { array, index }));
        self.adopt_all(id, &[array, index]);
        id
    }

    pub fn field(&mut self, record: NodeId, field: &str) -> NodeId {
        let id = self.tree.alloc(NodeKind::Expr(Expr::Field {
            record,
            field: SmolStr::new(field),
        }));
        self.tree.adopt(id, record);
        id
    }

    pub fn call(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        let id = self.tree.alloc(NodeKind::Expr(Expr::Call {
            name: SmolStr::new(name),
            args: args.clone(),
        }));
        self.adopt_all(id, &args);
        id
    }

    /* Types */

    pub fn ty_int(&mut self) -> NodeId {
        self.tree.alloc(NodeKind::Type(TypeExpr::Integer))
    }

    pub fn ty_real(&mut self) -> NodeId {
        self.tree.alloc(NodeKind::Type(TypeExpr::Real))
    }

    pub fn ty_bool(&mut self) -> NodeId {
        self.tree.alloc(NodeKind::Type(TypeExpr::Boolean))
    }

    pub fn ty_str(&mut self) -> NodeId {
        self.tree.alloc(NodeKind::Type(TypeExpr::Str))
    }

    pub fn ty_array(&mut self, len: usize, elem: NodeId) -> NodeId {
        let id = self.tree.alloc(NodeKind::Type(TypeExpr::Array { len, elem }));
        self.tree.adopt(id, elem);
        id
    }

    pub fn ty_record(&mut self, fields: Vec<(&str, NodeId)>) -> NodeId {
        let fields: Vec<FieldDef> = fields
            .into_iter()
            .map(|(name, ty)| FieldDef {
                name: SmolStr::new(name),
                ty,
            })
            .collect();
        let tys: Vec<NodeId> = fields.iter().map(|field| field.ty).collect();
        let id = self.tree.alloc(NodeKind::Type(TypeExpr::Record { fields }));
        self.adopt_all(id, &tys);
        id
    }

    pub fn ty_named(&mut self, name: &str) -> NodeId {
        self.tree.alloc(NodeKind::Type(TypeExpr::Named(SmolStr::new(name))))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_built_tree_has_consistent_parents() {
        let mut b = TreeBuilder::new();
        let ty = b.ty_int();
        let two = b.int(2);
        let three = b.int(3);
        let sum = b.binary(BinOp::Add, two, three);
        let decl = b.decl("x", ty, Some(sum));
        let x = b.ident("x");
        let print = b.print(x);
        let root = b.program(vec![decl, print]);
        let tree = b.finish();

        assert_eq!(tree.root(), root);
        assert!(tree.parents_consistent(root));
        assert_eq!(tree.parent(sum), Some(decl));
        assert_eq!(tree.parent(two), Some(sum));
    }
}
