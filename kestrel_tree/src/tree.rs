//! Arena storage for syntax tree nodes.
use crate::nodes::{Decl, Expr, Function, NodeKind, Program, Stmt, TypeAlias, TypeExpr};
use std::fmt;

/// Stable address of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One arena slot.
///
/// The parent index supports in-place rewrites and position-sensitive
/// diagnostics without back-pointers into the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

/// Arena of nodes addressed by stable indices.
///
/// A parent exclusively owns its children; the only sharing is that
/// `TypeExpr::Named` refers to a type alias by name, not by edge.
/// The tree is created once by the parser, mutated in place by the
/// optimizer, and read-only during code generation.
#[derive(Debug, Default, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new node with no parent.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { parent: None, kind });
        id
    }

    /// Record `parent` as the structural parent of `child`.
    #[inline]
    pub fn adopt(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Root program node. Set once by the builder or parser.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root.expect("tree has no root program node")
    }

    #[inline]
    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    #[inline]
    pub fn as_program(&self, id: NodeId) -> Option<&Program> {
        match self.kind(id) {
            NodeKind::Program(program) => Some(program),
            _ => None,
        }
    }

    #[inline]
    pub fn as_type_alias(&self, id: NodeId) -> Option<&TypeAlias> {
        match self.kind(id) {
            NodeKind::TypeAlias(alias) => Some(alias),
            _ => None,
        }
    }

    #[inline]
    pub fn as_decl(&self, id: NodeId) -> Option<&Decl> {
        match self.kind(id) {
            NodeKind::Decl(decl) => Some(decl),
            _ => None,
        }
    }

    #[inline]
    pub fn as_function(&self, id: NodeId) -> Option<&Function> {
        match self.kind(id) {
            NodeKind::Function(func) => Some(func),
            _ => None,
        }
    }

    #[inline]
    pub fn as_stmt(&self, id: NodeId) -> Option<&Stmt> {
        match self.kind(id) {
            NodeKind::Stmt(stmt) => Some(stmt),
            _ => None,
        }
    }

    #[inline]
    pub fn as_expr(&self, id: NodeId) -> Option<&Expr> {
        match self.kind(id) {
            NodeKind::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    #[inline]
    pub fn as_type(&self, id: NodeId) -> Option<&TypeExpr> {
        match self.kind(id) {
            NodeKind::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Replace `old` with `new` in the structural position `old`
    /// occupies.
    ///
    /// Rewires the child edge in the parent and the parent index of the
    /// replacement, keeping parent links consistent. Replacing the root
    /// or a node whose parent does not reference it is a caller bug.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let parent = self.nodes[old.index()]
            .parent
            .expect("cannot replace a node without a parent");

        let rewired = replace_edge(&mut self.nodes[parent.index()].kind, old, new);
        assert!(rewired, "node {} is not a child of its recorded parent", old);

        self.nodes[new.index()].parent = Some(parent);
        self.nodes[old.index()].parent = None;
    }

    /// Direct children of a node, in structural order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        collect_edges(self.kind(id), &mut out);
        out
    }

    /// Verify that every node reachable from `root` records the correct
    /// parent. Used by tests after rewrites.
    pub fn parents_consistent(&self, root: NodeId) -> bool {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for child in self.children(id) {
                if self.parent(child) != Some(id) {
                    return false;
                }
                stack.push(child);
            }
        }
        true
    }
}

/// Swap the edge pointing at `old` for `new` inside a node kind.
/// Returns false when no edge matches.
fn replace_edge(kind: &mut NodeKind, old: NodeId, new: NodeId) -> bool {
    let mut hit = false;
    let mut swap = |edge: &mut NodeId| {
        if *edge == old && !hit {
            *edge = new;
            hit = true;
        }
    };

    match kind {
        NodeKind::Program(Program { items }) => items.iter_mut().for_each(&mut swap),
        NodeKind::TypeAlias(TypeAlias { ty, .. }) => swap(ty),
        NodeKind::Decl(Decl { ty, init, .. }) => {
            swap(ty);
            if let Some(init) = init {
                swap(init);
            }
        }
        NodeKind::Function(Function { params, ret, body, .. }) => {
            params.iter_mut().for_each(&mut swap);
            if let Some(ret) = ret {
                swap(ret);
            }
            swap(body);
        }
        NodeKind::Stmt(stmt) => match stmt {
            Stmt::Assign { target, value } => {
                swap(target);
                swap(value);
            }
            Stmt::Return { value } => {
                if let Some(value) = value {
                    swap(value);
                }
            }
            Stmt::If { cond, then_body, else_body } => {
                swap(cond);
                swap(then_body);
                if let Some(else_body) = else_body {
                    swap(else_body);
                }
            }
            Stmt::While { cond, body } => {
                swap(cond);
                swap(body);
            }
            Stmt::For { start, end, body, .. } => {
                swap(start);
                swap(end);
                swap(body);
            }
            Stmt::Block { stmts } => stmts.iter_mut().for_each(&mut swap),
            Stmt::Print { value } => swap(value),
            Stmt::Empty => {}
        },
        NodeKind::Expr(expr) => match expr {
            Expr::Int(_) | Expr::Real(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Ident(_) => {}
            Expr::Binary { lhs, rhs, .. } => {
                swap(lhs);
                swap(rhs);
            }
            Expr::Unary { expr, .. } => swap(expr),
            Expr::Index { array, index } => {
                swap(array);
                swap(index);
            }
            Expr::Field { record, .. } => swap(record),
            Expr::Call { args, .. } => args.iter_mut().for_each(&mut swap),
        },
        NodeKind::Type(ty) => match ty {
            TypeExpr::Integer | TypeExpr::Real | TypeExpr::Boolean | TypeExpr::Str | TypeExpr::Named(_) => {}
            TypeExpr::Array { elem, .. } => swap(elem),
            TypeExpr::Record { fields } => fields.iter_mut().for_each(|field| swap(&mut field.ty)),
        },
    }

    hit
}

/// Collect the child edges of a node kind, in structural order.
fn collect_edges(kind: &NodeKind, out: &mut Vec<NodeId>) {
    match kind {
        NodeKind::Program(Program { items }) => out.extend(items.iter().copied()),
        NodeKind::TypeAlias(TypeAlias { ty, .. }) => out.push(*ty),
        NodeKind::Decl(Decl { ty, init, .. }) => {
            out.push(*ty);
            out.extend(init.iter().copied());
        }
        NodeKind::Function(Function { params, ret, body, .. }) => {
            out.extend(params.iter().copied());
            out.extend(ret.iter().copied());
            out.push(*body);
        }
        NodeKind::Stmt(stmt) => match stmt {
            Stmt::Assign { target, value } => out.extend([*target, *value]),
            Stmt::Return { value } => out.extend(value.iter().copied()),
            Stmt::If { cond, then_body, else_body } => {
                out.extend([*cond, *then_body]);
                out.extend(else_body.iter().copied());
            }
            Stmt::While { cond, body } => out.extend([*cond, *body]),
            Stmt::For { start, end, body, .. } => out.extend([*start, *end, *body]),
            Stmt::Block { stmts } => out.extend(stmts.iter().copied()),
            Stmt::Print { value } => out.push(*value),
            Stmt::Empty => {}
        },
        NodeKind::Expr(expr) => match expr {
            Expr::Int(_) | Expr::Real(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Ident(_) => {}
            Expr::Binary { lhs, rhs, .. } => out.extend([*lhs, *rhs]),
            Expr::Unary { expr, .. } => out.push(*expr),
            Expr::Index { array, index } => out.extend([*array, *index]),
            Expr::Field { record, .. } => out.push(*record),
            Expr::Call { args, .. } => out.extend(args.iter().copied()),
        },
        NodeKind::Type(ty) => match ty {
            TypeExpr::Integer | TypeExpr::Real | TypeExpr::Boolean | TypeExpr::Str | TypeExpr::Named(_) => {}
            TypeExpr::Array { elem, .. } => out.push(*elem),
            TypeExpr::Record { fields } => out.extend(fields.iter().map(|field| field.ty)),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::nodes::BinOp;

    #[test]
    fn test_replace_rewires_parent_links() {
        let mut tree = Tree::new();
        let lhs = tree.alloc(NodeKind::Expr(Expr::Int(1)));
        let rhs = tree.alloc(NodeKind::Expr(Expr::Int(2)));
        let bin = tree.alloc(NodeKind::Expr(Expr::Binary {
            op: BinOp::Add,
            lhs,
            rhs,
        }));
        tree.adopt(bin, lhs);
        tree.adopt(bin, rhs);

        let folded = tree.alloc(NodeKind::Expr(Expr::Int(3)));
        let ret = tree.alloc(NodeKind::Stmt(Stmt::Return { value: Some(bin) }));
        tree.adopt(ret, bin);

        tree.replace(bin, folded);

        assert_eq!(tree.parent(folded), Some(ret));
        assert_eq!(tree.parent(bin), None);
        assert!(matches!(
            tree.kind(ret),
            NodeKind::Stmt(Stmt::Return { value: Some(id) }) if *id == folded
        ));
        assert!(tree.parents_consistent(ret));
    }

    #[test]
    #[should_panic(expected = "cannot replace a node without a parent")]
    fn test_replace_detached_node_panics() {
        let mut tree = Tree::new();
        let a = tree.alloc(NodeKind::Expr(Expr::Int(1)));
        let b = tree.alloc(NodeKind::Expr(Expr::Int(2)));
        tree.replace(a, b);
    }
}
