//! Syntax tree model for the Kestrel language.
//!
//! The tree is produced by the parser and shared by every later stage:
//! the semantic checker validates it, the optimizer rewrites it in place,
//! and the code generator and interpreter consume it.
pub mod builder;
pub mod nodes;
pub mod tree;

pub use builder::TreeBuilder;
pub use nodes::{BinOp, Decl, Expr, FieldDef, Function, NodeKind, Program, Stmt, TypeAlias, TypeExpr, UnOp};
pub use tree::{Node, NodeId, Tree};
