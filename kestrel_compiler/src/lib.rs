//! Front-end analysis, optimization and code generation for the
//! Kestrel language.
//!
//! The pipeline over a parsed tree is three stages:
//!
//! 1. [`check`] validates scoping and types, accumulating non-fatal
//!    diagnostics.
//! 2. [`optimize`] rewrites the tree in place: constant folding, dead
//!    branch and loop elimination, unreachable-statement pruning and
//!    unused-declaration removal.
//! 3. [`generate`] lowers the tree to a bytecode [`Artifact`], or
//!    fails with a fatal error if an inconsistency survived this far.
pub mod check;
pub mod codegen;
pub mod diag;
pub mod optimize;
pub mod symbol;
pub mod types;

pub use check::check;
pub use codegen::{generate, GenError, GenResult};
pub use diag::{Diagnostic, DiagnosticKind};
pub use optimize::optimize;

use kestrel_bytecode::Artifact;
use kestrel_tree::Tree;

/// Run the full pipeline over a tree.
///
/// Diagnostics are reported alongside the generation result rather
/// than gating it; a diagnosed program may still generate, and a
/// clean-looking one may still fail fatally in the backend.
pub fn compile(tree: &mut Tree) -> (Vec<Diagnostic>, GenResult<Artifact>) {
    let diagnostics = check::check(tree);
    log::info!("semantic check reported {} diagnostic(s)", diagnostics.len());

    optimize::optimize(tree);

    let artifact = codegen::generate(tree);
    (diagnostics, artifact)
}
