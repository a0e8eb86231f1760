//! Target instruction set, artifact model and reference interpreter.
//!
//! The code generator lowers a checked tree into [`Artifact`]s made of
//! [`Module`]s full of typed stack-machine [`Instr`]uctions. The
//! [`vm`] module executes artifacts directly; tests use it to prove
//! that folding and generated code agree, and the CLI uses it to run
//! compiled programs.
pub mod instr;
pub mod module;
pub mod vm;

pub use instr::{Instr, Label, ValueKind};
pub use module::{Artifact, FieldSlot, FunctionDef, Module, RetWidth};
pub use vm::{Value, Vm, VmError, VmResult};
