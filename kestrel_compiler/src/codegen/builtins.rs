//! Generated formatting routines backing the `print` statement.
//!
//! `print` dispatches by the static type of its operand to one of a
//! fixed set of routines: integer, real, string, per-record formatters
//! that recurse into nested record and array fields, array formatters
//! specialized per element kind, and a null-safe generic routine for
//! arrays of references. Routines write the value text only; the
//! `print` lowering appends the line break. Each routine is emitted
//! into the primary module on first use and cached.
use super::records::{value_kind, RecordRegistry};
use crate::types::{RecordTy, Ty};
use kestrel_bytecode::{FunctionDef, Instr, Label, RetWidth, ValueKind};
use smol_str::SmolStr;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct Builtins {
    emitted: HashSet<SmolStr>,
    functions: Vec<FunctionDef>,
}

impl Builtins {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_functions(self) -> Vec<FunctionDef> {
        self.functions
    }

    pub fn print_int(&mut self) -> SmolStr {
        let name = SmolStr::new("print_int");
        if self.emitted.insert(name.clone()) {
            self.functions.push(FunctionDef {
                name: name.clone(),
                params: vec![ValueKind::Int],
                ret: RetWidth::None,
                locals: 1,
                code: vec![Instr::LoadInt(0), Instr::Write(ValueKind::Int), Instr::Ret],
            });
        }
        name
    }

    pub fn print_real(&mut self) -> SmolStr {
        let name = SmolStr::new("print_real");
        if self.emitted.insert(name.clone()) {
            self.functions.push(FunctionDef {
                name: name.clone(),
                params: vec![ValueKind::Real],
                ret: RetWidth::None,
                locals: 2,
                code: vec![Instr::LoadReal(0), Instr::Write(ValueKind::Real), Instr::Ret],
            });
        }
        name
    }

    pub fn print_str(&mut self) -> SmolStr {
        let name = SmolStr::new("print_str");
        if self.emitted.insert(name.clone()) {
            self.functions.push(FunctionDef {
                name: name.clone(),
                params: vec![ValueKind::Str],
                ret: RetWidth::None,
                locals: 1,
                code: vec![Instr::LoadRef(0), Instr::Write(ValueKind::Str), Instr::Ret],
            });
        }
        name
    }

    /// Formatter for one synthesized record type. Recurses into the
    /// formatters of nested record and array fields.
    pub fn print_record(&mut self, registry: &mut RecordRegistry, record: &RecordTy) -> SmolStr {
        let record_name = registry.ensure(record);
        let name = SmolStr::new(format!("print_{}", record_name));
        if !self.emitted.insert(name.clone()) {
            return name;
        }

        let mut code = vec![
            Instr::ConstStr(SmolStr::new("{")),
            Instr::Write(ValueKind::Str),
        ];
        let field_count = record.fields.len();
        for (i, (field_name, field_ty)) in record.fields.iter().enumerate() {
            code.push(Instr::ConstStr(SmolStr::new(format!("\"{}\": ", field_name))));
            code.push(Instr::Write(ValueKind::Str));
            code.push(Instr::LoadRef(0));
            code.push(Instr::GetField {
                record: record_name.clone(),
                field: field_name.clone(),
                kind: value_kind(field_ty),
            });
            match field_ty {
                Ty::Int | Ty::Bool => code.push(Instr::Write(ValueKind::Int)),
                Ty::Real => code.push(Instr::Write(ValueKind::Real)),
                Ty::Str => code.push(Instr::Write(ValueKind::Str)),
                Ty::Record(nested) => {
                    let callee = self.print_record(registry, nested);
                    code.push(Instr::Call(callee));
                }
                Ty::Array { elem, .. } => {
                    let callee = self.print_array(elem);
                    code.push(Instr::Call(callee));
                }
            }
            if i + 1 < field_count {
                code.push(Instr::ConstStr(SmolStr::new(", ")));
                code.push(Instr::Write(ValueKind::Str));
            }
        }
        code.push(Instr::ConstStr(SmolStr::new("}")));
        code.push(Instr::Write(ValueKind::Str));
        code.push(Instr::Ret);

        self.functions.push(FunctionDef {
            name: name.clone(),
            params: vec![ValueKind::Ref],
            ret: RetWidth::None,
            locals: 1,
            code,
        });
        name
    }

    /// Formatter for arrays, specialized per element kind. Arrays of
    /// records or arrays fall back to a generic null-safe routine.
    pub fn print_array(&mut self, elem: &Ty) -> SmolStr {
        let kind = value_kind(elem);
        let name = SmolStr::new(match kind {
            ValueKind::Int => "print_int_array",
            ValueKind::Real => "print_real_array",
            ValueKind::Str => "print_str_array",
            ValueKind::Ref => "print_ref_array",
        });
        if !self.emitted.insert(name.clone()) {
            return name;
        }

        // Slot 0 holds the array, slot 1 the index, slot 2 the length.
        let head = Label(0);
        let end = Label(1);
        let no_sep = Label(2);

        let mut code = vec![
            Instr::ConstStr(SmolStr::new("[")),
            Instr::Write(ValueKind::Str),
            Instr::LoadRef(0),
            Instr::ArrayLen,
            Instr::StoreInt(2),
            Instr::ConstInt(0),
            Instr::StoreInt(1),
            Instr::Mark(head),
            Instr::LoadInt(1),
            Instr::LoadInt(2),
            Instr::BranchIntEq(end),
            Instr::LoadInt(1),
            Instr::BranchZero(no_sep),
            Instr::ConstStr(SmolStr::new(", ")),
            Instr::Write(ValueKind::Str),
            Instr::Mark(no_sep),
            Instr::LoadRef(0),
            Instr::LoadInt(1),
            Instr::ArrayLoad(kind),
        ];
        match kind {
            ValueKind::Int | ValueKind::Real | ValueKind::Str => code.push(Instr::Write(kind)),
            ValueKind::Ref => {
                // Elements may be unset references.
                let is_null = Label(3);
                let next = Label(4);
                code.extend([
                    Instr::Dup,
                    Instr::BranchNull(is_null),
                    Instr::Write(ValueKind::Ref),
                    Instr::Jump(next),
                    Instr::Mark(is_null),
                    Instr::Pop,
                    Instr::ConstStr(SmolStr::new("null")),
                    Instr::Write(ValueKind::Str),
                    Instr::Mark(next),
                ]);
            }
        }
        code.extend([
            Instr::LoadInt(1),
            Instr::ConstInt(1),
            Instr::AddInt,
            Instr::StoreInt(1),
            Instr::Jump(head),
            Instr::Mark(end),
            Instr::ConstStr(SmolStr::new("]")),
            Instr::Write(ValueKind::Str),
            Instr::Ret,
        ]);

        self.functions.push(FunctionDef {
            name: name.clone(),
            params: vec![ValueKind::Ref],
            ret: RetWidth::None,
            locals: 3,
            code,
        });
        name
    }
}
