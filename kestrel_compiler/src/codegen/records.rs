//! Auxiliary type synthesis for record types.
use crate::types::{RecordTy, Ty};
use kestrel_bytecode::{FieldSlot, FunctionDef, Instr, Module, RetWidth, ValueKind};
use kestrel_tree::NodeId;
use smol_str::SmolStr;
use std::collections::HashMap;

/// Maps record type nodes, by identity, to synthesized auxiliary
/// modules. The first encounter of a record node emits a nominal type
/// definition (one field per record field plus a nullary constructor)
/// and caches the name; later encounters of the same node reuse it.
/// Structurally identical records declared separately stay distinct.
#[derive(Debug, Default)]
pub struct RecordRegistry {
    names: HashMap<NodeId, SmolStr>,
    modules: Vec<Module>,
    counter: u32,
}

impl RecordRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesized name for a record type, emitting the auxiliary
    /// module on first use.
    pub fn ensure(&mut self, record: &RecordTy) -> SmolStr {
        if let Some(name) = self.names.get(&record.id) {
            return name.clone();
        }

        let name = SmolStr::new(format!("Record{}", self.counter));
        self.counter += 1;
        self.names.insert(record.id, name.clone());

        let mut fields = Vec::with_capacity(record.fields.len());
        for (field_name, field_ty) in record.fields.iter() {
            // Nested record fields synthesize their own modules.
            if let Ty::Record(nested) = field_ty {
                self.ensure(nested);
            }
            fields.push(FieldSlot {
                name: field_name.clone(),
                kind: value_kind(field_ty),
            });
        }

        let ctor = FunctionDef {
            name: SmolStr::new(format!("{}_init", name)),
            params: vec![ValueKind::Ref],
            ret: RetWidth::None,
            locals: 1,
            code: vec![Instr::Ret],
        };

        self.modules.push(Module {
            name: name.clone(),
            fields,
            functions: vec![ctor],
        });

        name
    }

    pub fn into_modules(self) -> Vec<Module> {
        self.modules
    }
}

/// Storage class used for a value of the given type.
#[inline]
pub fn value_kind(ty: &Ty) -> ValueKind {
    match ty {
        Ty::Int | Ty::Bool => ValueKind::Int,
        Ty::Real => ValueKind::Real,
        Ty::Str => ValueKind::Str,
        Ty::Array { .. } | Ty::Record(_) => ValueKind::Ref,
    }
}
