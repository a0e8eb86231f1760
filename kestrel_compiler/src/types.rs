//! Semantic types, the type table and the compatibility lattice.
use itertools::Itertools;
use kestrel_tree::{NodeId, Tree, TypeExpr};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Fully resolved semantic type. Aliases are followed during
/// resolution, so a `Ty` never contains a name reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Int,
    Real,
    Bool,
    Str,
    Array { len: usize, elem: Box<Ty> },
    Record(RecordTy),
}

/// Record type identified by the tree node it was declared as.
///
/// Identity is nominal-by-node: two separately declared but
/// field-identical records are distinct, while every use reached
/// through the same alias shares one identity.
#[derive(Debug, Clone)]
pub struct RecordTy {
    pub id: NodeId,
    pub fields: Rc<Vec<(SmolStr, Ty)>>,
}

impl PartialEq for RecordTy {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl RecordTy {
    pub fn field(&self, name: &str) -> Option<&Ty> {
        self.fields
            .iter()
            .find(|(fname, _)| fname == name)
            .map(|(_, ty)| ty)
    }
}

impl Ty {
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int | Ty::Real)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "Integer"),
            Ty::Real => write!(f, "Real"),
            Ty::Bool => write!(f, "Boolean"),
            Ty::Str => write!(f, "String"),
            Ty::Array { elem, .. } => write!(f, "Array of {}", elem),
            Ty::Record(record) => {
                let fields = record
                    .fields
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, ty))
                    .join(", ");
                write!(f, "Record {{ {} }}", fields)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    /// Named type missing from the type table.
    Undefined(SmolStr),
    /// Alias chain that reaches itself.
    Cycle(SmolStr),
    /// Node is not a member of the type family.
    NotAType,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeError::Undefined(name) => write!(f, "type '{}' is not defined", name),
            TypeError::Cycle(name) => write!(f, "type '{}' refers to itself", name),
            TypeError::NotAType => write!(f, "expected a type"),
        }
    }
}

impl std::error::Error for TypeError {}

/// Name to type-node mapping built once from all top-level type
/// declarations, before any checking starts.
#[derive(Debug, Default)]
pub struct TypeTable {
    aliases: HashMap<SmolStr, NodeId>,
}

impl TypeTable {
    /// Collect every top-level type alias of the program.
    pub fn build(tree: &Tree) -> Self {
        let mut aliases = HashMap::new();
        if let Some(program) = tree.as_program(tree.root()) {
            for &item in &program.items {
                if let Some(alias) = tree.as_type_alias(item) {
                    // First declaration wins; the checker reports the
                    // duplicate separately.
                    aliases.entry(alias.name.clone()).or_insert(alias.ty);
                }
            }
        }
        Self { aliases }
    }

    pub fn alias_names(&self) -> impl Iterator<Item = &SmolStr> {
        self.aliases.keys()
    }

    /// Resolve a type node to a concrete type, following named
    /// references through the table.
    pub fn resolve(&self, tree: &Tree, id: NodeId) -> Result<Ty, TypeError> {
        self.resolve_guarded(tree, id, &mut Vec::new())
    }

    fn resolve_guarded(&self, tree: &Tree, id: NodeId, visiting: &mut Vec<SmolStr>) -> Result<Ty, TypeError> {
        let ty = tree.as_type(id).ok_or(TypeError::NotAType)?;
        match ty {
            TypeExpr::Integer => Ok(Ty::Int),
            TypeExpr::Real => Ok(Ty::Real),
            TypeExpr::Boolean => Ok(Ty::Bool),
            TypeExpr::Str => Ok(Ty::Str),
            TypeExpr::Array { len, elem } => Ok(Ty::Array {
                len: *len,
                elem: Box::new(self.resolve_guarded(tree, *elem, visiting)?),
            }),
            TypeExpr::Record { fields } => {
                let fields = fields
                    .iter()
                    .map(|field| {
                        self.resolve_guarded(tree, field.ty, visiting)
                            .map(|ty| (field.name.clone(), ty))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Ty::Record(RecordTy {
                    id,
                    fields: Rc::new(fields),
                }))
            }
            TypeExpr::Named(name) => {
                if visiting.contains(name) {
                    return Err(TypeError::Cycle(name.clone()));
                }
                let target = *self
                    .aliases
                    .get(name)
                    .ok_or_else(|| TypeError::Undefined(name.clone()))?;
                visiting.push(name.clone());
                let resolved = self.resolve_guarded(tree, target, visiting);
                visiting.pop();
                resolved
            }
        }
    }
}

/// Assignment compatibility lattice.
///
/// Identical types are always compatible. An Integer widens to a Real
/// target, a Real narrows (truncating) to an Integer target, and an
/// Integer collapses to a Boolean target. Arrays are compatible when
/// their element types are, regardless of size. Records are treated as
/// mutually compatible regardless of shape; this permissive rule is
/// deliberately kept next to the nominal-by-identity record synthesis
/// in the backend.
pub fn assignable(target: &Ty, source: &Ty) -> bool {
    match (target, source) {
        (Ty::Int, Ty::Int) | (Ty::Real, Ty::Real) | (Ty::Bool, Ty::Bool) | (Ty::Str, Ty::Str) => true,
        (Ty::Real, Ty::Int) => true,
        (Ty::Int, Ty::Real) => true,
        (Ty::Bool, Ty::Int) => true,
        (Ty::Array { elem: target, .. }, Ty::Array { elem: source, .. }) => {
            elements_compatible(target, source)
        }
        (Ty::Record(_), Ty::Record(_)) => true,
        _ => false,
    }
}

/// True when two types have the same machine representation, so an
/// assignment needs no conversion. Arrays compare structurally on the
/// element; records are representation-equal by the permissive rule.
pub fn identical(a: &Ty, b: &Ty) -> bool {
    match (a, b) {
        (Ty::Int, Ty::Int) | (Ty::Real, Ty::Real) | (Ty::Bool, Ty::Bool) | (Ty::Str, Ty::Str) => true,
        (Ty::Array { elem: a, .. }, Ty::Array { elem: b, .. }) => elements_compatible(a, b),
        (Ty::Record(_), Ty::Record(_)) => true,
        _ => false,
    }
}

fn elements_compatible(a: &Ty, b: &Ty) -> bool {
    match (a, b) {
        (Ty::Int, Ty::Int) | (Ty::Real, Ty::Real) | (Ty::Bool, Ty::Bool) | (Ty::Str, Ty::Str) => true,
        (Ty::Array { elem: a, .. }, Ty::Array { elem: b, .. }) => elements_compatible(a, b),
        (Ty::Record(_), Ty::Record(_)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kestrel_tree::TreeBuilder;

    #[test]
    fn test_lattice_rules() {
        assert!(assignable(&Ty::Int, &Ty::Int));
        assert!(assignable(&Ty::Real, &Ty::Int));
        assert!(assignable(&Ty::Int, &Ty::Real));
        assert!(assignable(&Ty::Bool, &Ty::Int));
        assert!(!assignable(&Ty::Int, &Ty::Bool));
        assert!(!assignable(&Ty::Str, &Ty::Int));
        assert!(!assignable(&Ty::Real, &Ty::Str));
    }

    #[test]
    fn test_array_compatibility_ignores_size() {
        let a = Ty::Array {
            len: 3,
            elem: Box::new(Ty::Int),
        };
        let b = Ty::Array {
            len: 8,
            elem: Box::new(Ty::Int),
        };
        let c = Ty::Array {
            len: 3,
            elem: Box::new(Ty::Real),
        };
        assert!(assignable(&a, &b));
        assert!(!assignable(&a, &c));
    }

    #[test]
    fn test_alias_resolution_follows_chain() {
        let mut b = TreeBuilder::new();
        let int = b.ty_int();
        let alias_a = b.type_alias("Meters", int);
        let named = b.ty_named("Meters");
        let alias_b = b.type_alias("Distance", named);
        let use_site = b.ty_named("Distance");
        b.program(vec![alias_a, alias_b]);
        let tree = b.finish();

        let table = TypeTable::build(&tree);
        assert_eq!(table.resolve(&tree, use_site), Ok(Ty::Int));
    }

    #[test]
    fn test_unresolved_and_cyclic_names() {
        let mut b = TreeBuilder::new();
        let named_self = b.ty_named("Loop");
        let alias = b.type_alias("Loop", named_self);
        let missing = b.ty_named("Nowhere");
        b.program(vec![alias]);
        let tree = b.finish();

        let table = TypeTable::build(&tree);
        assert_eq!(
            table.resolve(&tree, missing),
            Err(TypeError::Undefined(SmolStr::new("Nowhere")))
        );
        assert_eq!(
            table.resolve(&tree, named_self),
            Err(TypeError::Cycle(SmolStr::new("Loop")))
        );
    }

    #[test]
    fn test_record_identity_is_nominal_by_node() {
        // Two field-identical record declarations stay distinct types,
        // while the permissive lattice still accepts assignment between
        // them. Reference behavior, preserved as-is.
        let mut b = TreeBuilder::new();
        let int_a = b.ty_int();
        let rec_a = b.ty_record(vec![("x", int_a)]);
        let alias_a = b.type_alias("A", rec_a);
        let int_b = b.ty_int();
        let rec_b = b.ty_record(vec![("x", int_b)]);
        let alias_b = b.type_alias("B", rec_b);
        b.program(vec![alias_a, alias_b]);
        let tree = b.finish();

        let table = TypeTable::build(&tree);
        let a = table.resolve(&tree, rec_a).unwrap();
        let b = table.resolve(&tree, rec_b).unwrap();
        assert_ne!(a, b);
        assert!(assignable(&a, &b));
    }
}
