//! Symbol and function tables.
use crate::types::Ty;
use smol_str::SmolStr;
use std::collections::HashMap;

/// Name to static-type mapping with the language's flat scope model:
/// one global scope plus, while inside a function, one function scope
/// holding parameters and locals. Blocks do not open new scopes, so
/// re-declaring a name inside the same function is an error, not a
/// shadowing binding.
#[derive(Debug, Default)]
pub struct SymbolTable {
    global: HashMap<SmolStr, Ty>,
    local: Option<HashMap<SmolStr, Ty>>,
}

impl SymbolTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the function scope. Any previous function scope is
    /// discarded; functions do not nest.
    #[inline]
    pub fn enter_function(&mut self) {
        self.local = Some(HashMap::new());
    }

    #[inline]
    pub fn exit_function(&mut self) {
        self.local = None;
    }

    /// Declare a name in the active scope. Fails when the name is
    /// already present there.
    pub fn declare(&mut self, name: &SmolStr, ty: Ty) -> Result<(), ()> {
        let scope = self.local.as_mut().unwrap_or(&mut self.global);
        if scope.contains_key(name) {
            return Err(());
        }
        scope.insert(name.clone(), ty);
        Ok(())
    }

    /// Look a name up in the function scope first, then globals.
    pub fn lookup(&self, name: &str) -> Option<&Ty> {
        self.local
            .as_ref()
            .and_then(|scope| scope.get(name))
            .or_else(|| self.global.get(name))
    }

    /// Drop a name from the active scope. Used to retire a `for`
    /// iterator once its loop ends.
    pub fn remove(&mut self, name: &str) {
        let scope = self.local.as_mut().unwrap_or(&mut self.global);
        scope.remove(name);
    }
}

/// Signature of a top-level function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunSig {
    pub params: Vec<Ty>,
    pub ret: Option<Ty>,
}

/// Name to signature mapping, fully populated over all top-level
/// functions before any body is checked or generated. This is what
/// makes forward and mutually-recursive calls resolve.
#[derive(Debug, Default)]
pub struct FunctionTable {
    funcs: HashMap<SmolStr, FunSig>,
}

impl FunctionTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signature. Fails when the name is taken.
    pub fn insert(&mut self, name: &SmolStr, sig: FunSig) -> Result<(), ()> {
        if self.funcs.contains_key(name) {
            return Err(());
        }
        self.funcs.insert(name.clone(), sig);
        Ok(())
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&FunSig> {
        self.funcs.get(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_flat_function_scope() {
        let mut table = SymbolTable::new();
        table.declare(&SmolStr::new("g"), Ty::Int).unwrap();

        table.enter_function();
        table.declare(&SmolStr::new("x"), Ty::Real).unwrap();
        // Same name in the same function scope is rejected.
        assert!(table.declare(&SmolStr::new("x"), Ty::Int).is_err());
        // Globals stay visible from inside the function.
        assert_eq!(table.lookup("g"), Some(&Ty::Int));
        assert_eq!(table.lookup("x"), Some(&Ty::Real));

        table.exit_function();
        assert_eq!(table.lookup("x"), None);
    }
}
