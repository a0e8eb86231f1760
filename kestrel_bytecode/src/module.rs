//! Artifact and module containers produced by code generation.
use crate::instr::{Instr, ValueKind};
use smol_str::SmolStr;
use std::fmt;

/// Width class of a function's single return slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetWidth {
    /// One storage unit: Integer or Boolean.
    Narrow,
    /// Two storage units: Real.
    Wide,
    /// Reference handle: String, Array or Record.
    Ref,
    /// No return value.
    None,
}

impl fmt::Display for RetWidth {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use RetWidth as W;
        match self {
            W::Narrow => write!(f, "narrow"),
            W::Wide   => write!(f, "wide"),
            W::Ref    => write!(f, "ref"),
            W::None   => write!(f, "none"),
        }
    }
}

/// Named typed storage field of a record module.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    pub name: SmolStr,
    pub kind: ValueKind,
}

/// One callable entry point.
///
/// Arguments are passed in declaration order and land in the leading
/// local slots; `locals` counts slot units including parameters, with
/// `Real` values occupying two units.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: SmolStr,
    pub params: Vec<ValueKind>,
    pub ret: RetWidth,
    pub locals: u16,
    pub code: Vec<Instr>,
}

/// A named, self-contained container of entry points and storage
/// fields. The primary module holds all source functions plus the
/// synthetic entry routine; auxiliary modules describe synthesized
/// record types.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub name: SmolStr,
    pub fields: Vec<FieldSlot>,
    pub functions: Vec<FunctionDef>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|func| func.name == name)
    }
}

/// Complete output of one `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub primary: Module,
    pub records: Vec<Module>,
}

impl Artifact {
    /// Resolve an entry point by its exact source-level name,
    /// searching the primary module first.
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.primary
            .function(name)
            .or_else(|| self.records.iter().find_map(|module| module.function(name)))
    }

    /// Auxiliary record module by synthesized name.
    pub fn record(&self, name: &str) -> Option<&Module> {
        self.records.iter().find(|module| module.name == name)
    }
}

impl fmt::Display for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        writeln!(f, ") -> {} [locals={}]", self.ret, self.locals)?;
        for (pc, instr) in self.code.iter().enumerate() {
            writeln!(f, "  {:4}  {}", pc, instr)?;
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for field in &self.fields {
            writeln!(f, "  field {} ({})", field.name, field.kind)?;
        }
        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        for module in &self.records {
            writeln!(f)?;
            write!(f, "{}", module)?;
        }
        Ok(())
    }
}
