//! Non-fatal diagnostics reported by the semantic checker.
use std::fmt;

/// Classification of a checker finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    DuplicateDeclaration,
    UndeclaredVariable,
    UndeclaredFunction,
    UndefinedType,
    TypeMismatch,
    IndexOutOfRange,
    UnknownField,
    InvalidAssignmentTarget,
    ReturnOutsideFunction,
    UnsupportedConstruct,
}

impl fmt::Display for DiagnosticKind {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DiagnosticKind as K;
        match self {
            K::DuplicateDeclaration    => write!(f, "duplicate declaration"),
            K::UndeclaredVariable      => write!(f, "undeclared variable"),
            K::UndeclaredFunction      => write!(f, "undeclared function"),
            K::UndefinedType           => write!(f, "undefined type"),
            K::TypeMismatch            => write!(f, "type mismatch"),
            K::IndexOutOfRange         => write!(f, "index out of range"),
            K::UnknownField            => write!(f, "unknown field"),
            K::InvalidAssignmentTarget => write!(f, "invalid assignment target"),
            K::ReturnOutsideFunction   => write!(f, "return outside function"),
            K::UnsupportedConstruct    => write!(f, "unsupported construct"),
        }
    }
}

/// One finding. Diagnostics never stop the pipeline; the checker keeps
/// traversing and the caller decides what to do with the list.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    #[inline]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
