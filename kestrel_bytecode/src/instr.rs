//! Typed stack-machine instructions.
use smol_str::SmolStr;
use std::fmt;

/// Function-local branch target. Fresh per control-flow construct;
/// positions are defined by [`Instr::Mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u16);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Width/representation class of a stack or storage value.
///
/// Booleans use the integer class with a 0/1 encoding. Arrays and
/// records are `Ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Real,
    Str,
    Ref,
}

impl fmt::Display for ValueKind {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ValueKind as K;
        match self {
            K::Int  => write!(f, "i"),
            K::Real => write!(f, "r"),
            K::Str  => write!(f, "s"),
            K::Ref  => write!(f, "ref"),
        }
    }
}

/// One instruction of the abstract typed stack machine.
///
/// Local storage is addressed by slot index; a `Real` occupies two
/// consecutive slot units, everything else one.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /* Constants */
    ConstInt(i64),
    ConstReal(f64),
    ConstStr(SmolStr),
    ConstNull,

    /* Local slots */
    LoadInt(u16),
    StoreInt(u16),
    LoadReal(u16),
    StoreReal(u16),
    LoadRef(u16),
    StoreRef(u16),

    /* Integer arithmetic, wrapping on overflow */
    AddInt,
    SubInt,
    MulInt,
    DivInt,
    NegInt,

    /* Real arithmetic */
    AddReal,
    SubReal,
    MulReal,
    DivReal,
    NegReal,

    /* Bitwise over the 0/1 boolean encoding */
    AndInt,
    OrInt,
    XorInt,

    /// Ordered three-way compare of two reals; pushes -1, 0 or 1.
    CmpReal,

    /* Conversions */
    RealToInt,
    IntToReal,

    /* Branches */
    Jump(Label),
    BranchZero(Label),
    BranchNonZero(Label),
    BranchNeg(Label),
    BranchPos(Label),
    BranchIntEq(Label),
    BranchIntLt(Label),
    BranchIntGt(Label),
    BranchNull(Label),
    /// Defines the position of a label. Generates no code.
    Mark(Label),

    /* Arrays */
    NewArray(ValueKind),
    ArrayLoad(ValueKind),
    ArrayStore(ValueKind),
    ArrayLen,

    /* Records */
    NewRecord(SmolStr),
    GetField {
        record: SmolStr,
        field: SmolStr,
        kind: ValueKind,
    },
    PutField {
        record: SmolStr,
        field: SmolStr,
        kind: ValueKind,
    },

    /* Calls and returns */
    Call(SmolStr),
    RetInt,
    RetReal,
    RetRef,
    Ret,

    /* Stack plumbing */
    Dup,
    Pop,

    /// Raise a runtime fault with the given message.
    Fault(SmolStr),
    /// Pop one value of the given kind and write its text form to the
    /// program output.
    Write(ValueKind),
}

impl fmt::Display for Instr {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Instr as I;
        match self {
            I::ConstInt(v)      => write!(f, "const.i {}", v),
            I::ConstReal(v)     => write!(f, "const.r {:?}", v),
            I::ConstStr(v)      => write!(f, "const.s {:?}", v.as_str()),
            I::ConstNull        => write!(f, "const.null"),
            I::LoadInt(s)       => write!(f, "load.i {}", s),
            I::StoreInt(s)      => write!(f, "store.i {}", s),
            I::LoadReal(s)      => write!(f, "load.r {}", s),
            I::StoreReal(s)     => write!(f, "store.r {}", s),
            I::LoadRef(s)       => write!(f, "load.ref {}", s),
            I::StoreRef(s)      => write!(f, "store.ref {}", s),
            I::AddInt           => write!(f, "add.i"),
            I::SubInt           => write!(f, "sub.i"),
            I::MulInt           => write!(f, "mul.i"),
            I::DivInt           => write!(f, "div.i"),
            I::NegInt           => write!(f, "neg.i"),
            I::AddReal          => write!(f, "add.r"),
            I::SubReal          => write!(f, "sub.r"),
            I::MulReal          => write!(f, "mul.r"),
            I::DivReal          => write!(f, "div.r"),
            I::NegReal          => write!(f, "neg.r"),
            I::AndInt           => write!(f, "and.i"),
            I::OrInt            => write!(f, "or.i"),
            I::XorInt           => write!(f, "xor.i"),
            I::CmpReal          => write!(f, "cmp.r"),
            I::RealToInt        => write!(f, "r2i"),
            I::IntToReal        => write!(f, "i2r"),
            I::Jump(l)          => write!(f, "jmp {}", l),
            I::BranchZero(l)    => write!(f, "br.z {}", l),
            I::BranchNonZero(l) => write!(f, "br.nz {}", l),
            I::BranchNeg(l)     => write!(f, "br.neg {}", l),
            I::BranchPos(l)     => write!(f, "br.pos {}", l),
            I::BranchIntEq(l)   => write!(f, "br.eq.i {}", l),
            I::BranchIntLt(l)   => write!(f, "br.lt.i {}", l),
            I::BranchIntGt(l)   => write!(f, "br.gt.i {}", l),
            I::BranchNull(l)    => write!(f, "br.null {}", l),
            I::Mark(l)          => write!(f, "{}:", l),
            I::NewArray(k)      => write!(f, "newarr.{}", k),
            I::ArrayLoad(k)     => write!(f, "aload.{}", k),
            I::ArrayStore(k)    => write!(f, "astore.{}", k),
            I::ArrayLen         => write!(f, "arrlen"),
            I::NewRecord(name)  => write!(f, "newrec {}", name),
            I::GetField { record, field, kind } => write!(f, "getfield.{} {}.{}", kind, record, field),
            I::PutField { record, field, kind } => write!(f, "putfield.{} {}.{}", kind, record, field),
            I::Call(name)       => write!(f, "call {}", name),
            I::RetInt           => write!(f, "ret.i"),
            I::RetReal          => write!(f, "ret.r"),
            I::RetRef           => write!(f, "ret.ref"),
            I::Ret              => write!(f, "ret"),
            I::Dup              => write!(f, "dup"),
            I::Pop              => write!(f, "pop"),
            I::Fault(msg)       => write!(f, "fault {:?}", msg.as_str()),
            I::Write(k)         => write!(f, "write.{}", k),
        }
    }
}
