//! Micro-op tables for the load-store and arithmetic units.
//!
//! A micro-op travels as an immediate `ScadValue` in its `(opcode, count)`
//! view: the unit receiving it on its `opc` buffer executes `opcode`
//! `count` times. Opcode `0` is invalid on both units.
//!
//! PU suffixes: `N` natural (u64), `Z` integer (i64), `B` boolean.

/// Load-store unit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LsuOp {
    /// Pop an address from `in0`, push `memory[address]` to `out`.
    Load = 1,
    /// Pop an address from `in0` and a value from `in1`, store it.
    Store = 2,
}

/// Arithmetic (processing) unit operations.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PuOp {
    AddN = 1,
    SubN = 2,
    MulN = 3,
    DivN = 4,
    ModN = 5,
    LesN = 6,
    LeqN = 7,
    EqqN = 8,
    NeqN = 9,
    AddZ = 10,
    SubZ = 11,
    MulZ = 12,
    DivZ = 13,
    ModZ = 14,
    LesZ = 15,
    LeqZ = 16,
    EqqZ = 17,
    NeqZ = 18,
    AndB = 19,
    OrB = 20,
    EqqB = 21,
    NeqB = 22,
}

const LSU_TOKENS: [(&str, LsuOp); 2] = [("ld", LsuOp::Load), ("st", LsuOp::Store)];

const PU_TOKENS: [(&str, PuOp); 22] = [
    ("addN", PuOp::AddN),
    ("subN", PuOp::SubN),
    ("mulN", PuOp::MulN),
    ("divN", PuOp::DivN),
    ("modN", PuOp::ModN),
    ("lesN", PuOp::LesN),
    ("leqN", PuOp::LeqN),
    ("eqqN", PuOp::EqqN),
    ("neqN", PuOp::NeqN),
    ("addZ", PuOp::AddZ),
    ("subZ", PuOp::SubZ),
    ("mulZ", PuOp::MulZ),
    ("divZ", PuOp::DivZ),
    ("modZ", PuOp::ModZ),
    ("lesZ", PuOp::LesZ),
    ("leqZ", PuOp::LeqZ),
    ("eqqZ", PuOp::EqqZ),
    ("neqZ", PuOp::NeqZ),
    ("andB", PuOp::AndB),
    ("orB", PuOp::OrB),
    ("eqqB", PuOp::EqqB),
    ("neqB", PuOp::NeqB),
];

impl LsuOp {
    /// Decode a raw opcode.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        LSU_TOKENS.iter().map(|&(_, op)| op).find(|&op| op as u32 == raw)
    }

    /// Assembly token.
    #[must_use]
    pub fn token(self) -> &'static str {
        LSU_TOKENS.iter().find(|&&(_, op)| op == self).map_or("?", |&(t, _)| t)
    }
}

impl PuOp {
    /// Decode a raw opcode.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        PU_TOKENS.iter().map(|&(_, op)| op).find(|&op| op as u32 == raw)
    }

    /// Assembly token.
    #[must_use]
    pub fn token(self) -> &'static str {
        PU_TOKENS.iter().find(|&&(_, op)| op == self).map_or("?", |&(t, _)| t)
    }
}

/// A micro-op named in assembly source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// Load-store unit op.
    Lsu(LsuOp),
    /// Arithmetic unit op.
    Pu(PuOp),
}

impl MicroOp {
    /// Look up an assembly token (`ld`, `st`, `addN`, ...).
    ///
    /// Tokens are case sensitive: `addN` and `addZ` differ only in case.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        LSU_TOKENS
            .iter()
            .find(|&&(t, _)| t == token)
            .map(|&(_, op)| Self::Lsu(op))
            .or_else(|| {
                PU_TOKENS
                    .iter()
                    .find(|&&(t, _)| t == token)
                    .map(|&(_, op)| Self::Pu(op))
            })
    }

    /// Raw opcode as carried in the value's opcode word.
    #[must_use]
    pub const fn opcode(self) -> u32 {
        match self {
            Self::Lsu(op) => op as u32,
            Self::Pu(op) => op as u32,
        }
    }
}
