//! Bytecode instruction set for the Sigil VM.
//!
//! The VM is stack-based. Every instruction is one packed 64-bit word: the
//! opcode in the high half and a single operand in the low half. What the
//! operand means depends on the opcode (constant-pool index, variable
//! slot, jump target, argument count, type code).

#![allow(clippy::doc_markdown)]

use std::fmt;

use sigil_foundation::{Error, ErrorKind, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Operation selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum Opcode {
    // === Stack ===
    /// No operation. Removed by the optimizer.
    Noop = 0,
    /// Discard the top of stack.
    Pop,
    /// Discard the top two values.
    Pop2,
    /// Push a copy of the top of stack.
    Dup,

    // === Return ===
    /// Leave the frame, giving `null` to the caller.
    Return,
    /// Leave the frame, giving the top of stack to the caller.
    ReturnValue,

    // === Arithmetic and bitwise: `[a, b] -> [a op b]` ===
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a % b`
    Mod,
    /// `a ** b`
    Pow,
    /// `a & b`
    BwAnd,
    /// `a | b`
    BwOr,
    /// `a ^ b`
    BwXor,
    /// `[a] -> [~a]`
    BwNot,
    /// `a << b`
    ShiftLeft,
    /// `a >> b`
    ShiftRight,
    /// `a . b`
    Concat,

    // === Comparison: `[a, b] -> [bool]` ===
    /// `a == b`
    Equal,
    /// `a != b`
    NotEqual,
    /// `a === b`
    Identical,
    /// `a !== b`
    NotIdentical,
    /// `[a] -> [!a]`
    Not,
    /// `a > b`
    Greater,
    /// `a < b`
    Less,
    /// `a >= b`
    GreaterOrEqual,
    /// `a <= b`
    LessOrEqual,
    /// `a <=> b`, pushes -1, 0 or 1.
    Compare,

    // === Arrays ===
    /// `[ref, value] -> [value]`: write `value` through `ref`.
    AssignRef,
    /// Push an empty array.
    ArrayNew,
    /// `[array, key] -> [element]`, warning on missing keys.
    ArrayAccessRead,
    /// Like `ArrayAccessRead` but silent, for `isset` and `??`.
    ArrayAccessQuiet,
    /// `[container, key] -> [container, key, element]`: a quiet read that
    /// keeps its operands for a following write.
    ArrayAccessPeek,
    /// `[container, key] -> [element ref]`, creating the element.
    ArrayAccessWrite,
    /// `[container] -> [element ref]` for a new element at the next key.
    ArrayAccessPush,
    /// `[container, key] -> [null]`, removing the element.
    ArrayUnset,

    // === Foreach protocol ===
    /// `[iterable] -> [iterator]`
    ForEachInit,
    /// Advance the iterator on top of the stack.
    ForEachNext,
    /// Push whether the iterator is on an entry.
    ForEachValid,

    /// Placeholder for user-level exceptions: pops its operand.
    Throw,

    // === Single operand ===
    /// Store the top of stack into a slot (rebinding on references).
    Assign,
    /// `$slot += top`
    AssignAdd,
    /// `$slot -= top`
    AssignSub,
    /// `$slot *= top`
    AssignMul,
    /// `$slot /= top`
    AssignDiv,
    /// `$slot %= top`
    AssignMod,
    /// `$slot **= top`
    AssignPow,
    /// `$slot &= top`
    AssignBwAnd,
    /// `$slot |= top`
    AssignBwOr,
    /// `$slot ^= top`
    AssignBwXor,
    /// `$slot .= top`
    AssignConcat,
    /// `$slot <<= top`
    AssignShiftLeft,
    /// `$slot >>= top`
    AssignShiftRight,
    /// `$slot ??= top`
    AssignCoalesce,
    /// `[ref, value] -> [result]`; the operand is the binary opcode.
    AssignOpRef,
    /// Increment or decrement through a reference; the operand selects
    /// pre/post and direction (0 `++x`, 1 `--x`, 2 `x++`, 3 `x--`).
    IncDecRef,
    /// Cast the top of stack; the operand is a type code.
    Cast,
    /// `++$slot`
    PreIncrement,
    /// `$slot++`
    PostIncrement,
    /// `--$slot`
    PreDecrement,
    /// `$slot--`
    PostDecrement,
    /// Push a copy of a slot.
    Load,
    /// Push a reference to a slot, promoting it in place.
    LoadRef,
    /// Push a constant-pool entry.
    Const,
    /// Jump to an absolute instruction index.
    Jump,
    /// Pop; jump if truthy.
    JumpTrue,
    /// Pop; jump if falsy.
    JumpFalse,
    /// Call the callee sitting below `operand` arguments.
    Call,
    /// Pop and print `operand` values.
    Echo,
    /// Pop `operand` values; push true if none is null.
    IsSet,
    /// Drop `operand` values beneath the top of stack.
    PopBelow,
    /// Bind the iterator's key to a slot.
    ForEachKey,
    /// Bind a copy of the iterator's value to a slot.
    ForEachValue,
    /// Bind the iterator's element to a slot by reference.
    ForEachValueRef,
    /// Push a callable handle for a function-table entry.
    InitCall,
    /// Clear a slot.
    Unset,
}

impl Opcode {
    /// Every opcode, in numeric order.
    pub const ALL: [Self; 77] = [
        Self::Noop,
        Self::Pop,
        Self::Pop2,
        Self::Dup,
        Self::Return,
        Self::ReturnValue,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Mod,
        Self::Pow,
        Self::BwAnd,
        Self::BwOr,
        Self::BwXor,
        Self::BwNot,
        Self::ShiftLeft,
        Self::ShiftRight,
        Self::Concat,
        Self::Equal,
        Self::NotEqual,
        Self::Identical,
        Self::NotIdentical,
        Self::Not,
        Self::Greater,
        Self::Less,
        Self::GreaterOrEqual,
        Self::LessOrEqual,
        Self::Compare,
        Self::AssignRef,
        Self::ArrayNew,
        Self::ArrayAccessRead,
        Self::ArrayAccessQuiet,
        Self::ArrayAccessPeek,
        Self::ArrayAccessWrite,
        Self::ArrayAccessPush,
        Self::ArrayUnset,
        Self::ForEachInit,
        Self::ForEachNext,
        Self::ForEachValid,
        Self::Throw,
        Self::Assign,
        Self::AssignAdd,
        Self::AssignSub,
        Self::AssignMul,
        Self::AssignDiv,
        Self::AssignMod,
        Self::AssignPow,
        Self::AssignBwAnd,
        Self::AssignBwOr,
        Self::AssignBwXor,
        Self::AssignConcat,
        Self::AssignShiftLeft,
        Self::AssignShiftRight,
        Self::AssignCoalesce,
        Self::AssignOpRef,
        Self::IncDecRef,
        Self::Cast,
        Self::PreIncrement,
        Self::PostIncrement,
        Self::PreDecrement,
        Self::PostDecrement,
        Self::Load,
        Self::LoadRef,
        Self::Const,
        Self::Jump,
        Self::JumpTrue,
        Self::JumpFalse,
        Self::Call,
        Self::Echo,
        Self::IsSet,
        Self::PopBelow,
        Self::ForEachKey,
        Self::ForEachValue,
        Self::ForEachValueRef,
        Self::InitCall,
        Self::Unset,
    ];

    /// Decodes an opcode number.
    #[must_use]
    pub fn from_u32(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Returns true if the operand field is meaningful.
    #[must_use]
    pub const fn has_operand(self) -> bool {
        self as u32 >= Self::Assign as u32
    }

    /// Returns true for jumps, whose operand is an instruction index.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpTrue | Self::JumpFalse)
    }

    /// Returns the disassembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Noop => "NOOP",
            Self::Pop => "POP",
            Self::Pop2 => "POP2",
            Self::Dup => "DUP",
            Self::Return => "RETURN",
            Self::ReturnValue => "RETURN_VAL",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Pow => "POW",
            Self::BwAnd => "BW_AND",
            Self::BwOr => "BW_OR",
            Self::BwXor => "BW_XOR",
            Self::BwNot => "BW_NOT",
            Self::ShiftLeft => "SHL",
            Self::ShiftRight => "SHR",
            Self::Concat => "CONCAT",
            Self::Equal => "EQ",
            Self::NotEqual => "NOT_EQ",
            Self::Identical => "IDENTICAL",
            Self::NotIdentical => "NOT_IDENTICAL",
            Self::Not => "NOT",
            Self::Greater => "GT",
            Self::Less => "LT",
            Self::GreaterOrEqual => "GTE",
            Self::LessOrEqual => "LTE",
            Self::Compare => "CMP",
            Self::AssignRef => "ASSIGN_REF",
            Self::ArrayNew => "ARR_NEW",
            Self::ArrayAccessRead => "ARR_READ",
            Self::ArrayAccessQuiet => "ARR_READ_Q",
            Self::ArrayAccessPeek => "ARR_PEEK",
            Self::ArrayAccessWrite => "ARR_WRITE",
            Self::ArrayAccessPush => "ARR_PUSH",
            Self::ArrayUnset => "ARR_UNSET",
            Self::ForEachInit => "FE_INIT",
            Self::ForEachNext => "FE_NEXT",
            Self::ForEachValid => "FE_VALID",
            Self::Throw => "THROW",
            Self::Assign => "ASSIGN",
            Self::AssignAdd => "ASSIGN_ADD",
            Self::AssignSub => "ASSIGN_SUB",
            Self::AssignMul => "ASSIGN_MUL",
            Self::AssignDiv => "ASSIGN_DIV",
            Self::AssignMod => "ASSIGN_MOD",
            Self::AssignPow => "ASSIGN_POW",
            Self::AssignBwAnd => "ASSIGN_AND",
            Self::AssignBwOr => "ASSIGN_OR",
            Self::AssignBwXor => "ASSIGN_XOR",
            Self::AssignConcat => "ASSIGN_CONCAT",
            Self::AssignShiftLeft => "ASSIGN_SHL",
            Self::AssignShiftRight => "ASSIGN_SHR",
            Self::AssignCoalesce => "ASSIGN_COAL",
            Self::AssignOpRef => "ASSIGN_OP_REF",
            Self::IncDecRef => "INC_DEC_REF",
            Self::Cast => "CAST",
            Self::PreIncrement => "PRE_INC",
            Self::PostIncrement => "POST_INC",
            Self::PreDecrement => "PRE_DEC",
            Self::PostDecrement => "POST_DEC",
            Self::Load => "LOAD",
            Self::LoadRef => "LOAD_REF",
            Self::Const => "CONST",
            Self::Jump => "JUMP",
            Self::JumpTrue => "JUMP_TRUE",
            Self::JumpFalse => "JUMP_FALSE",
            Self::Call => "CALL",
            Self::Echo => "ECHO",
            Self::IsSet => "ISSET",
            Self::PopBelow => "POP_BELOW",
            Self::ForEachKey => "FE_KEY",
            Self::ForEachValue => "FE_VALUE",
            Self::ForEachValueRef => "FE_VALUE_REF",
            Self::InitCall => "INIT_CALL",
            Self::Unset => "UNSET",
        }
    }

    /// Returns the compound-assignment opcode for a binary operator.
    #[must_use]
    pub const fn compound(self) -> Option<Self> {
        Some(match self {
            Self::Add => Self::AssignAdd,
            Self::Sub => Self::AssignSub,
            Self::Mul => Self::AssignMul,
            Self::Div => Self::AssignDiv,
            Self::Mod => Self::AssignMod,
            Self::Pow => Self::AssignPow,
            Self::BwAnd => Self::AssignBwAnd,
            Self::BwOr => Self::AssignBwOr,
            Self::BwXor => Self::AssignBwXor,
            Self::Concat => Self::AssignConcat,
            Self::ShiftLeft => Self::AssignShiftLeft,
            Self::ShiftRight => Self::AssignShiftRight,
            _ => return None,
        })
    }

    /// Returns the binary operator behind a compound-assignment opcode.
    #[must_use]
    pub const fn binary(self) -> Option<Self> {
        Some(match self {
            Self::AssignAdd => Self::Add,
            Self::AssignSub => Self::Sub,
            Self::AssignMul => Self::Mul,
            Self::AssignDiv => Self::Div,
            Self::AssignMod => Self::Mod,
            Self::AssignPow => Self::Pow,
            Self::AssignBwAnd => Self::BwAnd,
            Self::AssignBwOr => Self::BwOr,
            Self::AssignBwXor => Self::BwXor,
            Self::AssignConcat => Self::Concat,
            Self::AssignShiftLeft => Self::ShiftLeft,
            Self::AssignShiftRight => Self::ShiftRight,
            _ => return None,
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// One packed instruction word: `opcode << 32 | operand`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instruction(u64);

impl Instruction {
    /// Packs an opcode and operand.
    #[must_use]
    pub const fn new(op: Opcode, operand: u32) -> Self {
        Self(((op as u64) << 32) | operand as u64)
    }

    /// Returns the raw word.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Unpacks a raw word.
    ///
    /// # Errors
    ///
    /// Returns an error if the opcode field is not a known opcode.
    pub fn from_bits(bits: u64) -> Result<Self> {
        let code = (bits >> 32) as u32;
        Opcode::from_u32(code)
            .map(|_| Self(bits))
            .ok_or_else(|| Error::new(ErrorKind::Internal(format!("unknown opcode {code}"))))
    }

    /// Returns the opcode.
    #[must_use]
    pub fn opcode(self) -> Opcode {
        // Construction guarantees a valid opcode field.
        Opcode::from_u32((self.0 >> 32) as u32).unwrap_or(Opcode::Noop)
    }

    /// Returns the operand.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn operand(self) -> u32 {
        self.0 as u32
    }

    /// Returns the instruction with its operand replaced.
    #[must_use]
    pub fn with_operand(self, operand: u32) -> Self {
        Self::new(self.opcode(), operand)
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        if op.has_operand() {
            write!(f, "{op:?}({})", self.operand())
        } else {
            write!(f, "{op:?}")
        }
    }
}

/// A sequence of bytecode instructions.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bytecode {
    /// The instructions.
    pub instructions: Vec<Instruction>,
}

impl Bytecode {
    /// Creates an empty bytecode sequence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
        }
    }

    /// Adds a zero-operand instruction and returns its index.
    pub fn emit(&mut self, op: Opcode) -> usize {
        self.emit_with(op, 0)
    }

    /// Adds an instruction with an operand and returns its index.
    pub fn emit_with(&mut self, op: Opcode, operand: u32) -> usize {
        let idx = self.instructions.len();
        self.instructions.push(Instruction::new(op, operand));
        idx
    }

    /// Returns the current instruction count (next instruction index).
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if there are no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Instruction> {
        self.instructions.get(idx).copied()
    }

    /// Returns the last instruction.
    #[must_use]
    pub fn last(&self) -> Option<Instruction> {
        self.instructions.last().copied()
    }

    /// Points the jump at `idx` to `target`.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `idx` is not a jump.
    pub fn patch_jump(&mut self, idx: usize, target: usize) -> Result<()> {
        let target = u32::try_from(target)
            .map_err(|_| Error::internal("jump target out of range"))?;
        match self.instructions.get_mut(idx) {
            Some(ins) if ins.opcode().is_jump() => {
                *ins = ins.with_operand(target);
                Ok(())
            }
            other => Err(Error::internal(format!(
                "cannot patch non-jump instruction at {idx}: {other:?}"
            ))),
        }
    }

    /// Iterates `(opcode, operand)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Opcode, u32)> + '_ {
        self.instructions.iter().map(|i| (i.opcode(), i.operand()))
    }
}

impl fmt::Debug for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.instructions).finish()
    }
}

impl fmt::Display for Bytecode {
    /// One line per instruction: index, mnemonic, operand.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ins) in self.instructions.iter().enumerate() {
            let op = ins.opcode();
            if op.has_operand() {
                writeln!(f, "{i:05}: {:<13} {}", op.mnemonic(), ins.operand())?;
            } else {
                writeln!(f, "{i:05}: {}", op.mnemonic())?;
            }
        }
        Ok(())
    }
}

impl FromIterator<(Opcode, u32)> for Bytecode {
    fn from_iter<I: IntoIterator<Item = (Opcode, u32)>>(iter: I) -> Self {
        Self {
            instructions: iter
                .into_iter()
                .map(|(op, operand)| Instruction::new(op, operand))
                .collect(),
        }
    }
}
