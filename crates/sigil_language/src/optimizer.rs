//! Peephole passes over finished bytecode.

use std::collections::HashSet;

use tracing::trace;

use crate::compiler::CompilerOptions;
use crate::opcode::{Bytecode, Instruction, Opcode};

/// Runs every enabled pass.
pub fn optimize(code: &mut Bytecode, options: &CompilerOptions) {
    let before = code.len();
    remove_noops(code);
    if options.fuse_pops {
        fuse_pops(code);
    }
    trace!(before, after = code.len(), "optimized bytecode");
}

/// Deletes `Noop`s and remaps jump targets so control flow is unchanged.
///
/// A jump to a removed instruction lands on the next kept one.
pub fn remove_noops(code: &mut Bytecode) {
    if !code.iter().any(|(op, _)| op == Opcode::Noop) {
        return;
    }
    // remap[i] is the new position of the first kept instruction at or
    // after i; remap[len] is the new length.
    let mut remap = Vec::with_capacity(code.len() + 1);
    let mut kept = 0u32;
    for instr in &code.instructions {
        remap.push(kept);
        if instr.opcode() != Opcode::Noop {
            kept += 1;
        }
    }
    remap.push(kept);

    code.instructions = code
        .instructions
        .iter()
        .filter(|i| i.opcode() != Opcode::Noop)
        .map(|&instr| {
            if instr.opcode().is_jump() {
                let target = remap
                    .get(instr.operand() as usize)
                    .copied()
                    .unwrap_or(kept);
                instr.with_operand(target)
            } else {
                instr
            }
        })
        .collect();
}

/// Replaces `Pop, Pop` with `Pop2` unless something jumps between them.
pub fn fuse_pops(code: &mut Bytecode) {
    let targets: HashSet<u32> = code
        .iter()
        .filter(|(op, _)| op.is_jump())
        .map(|(_, target)| target)
        .collect();
    let mut fused = false;
    let mut i = 0;
    while i + 1 < code.instructions.len() {
        let pair = (
            code.instructions[i].opcode(),
            code.instructions[i + 1].opcode(),
        );
        if pair == (Opcode::Pop, Opcode::Pop) && !targets.contains(&((i + 1) as u32)) {
            code.instructions[i] = Instruction::new(Opcode::Pop2, 0);
            code.instructions[i + 1] = Instruction::new(Opcode::Noop, 0);
            fused = true;
            i += 2;
        } else {
            i += 1;
        }
    }
    if fused {
        remove_noops(code);
    }
}
