// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use crate::instruction::{Instruction, Mnemonic};

// ============================================================================
// Disassembler
// ============================================================================

/// Turns a raw bytecode sequence into a flat sequence of
/// [`Instruction`]s plus a `pc -> index` lookup table.  This is a
/// purely local, single-pass walk: it does not attempt to resolve
/// jump targets or split basic blocks, which are the job of
/// [`crate::block::BasicBlockPartitioner`].
pub struct Disassembler<'a> {
    bytes: &'a [u8],
}

impl<'a> Disassembler<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Disassemble the entire byte sequence.  Bytes belonging to a
    /// `PUSH*` immediate are never themselves decoded as opcodes.
    /// Trailing bytes that would start a `PUSH*` whose immediate runs
    /// past the end of the bytecode are padded with zero, matching
    /// the convention used by every mainstream EVM disassembler for
    /// truncated deploy/runtime code.
    pub fn disassemble(&mut self) -> Vec<Instruction> {
        let mut out = Vec::new();
        let mut pc = 0;
        while pc < self.bytes.len() {
            let byte = self.bytes[pc];
            let mnemonic = Mnemonic::decode(byte);
            let imm_len = mnemonic.immediate_len();
            let immediate = if imm_len > 0 {
                let start = pc + 1;
                let end = (start + imm_len).min(self.bytes.len());
                let mut bytes = self.bytes[start..end].to_vec();
                bytes.resize(imm_len, 0);
                Some(bytes)
            } else {
                None
            };
            out.push(Instruction::new(pc, mnemonic, immediate));
            pc += 1 + imm_len;
        }
        out
    }
}

/// Build the `pc -> index` map for a disassembled instruction
/// sequence, used by callers (basic-block partitioning, jump-target
/// resolution) that need to go from a byte offset back to the
/// instruction starting there.
pub fn pc_index(instructions: &[Instruction]) -> std::collections::BTreeMap<usize, usize> {
    instructions
        .iter()
        .enumerate()
        .map(|(i, insn)| (insn.pc, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode;

    #[test]
    fn disassembles_push_and_add() {
        let bytes = [opcode::PUSH1, 0x01, opcode::PUSH1, 0x02, opcode::ADD, opcode::STOP];
        let insns = Disassembler::new(&bytes).disassemble();
        assert_eq!(insns.len(), 4);
        assert_eq!(insns[0].mnemonic, Mnemonic::Push(1));
        assert_eq!(insns[0].immediate, Some(vec![0x01]));
        assert_eq!(insns[2].mnemonic, Mnemonic::Add);
        assert_eq!(insns[3].mnemonic, Mnemonic::Stop);
    }

    #[test]
    fn truncated_push_is_zero_padded() {
        let bytes = [opcode::PUSH2, 0xaa];
        let insns = Disassembler::new(&bytes).disassemble();
        assert_eq!(insns.len(), 1);
        assert_eq!(insns[0].immediate, Some(vec![0xaa, 0x00]));
    }

    #[test]
    fn unassigned_byte_becomes_invalid() {
        let bytes = [0x0c, opcode::STOP];
        let insns = Disassembler::new(&bytes).disassemble();
        assert_eq!(insns.len(), 2);
        assert_eq!(insns[0].mnemonic, Mnemonic::Invalid(0x0c));
    }

    #[test]
    fn roundtrips_to_original_bytes() {
        let bytes = [
            opcode::PUSH1, 0x20, opcode::JUMPDEST, opcode::DUP1, opcode::SWAP2,
            opcode::LOG2, opcode::CALL, opcode::INVALID,
        ];
        let insns = Disassembler::new(&bytes).disassemble();
        let mut out = Vec::new();
        for insn in &insns {
            insn.encode(&mut out);
        }
        assert_eq!(out, bytes);
    }
}
