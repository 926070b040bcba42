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
use std::cmp::Ordering;
use std::collections::BTreeMap;
use crate::address::Address;
use crate::instruction::{Instruction, Mnemonic};

/// A contiguous run of instructions belonging to a single contract.
/// Invariants (enforced by [`BasicBlockPartitioner`], never by this
/// struct's constructor alone): no instruction other than the last is
/// a terminator; no instruction other than the first is a `JUMPDEST`;
/// instructions are in strictly increasing `pc` order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BasicBlock {
    pub contract_address: Address,
    pub start_pc: usize,
    pub end_pc: usize,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// The mnemonic of the final instruction in the block.
    pub fn terminator(&self) -> Mnemonic {
        self.instructions.last().expect("block is never empty").mnemonic
    }

    pub fn starts_with_jumpdest(&self) -> bool {
        self.instructions[0].is_jumpdest()
    }
}

impl PartialOrd for BasicBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BasicBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.contract_address, self.start_pc).cmp(&(&other.contract_address, other.start_pc))
    }
}

// ============================================================================
// Basic Block Partitioner
// ============================================================================

/// Splits a flat, already-disassembled instruction sequence into
/// [`BasicBlock`]s.  A new block begins at offset 0, immediately after
/// any terminator, and at every `JUMPDEST` (even one immediately
/// following a terminator, in which case it starts its own block
/// rather than extending the previous one — `JUMPDEST` is only ever
/// the *first* instruction of a block).
pub struct BasicBlockPartitioner {
    contract_address: Address,
}

impl BasicBlockPartitioner {
    pub fn new(contract_address: Address) -> Self {
        Self { contract_address }
    }

    /// Partition `instructions` (assumed sorted by `pc`, as produced
    /// by [`crate::disassembler::Disassembler`]) into basic blocks,
    /// plus a `start_pc -> block index` lookup table.
    pub fn partition(&self, instructions: Vec<Instruction>) -> (Vec<BasicBlock>, BTreeMap<usize, usize>) {
        let mut blocks = Vec::new();
        let mut current: Vec<Instruction> = Vec::new();

        for insn in instructions {
            if insn.is_jumpdest() && !current.is_empty() {
                blocks.push(self.finish(std::mem::take(&mut current)));
            }
            let is_terminator = insn.is_terminator();
            current.push(insn);
            if is_terminator {
                blocks.push(self.finish(std::mem::take(&mut current)));
            }
        }
        if !current.is_empty() {
            blocks.push(self.finish(current));
        }

        let index = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.start_pc, i))
            .collect();
        (blocks, index)
    }

    fn finish(&self, instructions: Vec<Instruction>) -> BasicBlock {
        let start_pc = instructions[0].pc;
        let end_pc = instructions.last().unwrap().pc;
        BasicBlock {
            contract_address: self.contract_address,
            start_pc,
            end_pc,
            instructions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassembler::Disassembler;
    use crate::opcode;

    fn addr() -> Address {
        Address::new([0u8; 20])
    }

    #[test]
    fn splits_on_terminator_and_jumpdest() {
        let bytes = [
            opcode::PUSH1, 0x01, opcode::JUMP,
            opcode::JUMPDEST,
            opcode::PUSH1, 0x02, opcode::STOP,
        ];
        let insns = Disassembler::new(&bytes).disassemble();
        let (blocks, index) = BasicBlockPartitioner::new(addr()).partition(insns);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].start_pc, 0);
        assert_eq!(blocks[0].terminator(), Mnemonic::Jump);
        assert_eq!(blocks[1].start_pc, 3);
        assert!(blocks[1].starts_with_jumpdest());
        assert_eq!(index[&3], 1);
    }

    #[test]
    fn falls_off_the_end_without_terminator() {
        let bytes = [opcode::PUSH1, 0x01, opcode::PUSH1, 0x02];
        let insns = Disassembler::new(&bytes).disassemble();
        let (blocks, _) = BasicBlockPartitioner::new(addr()).partition(insns);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].instructions.len(), 2);
    }

    #[test]
    fn jumpdest_only_ever_starts_a_block() {
        let bytes = [opcode::JUMPDEST, opcode::JUMPDEST, opcode::STOP];
        let insns = Disassembler::new(&bytes).disassemble();
        let (blocks, _) = BasicBlockPartitioner::new(addr()).partition(insns);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].instructions.len(), 1);
        assert_eq!(blocks[1].instructions.len(), 2);
    }
}
