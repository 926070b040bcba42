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
use std::collections::HashMap;

use crate::address::Address;
use crate::block::BasicBlock;
use crate::cfg::{Cfg, EdgeKind};
use crate::instruction::Mnemonic;
use crate::stack_value::StackValueAnalyzer;
use crate::trace::{Step, Trace};

/// A read-only index over a set of basic blocks, supporting the two
/// lookups every builder needs: by block key, and by an arbitrary pc
/// falling somewhere inside a block.
pub struct BlockTable<'a> {
    by_start: HashMap<(Address, usize), &'a BasicBlock>,
    by_pc: HashMap<(Address, usize), usize>,
}

impl<'a> BlockTable<'a> {
    pub fn new(blocks: &'a [BasicBlock]) -> Self {
        let mut by_start = HashMap::new();
        let mut by_pc = HashMap::new();
        for block in blocks {
            by_start.insert((block.contract_address, block.start_pc), block);
            for insn in &block.instructions {
                by_pc.insert((block.contract_address, insn.pc), block.start_pc);
            }
        }
        Self { by_start, by_pc }
    }

    pub fn block_starting_at(&self, address: Address, start_pc: usize) -> Option<&'a BasicBlock> {
        self.by_start.get(&(address, start_pc)).copied()
    }

    /// The block containing `pc`, wherever in the block it falls.
    pub fn block_containing(&self, address: Address, pc: usize) -> Option<&'a BasicBlock> {
        let start_pc = *self.by_pc.get(&(address, pc))?;
        self.block_starting_at(address, start_pc)
    }
}

fn dynamic_edge_kind(terminator: Mnemonic) -> EdgeKind {
    use Mnemonic::*;
    match terminator {
        Jump | Jumpi => EdgeKind::Jump,
        Call | Callcode | Delegatecall | Staticcall => EdgeKind::Call,
        Return | Revert => EdgeKind::Return,
        Selfdestruct => EdgeKind::Destruct,
        Stop | Invalid(_) => EdgeKind::Terminate,
        Create | Create2 => EdgeKind::Create,
        _ => EdgeKind::Unknown,
    }
}

fn build_dynamic(name: String, steps: &[&Step], table: &BlockTable) -> Cfg {
    let mut cfg = Cfg::new(name);
    let Some(first) = steps.first() else { return cfg };

    let Some(first_block) = table.block_containing(first.contract_address, first.pc) else {
        log::warn!(
            "first step (contract {}, pc {}) does not fall inside any known block",
            first.contract_address,
            first.pc
        );
        return cfg;
    };
    let mut current_idx = cfg.add_node(first_block.clone());

    for window in steps.windows(2) {
        let (prev, step) = (window[0], window[1]);
        if !prev.mnemonic.is_terminator() {
            continue;
        }
        match table.block_containing(step.contract_address, step.pc) {
            Some(block) => {
                let target_idx = cfg
                    .find_node(block.contract_address, block.start_pc)
                    .unwrap_or_else(|| cfg.add_node(block.clone()));
                let kind = dynamic_edge_kind(prev.mnemonic);
                cfg.add_edge(current_idx, target_idx, kind);
                current_idx = target_idx;
            }
            None => {
                log::warn!(
                    "step (contract {}, pc {}) following a terminator does not fall inside any known block",
                    step.contract_address,
                    step.pc
                );
            }
        }
    }
    cfg
}

/// Walks the full, cross-contract step stream of one transaction,
/// producing the dynamic transaction-level CFG.
pub struct DynamicTransactionCFGBuilder;

impl DynamicTransactionCFGBuilder {
    pub fn build(trace: &Trace, table: &BlockTable) -> Cfg {
        let steps: Vec<&Step> = trace.steps.iter().collect();
        build_dynamic(format!("transaction_{}", trace.tx_hash), &steps, table)
    }
}

/// Identical to [`DynamicTransactionCFGBuilder`] but restricted to a
/// single contract's steps within the trace.
pub struct DynamicContractCFGBuilder;

impl DynamicContractCFGBuilder {
    pub fn build(address: Address, trace: &Trace, table: &BlockTable) -> Cfg {
        let steps = trace.steps_for(address);
        build_dynamic(format!("contract_{address}"), &steps, table)
    }
}

/// Builds the static complete CFG for one contract straight from its
/// bytecode's basic blocks, without any execution evidence.
pub struct StaticContractCFGBuilder;

impl StaticContractCFGBuilder {
    pub fn build(address: Address, blocks: &[BasicBlock]) -> Cfg {
        let table = BlockTable::new(blocks);
        let analyzer = StackValueAnalyzer::new();
        let mut cfg = Cfg::new(format!("static_complete_{address}"));

        for block in blocks {
            cfg.add_node(block.clone());
        }

        for block in blocks {
            let current_idx = cfg
                .find_node(block.contract_address, block.start_pc)
                .expect("just inserted");
            let Some(last) = block.instructions.last() else { continue };

            match last.mnemonic {
                Mnemonic::Jumpi => {
                    let fallthrough_pc = last.next_pc();
                    if let Some(fb) = table.block_containing(address, fallthrough_pc) {
                        if let Some(idx) = cfg.find_node(fb.contract_address, fb.start_pc) {
                            cfg.add_edge(current_idx, idx, EdgeKind::ConditionFalse);
                        }
                    }
                    if let Some(target_pc) = analyzer.resolve(block) {
                        if let Some(tb) = table.block_containing(address, target_pc) {
                            if let Some(idx) = cfg.find_node(tb.contract_address, tb.start_pc) {
                                if idx != current_idx {
                                    cfg.add_edge(current_idx, idx, EdgeKind::ConditionTrue);
                                }
                            }
                        }
                    }
                }
                Mnemonic::Jump => {
                    if let Some(target_pc) = analyzer.resolve(block) {
                        if let Some(tb) = table.block_containing(address, target_pc) {
                            if let Some(idx) = cfg.find_node(tb.contract_address, tb.start_pc) {
                                if idx != current_idx {
                                    cfg.add_edge(current_idx, idx, EdgeKind::Jump);
                                }
                            }
                        }
                    }
                }
                Mnemonic::Stop
                | Mnemonic::Return
                | Mnemonic::Revert
                | Mnemonic::Invalid(_)
                | Mnemonic::Selfdestruct => {}
                Mnemonic::Call
                | Mnemonic::Callcode
                | Mnemonic::Delegatecall
                | Mnemonic::Staticcall
                | Mnemonic::Create
                | Mnemonic::Create2 => {
                    let next_pc = last.next_pc();
                    if let Some(nb) = table.block_containing(address, next_pc) {
                        if let Some(idx) = cfg.find_node(nb.contract_address, nb.start_pc) {
                            let kind = match last.mnemonic {
                                Mnemonic::Call | Mnemonic::Callcode => EdgeKind::Call,
                                Mnemonic::Delegatecall => EdgeKind::Delegatecall,
                                Mnemonic::Staticcall => EdgeKind::Staticcall,
                                Mnemonic::Create | Mnemonic::Create2 => EdgeKind::Create,
                                _ => unreachable!(),
                            };
                            cfg.add_edge(current_idx, idx, kind);
                        }
                    }
                }
                _ => {
                    // Block ended implicitly at a JUMPDEST-introduced
                    // split; control simply falls through.
                    let next_pc = last.next_pc();
                    if let Some(nb) = table.block_containing(address, next_pc) {
                        if let Some(idx) = cfg.find_node(nb.contract_address, nb.start_pc) {
                            cfg.add_edge(current_idx, idx, EdgeKind::Sequence);
                        }
                    }
                }
            }
        }

        Self::prune_unreachable(&mut cfg);
        cfg
    }

    /// Removes every node with no incoming edge, unless it starts at
    /// pc 0 or begins with `JUMPDEST`. Collected before any removal,
    /// so this is single-pass: a node that becomes unreachable only
    /// because a neighbour was just pruned survives this round.
    fn prune_unreachable(cfg: &mut Cfg) {
        let to_remove: Vec<usize> = cfg
            .nodes()
            .filter(|(idx, node)| {
                !cfg.has_incoming_edge(*idx)
                    && node.block.start_pc != 0
                    && !node.block.starts_with_jumpdest()
            })
            .map(|(idx, _)| idx)
            .collect();
        for idx in to_remove {
            cfg.remove_node(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::block::BasicBlockPartitioner;
    use crate::disassembler::Disassembler;
    use crate::opcode;

    fn addr() -> Address {
        Address::new([0x11; 20])
    }

    fn blocks_from(bytes: &[u8]) -> Vec<BasicBlock> {
        let insns = Disassembler::new(bytes).disassemble();
        BasicBlockPartitioner::new(addr()).partition(insns).0
    }

    #[test]
    fn s1_single_contract_linear_has_no_edges() {
        // PUSH1 1, PUSH1 2, ADD, STOP
        let bytes = [opcode::PUSH1, 0x01, opcode::PUSH1, 0x02, opcode::ADD, opcode::STOP];
        let blocks = blocks_from(&bytes);
        assert_eq!(blocks.len(), 1);
        let cfg = StaticContractCFGBuilder::build(addr(), &blocks);
        assert_eq!(cfg.edge_count(), 0);
        assert_eq!(cfg.node_count(), 1);
    }

    #[test]
    fn s2_jumpi_taken_produces_both_condition_edges() {
        // PUSH1 1, PUSH1 <pc of JUMPDEST below>, JUMPI, STOP, JUMPDEST, STOP
        let bytes = [
            opcode::PUSH1, 0x01,
            opcode::PUSH1, 0x06,
            opcode::JUMPI,
            opcode::STOP,
            opcode::JUMPDEST,
            opcode::STOP,
        ];
        let blocks = blocks_from(&bytes);
        assert_eq!(blocks.len(), 3);
        let cfg = StaticContractCFGBuilder::build(addr(), &blocks);
        let kinds: Vec<EdgeKind> = cfg.edges().map(|e| e.kind).collect();
        assert!(kinds.contains(&EdgeKind::ConditionFalse));
        assert!(kinds.contains(&EdgeKind::ConditionTrue));
    }

    #[test]
    fn s3_unresolved_jump_keeps_source_block_with_no_outgoing_edges() {
        // SLOAD, JUMP  (target is unknowable; source block starts at pc 0)
        let bytes = [opcode::SLOAD, opcode::JUMP];
        let blocks = blocks_from(&bytes);
        assert_eq!(blocks.len(), 1);
        let cfg = StaticContractCFGBuilder::build(addr(), &blocks);
        assert_eq!(cfg.edge_count(), 0);
        assert_eq!(cfg.node_count(), 1);
    }

    #[test]
    fn s5_self_loop_jump_is_suppressed() {
        // JUMPDEST, PUSH1 0, JUMP  -- jumps back to its own start
        let bytes = [opcode::JUMPDEST, opcode::PUSH1, 0x00, opcode::JUMP];
        let blocks = blocks_from(&bytes);
        assert_eq!(blocks.len(), 1);
        let cfg = StaticContractCFGBuilder::build(addr(), &blocks);
        assert_eq!(cfg.edge_count(), 0);
    }

    #[test]
    fn s6_unreachable_non_jumpdest_block_is_pruned() {
        // STOP, then an orphaned PUSH1/STOP pair nobody jumps to.
        let bytes = [opcode::STOP, opcode::PUSH1, 0x00, opcode::STOP];
        let blocks = blocks_from(&bytes);
        assert_eq!(blocks.len(), 2);
        let cfg = StaticContractCFGBuilder::build(addr(), &blocks);
        // Only the pc-0 block survives; the orphan has no incoming
        // edge and does not start with JUMPDEST.
        assert_eq!(cfg.node_count(), 1);
        assert!(cfg.find_node(addr(), 0).is_some());
    }

    #[test]
    fn s7_jumpdest_starting_block_survives_even_with_no_incoming_edge() {
        // STOP, then a JUMPDEST block nothing in-bytecode jumps to.
        let bytes = [opcode::STOP, opcode::JUMPDEST, opcode::STOP];
        let blocks = blocks_from(&bytes);
        assert_eq!(blocks.len(), 2);
        let cfg = StaticContractCFGBuilder::build(addr(), &blocks);
        assert_eq!(cfg.node_count(), 2);
    }
}
