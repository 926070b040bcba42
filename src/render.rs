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
use std::fmt::Write;

use crate::address::Address;
use crate::cfg::{Cfg, EdgeKind};

/// Which of the three CFG products is being rendered. Each picks its
/// own node-id scheme, graph name, and styling, matching the original
/// tool's three independent renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Cross-contract dynamic CFG: nodes colour-coded per contract.
    Transaction,
    /// Single-contract dynamic CFG.
    Contract,
    /// Single-contract static complete CFG.
    StaticContract,
}

/// A small fixed palette cycled by first-seen order of distinct
/// contract addresses, used only in [`RenderMode::Transaction`].
const CONTRACT_COLORS: &[&str] = &[
    "#a8d1ff", "#ffb3ba", "#baffc9", "#ffffba", "#ffdfba", "#ffb3ff", "#c9c9ff", "#bafaff",
    "#d1c4e9", "#b2ebf2", "#c8e6c9", "#fff9c4", "#ffccbc",
];

fn edge_color(kind: EdgeKind) -> &'static str {
    use EdgeKind::*;
    match kind {
        Jump | Jumpi => "#ff9800",
        Call | Delegatecall | Staticcall => "#4caf50",
        Return => "#2196f3",
        Destruct => "#f44336",
        Terminate => "#9e9e9e",
        Create => "#8bc34a",
        ConditionTrue => "#9ece6a",
        ConditionFalse => "#f7768e",
        Invalid | Sequence | Unknown => "#bdbdbd",
    }
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// The node id string used for one block, per rendering mode.
fn node_id(mode: RenderMode, address: Address, start_pc: usize) -> String {
    match mode {
        RenderMode::Transaction => format!("node_{}_{:x}", strip_0x(&address.to_string()), start_pc),
        RenderMode::Contract | RenderMode::StaticContract => format!("block_{start_pc:x}"),
    }
}

/// Renders `cfg` as a DOT-language graph. The node label always
/// carries the shortened contract address, `start_pc`/`end_pc`, the
/// terminator, and the full instruction listing separated from the
/// header by a `---------` marker — [`crate::grep`] depends on this
/// exact marker to locate the instruction section of a node's label.
pub fn render(cfg: &Cfg, mode: RenderMode) -> String {
    let mut out = String::new();
    let graph_name = match mode {
        RenderMode::Transaction => "CFG",
        RenderMode::Contract => "Contract_CFG",
        RenderMode::StaticContract => "Static_Complete_CFG",
    };
    writeln!(out, "digraph {graph_name} {{").unwrap();
    writeln!(out, "    rankdir=TB;").unwrap();
    match mode {
        RenderMode::Transaction => {
            writeln!(out, "    node [shape=box, style=\"filled, rounded\", fontname=\"Arial\", fontsize=8, margin=0.1];").unwrap();
            writeln!(out, "    edge [fontname=\"Arial\", fontsize=8, color=\"#555555\"];\n").unwrap();
        }
        RenderMode::Contract | RenderMode::StaticContract => {
            writeln!(out, "    node [shape=box, style=\"filled, rounded\", fontname=\"Monospace\", fontsize=9, margin=0.15];").unwrap();
            writeln!(out, "    edge [fontname=\"Arial\", fontsize=8, penwidth=1.2];\n").unwrap();
        }
    }

    let mut address_color: HashMap<Address, &str> = HashMap::new();
    if mode == RenderMode::Transaction {
        let mut next_color = 0;
        for (_, node) in cfg.nodes() {
            address_color.entry(node.block.contract_address).or_insert_with(|| {
                let color = CONTRACT_COLORS[next_color % CONTRACT_COLORS.len()];
                next_color += 1;
                color
            });
        }
    }

    for (_, node) in cfg.nodes() {
        let block = &node.block;
        let id = node_id(mode, block.contract_address, block.start_pc);
        let fill = match mode {
            RenderMode::Transaction => address_color.get(&block.contract_address).copied().unwrap_or("#e0e0e0"),
            RenderMode::Contract | RenderMode::StaticContract => "#e6f7ff",
        };
        let instructions = block
            .instructions
            .iter()
            .map(|i| format!("{:#x}: {}", i.pc, i.mnemonic))
            .collect::<Vec<_>>()
            .join("\\n");
        let label = format!(
            "{}...\\nstart: {:#x} | end: {:#x}\\nterminator: {}\\n---------\\n{}",
            block.contract_address.short_hex(),
            block.start_pc,
            block.end_pc,
            block.terminator(),
            instructions,
        );
        let label = label.replace('"', "\\\"");
        writeln!(out, "    \"{id}\" [label=\"{label}\", fillcolor=\"{fill}\"];").unwrap();
    }
    writeln!(out).unwrap();

    for edge in cfg.edges() {
        let source = &cfg.node(edge.source).expect("edge source must be live").block;
        let target = &cfg.node(edge.target).expect("edge target must be live").block;
        let source_id = node_id(mode, source.contract_address, source.start_pc);
        let target_id = node_id(mode, target.contract_address, target.start_pc);
        match mode {
            RenderMode::Transaction => {
                writeln!(
                    out,
                    "    \"{source_id}\" -> \"{target_id}\" [label=\"id: {} ({})\"];",
                    edge.edge_id, edge.kind
                )
                .unwrap();
            }
            RenderMode::Contract | RenderMode::StaticContract => {
                writeln!(
                    out,
                    "    \"{source_id}\" -> \"{target_id}\" [label=\"#{} ({})\", color=\"{}\"];",
                    edge.edge_id,
                    edge.kind,
                    edge_color(edge.kind)
                )
                .unwrap();
            }
        }
    }

    writeln!(out, "}}").unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BasicBlockPartitioner;
    use crate::builders::StaticContractCFGBuilder;
    use crate::disassembler::Disassembler;
    use crate::opcode;

    #[test]
    fn renders_jump_edge_with_condition_colour() {
        let addr = Address::new([0x22; 20]);
        let bytes = [
            opcode::PUSH1, 0x01,
            opcode::PUSH1, 0x06,
            opcode::JUMPI,
            opcode::STOP,
            opcode::JUMPDEST,
            opcode::STOP,
        ];
        let insns = Disassembler::new(&bytes).disassemble();
        let (blocks, _) = BasicBlockPartitioner::new(addr).partition(insns);
        let cfg = StaticContractCFGBuilder::build(addr, &blocks);
        let dot = render(&cfg, RenderMode::StaticContract);
        assert!(dot.starts_with("digraph Static_Complete_CFG {"));
        assert!(dot.contains("block_0"));
        assert!(dot.contains("CONDITION_TRUE"));
        assert!(dot.contains("---------"));
    }
}
