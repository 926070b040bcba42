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
use crate::block::BasicBlock;
use crate::instruction::Mnemonic;
use crate::util::w256;

/// Resolves the jump target of a block's terminating `JUMP`/`JUMPI` by
/// simulating, forward, the concrete-integer stack effect of every
/// instruction between the block's entry and the terminator itself.
///
/// Simulating forward from the block's own start (rather than from
/// the contract's first instruction) is sound because a `BasicBlock`
/// is by construction never split by anything other than a
/// terminator or a `JUMPDEST` — so the prefix examined here never
/// contains an instruction whose stack effect this analyzer cannot
/// already account for, other than ones that abort the analysis
/// outright. This is the "most recent resettable point" the forward
/// re-simulation may start from.
pub struct StackValueAnalyzer;

impl StackValueAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the pc that `block`'s terminating `JUMP`/`JUMPI` jumps
    /// to, or `None` if the analysis cannot determine it concretely.
    pub fn resolve(&self, block: &BasicBlock) -> Option<usize> {
        let insns = &block.instructions;
        if insns.is_empty() {
            return None;
        }
        let prefix = &insns[..insns.len() - 1];
        let mut stack: Vec<w256> = Vec::new();

        for insn in prefix {
            match insn.mnemonic {
                Mnemonic::Push(_) => {
                    let imm = insn.immediate.as_ref()?;
                    stack.push(w256::from_be_bytes(imm));
                }
                Mnemonic::Dup(n) => {
                    let n = n as usize;
                    if stack.len() < n {
                        return None;
                    }
                    stack.push(stack[stack.len() - n]);
                }
                Mnemonic::Swap(n) => {
                    let n = n as usize;
                    if stack.len() < n + 1 {
                        return None;
                    }
                    let top = stack.len() - 1;
                    stack.swap(top, top - n);
                }
                Mnemonic::Pop => {
                    stack.pop()?;
                }
                Mnemonic::Add | Mnemonic::Sub | Mnemonic::Mul | Mnemonic::Div => {
                    if stack.len() < 2 {
                        return None;
                    }
                    let top = stack.pop().unwrap();
                    let deeper = stack.pop().unwrap();
                    let result = match insn.mnemonic {
                        Mnemonic::Add => deeper + top,
                        Mnemonic::Sub => deeper - top,
                        Mnemonic::Mul => deeper * top,
                        Mnemonic::Div => deeper / top,
                        _ => unreachable!(),
                    };
                    stack.push(result);
                }
                // JUMPDEST has no stack effect; it may legitimately be
                // the first instruction of the block.
                Mnemonic::Jumpdest => {}
                _ => return None,
            }
        }

        stack.last().map(|v| Into::<usize>::into(*v))
    }
}

impl Default for StackValueAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
