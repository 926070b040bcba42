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
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::instruction::Mnemonic;

/// One `structLogs` entry of a raw `debug_traceTransaction`-equivalent
/// response, before normalization.  The wire stack is ordered
/// top-*last*; everything downstream of [`TraceIngestor`] instead
/// expects top-first, per the normalized [`Step`].
#[derive(Clone, Debug, Deserialize)]
pub struct RawStep {
    pub pc: u64,
    pub op: String,
    pub stack: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawTraceResult {
    #[serde(rename = "structLogs")]
    pub struct_logs: Vec<RawStep>,
}

/// A normalized trace record.  `stack` holds `0x`-prefixed hex words,
/// lowest index first (the top of stack).
#[derive(Clone, Debug, Serialize)]
pub struct Step {
    #[serde(rename = "address")]
    pub contract_address: Address,
    pub pc: usize,
    #[serde(rename = "opcode", serialize_with = "serialize_mnemonic")]
    pub mnemonic: Mnemonic,
    pub stack: Vec<String>,
}

fn serialize_mnemonic<S>(m: &Mnemonic, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&m.to_string())
}

/// A full normalized execution trace.
#[derive(Clone, Debug, Serialize)]
pub struct Trace {
    pub tx_hash: String,
    pub steps: Vec<Step>,
}

impl Trace {
    /// The distinct contract addresses touched by this trace, in
    /// first-seen order.
    pub fn contract_addresses(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for step in &self.steps {
            if !step.contract_address.is_empty() && seen.insert(step.contract_address) {
                out.push(step.contract_address);
            }
        }
        out
    }

    /// The steps attributed to a single contract, preserving order.
    pub fn steps_for(&self, address: Address) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.contract_address == address).collect()
    }
}

fn normalize_stack_item(raw: &str) -> String {
    if raw.is_empty() {
        "0x".to_string()
    } else if raw.starts_with("0x") {
        raw.to_string()
    } else {
        format!("0x{raw}")
    }
}

const CALL_FAMILY: [Mnemonic; 4] =
    [Mnemonic::Call, Mnemonic::Callcode, Mnemonic::Delegatecall, Mnemonic::Staticcall];
const TERMINATOR_POPPING_FRAME: [Mnemonic; 5] =
    [Mnemonic::Stop, Mnemonic::Return, Mnemonic::Revert, Mnemonic::Invalid(crate::opcode::INVALID), Mnemonic::Selfdestruct];

/// Normalizes a raw trace into a [`Trace`], attributing each step to
/// the contract address whose frame was executing when that step ran.
///
/// Labelling happens *before* a call/create/terminator opcode takes
/// effect, since the opcode itself still runs in the caller's frame;
/// the callee's frame begins only with the step that follows it.
pub struct TraceIngestor;

impl TraceIngestor {
    pub fn new() -> Self {
        Self
    }

    pub fn ingest(&self, tx_hash: &str, destination: Address, raw: RawTraceResult) -> Trace {
        let mut steps = Vec::with_capacity(raw.struct_logs.len());
        let mut call_stack = vec![destination];
        let mut current = destination;

        for raw_step in &raw.struct_logs {
            let mnemonic = Mnemonic::from_name(&raw_step.op).unwrap_or_else(|| {
                log::warn!("unrecognized trace opcode {:?} at pc {}", raw_step.op, raw_step.pc);
                Mnemonic::Invalid(crate::opcode::INVALID)
            });

            let stack = raw_step.stack.iter().rev().map(|s| normalize_stack_item(s)).collect();
            steps.push(Step {
                contract_address: current,
                pc: raw_step.pc as usize,
                mnemonic,
                stack,
            });

            if CALL_FAMILY.contains(&mnemonic) {
                if raw_step.stack.len() >= 2 {
                    let callee_raw = &raw_step.stack[raw_step.stack.len() - 2];
                    if let Some(callee) = Address::parse(callee_raw) {
                        call_stack.push(current);
                        current = callee;
                    }
                }
            } else if matches!(mnemonic, Mnemonic::Create | Mnemonic::Create2) {
                // The new contract's address is not recoverable from
                // this step alone; `current` is left unchanged.
            } else if TERMINATOR_POPPING_FRAME.contains(&mnemonic) && call_stack.len() > 1 {
                current = call_stack.pop().expect("call_stack.len() > 1 checked above");
            }
        }

        Trace { tx_hash: tx_hash.to_string(), steps }
    }
}

impl Default for TraceIngestor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn raw(pc: u64, op: &str, stack: Vec<&str>) -> RawStep {
        RawStep { pc, op: op.to_string(), stack: stack.into_iter().map(|s| s.to_string()).collect() }
    }

    #[test]
    fn simple_steps_keep_destination_address() {
        let dest = addr(0x01);
        let raw = RawTraceResult {
            struct_logs: vec![raw(0, "PUSH1", vec![]), raw(2, "STOP", vec!["01"])],
        };
        let trace = TraceIngestor::new().ingest("0xabc", dest, raw);
        assert_eq!(trace.steps.len(), 2);
        assert_eq!(trace.steps[0].contract_address, dest);
        assert_eq!(trace.steps[1].contract_address, dest);
    }

    #[test]
    fn call_switches_address_on_the_following_step() {
        let dest = addr(0x01);
        let callee_hex = "0000000000000000000000000000000000000002";
        let raw = RawTraceResult {
            struct_logs: vec![
                raw(10, "CALL", vec!["00", "00", "00", "00", "00", callee_hex, "00"]),
                raw(0, "PUSH1", vec![]),
            ],
        };
        let trace = TraceIngestor::new().ingest("0xabc", dest, raw);
        // The CALL step itself still runs in the caller's frame.
        assert_eq!(trace.steps[0].contract_address, dest);
        // Execution resumes in the callee on the very next step.
        assert_eq!(trace.steps[1].contract_address, addr(0x02));
    }

    #[test]
    fn return_pops_back_to_caller() {
        let dest = addr(0x01);
        let callee_hex = "0000000000000000000000000000000000000002";
        let raw = RawTraceResult {
            struct_logs: vec![
                raw(10, "CALL", vec!["00", "00", "00", "00", "00", callee_hex, "00"]),
                raw(0, "STOP", vec![]),
                raw(11, "STOP", vec![]),
            ],
        };
        let trace = TraceIngestor::new().ingest("0xabc", dest, raw);
        assert_eq!(trace.steps[1].contract_address, addr(0x02));
        assert_eq!(trace.steps[2].contract_address, dest);
    }

    #[test]
    fn empty_raw_stack_item_normalizes_to_bare_prefix() {
        let dest = addr(0x01);
        let raw = RawTraceResult { struct_logs: vec![raw(0, "PUSH1", vec![""])] };
        let trace = TraceIngestor::new().ingest("0xabc", dest, raw);
        assert_eq!(trace.steps[0].stack, vec!["0x".to_string()]);
    }
}
