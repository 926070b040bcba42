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
use std::fmt;
use crate::opcode;

/// A canonical EVM opcode name.  Several related bytecodes (e.g. all
/// the `PUSH*` variants) are represented by a single variant carrying
/// the operand which distinguishes them: the *class* of instruction is
/// what matters for control-flow purposes, not which of the 32 `PUSH`
/// bytecodes happened to appear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Stop,
    Add,
    Mul,
    Sub,
    Div,
    Sdiv,
    Mod,
    Smod,
    Addmod,
    Mulmod,
    Exp,
    Signextend,
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    Iszero,
    And,
    Or,
    Xor,
    Not,
    Byte,
    Shl,
    Shr,
    Sar,
    Keccak256,
    Address,
    Balance,
    Origin,
    Caller,
    Callvalue,
    Calldataload,
    Calldatasize,
    Calldatacopy,
    Codesize,
    Codecopy,
    Gasprice,
    Extcodesize,
    Extcodecopy,
    Returndatasize,
    Returndatacopy,
    Extcodehash,
    Blockhash,
    Coinbase,
    Timestamp,
    Number,
    Difficulty,
    Gaslimit,
    Chainid,
    Selfbalance,
    Pop,
    Mload,
    Mstore,
    Mstore8,
    Sload,
    Sstore,
    Jump,
    Jumpi,
    Pc,
    Msize,
    Gas,
    Jumpdest,
    /// `PUSH1`..`PUSH32`; the payload is `n`, the number of immediate
    /// bytes (`1..=32`).
    Push(u8),
    /// `DUP1`..`DUP16`; the payload is `n` (`1..=16`).
    Dup(u8),
    /// `SWAP1`..`SWAP16`; the payload is `n` (`1..=16`).
    Swap(u8),
    /// `LOG0`..`LOG4`; the payload is the topic count (`0..=4`).
    Log(u8),
    Create,
    Call,
    Callcode,
    Return,
    Delegatecall,
    Create2,
    Staticcall,
    Revert,
    /// Either the canonical `INVALID` opcode (`0xfe`) or any byte not
    /// assigned to a known opcode.  The raw byte is retained so that
    /// disassembly followed by reassembly reproduces the original
    /// bytecode exactly.
    Invalid(u8),
    Selfdestruct,
}

impl Mnemonic {
    /// Decode an opcode byte into a mnemonic.  Every byte value
    /// decodes to something: bytes not assigned to a known opcode
    /// become `Invalid`, mirroring real EVM semantics where an
    /// unassigned opcode simply traps.
    pub fn decode(byte: u8) -> Mnemonic {
        use Mnemonic::*;
        match byte {
            opcode::STOP => Stop,
            opcode::ADD => Add,
            opcode::MUL => Mul,
            opcode::SUB => Sub,
            opcode::DIV => Div,
            opcode::SDIV => Sdiv,
            opcode::MOD => Mod,
            opcode::SMOD => Smod,
            opcode::ADDMOD => Addmod,
            opcode::MULMOD => Mulmod,
            opcode::EXP => Exp,
            opcode::SIGNEXTEND => Signextend,
            opcode::LT => Lt,
            opcode::GT => Gt,
            opcode::SLT => Slt,
            opcode::SGT => Sgt,
            opcode::EQ => Eq,
            opcode::ISZERO => Iszero,
            opcode::AND => And,
            opcode::OR => Or,
            opcode::XOR => Xor,
            opcode::NOT => Not,
            opcode::BYTE => Byte,
            opcode::SHL => Shl,
            opcode::SHR => Shr,
            opcode::SAR => Sar,
            opcode::KECCAK256 => Keccak256,
            opcode::ADDRESS => Address,
            opcode::BALANCE => Balance,
            opcode::ORIGIN => Origin,
            opcode::CALLER => Caller,
            opcode::CALLVALUE => Callvalue,
            opcode::CALLDATALOAD => Calldataload,
            opcode::CALLDATASIZE => Calldatasize,
            opcode::CALLDATACOPY => Calldatacopy,
            opcode::CODESIZE => Codesize,
            opcode::CODECOPY => Codecopy,
            opcode::GASPRICE => Gasprice,
            opcode::EXTCODESIZE => Extcodesize,
            opcode::EXTCODECOPY => Extcodecopy,
            opcode::RETURNDATASIZE => Returndatasize,
            opcode::RETURNDATACOPY => Returndatacopy,
            opcode::EXTCODEHASH => Extcodehash,
            opcode::BLOCKHASH => Blockhash,
            opcode::COINBASE => Coinbase,
            opcode::TIMESTAMP => Timestamp,
            opcode::NUMBER => Number,
            opcode::DIFFICULTY => Difficulty,
            opcode::GASLIMIT => Gaslimit,
            opcode::CHAINID => Chainid,
            opcode::SELFBALANCE => Selfbalance,
            opcode::POP => Pop,
            opcode::MLOAD => Mload,
            opcode::MSTORE => Mstore,
            opcode::MSTORE8 => Mstore8,
            opcode::SLOAD => Sload,
            opcode::SSTORE => Sstore,
            opcode::JUMP => Jump,
            opcode::JUMPI => Jumpi,
            opcode::PC => Pc,
            opcode::MSIZE => Msize,
            opcode::GAS => Gas,
            opcode::JUMPDEST => Jumpdest,
            opcode::PUSH1..=opcode::PUSH32 => Push(byte - opcode::PUSH1 + 1),
            opcode::DUP1..=opcode::DUP16 => Dup(byte - opcode::DUP1 + 1),
            opcode::SWAP1..=opcode::SWAP16 => Swap(byte - opcode::SWAP1 + 1),
            opcode::LOG0..=opcode::LOG4 => Log(byte - opcode::LOG0),
            opcode::CREATE => Create,
            opcode::CALL => Call,
            opcode::CALLCODE => Callcode,
            opcode::RETURN => Return,
            opcode::DELEGATECALL => Delegatecall,
            opcode::CREATE2 => Create2,
            opcode::STATICCALL => Staticcall,
            opcode::REVERT => Revert,
            opcode::INVALID => Invalid(byte),
            opcode::SELFDESTRUCT => Selfdestruct,
            other => Invalid(other),
        }
    }

    /// Number of immediate bytes following the opcode byte itself.
    pub fn immediate_len(&self) -> usize {
        match self {
            Mnemonic::Push(n) => *n as usize,
            _ => 0,
        }
    }

    /// Total encoded length of this instruction in bytes (opcode byte
    /// plus any immediate).
    pub fn length(&self) -> usize {
        1 + self.immediate_len()
    }

    /// Recover the opcode byte for this mnemonic.
    pub fn to_byte(&self) -> u8 {
        use Mnemonic::*;
        match self {
            Stop => opcode::STOP,
            Add => opcode::ADD,
            Mul => opcode::MUL,
            Sub => opcode::SUB,
            Div => opcode::DIV,
            Sdiv => opcode::SDIV,
            Mod => opcode::MOD,
            Smod => opcode::SMOD,
            Addmod => opcode::ADDMOD,
            Mulmod => opcode::MULMOD,
            Exp => opcode::EXP,
            Signextend => opcode::SIGNEXTEND,
            Lt => opcode::LT,
            Gt => opcode::GT,
            Slt => opcode::SLT,
            Sgt => opcode::SGT,
            Eq => opcode::EQ,
            Iszero => opcode::ISZERO,
            And => opcode::AND,
            Or => opcode::OR,
            Xor => opcode::XOR,
            Not => opcode::NOT,
            Byte => opcode::BYTE,
            Shl => opcode::SHL,
            Shr => opcode::SHR,
            Sar => opcode::SAR,
            Keccak256 => opcode::KECCAK256,
            Address => opcode::ADDRESS,
            Balance => opcode::BALANCE,
            Origin => opcode::ORIGIN,
            Caller => opcode::CALLER,
            Callvalue => opcode::CALLVALUE,
            Calldataload => opcode::CALLDATALOAD,
            Calldatasize => opcode::CALLDATASIZE,
            Calldatacopy => opcode::CALLDATACOPY,
            Codesize => opcode::CODESIZE,
            Codecopy => opcode::CODECOPY,
            Gasprice => opcode::GASPRICE,
            Extcodesize => opcode::EXTCODESIZE,
            Extcodecopy => opcode::EXTCODECOPY,
            Returndatasize => opcode::RETURNDATASIZE,
            Returndatacopy => opcode::RETURNDATACOPY,
            Extcodehash => opcode::EXTCODEHASH,
            Blockhash => opcode::BLOCKHASH,
            Coinbase => opcode::COINBASE,
            Timestamp => opcode::TIMESTAMP,
            Number => opcode::NUMBER,
            Difficulty => opcode::DIFFICULTY,
            Gaslimit => opcode::GASLIMIT,
            Chainid => opcode::CHAINID,
            Selfbalance => opcode::SELFBALANCE,
            Pop => opcode::POP,
            Mload => opcode::MLOAD,
            Mstore => opcode::MSTORE,
            Mstore8 => opcode::MSTORE8,
            Sload => opcode::SLOAD,
            Sstore => opcode::SSTORE,
            Jump => opcode::JUMP,
            Jumpi => opcode::JUMPI,
            Pc => opcode::PC,
            Msize => opcode::MSIZE,
            Gas => opcode::GAS,
            Jumpdest => opcode::JUMPDEST,
            Push(n) => opcode::PUSH1 + (*n - 1),
            Dup(n) => opcode::DUP1 + (*n - 1),
            Swap(n) => opcode::SWAP1 + (*n - 1),
            Log(n) => opcode::LOG0 + *n,
            Create => opcode::CREATE,
            Call => opcode::CALL,
            Callcode => opcode::CALLCODE,
            Return => opcode::RETURN,
            Delegatecall => opcode::DELEGATECALL,
            Create2 => opcode::CREATE2,
            Staticcall => opcode::STATICCALL,
            Revert => opcode::REVERT,
            Invalid(byte) => *byte,
            Selfdestruct => opcode::SELFDESTRUCT,
        }
    }

    /// A block ends *at* an instruction bearing one of these
    /// mnemonics.
    pub fn is_terminator(&self) -> bool {
        use Mnemonic::*;
        matches!(
            self,
            Jump | Jumpi
                | Stop
                | Return
                | Revert
                | Invalid(_)
                | Selfdestruct
                | Call
                | Callcode
                | Delegatecall
                | Staticcall
                | Create
                | Create2
        )
    }

    pub fn is_jumpdest(&self) -> bool {
        matches!(self, Mnemonic::Jumpdest)
    }

    /// Parse a mnemonic from its canonical textual name, as returned
    /// by a node's `debug_traceTransaction`-equivalent `op` field
    /// (e.g. `"PUSH1"`, `"JUMPI"`). Case-insensitive. `INVALID` parses
    /// to `Invalid(0xfe)`, since the raw byte is not recoverable from
    /// the name alone.
    pub fn from_name(name: &str) -> Option<Mnemonic> {
        use Mnemonic::*;
        let name = name.to_ascii_uppercase();
        if let Some(n) = name.strip_prefix("PUSH") {
            return n.parse::<u8>().ok().filter(|n| (1..=32).contains(n)).map(Push);
        }
        if let Some(n) = name.strip_prefix("DUP") {
            return n.parse::<u8>().ok().filter(|n| (1..=16).contains(n)).map(Dup);
        }
        if let Some(n) = name.strip_prefix("SWAP") {
            return n.parse::<u8>().ok().filter(|n| (1..=16).contains(n)).map(Swap);
        }
        if let Some(n) = name.strip_prefix("LOG") {
            return n.parse::<u8>().ok().filter(|n| (0..=4).contains(n)).map(Log);
        }
        Some(match name.as_str() {
            "STOP" => Stop,
            "ADD" => Add,
            "MUL" => Mul,
            "SUB" => Sub,
            "DIV" => Div,
            "SDIV" => Sdiv,
            "MOD" => Mod,
            "SMOD" => Smod,
            "ADDMOD" => Addmod,
            "MULMOD" => Mulmod,
            "EXP" => Exp,
            "SIGNEXTEND" => Signextend,
            "LT" => Lt,
            "GT" => Gt,
            "SLT" => Slt,
            "SGT" => Sgt,
            "EQ" => Eq,
            "ISZERO" => Iszero,
            "AND" => And,
            "OR" => Or,
            "XOR" => Xor,
            "NOT" => Not,
            "BYTE" => Byte,
            "SHL" => Shl,
            "SHR" => Shr,
            "SAR" => Sar,
            "KECCAK256" | "SHA3" => Keccak256,
            "ADDRESS" => Address,
            "BALANCE" => Balance,
            "ORIGIN" => Origin,
            "CALLER" => Caller,
            "CALLVALUE" => Callvalue,
            "CALLDATALOAD" => Calldataload,
            "CALLDATASIZE" => Calldatasize,
            "CALLDATACOPY" => Calldatacopy,
            "CODESIZE" => Codesize,
            "CODECOPY" => Codecopy,
            "GASPRICE" => Gasprice,
            "EXTCODESIZE" => Extcodesize,
            "EXTCODECOPY" => Extcodecopy,
            "RETURNDATASIZE" => Returndatasize,
            "RETURNDATACOPY" => Returndatacopy,
            "EXTCODEHASH" => Extcodehash,
            "BLOCKHASH" => Blockhash,
            "COINBASE" => Coinbase,
            "TIMESTAMP" => Timestamp,
            "NUMBER" => Number,
            "DIFFICULTY" | "PREVRANDAO" => Difficulty,
            "GASLIMIT" => Gaslimit,
            "CHAINID" => Chainid,
            "SELFBALANCE" => Selfbalance,
            "POP" => Pop,
            "MLOAD" => Mload,
            "MSTORE" => Mstore,
            "MSTORE8" => Mstore8,
            "SLOAD" => Sload,
            "SSTORE" => Sstore,
            "JUMP" => Jump,
            "JUMPI" => Jumpi,
            "PC" => Pc,
            "MSIZE" => Msize,
            "GAS" => Gas,
            "JUMPDEST" => Jumpdest,
            "CREATE" => Create,
            "CALL" => Call,
            "CALLCODE" => Callcode,
            "RETURN" => Return,
            "DELEGATECALL" => Delegatecall,
            "CREATE2" => Create2,
            "STATICCALL" => Staticcall,
            "REVERT" => Revert,
            "INVALID" => Invalid(opcode::INVALID),
            "SELFDESTRUCT" | "SUICIDE" => Selfdestruct,
            _ => return None,
        })
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Mnemonic::*;
        match self {
            Stop => write!(f, "STOP"),
            Add => write!(f, "ADD"),
            Mul => write!(f, "MUL"),
            Sub => write!(f, "SUB"),
            Div => write!(f, "DIV"),
            Sdiv => write!(f, "SDIV"),
            Mod => write!(f, "MOD"),
            Smod => write!(f, "SMOD"),
            Addmod => write!(f, "ADDMOD"),
            Mulmod => write!(f, "MULMOD"),
            Exp => write!(f, "EXP"),
            Signextend => write!(f, "SIGNEXTEND"),
            Lt => write!(f, "LT"),
            Gt => write!(f, "GT"),
            Slt => write!(f, "SLT"),
            Sgt => write!(f, "SGT"),
            Eq => write!(f, "EQ"),
            Iszero => write!(f, "ISZERO"),
            And => write!(f, "AND"),
            Or => write!(f, "OR"),
            Xor => write!(f, "XOR"),
            Not => write!(f, "NOT"),
            Byte => write!(f, "BYTE"),
            Shl => write!(f, "SHL"),
            Shr => write!(f, "SHR"),
            Sar => write!(f, "SAR"),
            Keccak256 => write!(f, "KECCAK256"),
            Address => write!(f, "ADDRESS"),
            Balance => write!(f, "BALANCE"),
            Origin => write!(f, "ORIGIN"),
            Caller => write!(f, "CALLER"),
            Callvalue => write!(f, "CALLVALUE"),
            Calldataload => write!(f, "CALLDATALOAD"),
            Calldatasize => write!(f, "CALLDATASIZE"),
            Calldatacopy => write!(f, "CALLDATACOPY"),
            Codesize => write!(f, "CODESIZE"),
            Codecopy => write!(f, "CODECOPY"),
            Gasprice => write!(f, "GASPRICE"),
            Extcodesize => write!(f, "EXTCODESIZE"),
            Extcodecopy => write!(f, "EXTCODECOPY"),
            Returndatasize => write!(f, "RETURNDATASIZE"),
            Returndatacopy => write!(f, "RETURNDATACOPY"),
            Extcodehash => write!(f, "EXTCODEHASH"),
            Blockhash => write!(f, "BLOCKHASH"),
            Coinbase => write!(f, "COINBASE"),
            Timestamp => write!(f, "TIMESTAMP"),
            Number => write!(f, "NUMBER"),
            Difficulty => write!(f, "DIFFICULTY"),
            Gaslimit => write!(f, "GASLIMIT"),
            Chainid => write!(f, "CHAINID"),
            Selfbalance => write!(f, "SELFBALANCE"),
            Pop => write!(f, "POP"),
            Mload => write!(f, "MLOAD"),
            Mstore => write!(f, "MSTORE"),
            Mstore8 => write!(f, "MSTORE8"),
            Sload => write!(f, "SLOAD"),
            Sstore => write!(f, "SSTORE"),
            Jump => write!(f, "JUMP"),
            Jumpi => write!(f, "JUMPI"),
            Pc => write!(f, "PC"),
            Msize => write!(f, "MSIZE"),
            Gas => write!(f, "GAS"),
            Jumpdest => write!(f, "JUMPDEST"),
            Push(n) => write!(f, "PUSH{n}"),
            Dup(n) => write!(f, "DUP{n}"),
            Swap(n) => write!(f, "SWAP{n}"),
            Log(n) => write!(f, "LOG{n}"),
            Create => write!(f, "CREATE"),
            Call => write!(f, "CALL"),
            Callcode => write!(f, "CALLCODE"),
            Return => write!(f, "RETURN"),
            Delegatecall => write!(f, "DELEGATECALL"),
            Create2 => write!(f, "CREATE2"),
            Staticcall => write!(f, "STATICCALL"),
            Revert => write!(f, "REVERT"),
            Invalid(_) => write!(f, "INVALID"),
            Selfdestruct => write!(f, "SELFDESTRUCT"),
        }
    }
}

/// A single disassembled instruction.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Instruction {
    pub pc: usize,
    #[serde(serialize_with = "serialize_mnemonic")]
    pub mnemonic: Mnemonic,
    /// Present only for `PUSH*`; holds the immediate operand as a
    /// big-endian byte sequence (up to 32 bytes).
    pub immediate: Option<Vec<u8>>,
}

fn serialize_mnemonic<S>(m: &Mnemonic, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&m.to_string())
}

impl Instruction {
    pub fn new(pc: usize, mnemonic: Mnemonic, immediate: Option<Vec<u8>>) -> Self {
        Self {
            pc,
            mnemonic,
            immediate,
        }
    }

    /// Total length of this instruction in bytes, including any
    /// immediate.
    pub fn length(&self) -> usize {
        self.mnemonic.length()
    }

    /// Byte offset of the first byte *after* this instruction.
    pub fn next_pc(&self) -> usize {
        self.pc + self.length()
    }

    /// Encode this instruction back into its original byte sequence.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.mnemonic.to_byte());
        if let Some(imm) = &self.immediate {
            out.extend_from_slice(imm);
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.mnemonic.is_terminator()
    }

    pub fn is_jumpdest(&self) -> bool {
        self.mnemonic.is_jumpdest()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.immediate {
            Some(imm) => {
                write!(f, "{:#06x}: {} 0x", self.pc, self.mnemonic)?;
                for b in imm {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            None => write!(f, "{:#06x}: {}", self.pc, self.mnemonic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_opcode() {
        assert_eq!(Mnemonic::decode(opcode::ADD), Mnemonic::Add);
        assert_eq!(Mnemonic::decode(opcode::JUMPI), Mnemonic::Jumpi);
    }

    #[test]
    fn decode_push_width() {
        assert_eq!(Mnemonic::decode(opcode::PUSH1), Mnemonic::Push(1));
        assert_eq!(Mnemonic::decode(opcode::PUSH32), Mnemonic::Push(32));
    }

    #[test]
    fn decode_unassigned_byte_is_invalid() {
        // 0x0c is unassigned in the base instruction set.
        assert_eq!(Mnemonic::decode(0x0c), Mnemonic::Invalid(0x0c));
    }

    #[test]
    fn roundtrip_push() {
        let insn = Instruction::new(0, Mnemonic::Push(2), Some(vec![0x01, 0x02]));
        let mut bytes = Vec::new();
        insn.encode(&mut bytes);
        assert_eq!(bytes, vec![opcode::PUSH2, 0x01, 0x02]);
    }

    #[test]
    fn terminators() {
        assert!(Mnemonic::Jump.is_terminator());
        assert!(Mnemonic::Call.is_terminator());
        assert!(!Mnemonic::Add.is_terminator());
        assert!(!Mnemonic::Jumpdest.is_terminator());
    }

    #[test]
    fn from_name_parses_trace_opcodes() {
        assert_eq!(Mnemonic::from_name("PUSH1"), Some(Mnemonic::Push(1)));
        assert_eq!(Mnemonic::from_name("jumpi"), Some(Mnemonic::Jumpi));
        assert_eq!(Mnemonic::from_name("DUP16"), Some(Mnemonic::Dup(16)));
        assert_eq!(Mnemonic::from_name("NOTAREALOPCODE"), None);
    }
}
