/// 20-byte account addresses, as used throughout traces and CFGs.
pub mod address;
/// Single-contract and transaction-wide basic-block grouping.
pub mod block;
/// Reconstructs transaction-level, contract-level, and static-complete
/// control-flow graphs from basic blocks and/or a normalized trace.
pub mod builders;
/// The arena-based control-flow graph representation shared by every
/// builder.
pub mod cfg;
/// Turns raw bytecode into a flat instruction sequence.
pub mod disassembler;
/// The crate's fatal-error type.
pub mod error;
/// Scans rendered DOT output for nodes containing instructions of
/// interest (e.g. `CALL`, `SSTORE`).
pub mod grep;
/// Individual bytecode instructions and their mnemonics, including
/// constants for each opcode.
pub mod instruction;
/// Raw opcode byte constants.
pub mod opcode;
/// A minimal JSON-RPC client for the node calls this crate needs.
pub mod rpc;
/// Renders a [`cfg::Cfg`] as a DOT-language graph.
pub mod render;
/// A small forward concrete-stack simulator used to resolve constant
/// `JUMP`/`JUMPI` targets ahead of execution evidence.
pub mod stack_value;
/// Normalizes a raw execution trace into the crate's own [`trace::Step`]
/// representation, tracking call-stack frame attribution.
pub mod trace;
/// Small standalone helpers (hex codecs, 256-bit words) shared across
/// the crate.
pub mod util;
