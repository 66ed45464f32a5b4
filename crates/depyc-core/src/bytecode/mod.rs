//! Reference code record: chunk structure, validation and textual disassembly.

/// Chunk representation plus binary roundtrip helpers.
pub mod chunk;
pub mod disasm;
pub mod helpers;

pub use chunk::{BinOpKind, Chunk, ChunkError, CodeFlags, ConstPool, ConstValue, LineTable, NameTable, Op, UnOpKind};
