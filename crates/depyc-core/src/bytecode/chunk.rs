//! Reference code record: constants, names, ops and a line table, with a
//! compact self-delimiting binary encoding closed by a CRC32 trailer.
//!
//! Layout (little-endian):
//!
//! ```text
//! "CHNK" | version u16 | flags u8 | reserved u8
//! filename   : u8 (0|1) [+ str]
//! consts     : u32 count, then tag u8 + value
//! names      : u32 count, then str
//! ops        : u32 count, then opcode u8 [+ arg]
//! lines      : u32 count (0 when STRIPPED, else == ops), then u32 each
//! crc32      : u32 over every preceding byte
//! ```

use crate::{crc32, ByteReader, ByteWriter, CoreError, CHUNK_VERSION};

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};
#[cfg(feature = "std")]
use std::{string::String, vec::Vec};

use bitflags::bitflags;
use core::{fmt, hash::{Hash, Hasher}, mem, slice};

const MAGIC: &[u8; 4] = b"CHNK";

const CONST_TAG_NONE: u8 = 0x00;
const CONST_TAG_STR: u8 = 0x01;
const CONST_TAG_INT: u8 = 0x02;
const CONST_TAG_FLOAT: u8 = 0x03;
const CONST_TAG_BOOL: u8 = 0x04;

const OP_POP_TOP: u8 = 0x01;
const OP_NOP: u8 = 0x09;
const OP_UNARY: u8 = 0x0B;
const OP_RETURN_VALUE: u8 = 0x53;
const OP_STORE_NAME: u8 = 0x5A;
const OP_LOAD_CONST: u8 = 0x64;
const OP_LOAD_NAME: u8 = 0x65;
const OP_BINARY: u8 = 0x7A;
const OP_CALL: u8 = 0x83;

bitflags! {
    /// Flags stored in the chunk header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CodeFlags: u8 {
        /// The line table was not serialized.
        const STRIPPED  = 0b0000_0001;
        /// Constant expressions were folded at compile time.
        const OPTIMIZED = 0b0000_0010;
    }
}

/// Values that can live in the constant pool.
#[derive(Debug, Clone)]
pub enum ConstValue {
    /// `None`.
    None,
    /// `True` / `False`.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// UTF-8 string constant.
    Str(String),
}

impl PartialEq for ConstValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstValue {}

impl Hash for ConstValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Self::None => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Str(s) => s.hash(state),
        }
    }
}

/// Constant pool with stable, deduplicated indices (0-based).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstPool {
    values: Vec<ConstValue>,
}

impl ConstPool {
    /// Create an empty pool.
    pub const fn new() -> Self { Self { values: Vec::new() } }

    /// Number of stored constants.
    pub fn len(&self) -> usize { self.values.len() }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Iterate as `(index, &ConstValue)`.
    pub fn iter(&self) -> ConstIter<'_> { ConstIter { inner: self.values.iter().enumerate() } }

    /// Returns the index of `value`, inserting it if absent.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, value: ConstValue) -> u32 {
        if let Some(idx) = self.values.iter().position(|v| *v == value) {
            return idx as u32;
        }
        let idx = self.values.len() as u32;
        self.values.push(value);
        idx
    }

    /// Lookup a constant by index.
    pub fn get(&self, idx: u32) -> Option<&ConstValue> { self.values.get(idx as usize) }

    fn push_raw(&mut self, value: ConstValue) { self.values.push(value); }
}

/// Iterator returned by [`ConstPool::iter`].
pub struct ConstIter<'a> {
    inner: core::iter::Enumerate<slice::Iter<'a, ConstValue>>,
}

impl<'a> Iterator for ConstIter<'a> {
    type Item = (u32, &'a ConstValue);

    #[allow(clippy::cast_possible_truncation)]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(idx, value)| (idx as u32, value))
    }
}

impl<'a> IntoIterator for &'a ConstPool {
    type Item = (u32, &'a ConstValue);
    type IntoIter = ConstIter<'a>;

    fn into_iter(self) -> Self::IntoIter { self.iter() }
}

/// Interned identifiers referenced by `LoadName` / `StoreName`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    /// Create an empty table.
    pub const fn new() -> Self { Self { names: Vec::new() } }
    /// Number of names.
    pub fn len(&self) -> usize { self.names.len() }
    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool { self.names.is_empty() }
    /// Returns the index of `name`, inserting it if absent.
    #[allow(clippy::cast_possible_truncation)]
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            return idx as u32;
        }
        self.names.push(String::from(name));
        (self.names.len() - 1) as u32
    }
    /// Lookup a name by index.
    pub fn get(&self, idx: u32) -> Option<&str> { self.names.get(idx as usize).map(String::as_str) }
    /// Iterate over names in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.names.iter().map(String::as_str) }
}

/// Line table (pc → source line) with contiguous range iteration helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTable {
    lines: Vec<u32>,
}

impl LineTable {
    /// Create an empty line table.
    pub const fn new() -> Self { Self { lines: Vec::new() } }
    /// Append a mapping for the next program counter.
    pub fn push(&mut self, line: u32) { self.lines.push(line); }
    /// Number of stored line entries.
    pub fn len(&self) -> usize { self.lines.len() }
    /// Whether no mapping is recorded.
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    /// Source line of a program counter, `0` when unknown.
    pub fn line_for_pc(&self, pc: u32) -> u32 { self.lines.get(pc as usize).copied().unwrap_or_default() }
    /// Remove all recorded mappings.
    pub fn clear(&mut self) { self.lines.clear(); }
    fn as_slice(&self) -> &[u32] { &self.lines }
}

/// Binary operators carried by [`Op::Binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOpKind {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

impl BinOpKind {
    /// Source symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }

    const fn code(self) -> u8 {
        match self {
            Self::Add => 0,
            Self::Sub => 1,
            Self::Mul => 2,
            Self::Div => 3,
            Self::Mod => 4,
        }
    }

    const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Add,
            1 => Self::Sub,
            2 => Self::Mul,
            3 => Self::Div,
            4 => Self::Mod,
            _ => return None,
        })
    }
}

/// Unary operators carried by [`Op::Unary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOpKind {
    /// `-x`
    Neg,
    /// `not x`
    Not,
}

impl UnOpKind {
    /// Source symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "not",
        }
    }

    const fn code(self) -> u8 {
        match self {
            Self::Neg => 0,
            Self::Not => 1,
        }
    }

    const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Neg),
            1 => Some(Self::Not),
            _ => None,
        }
    }
}

/// Stack machine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Does nothing (emitted for `pass`).
    Nop,
    /// Push constant `u32`.
    LoadConst(u32),
    /// Push the value bound to name `u32`.
    LoadName(u32),
    /// Pop and bind to name `u32`.
    StoreName(u32),
    /// Pop `argc` arguments then the callee, push the result.
    Call(u32),
    /// Pop two operands, push the result.
    Binary(BinOpKind),
    /// Pop one operand, push the result.
    Unary(UnOpKind),
    /// Discard the top of the stack.
    PopTop,
    /// Return the top of the stack.
    ReturnValue,
}

impl Op {
    /// Upper-case mnemonic used by listings.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::LoadConst(_) => "LOAD_CONST",
            Self::LoadName(_) => "LOAD_NAME",
            Self::StoreName(_) => "STORE_NAME",
            Self::Call(_) => "CALL",
            Self::Binary(_) => "BINARY_OP",
            Self::Unary(_) => "UNARY_OP",
            Self::PopTop => "POP_TOP",
            Self::ReturnValue => "RETURN_VALUE",
        }
    }

    /// Numeric argument, if the op has one.
    pub const fn arg(&self) -> Option<u32> {
        match *self {
            Self::LoadConst(ix) | Self::LoadName(ix) | Self::StoreName(ix) | Self::Call(ix) => Some(ix),
            Self::Binary(kind) => Some(kind.code() as u32),
            Self::Unary(kind) => Some(kind.code() as u32),
            Self::Nop | Self::PopTop | Self::ReturnValue => None,
        }
    }
}

/// Errors returned when decoding a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// Binary payload does not match the expected chunk layout.
    Format(&'static str),
    /// Low level read failure (EOF, bad length, bad UTF-8).
    Core(CoreError),
    /// Format version not understood by this decoder.
    UnsupportedVersion(u16),
    /// CRC32 mismatch detected while decoding a payload.
    HashMismatch {
        /// CRC32 recomputed from the payload.
        expected: u32,
        /// CRC32 value read from the payload.
        found: u32,
    },
    /// Bytes left after the CRC trailer.
    TrailingBytes(usize),
}

impl From<CoreError> for ChunkError {
    fn from(e: CoreError) -> Self { Self::Core(e) }
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Core(e) => write!(f, "{e}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported chunk version {v} (expected {CHUNK_VERSION})"),
            Self::HashMismatch { expected, found } => write!(
                f,
                "hash mismatch (crc32): expected=0x{expected:08X}, found=0x{found:08X}"
            ),
            Self::TrailingBytes(n) => write!(f, "{n} trailing byte(s) after chunk"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ChunkError {}

/// Module-level code record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    version: u16,
    flags: CodeFlags,
    /// Constant pool.
    pub consts: ConstPool,
    /// Identifiers.
    pub names: NameTable,
    /// Linear list of operations.
    pub ops: Vec<Op>,
    /// pc → source line.
    pub lines: LineTable,
    /// Name of the compiled source, if recorded.
    pub filename: Option<String>,
}

impl Default for Chunk {
    fn default() -> Self { Self::new(CodeFlags::empty()) }
}

impl Chunk {
    /// Create an empty chunk with the provided flags.
    pub const fn new(flags: CodeFlags) -> Self {
        Self {
            version: CHUNK_VERSION,
            flags,
            consts: ConstPool::new(),
            names: NameTable::new(),
            ops: Vec::new(),
            lines: LineTable::new(),
            filename: None,
        }
    }

    /// Chunk format version.
    pub const fn version(&self) -> u16 { self.version }

    /// Header flags.
    pub const fn flags(&self) -> CodeFlags { self.flags }


    /// Append a constant and return its index.
    pub fn add_const(&mut self, value: ConstValue) -> u32 { self.consts.add(value) }

    /// Intern a name and return its index.
    pub fn add_name(&mut self, name: &str) -> u32 { self.names.intern(name) }

    /// Push an opcode while recording its source line.
    pub fn push_op(&mut self, op: Op, line: u32) {
        self.ops.push(op);
        if !self.flags.contains(CodeFlags::STRIPPED) {
            self.lines.push(line);
        }
    }

    /// Drop the line table and mark the chunk as stripped.
    pub fn strip(&mut self) {
        self.lines.clear();
        self.flags.insert(CodeFlags::STRIPPED);
    }

    /// Encode the chunk to its binary form.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes(MAGIC);
        w.write_u16_le(self.version);
        w.write_u8(self.flags.bits());
        w.write_u8(0); // reserved

        match &self.filename {
            Some(name) => {
                w.write_u8(1);
                w.write_str(name);
            }
            None => w.write_u8(0),
        }

        w.write_u32_le(self.consts.len() as u32);
        for (_, value) in &self.consts {
            match value {
                ConstValue::None => w.write_u8(CONST_TAG_NONE),
                ConstValue::Str(s) => {
                    w.write_u8(CONST_TAG_STR);
                    w.write_str(s);
                }
                ConstValue::Int(v) => {
                    w.write_u8(CONST_TAG_INT);
                    w.write_i64_le(*v);
                }
                ConstValue::Float(v) => {
                    w.write_u8(CONST_TAG_FLOAT);
                    w.write_f64_le(*v);
                }
                ConstValue::Bool(b) => {
                    w.write_u8(CONST_TAG_BOOL);
                    w.write_u8(u8::from(*b));
                }
            }
        }

        w.write_u32_le(self.names.len() as u32);
        for name in self.names.iter() {
            w.write_str(name);
        }

        w.write_u32_le(self.ops.len() as u32);
        for op in &self.ops {
            match *op {
                Op::Nop => w.write_u8(OP_NOP),
                Op::LoadConst(ix) => {
                    w.write_u8(OP_LOAD_CONST);
                    w.write_u32_le(ix);
                }
                Op::LoadName(ix) => {
                    w.write_u8(OP_LOAD_NAME);
                    w.write_u32_le(ix);
                }
                Op::StoreName(ix) => {
                    w.write_u8(OP_STORE_NAME);
                    w.write_u32_le(ix);
                }
                Op::Call(argc) => {
                    w.write_u8(OP_CALL);
                    w.write_u32_le(argc);
                }
                Op::Binary(kind) => {
                    w.write_u8(OP_BINARY);
                    w.write_u8(kind.code());
                }
                Op::Unary(kind) => {
                    w.write_u8(OP_UNARY);
                    w.write_u8(kind.code());
                }
                Op::PopTop => w.write_u8(OP_POP_TOP),
                Op::ReturnValue => w.write_u8(OP_RETURN_VALUE),
            }
        }

        w.write_u32_le(self.lines.len() as u32);
        for line in self.lines.as_slice() {
            w.write_u32_le(*line);
        }

        let crc = crc32(w.as_slice());
        w.write_u32_le(crc);
        w.into_vec()
    }

    /// Decode a chunk from [`Chunk::to_bytes`] output.
    ///
    /// The whole of `data` must be consumed: bytes after the trailer are an error.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ChunkError> {
        let mut r = ByteReader::new(data);

        if &r.read_array::<4>()? != MAGIC {
            return Err(ChunkError::Format("bad magic"));
        }
        let version = r.read_u16_le()?;
        if version != CHUNK_VERSION {
            return Err(ChunkError::UnsupportedVersion(version));
        }
        let flags = CodeFlags::from_bits(r.read_u8()?).ok_or(ChunkError::Format("unknown flag bits"))?;
        let _reserved = r.read_u8()?;

        let mut chunk = Self::new(flags);

        chunk.filename = match r.read_u8()? {
            0 => None,
            1 => Some(String::from(r.read_str()?)),
            _ => return Err(ChunkError::Format("invalid filename flag")),
        };

        let const_count = read_count(&mut r, "consts")?;
        for _ in 0..const_count {
            let value = match r.read_u8()? {
                CONST_TAG_NONE => ConstValue::None,
                CONST_TAG_STR => ConstValue::Str(String::from(r.read_str()?)),
                CONST_TAG_INT => ConstValue::Int(r.read_i64_le()?),
                CONST_TAG_FLOAT => ConstValue::Float(r.read_f64_le()?),
                CONST_TAG_BOOL => ConstValue::Bool(match r.read_u8()? {
                    0 => false,
                    1 => true,
                    _ => return Err(ChunkError::Format("invalid bool")),
                }),
                _ => return Err(ChunkError::Format("unknown const tag")),
            };
            chunk.consts.push_raw(value);
        }

        let name_count = read_count(&mut r, "names")?;
        for _ in 0..name_count {
            chunk.names.names.push(String::from(r.read_str()?));
        }

        let op_count = read_count(&mut r, "ops")?;
        for _ in 0..op_count {
            let op = match r.read_u8()? {
                OP_NOP => Op::Nop,
                OP_LOAD_CONST => Op::LoadConst(r.read_u32_le()?),
                OP_LOAD_NAME => Op::LoadName(r.read_u32_le()?),
                OP_STORE_NAME => Op::StoreName(r.read_u32_le()?),
                OP_CALL => Op::Call(r.read_u32_le()?),
                OP_BINARY => Op::Binary(BinOpKind::from_code(r.read_u8()?).ok_or(ChunkError::Format("unknown binary operator"))?),
                OP_UNARY => Op::Unary(UnOpKind::from_code(r.read_u8()?).ok_or(ChunkError::Format("unknown unary operator"))?),
                OP_POP_TOP => Op::PopTop,
                OP_RETURN_VALUE => Op::ReturnValue,
                _ => return Err(ChunkError::Format("unknown op tag")),
            };
            chunk.ops.push(op);
        }

        let line_count = read_count(&mut r, "lines")?;
        let expected_lines = if flags.contains(CodeFlags::STRIPPED) { 0 } else { chunk.ops.len() };
        if line_count != expected_lines {
            return Err(ChunkError::Format("line/op length mismatch"));
        }
        for _ in 0..line_count {
            chunk.lines.push(r.read_u32_le()?);
        }

        let expected = crc32(r.consumed());
        let found = r.read_u32_le()?;
        if expected != found {
            return Err(ChunkError::HashMismatch { expected, found });
        }

        if r.remaining() != 0 {
            return Err(ChunkError::TrailingBytes(r.remaining()));
        }

        Ok(chunk)
    }
}

/// Reads a table length; every entry takes at least one byte.
fn read_count(r: &mut ByteReader<'_>, section: &'static str) -> Result<usize, ChunkError> {
    let n = r.read_u32_le()? as usize;
    if n > r.remaining() {
        return Err(CoreError::InvalidLength { section: Some(section.into()), len: n as u64 }.into());
    }
    Ok(n)
}

/* ───────────────────────────── Tests ───────────────────────────── */
