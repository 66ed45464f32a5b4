//! Structural validation of decoded chunks.

use crate::{bytecode::chunk::{Chunk, CodeFlags, ConstValue, Op}, CoreError, CoreResult};

#[cfg(not(feature = "std"))]
use alloc::format;

/// Net stack effect of an op (pops are counted negative).
#[allow(clippy::cast_possible_wrap)]
pub const fn stack_effect(op: &Op) -> i64 {
    match *op {
        Op::Nop => 0,
        Op::LoadConst(_) | Op::LoadName(_) => 1,
        Op::StoreName(_) | Op::PopTop | Op::ReturnValue | Op::Binary(_) => -1,
        Op::Unary(_) => 0,
        Op::Call(argc) => -(argc as i64),
    }
}

/// Validates a chunk decoded from untrusted bytes.
///
/// Checks that every index is in range, that the line table matches the
/// flags, that the stack never underflows and that the code ends with
/// `RETURN_VALUE`. Returns the maximum stack depth reached.
pub fn validate_chunk(chunk: &Chunk) -> CoreResult<u32> {
    let expected_lines = if chunk.flags().contains(CodeFlags::STRIPPED) { 0 } else { chunk.ops.len() };
    if chunk.lines.len() != expected_lines {
        return Err(CoreError::corrupted("line/op length mismatch"));
    }

    let const_count = chunk.consts.len();
    let name_count = chunk.names.len();
    let mut depth: i64 = 0;
    let mut max_depth: i64 = 0;

    for (pc, op) in chunk.ops.iter().enumerate() {
        match *op {
            Op::LoadConst(ix) if ix as usize >= const_count => {
                return Err(CoreError::corrupted(format!(
                    "op {pc} references const {ix} but pool size is {const_count}"
                )));
            }
            Op::LoadName(ix) | Op::StoreName(ix) if ix as usize >= name_count => {
                return Err(CoreError::corrupted(format!(
                    "op {pc} references name {ix} but table size is {name_count}"
                )));
            }
            _ => {}
        }

        // Call pops its callee too; the callee slot is reused for the result.
        let needed = match *op {
            Op::Call(argc) => i64::from(argc) + 1,
            Op::Binary(_) => 2,
            Op::StoreName(_) | Op::PopTop | Op::ReturnValue | Op::Unary(_) => 1,
            Op::Nop | Op::LoadConst(_) | Op::LoadName(_) => 0,
        };
        if depth < needed {
            return Err(CoreError::corrupted(format!("stack underflow at op {pc} ({})", op.mnemonic())));
        }
        depth += stack_effect(op);
        max_depth = max_depth.max(depth);
    }

    match chunk.ops.last() {
        Some(Op::ReturnValue) => {}
        Some(_) => return Err(CoreError::corrupted("code does not end with RETURN_VALUE")),
        None => return Err(CoreError::corrupted("empty code")),
    }

    Ok(u32::try_from(max_depth).unwrap_or(u32::MAX))
}

/// Whether the chunk ends with the implicit module epilogue `LOAD_CONST None; RETURN_VALUE`.
pub fn has_module_epilogue(chunk: &Chunk) -> bool {
    match chunk.ops.as_slice() {
        [.., Op::LoadConst(ix), Op::ReturnValue] => matches!(chunk.consts.get(*ix), Some(ConstValue::None)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::chunk::{BinOpKind, CodeFlags, ConstValue};

    fn epilogue(c: &mut Chunk) {
        let none = c.add_const(ConstValue::None);
        c.push_op(Op::LoadConst(none), 1);
        c.push_op(Op::ReturnValue, 1);
    }

    #[test]
    fn accepts_well_formed_module() {
        let mut c = Chunk::new(CodeFlags::empty());
        let x = c.add_name("x");
        let one = c.add_const(ConstValue::Int(1));
        c.push_op(Op::LoadConst(one), 1);
        c.push_op(Op::LoadConst(one), 1);
        c.push_op(Op::Binary(BinOpKind::Add), 1);
        c.push_op(Op::StoreName(x), 1);
        epilogue(&mut c);
        assert_eq!(validate_chunk(&c), Ok(2));
        assert!(has_module_epilogue(&c));
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let mut c = Chunk::new(CodeFlags::empty());
        c.push_op(Op::LoadName(3), 1);
        c.push_op(Op::PopTop, 1);
        epilogue(&mut c);
        assert!(validate_chunk(&c).is_err());

        let mut c = Chunk::new(CodeFlags::empty());
        c.push_op(Op::LoadConst(9), 1);
        c.push_op(Op::ReturnValue, 1);
        assert!(validate_chunk(&c).is_err());
    }

    #[test]
    fn rejects_underflow_and_missing_return() {
        let mut c = Chunk::new(CodeFlags::empty());
        c.push_op(Op::PopTop, 1);
        epilogue(&mut c);
        assert!(validate_chunk(&c).is_err());

        let mut c = Chunk::new(CodeFlags::empty());
        c.push_op(Op::Nop, 1);
        assert!(validate_chunk(&c).is_err());
        assert!(validate_chunk(&Chunk::default()).is_err());
    }
}
