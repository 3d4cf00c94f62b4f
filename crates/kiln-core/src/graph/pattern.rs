//! Operation pattern classification used by the graph walks.

use crate::Opcode;

/// Coarse access pattern of an operation.
///
/// Ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum OpPattern {
    /// One output element per input element, same shape.
    ///
    /// Examples: `negate`, `add`, `convert`, `select`
    Elemwise = 0,

    /// One input element per output element, shape may change.
    ///
    /// Examples: `bitcast`, `transpose`, `slice`, `broadcast`
    Injective = 1,

    /// Many input elements per output element.
    Reduce = 2,

    /// Specialised tiling, e.g. `dot`.
    ComputeIntensive = 3,

    /// Structural operations and calls into other regions. Walks do not see
    /// through these without special handling.
    Opaque = 4,

    /// Observable effects beyond the result value: external calls and loops.
    SideEffecting = 5,
}

impl Opcode {
    /// Classify this operation.
    pub fn pattern(&self) -> OpPattern {
        match self {
            Opcode::Unary(_)
            | Opcode::Binary(_)
            | Opcode::Compare(_)
            | Opcode::Convert(_)
            | Opcode::Select
            | Opcode::Copy => OpPattern::Elemwise,

            Opcode::Transpose { .. }
            | Opcode::Broadcast { .. }
            | Opcode::Bitcast
            | Opcode::Reshape
            | Opcode::Reverse { .. }
            | Opcode::Concatenate { .. }
            | Opcode::Slice(_)
            | Opcode::DynamicSlice { .. }
            | Opcode::DynamicUpdateSlice => OpPattern::Injective,

            Opcode::Reduce { .. } => OpPattern::Reduce,

            Opcode::Dot(_) => OpPattern::ComputeIntensive,

            Opcode::Parameter { .. }
            | Opcode::Constant(_)
            | Opcode::Tuple
            | Opcode::GetTupleElement { .. }
            | Opcode::Call { .. }
            | Opcode::Fusion { .. } => OpPattern::Opaque,

            Opcode::While { .. } | Opcode::CustomCall { .. } => OpPattern::SideEffecting,
        }
    }

    pub fn is_elementwise(&self) -> bool {
        self.pattern() == OpPattern::Elemwise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinaryOp, DType};

    #[test]
    fn test_pattern_ordering() {
        assert!(OpPattern::Elemwise < OpPattern::Injective);
        assert!(OpPattern::Injective < OpPattern::Reduce);
        assert!(OpPattern::Reduce < OpPattern::ComputeIntensive);
        assert!(OpPattern::ComputeIntensive < OpPattern::Opaque);
        assert!(OpPattern::Opaque < OpPattern::SideEffecting);
    }

    #[test]
    fn test_elementwise() {
        assert!(Opcode::Binary(BinaryOp::Add).is_elementwise());
        assert!(Opcode::Convert(DType::F16).is_elementwise());
        assert!(!Opcode::Bitcast.is_elementwise());
        assert!(!Opcode::Tuple.is_elementwise());
    }

    #[test]
    fn test_side_effecting() {
        let call = Opcode::CustomCall {
            target: "print".into(),
        };
        assert_eq!(call.pattern(), OpPattern::SideEffecting);
        assert_eq!(Opcode::Tuple.pattern(), OpPattern::Opaque);
        assert_eq!(Opcode::Bitcast.pattern(), OpPattern::Injective);
    }
}
