use crate::{DType, Literal, RVec, RegionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Abs,
    Sign,
    Exp,
    Log,
    Tanh,
    Sqrt,
    Not,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "negate",
            UnaryOp::Abs => "abs",
            UnaryOp::Sign => "sign",
            UnaryOp::Exp => "exponential",
            UnaryOp::Log => "log",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Maximum,
    Minimum,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "subtract",
            BinaryOp::Multiply => "multiply",
            BinaryOp::Divide => "divide",
            BinaryOp::Remainder => "remainder",
            BinaryOp::Maximum => "maximum",
            BinaryOp::Minimum => "minimum",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareDirection {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareDirection::Eq => "EQ",
            CompareDirection::Ne => "NE",
            CompareDirection::Lt => "LT",
            CompareDirection::Le => "LE",
            CompareDirection::Gt => "GT",
            CompareDirection::Ge => "GE",
        }
    }
}

/// Static bounds of a strided slice, one entry per dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_new::new)]
pub struct SliceBounds {
    pub starts: RVec<usize>,
    pub limits: RVec<usize>,
    pub strides: RVec<usize>,
}

impl SliceBounds {
    /// Number of elements selected along `dim`.
    pub fn extent(&self, dim: usize) -> usize {
        (self.limits[dim] - self.starts[dim]).div_ceil(self.strides[dim])
    }

    pub fn rank(&self) -> usize {
        self.starts.len()
    }
}

/// Batch and contracting dimensions of both dot operands. Every other
/// dimension is free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, derive_new::new)]
pub struct DotDimensions {
    pub lhs_batch: RVec<usize>,
    pub lhs_contracting: RVec<usize>,
    pub rhs_batch: RVec<usize>,
    pub rhs_contracting: RVec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FusionKind {
    #[default]
    Loop,
    Input,
    Output,
    Custom,
}

impl FusionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FusionKind::Loop => "kLoop",
            FusionKind::Input => "kInput",
            FusionKind::Output => "kOutput",
            FusionKind::Custom => "kCustom",
        }
    }
}

/// Marks which slot of a loop's state tuple is its induction variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_new::new, Serialize, Deserialize)]
pub struct InductionVariable {
    pub tuple_index: usize,
}

/// Operation kind of a node, with the attributes each kind carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Formal input `index` of the enclosing region.
    Parameter { index: usize },
    Constant(Literal),
    /// Output dimension `i` is operand dimension `permutation[i]`.
    Transpose { permutation: RVec<usize> },
    Reduce { dimensions: RVec<usize> },
    Broadcast { dimensions: RVec<usize> },
    Bitcast,
    Reshape,
    Copy,
    Reverse { dimensions: RVec<usize> },
    Concatenate { dimension: usize },
    Slice(SliceBounds),
    /// Operand 0 is sliced; operands 1.. are the start indices.
    DynamicSlice { sizes: RVec<usize> },
    /// Operand 0 is the target, 1 the update, 2.. the start indices.
    DynamicUpdateSlice,
    Convert(DType),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Compare(CompareDirection),
    Select,
    Tuple,
    GetTupleElement { index: usize },
    Call { region: RegionId },
    While {
        body: RegionId,
        condition: RegionId,
        induction_variable: Option<InductionVariable>,
    },
    Fusion { kind: FusionKind, region: RegionId },
    /// An opaque external call; always treated as side-effecting.
    CustomCall { target: String },
    Dot(DotDimensions),
}

impl Opcode {
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Parameter { .. } => "parameter",
            Opcode::Constant(_) => "constant",
            Opcode::Transpose { .. } => "transpose",
            Opcode::Reduce { .. } => "reduce",
            Opcode::Broadcast { .. } => "broadcast",
            Opcode::Bitcast => "bitcast",
            Opcode::Reshape => "reshape",
            Opcode::Copy => "copy",
            Opcode::Reverse { .. } => "reverse",
            Opcode::Concatenate { .. } => "concatenate",
            Opcode::Slice(_) => "slice",
            Opcode::DynamicSlice { .. } => "dynamic-slice",
            Opcode::DynamicUpdateSlice => "dynamic-update-slice",
            Opcode::Convert(_) => "convert",
            Opcode::Unary(op) => op.as_str(),
            Opcode::Binary(op) => op.as_str(),
            Opcode::Compare(_) => "compare",
            Opcode::Select => "select",
            Opcode::Tuple => "tuple",
            Opcode::GetTupleElement { .. } => "get-tuple-element",
            Opcode::Call { .. } => "call",
            Opcode::While { .. } => "while",
            Opcode::Fusion { .. } => "fusion",
            Opcode::CustomCall { .. } => "custom-call",
            Opcode::Dot(_) => "dot",
        }
    }

    /// Regions this node invokes.
    pub fn called_regions(&self) -> RVec<RegionId> {
        match self {
            Opcode::Call { region } | Opcode::Fusion { region, .. } => crate::rvec![*region],
            Opcode::While {
                body, condition, ..
            } => crate::rvec![*condition, *body],
            _ => RVec::new(),
        }
    }

    /// Reinterprets its operand's bytes without moving data, given matching layouts.
    pub fn is_shape_reinterpreting(&self) -> bool {
        matches!(self, Opcode::Bitcast | Opcode::Reshape)
    }
}
