use half::{bf16, f16};
use serde::{Deserialize, Serialize};

/// Element type of an array value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum DType {
    Pred,
    S4,
    U4,
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F16,
    BF16,
    #[default]
    F32,
    F64,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Pred => "pred",
            DType::S4 => "s4",
            DType::U4 => "u4",
            DType::S8 => "s8",
            DType::U8 => "u8",
            DType::S16 => "s16",
            DType::U16 => "u16",
            DType::S32 => "s32",
            DType::U32 => "u32",
            DType::S64 => "s64",
            DType::U64 => "u64",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }

    /// Logical width of one element. `Pred` occupies a whole byte.
    pub fn bit_width(&self) -> usize {
        match self {
            DType::S4 | DType::U4 => 4,
            DType::Pred | DType::S8 | DType::U8 => 8,
            DType::S16 | DType::U16 | DType::F16 | DType::BF16 => 16,
            DType::S32 | DType::U32 | DType::F32 => 32,
            DType::S64 | DType::U64 | DType::F64 => 64,
        }
    }

    /// Width rounded up to whole bytes; sub-byte types report 1.
    pub fn byte_width(&self) -> usize {
        self.bit_width().div_ceil(8)
    }

    pub fn is_sub_byte(&self) -> bool {
        self.bit_width() < 8
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DType::S4 | DType::S8 | DType::S16 | DType::S32 | DType::S64
        ) || self.is_float()
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host types that map onto a [`DType`] and can be viewed as raw bytes.
pub trait NativeType: bytemuck::Pod {
    const DTYPE: DType;
}

macro_rules! map_native_type {
    ($($t:ty => $dt:expr),* $(,)?) => {
        $(
            impl NativeType for $t {
                const DTYPE: DType = $dt;
            }
        )*
    };
}

map_native_type!(
    i8 => DType::S8,
    u8 => DType::U8,
    i16 => DType::S16,
    u16 => DType::U16,
    i32 => DType::S32,
    u32 => DType::U32,
    i64 => DType::S64,
    u64 => DType::U64,
    f16 => DType::F16,
    bf16 => DType::BF16,
    f32 => DType::F32,
    f64 => DType::F64,
);
