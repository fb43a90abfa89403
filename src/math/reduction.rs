use bytemuck::Pod;

/// Write-conflict resolution applied when a copy lands on data that is already there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReductionType {
    /// Plain overwrite, the last write wins
    Exchange,
    Sum,
    Product,
    Min,
    Max,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
}

impl ReductionType {
    pub fn all() -> Vec<ReductionType> {
        vec![
            ReductionType::Exchange,
            ReductionType::Sum,
            ReductionType::Product,
            ReductionType::Min,
            ReductionType::Max,
            ReductionType::BitwiseAnd,
            ReductionType::BitwiseOr,
            ReductionType::BitwiseXor,
            ReductionType::LogicalAnd,
            ReductionType::LogicalOr,
            ReductionType::LogicalXor,
        ]
    }

    pub fn is_commutative(self) -> bool {
        self != ReductionType::Exchange
    }

    // Floating point sums are only associative up to rounding.
    pub fn is_associative(self) -> bool {
        true
    }
}

/// Element types a reduction can be applied to.
///
/// `combine` returns `None` when the operator has no meaning for the type,
/// e.g. bitwise operators on floats.
pub trait Reducible: Pod + Send + Sync + 'static {
    fn combine(op: ReductionType, acc: Self, value: Self) -> Option<Self>;

    fn identity(op: ReductionType) -> Option<Self>;

    fn supports(op: ReductionType) -> bool {
        op == ReductionType::Exchange || Self::identity(op).is_some()
    }
}

macro_rules! impl_reducible_int {
    ($($t:ty),*) => {
        $(
            impl Reducible for $t {
                fn combine(op: ReductionType, acc: Self, value: Self) -> Option<Self> {
                    Some(match op {
                        ReductionType::Exchange => value,
                        ReductionType::Sum => acc.wrapping_add(value),
                        ReductionType::Product => acc.wrapping_mul(value),
                        ReductionType::Min => acc.min(value),
                        ReductionType::Max => acc.max(value),
                        ReductionType::BitwiseAnd => acc & value,
                        ReductionType::BitwiseOr => acc | value,
                        ReductionType::BitwiseXor => acc ^ value,
                        ReductionType::LogicalAnd => ((acc != 0) && (value != 0)) as $t,
                        ReductionType::LogicalOr => ((acc != 0) || (value != 0)) as $t,
                        ReductionType::LogicalXor => ((acc != 0) != (value != 0)) as $t,
                    })
                }

                fn identity(op: ReductionType) -> Option<Self> {
                    match op {
                        ReductionType::Exchange => None,
                        ReductionType::Sum
                        | ReductionType::BitwiseOr
                        | ReductionType::BitwiseXor
                        | ReductionType::LogicalOr
                        | ReductionType::LogicalXor => Some(0),
                        ReductionType::Product | ReductionType::LogicalAnd => Some(1),
                        ReductionType::Min => Some(<$t>::MAX),
                        ReductionType::Max => Some(<$t>::MIN),
                        ReductionType::BitwiseAnd => Some(!0),
                    }
                }
            }
        )*
    };
}

macro_rules! impl_reducible_float {
    ($($t:ty),*) => {
        $(
            impl Reducible for $t {
                fn combine(op: ReductionType, acc: Self, value: Self) -> Option<Self> {
                    let truth = |b: bool| if b { 1.0 } else { 0.0 };
                    match op {
                        ReductionType::Exchange => Some(value),
                        ReductionType::Sum => Some(acc + value),
                        ReductionType::Product => Some(acc * value),
                        ReductionType::Min => Some(acc.min(value)),
                        ReductionType::Max => Some(acc.max(value)),
                        ReductionType::LogicalAnd => Some(truth(acc != 0.0 && value != 0.0)),
                        ReductionType::LogicalOr => Some(truth(acc != 0.0 || value != 0.0)),
                        ReductionType::LogicalXor => Some(truth((acc != 0.0) != (value != 0.0))),
                        ReductionType::BitwiseAnd
                        | ReductionType::BitwiseOr
                        | ReductionType::BitwiseXor => None,
                    }
                }

                fn identity(op: ReductionType) -> Option<Self> {
                    match op {
                        ReductionType::Sum
                        | ReductionType::LogicalOr
                        | ReductionType::LogicalXor => Some(0.0),
                        ReductionType::Product | ReductionType::LogicalAnd => Some(1.0),
                        ReductionType::Min => Some(<$t>::INFINITY),
                        ReductionType::Max => Some(<$t>::NEG_INFINITY),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_reducible_int!(u8, u16, u32, u64, i8, i16, i32, i64);
impl_reducible_float!(f32, f64);
