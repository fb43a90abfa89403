pub use num_complex::{Complex, Complex32, Complex64};

use super::reduction::{Reducible, ReductionType};

// Complex numbers have no ordering, so only the arithmetic reductions apply.
macro_rules! impl_reducible_complex {
    ($($t:ty),*) => {
        $(
            impl Reducible for Complex<$t> {
                fn combine(op: ReductionType, acc: Self, value: Self) -> Option<Self> {
                    match op {
                        ReductionType::Exchange => Some(value),
                        ReductionType::Sum => Some(acc + value),
                        ReductionType::Product => Some(acc * value),
                        _ => None,
                    }
                }

                fn identity(op: ReductionType) -> Option<Self> {
                    match op {
                        ReductionType::Sum => Some(Complex::new(0.0, 0.0)),
                        ReductionType::Product => Some(Complex::new(1.0, 0.0)),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_reducible_complex!(f32, f64);
