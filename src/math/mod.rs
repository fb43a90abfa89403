pub mod complex;
pub mod intset;
pub mod reduction;
pub mod scalar;

pub use complex::{Complex32, Complex64};
pub use intset::{IndexSpace, Range};
pub use reduction::{Reducible, ReductionType};
