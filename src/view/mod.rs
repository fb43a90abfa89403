mod layout;
mod view;

pub use layout::{element_count, is_contiguous, row_major_strides};
pub use view::View;
