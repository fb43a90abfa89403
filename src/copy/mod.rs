mod descriptor;
mod engine;
mod plan;
mod policy;

pub use descriptor::CopyDescriptor;
pub use engine::{CopyEngine, TransferScope};
pub use policy::TransferPolicy;
