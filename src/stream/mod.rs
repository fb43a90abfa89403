mod channel;
mod endpoint;

pub use channel::{Capacity, Drain, StreamChannel, TryPopError, TryPushError};
pub use endpoint::{StreamConsumer, StreamProducer, channel};
