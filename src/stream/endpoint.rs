use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::error::Result;

use super::channel::{Capacity, Drain, StreamChannel, TryPopError, TryPushError};

/// Creates a channel and its first producer and consumer.
///
/// The channel closes when every producer or every consumer has been dropped.
pub fn channel<T>(capacity: Capacity) -> (StreamProducer<T>, StreamConsumer<T>) {
    let channel = Arc::new(StreamChannel::new(capacity));
    (
        StreamProducer::attach(channel.clone()),
        StreamConsumer::attach(channel),
    )
}

pub struct StreamProducer<T> {
    channel: Arc<StreamChannel<T>>,
}

impl<T> StreamProducer<T> {
    fn attach(channel: Arc<StreamChannel<T>>) -> Self {
        channel.producers.fetch_add(1, Ordering::AcqRel);
        Self { channel }
    }

    pub fn push(&self, item: T) -> Result<()> {
        self.channel.push(item)
    }

    pub fn try_push(&self, item: T) -> std::result::Result<(), TryPushError<T>> {
        self.channel.try_push(item)
    }

    pub fn push_all<I: IntoIterator<Item = T>>(&self, items: I) -> Result<usize> {
        self.channel.push_all(items)
    }

    pub fn close(&self) {
        self.channel.close()
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn capacity(&self) -> Capacity {
        self.channel.capacity()
    }

    pub fn channel(&self) -> &Arc<StreamChannel<T>> {
        &self.channel
    }
}

impl<T> Clone for StreamProducer<T> {
    fn clone(&self) -> Self {
        Self::attach(self.channel.clone())
    }
}

impl<T> Drop for StreamProducer<T> {
    fn drop(&mut self) {
        self.channel.release_producer();
    }
}

pub struct StreamConsumer<T> {
    channel: Arc<StreamChannel<T>>,
}

impl<T> StreamConsumer<T> {
    fn attach(channel: Arc<StreamChannel<T>>) -> Self {
        channel.consumers.fetch_add(1, Ordering::AcqRel);
        Self { channel }
    }

    pub fn pop(&self) -> Result<T> {
        self.channel.pop()
    }

    pub fn try_pop(&self) -> std::result::Result<T, TryPopError> {
        self.channel.try_pop()
    }

    pub fn drain(&self) -> Drain<'_, T> {
        self.channel.drain()
    }

    pub fn close(&self) {
        self.channel.close()
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn capacity(&self) -> Capacity {
        self.channel.capacity()
    }
}

impl<T> Clone for StreamConsumer<T> {
    fn clone(&self) -> Self {
        Self::attach(self.channel.clone())
    }
}

impl<T> Drop for StreamConsumer<T> {
    fn drop(&mut self) {
        self.channel.release_consumer();
    }
}

impl<'c, T> IntoIterator for &'c StreamConsumer<T> {
    type Item = T;
    type IntoIter = Drain<'c, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use std::thread;

    #[test]
    fn dropping_last_producer_ends_stream() {
        let (tx, rx) = channel(Capacity::Bounded(4));
        let tx2 = tx.clone();
        tx.push(1).unwrap();
        drop(tx);
        assert!(!rx.is_closed());

        tx2.push(2).unwrap();
        drop(tx2);
        assert!(rx.is_closed());
        assert_eq!(rx.drain().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn dropping_consumers_fails_pushers() {
        let (tx, rx) = channel::<u32>(Capacity::Bounded(1));
        tx.push(1).unwrap();
        let blocked = {
            let tx = tx.clone();
            thread::spawn(move || tx.push(2))
        };
        drop(rx);
        assert_eq!(blocked.join().unwrap(), Err(RuntimeError::ChannelClosed));
    }

    #[test]
    fn consumer_iterates_until_end() {
        let (tx, rx) = channel(Capacity::Unbounded);
        let producer = thread::spawn(move || {
            for i in 0..100 {
                tx.push(i).unwrap();
            }
        });
        let got: Vec<i32> = (&rx).into_iter().collect();
        producer.join().unwrap();
        assert_eq!(got, (0..100).collect::<Vec<_>>());
    }
}
