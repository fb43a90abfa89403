use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use flowrt::stream::{TryPopError, TryPushError};
use flowrt::{Capacity, RuntimeError, StreamChannel, channel};

#[test]
fn third_push_waits_for_a_pop() {
    let (tx, rx) = channel::<u32>(Capacity::Bounded(2));
    tx.push(1).unwrap();
    tx.push(2).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let pusher = {
        let (tx, done) = (tx.clone(), done.clone());
        thread::spawn(move || {
            tx.push(3).unwrap();
            done.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::SeqCst));
    assert_eq!(rx.len(), 2);

    assert_eq!(rx.pop().unwrap(), 1);
    pusher.join().unwrap();
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(rx.len(), 2);
    assert_eq!(rx.pop().unwrap(), 2);
    assert_eq!(rx.pop().unwrap(), 3);
}

#[test]
fn fifo_with_concurrent_producers() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 500;

    let (tx, rx) = channel::<(usize, usize)>(Capacity::Bounded(8));
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let tx = tx.clone();
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    tx.push((p, seq)).unwrap();
                }
            })
        })
        .collect();
    drop(tx);

    let mut next = [0usize; PRODUCERS];
    let mut total = 0;
    for (p, seq) in &rx {
        assert_eq!(seq, next[p], "producer {} out of order", p);
        next[p] += 1;
        total += 1;
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(total, PRODUCERS * PER_PRODUCER);
    assert!(matches!(rx.pop(), Err(RuntimeError::EndOfStream)));
}

#[test]
fn single_producer_order_survives_several_consumers() {
    let channel = Arc::new(StreamChannel::new(Capacity::Bounded(4)));
    let received = Arc::new(AtomicUsize::new(0));

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let (channel, received) = (channel.clone(), received.clone());
            thread::spawn(move || {
                let mut last = None;
                for item in channel.drain() {
                    // each consumer sees an increasing subsequence
                    assert!(last.is_none_or(|l| l < item));
                    last = Some(item);
                    received.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for i in 0..1000u32 {
        channel.push(i).unwrap();
    }
    channel.close();

    for c in consumers {
        c.join().unwrap();
    }
    assert_eq!(received.load(Ordering::SeqCst), 1000);
}

#[test]
fn closed_channel_drains_then_ends() {
    let (tx, rx) = channel::<&str>(Capacity::Bounded(4));
    tx.push("a").unwrap();
    tx.push("b").unwrap();

    tx.close();
    tx.close();
    assert!(rx.is_closed());
    assert!(matches!(tx.push("c"), Err(RuntimeError::ChannelClosed)));
    assert_eq!(tx.try_push("c"), Err(TryPushError::Closed("c")));
    assert_eq!(rx.len(), 2);

    assert_eq!(rx.pop().unwrap(), "a");
    assert_eq!(rx.try_pop(), Ok("b"));
    assert_eq!(rx.try_pop(), Err(TryPopError::EndOfStream));
    assert!(matches!(rx.pop(), Err(RuntimeError::EndOfStream)));
}

#[test]
fn close_wakes_blocked_pushers_and_poppers() {
    let full = Arc::new(StreamChannel::new(Capacity::Bounded(1)));
    full.push(0u8).unwrap();
    let pusher = {
        let full = full.clone();
        thread::spawn(move || full.push(1))
    };

    let empty = Arc::new(StreamChannel::<u8>::new(Capacity::Bounded(1)));
    let popper = {
        let empty = empty.clone();
        thread::spawn(move || empty.pop())
    };

    thread::sleep(Duration::from_millis(30));
    full.close();
    empty.close();

    assert!(matches!(pusher.join().unwrap(), Err(RuntimeError::ChannelClosed)));
    assert!(matches!(popper.join().unwrap(), Err(RuntimeError::EndOfStream)));
    // the failed push left nothing behind
    assert_eq!(full.len(), 1);
}

#[test]
fn rendezvous_push_completes_only_with_a_pop() {
    let (tx, rx) = channel::<u64>(Capacity::bounded(0));
    assert_eq!(tx.capacity(), Capacity::Rendezvous);
    assert_eq!(tx.try_push(1), Err(TryPushError::Full(1)));

    let done = Arc::new(AtomicBool::new(false));
    let pusher = {
        let (tx, done) = (tx.clone(), done.clone());
        thread::spawn(move || {
            tx.push(7).unwrap();
            done.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::SeqCst));
    assert!(rx.len() <= 1);

    assert_eq!(rx.pop().unwrap(), 7);
    pusher.join().unwrap();
    assert!(done.load(Ordering::SeqCst));
    assert!(rx.is_empty());
}

#[test]
fn rendezvous_try_push_hands_to_a_waiting_popper() {
    let (tx, rx) = channel::<u8>(Capacity::Rendezvous);
    let popper = thread::spawn(move || rx.pop());

    let mut item = 9;
    loop {
        match tx.try_push(item) {
            Ok(()) => break,
            Err(TryPushError::Full(back)) => {
                item = back;
                thread::yield_now();
            }
            Err(TryPushError::Closed(_)) => panic!("closed"),
        }
    }
    assert_eq!(popper.join().unwrap().unwrap(), 9);
}

#[test]
fn rendezvous_close_withdraws_the_pending_element() {
    let channel = Arc::new(StreamChannel::new(Capacity::Rendezvous));
    let pusher = {
        let channel = channel.clone();
        thread::spawn(move || channel.push(5u8))
    };

    thread::sleep(Duration::from_millis(30));
    channel.close();
    assert!(matches!(pusher.join().unwrap(), Err(RuntimeError::ChannelClosed)));
    assert_eq!(channel.try_pop(), Err(TryPopError::EndOfStream));
}

#[test]
fn dropping_every_consumer_closes_the_channel() {
    let (tx, rx) = channel::<u8>(Capacity::Unbounded);
    let rx2 = rx.clone();
    assert_eq!(tx.push_all(0..100).unwrap(), 100);

    drop(rx);
    assert!(!tx.is_closed());
    drop(rx2);
    assert!(tx.is_closed());
    assert!(tx.push(1).is_err());
}

#[test]
fn capacity_is_never_exceeded() {
    let (tx, rx) = channel::<usize>(Capacity::Bounded(3));
    let producer = thread::spawn(move || tx.push_all(0..2000).unwrap());

    let mut seen = 0;
    loop {
        assert!(rx.len() <= 3);
        match rx.pop() {
            Ok(v) => {
                assert_eq!(v, seen);
                seen += 1;
            }
            Err(_) => break,
        }
    }
    assert_eq!(producer.join().unwrap(), 2000);
    assert_eq!(seen, 2000);
}
