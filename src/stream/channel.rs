use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::error::{Result, RuntimeError};

/// How many elements a channel may buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capacity {
    /// No buffering, a push completes only once a pop has taken the element
    Rendezvous,
    Bounded(usize),
    Unbounded,
}

impl Capacity {
    /// `0` means rendezvous.
    pub fn bounded(n: usize) -> Self {
        if n == 0 {
            Capacity::Rendezvous
        } else {
            Capacity::Bounded(n)
        }
    }

    // rendezvous parks its single element in the queue until a popper takes it
    fn slots(self) -> Option<usize> {
        match self {
            Capacity::Rendezvous => Some(1),
            Capacity::Bounded(n) => Some(n),
            Capacity::Unbounded => None,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Rendezvous => write!(f, "0"),
            Capacity::Bounded(n) => write!(f, "{}", n),
            Capacity::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl FromStr for Capacity {
    type Err = RuntimeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("inf") {
            return Ok(Capacity::Unbounded);
        }
        s.parse::<usize>()
            .map(Capacity::bounded)
            .map_err(|_| RuntimeError::Config(format!("Invalid channel capacity '{}'", s)))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TryPushError<T> {
    #[error("channel is full")]
    Full(T),
    #[error("channel is closed")]
    Closed(T),
}

impl<T> TryPushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) => item,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPopError {
    /// Nothing buffered right now, more may come
    #[error("channel is empty")]
    Empty,
    /// Closed and drained, nothing will ever come
    #[error("end of stream")]
    EndOfStream,
}

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
    pushed: u64,
    popped: u64,
    waiting_poppers: usize,
}

/// FIFO between pipeline stages with back-pressure.
///
/// Pushes block while the channel is full, pops block while it is empty.
/// After `close` no push is accepted, buffered elements can still be popped,
/// and once they are gone `pop` fails with `EndOfStream`.
pub struct StreamChannel<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Capacity,
    pub(super) producers: AtomicUsize,
    pub(super) consumers: AtomicUsize,
}

impl<T> StreamChannel<T> {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
                pushed: 0,
                popped: 0,
                waiting_poppers: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            producers: AtomicUsize::new(0),
            consumers: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    fn has_room(&self, state: &State<T>) -> bool {
        match self.capacity.slots() {
            Some(n) => state.queue.len() < n,
            None => true,
        }
    }

    fn wake_pushers(&self) {
        // rendezvous pushers wait on their own ticket, so all of them must look
        if self.capacity == Capacity::Rendezvous {
            self.not_full.notify_all();
        } else {
            self.not_full.notify_one();
        }
    }

    /// Blocks until there is room, then enqueues `item`.
    ///
    /// Fails with `ChannelClosed` if the channel is or becomes closed first; the
    /// element is then not in the channel. On a rendezvous channel the call
    /// also waits for a pop to take the element.
    pub fn push(&self, item: T) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(RuntimeError::ChannelClosed);
            }
            if self.has_room(&state) {
                break;
            }
            self.not_full.wait(&mut state);
        }

        state.queue.push_back(item);
        state.pushed += 1;
        let ticket = state.pushed;
        self.not_empty.notify_one();

        if self.capacity == Capacity::Rendezvous {
            while state.popped < ticket {
                if state.closed {
                    // still ours: a rendezvous channel holds one element at most
                    state.queue.pop_back();
                    state.pushed -= 1;
                    self.not_full.notify_all();
                    return Err(RuntimeError::ChannelClosed);
                }
                self.not_full.wait(&mut state);
            }
        }

        Ok(())
    }

    /// Enqueues without blocking.
    ///
    /// A rendezvous channel accepts the element only when a popper is already
    /// waiting for it.
    pub fn try_push(&self, item: T) -> std::result::Result<(), TryPushError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TryPushError::Closed(item));
        }

        let room = match self.capacity {
            Capacity::Rendezvous => state.queue.is_empty() && state.waiting_poppers > 0,
            _ => self.has_room(&state),
        };
        if !room {
            return Err(TryPushError::Full(item));
        }

        state.queue.push_back(item);
        state.pushed += 1;
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pushes in order and stops at the first failure.
    pub fn push_all<I: IntoIterator<Item = T>>(&self, items: I) -> Result<usize> {
        let mut count = 0;
        for item in items {
            self.push(item)?;
            count += 1;
        }
        Ok(count)
    }

    /// Blocks until an element is available.
    ///
    /// Fails with `EndOfStream` once the channel is closed and drained.
    pub fn pop(&self) -> Result<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.queue.pop_front() {
                state.popped += 1;
                self.wake_pushers();
                return Ok(item);
            }
            if state.closed {
                return Err(RuntimeError::EndOfStream);
            }
            state.waiting_poppers += 1;
            self.not_empty.wait(&mut state);
            state.waiting_poppers -= 1;
        }
    }

    pub fn try_pop(&self) -> std::result::Result<T, TryPopError> {
        let mut state = self.state.lock();
        match state.queue.pop_front() {
            Some(item) => {
                state.popped += 1;
                self.wake_pushers();
                Ok(item)
            }
            None if state.closed => Err(TryPopError::EndOfStream),
            None => Err(TryPopError::Empty),
        }
    }

    /// Idempotent. Blocked pushers fail, blocked poppers drain and then see `EndOfStream`.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            tracing::debug!(buffered = state.queue.len(), "stream channel closed");
        }
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Elements currently buffered.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterator that pops until the stream ends.
    pub fn drain(&self) -> Drain<'_, T> {
        Drain { channel: self }
    }

    pub(super) fn release_producer(&self) {
        if self.producers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.close();
        }
    }

    pub(super) fn release_consumer(&self) {
        if self.consumers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.close();
        }
    }
}

impl<T> fmt::Debug for StreamChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StreamChannel")
            .field("capacity", &self.capacity)
            .field("len", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}

pub struct Drain<'c, T> {
    channel: &'c StreamChannel<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.channel.pop().ok()
    }
}
