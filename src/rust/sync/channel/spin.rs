// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::{
        fail::Fail,
        scheduler::{
            KillSwitch,
            Yielder,
        },
    },
    sync::channel::Channel,
};
use ::async_trait::async_trait;
use ::std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
};

//======================================================================================================================
// Structures
//======================================================================================================================

struct Buffer<T> {
    queue: VecDeque<T>,
    capacity: usize,
    open: bool,
}

/// Bounded channel. Senders and receivers that cannot make progress yield once and retry.
pub struct BufferedChannel<T> {
    inner: Rc<RefCell<Buffer<T>>>,
}

/// Slot a waiting receiver hands to senders.
type Slot<T> = Rc<RefCell<Option<T>>>;

struct Claim<T> {
    slot: Slot<T>,
    /// Kill flag of the receiving task.
    receiver: KillSwitch,
}

struct Rendezvous<T> {
    /// Receivers currently waiting for a value, oldest first.
    receivers: VecDeque<Claim<T>>,
    open: bool,
}

/// Channel without buffer space. A send completes only once it has handed its value to a waiting receiver.
pub struct UnbufferedChannel<T> {
    inner: Rc<RefCell<Rendezvous<T>>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl<T> BufferedChannel<T> {
    /// Creates a channel that holds at most `capacity` values. Fails with `EINVAL` for a zero capacity, use
    /// [UnbufferedChannel] for rendezvous semantics.
    pub fn new(capacity: usize) -> Result<Self, Fail> {
        if capacity == 0 {
            let cause: &str = "buffered channel needs a non-zero capacity";
            warn!("new(): {}", cause);
            return Err(Fail::new(libc::EINVAL, cause));
        }
        Ok(Self {
            inner: Rc::new(RefCell::new(Buffer {
                queue: VecDeque::with_capacity(capacity),
                capacity,
                open: true,
            })),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity
    }
}

impl<T> Claim<T> {
    /// Whether the receiver can still take a value. A receiver that was dropped no longer shares the slot.
    fn is_live(&self) -> bool {
        Rc::strong_count(&self.slot) > 1 && !self.receiver.is_tripped()
    }
}

impl<T> UnbufferedChannel<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Rendezvous {
                receivers: VecDeque::new(),
                open: true,
            })),
        }
    }

    /// Number of receivers waiting for a value.
    pub fn num_receivers(&self) -> usize {
        self.inner.borrow().receivers.len()
    }

    fn withdraw(&self, slot: &Slot<T>) {
        self.inner.borrow_mut().receivers.retain(|claim| !Rc::ptr_eq(&claim.slot, slot));
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

#[async_trait(?Send)]
impl<T: 'static> Channel<T> for BufferedChannel<T> {
    async fn send(&self, yielder: &Yielder, value: T) -> Result<(), Fail> {
        loop {
            {
                let mut buffer = self.inner.borrow_mut();
                if !buffer.open {
                    debug!("send(): channel is closed, dropping value");
                    return Ok(());
                }
                if buffer.queue.len() < buffer.capacity {
                    buffer.queue.push_back(value);
                    return Ok(());
                }
            }
            yielder.yield_once().await?;
        }
    }

    async fn recv(&self, yielder: &Yielder) -> Result<(Option<T>, bool), Fail> {
        loop {
            {
                let mut buffer = self.inner.borrow_mut();
                if let Some(value) = buffer.queue.pop_front() {
                    let ok: bool = buffer.open || !buffer.queue.is_empty();
                    return Ok((Some(value), ok));
                }
                if !buffer.open {
                    return Ok((None, false));
                }
            }
            yielder.yield_once().await?;
        }
    }

    fn close(&self) {
        self.inner.borrow_mut().open = false;
    }

    fn is_open(&self) -> bool {
        self.inner.borrow().open
    }
}

#[async_trait(?Send)]
impl<T: 'static> Channel<T> for UnbufferedChannel<T> {
    /// Completes once a live receiver took the value. A receiver killed before taking it hands the value back, and
    /// the send goes on with the next receiver.
    async fn send(&self, yielder: &Yielder, value: T) -> Result<(), Fail> {
        let mut value: Option<T> = Some(value);
        loop {
            let claim: Option<Claim<T>> = {
                let mut rendezvous = self.inner.borrow_mut();
                if !rendezvous.open {
                    debug!("send(): channel is closed, dropping value");
                    return Ok(());
                }
                let mut live: Option<Claim<T>> = None;
                while let Some(claim) = rendezvous.receivers.pop_front() {
                    if claim.is_live() {
                        live = Some(claim);
                        break;
                    }
                }
                live
            };

            if let Some(claim) = claim {
                *claim.slot.borrow_mut() = value.take();
                loop {
                    yielder.yield_once().await?;
                    if claim.slot.borrow().is_none() {
                        return Ok(());
                    }
                    if !claim.is_live() {
                        trace!("send(): receiver went away before taking the value, retrying");
                        value = claim.slot.borrow_mut().take();
                        break;
                    }
                }
                continue;
            }
            yielder.yield_once().await?;
        }
    }

    async fn recv(&self, yielder: &Yielder) -> Result<(Option<T>, bool), Fail> {
        let slot: Slot<T> = Rc::new(RefCell::new(None));
        {
            let mut rendezvous = self.inner.borrow_mut();
            if !rendezvous.open {
                return Ok((None, false));
            }
            rendezvous.receivers.push_back(Claim {
                slot: slot.clone(),
                receiver: yielder.kill_switch(),
            });
        }
        loop {
            if let Some(value) = slot.borrow_mut().take() {
                return Ok((Some(value), self.is_open()));
            }
            if !self.is_open() {
                self.withdraw(&slot);
                return Ok((None, false));
            }
            if let Err(cause) = yielder.yield_once().await {
                self.withdraw(&slot);
                return Err(cause);
            }
        }
    }

    fn close(&self) {
        self.inner.borrow_mut().open = false;
    }

    fn is_open(&self) -> bool {
        self.inner.borrow().open
    }
}

impl<T> Clone for BufferedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Clone for UnbufferedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for UnbufferedChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
