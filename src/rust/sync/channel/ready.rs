// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::{
        fail::Fail,
        io,
        resource::{
            Resource,
            ResourceId,
            Stream,
        },
        scheduler::Yielder,
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
// Constants
//======================================================================================================================

const NOTIFICATION: &[u8] = &[1];

//======================================================================================================================
// Structures
//======================================================================================================================

struct Notifier<T> {
    queue: VecDeque<T>,
    open: bool,
    /// Receivers wait for this end to become readable.
    reader: Stream,
    /// Every send and the close write one byte here.
    writer: Stream,
}

/// Unbounded channel whose receivers sleep on the readiness backend instead of spinning.
pub struct ReadyChannel<T> {
    inner: Rc<RefCell<Notifier<T>>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl<T> Notifier<T> {
    /// Writes a notification byte. A full socket buffer already means pending readiness, so that is not an error.
    fn notify(&mut self) -> Result<(), Fail> {
        match self.writer.write(NOTIFICATION) {
            Ok(_) => Ok(()),
            Err(e) if e.is_would_block() => Ok(()),
            Err(e) => {
                error!("notify(): {:?}", e);
                Err(e)
            },
        }
    }

    /// Consumes pending notification bytes.
    fn drain(&mut self) -> Result<(), Fail> {
        loop {
            match self.reader.read(64) {
                Ok(buf) if buf.is_empty() => return Ok(()),
                Ok(_) => continue,
                Err(e) if e.is_would_block() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}

impl<T> ReadyChannel<T> {
    pub fn new() -> Result<Self, Fail> {
        let (reader, writer): (Stream, Stream) = Stream::pair()?;
        Ok(Self {
            inner: Rc::new(RefCell::new(Notifier {
                queue: VecDeque::new(),
                open: true,
                reader,
                writer,
            })),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().queue.is_empty()
    }

    /// Resource receivers wait on.
    pub fn resource_id(&self) -> ResourceId {
        self.inner.borrow().reader.resource_id()
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

#[async_trait(?Send)]
impl<T: 'static> Channel<T> for ReadyChannel<T> {
    async fn send(&self, _yielder: &Yielder, value: T) -> Result<(), Fail> {
        let mut notifier = self.inner.borrow_mut();
        if !notifier.open {
            debug!("send(): channel is closed, dropping value");
            return Ok(());
        }
        // Queued only once the notification went through.
        notifier.notify()?;
        notifier.queue.push_back(value);
        Ok(())
    }

    async fn recv(&self, yielder: &Yielder) -> Result<(Option<T>, bool), Fail> {
        loop {
            let resource: ResourceId = {
                let mut notifier = self.inner.borrow_mut();
                notifier.drain()?;
                if let Some(value) = notifier.queue.pop_front() {
                    let ok: bool = notifier.open || !notifier.queue.is_empty();
                    return Ok((Some(value), ok));
                }
                if !notifier.open {
                    return Ok((None, false));
                }
                notifier.reader.resource_id()
            };
            io::wait_readable(yielder, resource).await?;
        }
    }

    fn close(&self) {
        let mut notifier = self.inner.borrow_mut();
        if notifier.open {
            notifier.open = false;
            if let Err(e) = notifier.notify() {
                warn!("close(): failed to wake receivers ({:?})", e);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.inner.borrow().open
    }
}

impl<T> Clone for ReadyChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
