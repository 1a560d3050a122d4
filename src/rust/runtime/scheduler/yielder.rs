// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::{
        coroutine::{
            Delivery,
            Value,
        },
        signal::{
            Resume,
            Signal,
        },
        task::{
            KillSwitch,
            TaskId,
        },
    },
};
use ::std::{
    any::Any,
    cell::RefCell,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{
        Context,
        Poll,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Request a coroutine leaves behind when it suspends.
pub(crate) enum Yielded {
    Value(Option<Value>),
    Signal(Signal),
}

/// Exchange area between a coroutine body and the coroutine driving it.
#[derive(Default)]
struct Mailbox {
    /// What the coroutine is resumed with.
    inbox: Option<Delivery>,
    /// What the coroutine asked for when it suspended.
    outbox: Option<Yielded>,
    /// Kill flag of the owning task.
    killed: KillSwitch,
}

#[derive(PartialEq, Eq)]
enum YieldState {
    Running,
    Yielded,
}

/// Yield is a future that suspends the running coroutine exactly once. It leaves its request in the mailbox on the
/// first poll and hands back whatever was delivered on the second.
struct Yield {
    mailbox: Rc<RefCell<Mailbox>>,
    request: Option<Yielded>,
    state: YieldState,
}

/// Yielder lets a single coroutine yield to the scheduler.
#[derive(Clone)]
pub struct Yielder {
    task_id: TaskId,
    mailbox: Rc<RefCell<Mailbox>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Yield {
    fn new(mailbox: Rc<RefCell<Mailbox>>, request: Yielded) -> Self {
        Self {
            mailbox,
            request: Some(request),
            state: YieldState::Running,
        }
    }
}

impl Yielder {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            mailbox: Rc::new(RefCell::new(Mailbox::default())),
        }
    }

    /// Identifier of the task this yielder belongs to.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Gives up the processor until the next scheduling pass. Fails if a failure was thrown into the task meanwhile.
    pub async fn yield_once(&self) -> Result<(), Fail> {
        match self.suspend(Yielded::Value(None)).await {
            Some(Err(cause)) => Err(cause),
            _ => Ok(()),
        }
    }

    /// Yields `n` times in a row.
    pub async fn yield_times(&self, n: usize) -> Result<(), Fail> {
        for _ in 0..n {
            self.yield_once().await?;
        }
        Ok(())
    }

    /// Yields and surfaces `value` to whoever runs the task.
    pub async fn yield_value(&self, value: Value) -> Result<(), Fail> {
        match self.suspend(Yielded::Value(Some(value))).await {
            Some(Err(cause)) => Err(cause),
            _ => Ok(()),
        }
    }

    /// Suspends the task until someone resumes it through the [Resume] handed to `callback`. The callback runs as its
    /// own task right after the suspension.
    pub async fn signal<F>(&self, callback: F) -> Result<Option<Value>, Fail>
    where
        F: FnOnce(Resume) -> Result<(), Fail> + 'static,
    {
        match self.suspend(Yielded::Signal(Signal::new(callback))).await {
            None => Ok(None),
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(cause)) => Err(cause),
        }
    }

    /// Same as [Yielder::signal] but expects to be resumed with a value of type `T`.
    pub async fn signal_value<T, F>(&self, callback: F) -> Result<T, Fail>
    where
        T: Any,
        F: FnOnce(Resume) -> Result<(), Fail> + 'static,
    {
        match self.signal(callback).await? {
            Some(value) => match value.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(_) => {
                    let cause: String = format!("resumed with a value of unexpected type (task_id={:?})", self.task_id);
                    warn!("signal_value(): {}", cause);
                    Err(Fail::new(libc::EINVAL, &cause))
                },
            },
            None => {
                let cause: String = format!("resumed without a value (task_id={:?})", self.task_id);
                warn!("signal_value(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }

    fn suspend(&self, request: Yielded) -> Yield {
        Yield::new(self.mailbox.clone(), request)
    }

    /// Hands what the task was resumed with to the pending yield point.
    pub(crate) fn deliver(&self, input: Option<Delivery>) {
        self.mailbox.borrow_mut().inbox = input;
    }

    pub(crate) fn attach(&self, killed: KillSwitch) {
        self.mailbox.borrow_mut().killed = killed;
    }

    /// Kill flag of the task running this yielder's coroutine. Lets shared structures tell live waiters from tasks
    /// that were killed but not yet dropped.
    pub(crate) fn kill_switch(&self) -> KillSwitch {
        self.mailbox.borrow().killed.clone()
    }

    /// Takes the request left behind by the last suspension.
    pub(crate) fn take_request(&self) -> Option<Yielded> {
        self.mailbox.borrow_mut().outbox.take()
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Future for Yield {
    type Output = Option<Delivery>;

    fn poll(self: Pin<&mut Self>, _context: &mut Context) -> Poll<Self::Output> {
        let self_: &mut Self = self.get_mut();
        match self_.state {
            YieldState::Running => {
                let mut mailbox = self_.mailbox.borrow_mut();
                if mailbox.outbox.is_some() {
                    warn!("poll(): more than one pending yield in the same coroutine, dropping the earlier request");
                }
                mailbox.outbox = self_.request.take();
                self_.state = YieldState::Yielded;
                Poll::Pending
            },
            YieldState::Yielded => Poll::Ready(self_.mailbox.borrow_mut().inbox.take()),
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
