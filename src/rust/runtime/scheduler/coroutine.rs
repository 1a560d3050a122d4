// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::{
        signal::Signal,
        task::{
            KillSwitch,
            TaskId,
        },
        yielder::{
            Yielded,
            Yielder,
        },
    },
};
use ::futures::task::noop_waker_ref;
use ::std::{
    any::Any,
    future::Future,
    pin::Pin,
    task::{
        Context,
        Poll,
    },
};

//==============================================================================
// Structures
//==============================================================================

/// Opaque value exchanged between a coroutine and the scheduler.
pub type Value = Box<dyn Any>;

/// What a coroutine receives when it is resumed: a value or a failure to raise at its suspension point.
pub type Delivery = Result<Value, Fail>;

/// What a coroutine produces each time it runs.
pub enum Step {
    /// The coroutine yielded, optionally with a value, and wants to run again on the next pass.
    Continue(Option<Value>),
    /// The coroutine suspended until somebody resumes it from the signal callback.
    Suspend(Signal),
    /// The coroutine finished with this value.
    Complete(Value),
}

/// A resumable computation driven by the scheduler.
pub trait Coroutine {
    /// Runs the coroutine until its next suspension point. `input` is what was staged since the last run.
    fn resume(&mut self, input: Option<Delivery>) -> Result<Step, Fail>;

    fn is_done(&self) -> bool;

    /// Hands over the kill flag of the task that owns the coroutine. Called once, before the first run.
    fn attach(&mut self, _killed: KillSwitch) {}
}

/// Coroutine backed by a Rust future. The future talks to the scheduler through its [Yielder].
pub struct FutureCoroutine {
    yielder: Yielder,
    future: Pin<Box<dyn Future<Output = Result<Value, Fail>>>>,
    started: bool,
    done: bool,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl FutureCoroutine {
    /// Builds the coroutine body by handing a fresh [Yielder] to `factory`. The body does not run until the first
    /// call to [Coroutine::resume].
    pub fn new<F, Fut, T>(task_id: TaskId, factory: F) -> Self
    where
        F: FnOnce(Yielder) -> Fut,
        Fut: Future<Output = Result<T, Fail>> + 'static,
        T: Any,
    {
        let yielder: Yielder = Yielder::new(task_id);
        let body: Fut = factory(yielder.clone());
        let future = Box::pin(async move { body.await.map(|value: T| Box::new(value) as Value) });
        Self {
            yielder,
            future,
            started: false,
            done: false,
        }
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl Coroutine for FutureCoroutine {
    fn resume(&mut self, input: Option<Delivery>) -> Result<Step, Fail> {
        if self.done {
            return Err(Fail::new(libc::EINVAL, "coroutine has already completed"));
        }

        if !self.started {
            self.started = true;
            // The body has no suspension point to raise a failure at yet.
            if let Some(Err(cause)) = input {
                self.done = true;
                return Err(cause);
            }
        } else {
            self.yielder.deliver(input);
        }

        let mut ctx: Context = Context::from_waker(noop_waker_ref());
        match self.future.as_mut().poll(&mut ctx) {
            Poll::Ready(Ok(value)) => {
                self.done = true;
                Ok(Step::Complete(value))
            },
            Poll::Ready(Err(cause)) => {
                self.done = true;
                Err(cause)
            },
            Poll::Pending => match self.yielder.take_request() {
                Some(Yielded::Signal(signal)) => Ok(Step::Suspend(signal)),
                Some(Yielded::Value(value)) => Ok(Step::Continue(value)),
                None => Ok(Step::Continue(None)),
            },
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn attach(&mut self, killed: KillSwitch) {
        self.yielder.attach(killed);
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
