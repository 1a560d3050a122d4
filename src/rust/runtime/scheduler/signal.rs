// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    resource::ResourceId,
    scheduler::{
        coroutine::{
            Coroutine,
            Delivery,
            Step,
            Value,
        },
        scheduler::{
            SharedScheduler,
            WeakScheduler,
        },
        task::Task,
    },
};
use ::std::{
    any::Any,
    time::Instant,
};

//======================================================================================================================
// Structures
//======================================================================================================================

pub type SignalCallback = Box<dyn FnOnce(Resume) -> Result<(), Fail>>;

/// Suspension request. The callback decides when and how the suspended task comes back.
pub struct Signal {
    callback: SignalCallback,
}

/// One-shot handle that resumes a suspended task. Consuming it is the only way to resume the task it refers to.
pub struct Resume {
    task: Task,
    scheduler: WeakScheduler,
}

/// Runs a signal callback as a task of its own.
pub(crate) struct SignalCoroutine {
    signal: Option<Signal>,
    origin: Task,
    scheduler: WeakScheduler,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Signal {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Resume) -> Result<(), Fail> + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    pub fn invoke(self, resume: Resume) -> Result<(), Fail> {
        (self.callback)(resume)
    }
}

impl Resume {
    pub(crate) fn new(task: Task, scheduler: WeakScheduler) -> Self {
        Self { task, scheduler }
    }

    /// The suspended task.
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn scheduler(&self) -> Result<SharedScheduler, Fail> {
        match self.scheduler.upgrade() {
            Some(scheduler) => Ok(scheduler),
            None => Err(Fail::new(libc::ECANCELED, "scheduler is gone")),
        }
    }

    /// Resumes the task with `value` on the next pass.
    pub fn resume(self, value: Value) -> Result<(), Fail> {
        self.deliver(Some(Ok(value)))
    }

    pub fn resume_with<T: Any>(self, value: T) -> Result<(), Fail> {
        self.resume(Box::new(value))
    }

    /// Resumes the task without a value.
    pub fn wake(self) -> Result<(), Fail> {
        self.deliver(None)
    }

    /// Resumes the task by raising `cause` at its suspension point.
    pub fn throw(self, cause: Fail) -> Result<(), Fail> {
        self.deliver(Some(Err(cause)))
    }

    /// Resumes the task once `deadline` is reached.
    pub fn schedule_at(self, deadline: Instant) -> Result<(), Fail> {
        let scheduler: SharedScheduler = self.consume("schedule_at")?;
        scheduler.schedule(&self.task, Some(deadline))
    }

    /// Resumes the task once `resource` becomes readable.
    pub fn on_read(self, resource: ResourceId) -> Result<(), Fail> {
        let scheduler: SharedScheduler = self.consume("on_read")?;
        scheduler.on_read(resource, &self.task)
    }

    /// Resumes the task once `resource` becomes writable.
    pub fn on_write(self, resource: ResourceId) -> Result<(), Fail> {
        let scheduler: SharedScheduler = self.consume("on_write")?;
        scheduler.on_write(resource, &self.task)
    }

    /// Resumes the task once the process receives `signum`.
    pub fn on_signal(self, signum: libc::c_int) -> Result<(), Fail> {
        let scheduler: SharedScheduler = self.consume("on_signal")?;
        scheduler.on_signal(signum, &self.task)
    }

    /// Gives up the handle and returns the task. The task stays suspended until someone places it again.
    pub fn into_task(self) -> Task {
        self.task
    }

    fn deliver(self, input: Option<Delivery>) -> Result<(), Fail> {
        let scheduler: SharedScheduler = self.consume("deliver")?;
        // Staged only once the task is placed.
        scheduler.schedule(&self.task, None)?;
        if let Some(delivery) = input {
            self.task.stage(delivery);
        }
        Ok(())
    }

    /// Checks the task is still suspended on this handle's signal.
    fn consume(&self, caller: &str) -> Result<SharedScheduler, Fail> {
        let scheduler: SharedScheduler = self.scheduler()?;
        if !self.task.is_awaiting() {
            let cause: String = format!(
                "task was already resumed (name={:?}, id={:?})",
                self.task.get_name(),
                self.task.get_id()
            );
            error!("{}(): {}", caller, cause);
            return Err(Fail::new(libc::EALREADY, &cause));
        }
        Ok(scheduler)
    }
}

impl SignalCoroutine {
    pub(crate) fn new(signal: Signal, origin: Task, scheduler: WeakScheduler) -> Self {
        Self {
            signal: Some(signal),
            origin,
            scheduler,
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Coroutine for SignalCoroutine {
    fn resume(&mut self, _input: Option<Delivery>) -> Result<Step, Fail> {
        let signal: Signal = match self.signal.take() {
            Some(signal) => signal,
            None => return Err(Fail::new(libc::EINVAL, "signal was already handled")),
        };

        if self.origin.is_finished() {
            trace!("resume(): origin task is gone, skipping signal (id={:?})", self.origin.get_id());
            return Ok(Step::Complete(Box::new(())));
        }

        let resume: Resume = Resume::new(self.origin.clone(), self.scheduler.clone());
        match signal.invoke(resume) {
            Ok(()) => Ok(Step::Complete(Box::new(()))),
            // Hand the failure to the suspended task if nobody resumed it.
            Err(cause) if self.origin.is_awaiting() => {
                warn!(
                    "resume(): signal callback failed, raising in origin task (id={:?}, cause={:?})",
                    self.origin.get_id(),
                    cause
                );
                Resume::new(self.origin.clone(), self.scheduler.clone()).throw(cause)?;
                Ok(Step::Complete(Box::new(())))
            },
            Err(cause) => Err(cause),
        }
    }

    fn is_done(&self) -> bool {
        self.signal.is_none()
    }
}
