// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::{
    fail::Fail,
    resource::ResourceId,
    scheduler::coroutine::{
        Coroutine,
        Delivery,
        Step,
        Value,
    },
};
use ::libc::c_int;
use ::std::{
    any::Any,
    cell::{
        Cell,
        RefCell,
    },
    fmt,
    rc::Rc,
    time::Instant,
};

//==============================================================================
// Structures
//==============================================================================

/// Externally visible task identifier. Identifiers are handed out in increasing order and never reused.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct TaskId(pub u64);

/// Lifecycle of the coroutine owned by a task.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TaskState {
    Created,
    Running,
    Suspended,
    Done,
}

/// Kill flag shared between a task and the body it runs. Once tripped, stays tripped.
#[derive(Clone, Default)]
pub struct KillSwitch(Rc<Cell<bool>>);

/// Where the scheduler currently keeps a task. A task sits in at most one of these places at any time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Placement {
    Detached,
    Ready,
    Timer(Instant),
    ReadWait(ResourceId),
    WriteWait(ResourceId),
    SignalWait(c_int),
}

struct TaskInner {
    /// Task identifier.
    id: TaskId,
    /// Task name, used for tracing.
    name: String,
    /// Underlying coroutine to run.
    coroutine: RefCell<Box<dyn Coroutine>>,
    /// Value or failure to hand to the coroutine on its next run.
    staged: RefCell<Option<Delivery>>,
    /// Output value of the coroutine once it completes.
    result: RefCell<Option<Value>>,
    state: Cell<TaskState>,
    placement: Cell<Placement>,
    killed: KillSwitch,
    /// Raised on kill so that the owning scheduler looks for killed tasks that sit in none of its queues.
    kill_notice: RefCell<Option<Rc<Cell<bool>>>>,
    paused: Cell<bool>,
    /// Set while the task is suspended on a signal that nobody has resumed yet.
    awaiting: Cell<bool>,
    /// Set after a failure was thrown back into the coroutine and not yet followed by a clean run.
    rethrown: Cell<bool>,
}

/// A schedulable unit of work. Cloning a task clones the handle, not the coroutine.
#[derive(Clone)]
pub struct Task(Rc<TaskInner>);

//==============================================================================
// Associate Functions
//==============================================================================

impl KillSwitch {
    /// Trips the switch. Returns whether it was already tripped.
    pub fn trip(&self) -> bool {
        self.0.replace(true)
    }

    pub fn is_tripped(&self) -> bool {
        self.0.get()
    }
}

impl Task {
    /// Instantiates a new Task.
    pub fn new(id: TaskId, name: &str, mut coroutine: Box<dyn Coroutine>) -> Self {
        let killed: KillSwitch = KillSwitch::default();
        coroutine.attach(killed.clone());
        Self(Rc::new(TaskInner {
            id,
            name: name.to_string(),
            coroutine: RefCell::new(coroutine),
            staged: RefCell::new(None),
            result: RefCell::new(None),
            state: Cell::new(TaskState::Created),
            placement: Cell::new(Placement::Detached),
            killed,
            kill_notice: RefCell::new(None),
            paused: Cell::new(false),
            awaiting: Cell::new(false),
            rethrown: Cell::new(false),
        }))
    }

    pub fn get_id(&self) -> TaskId {
        self.0.id
    }

    pub fn get_name(&self) -> &str {
        &self.0.name
    }

    pub fn get_state(&self) -> TaskState {
        self.0.state.get()
    }

    /// Starts the coroutine on the first call and resumes it afterwards, handing over whatever was staged with
    /// [Task::send] or [Task::throw]. Returns what the coroutine produced at its next suspension point.
    pub fn run(&self) -> Result<Step, Fail> {
        if self.is_finished() {
            let cause: String = format!("cannot run a finished task (id={:?})", self.0.id);
            warn!("run(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        let mut coroutine = match self.0.coroutine.try_borrow_mut() {
            Ok(coroutine) => coroutine,
            Err(_) => {
                let cause: String = format!("task is already running (id={:?})", self.0.id);
                error!("run(): {}", cause);
                return Err(Fail::new(libc::EBUSY, &cause));
            },
        };
        let input: Option<Delivery> = self.0.staged.borrow_mut().take();
        self.0.state.set(TaskState::Running);
        let result: Result<Step, Fail> = coroutine.resume(input);
        self.0.state.set(if coroutine.is_done() {
            TaskState::Done
        } else {
            TaskState::Suspended
        });
        result
    }

    /// Stages a value to be delivered on the next run.
    pub fn send(&self, value: Value) {
        self.stage(Ok(value));
    }

    /// Stages a failure to be raised inside the coroutine at its next resume point.
    pub fn throw(&self, cause: Fail) {
        self.stage(Err(cause));
    }

    /// Requests termination. The scheduler drops the task the next time it finds it in one of its queues.
    pub fn kill(&self) {
        if !self.0.killed.trip() {
            trace!("kill(): name={:?}, id={:?}", self.0.name, self.0.id);
            if let Some(notice) = self.0.kill_notice.borrow().as_ref() {
                notice.set(true);
            }
        }
    }

    pub fn is_killed(&self) -> bool {
        self.0.killed.is_tripped()
    }

    pub fn pause(&self) {
        self.0.paused.set(true);
    }

    pub fn unpause(&self) {
        self.0.paused.set(false);
    }

    pub fn is_paused(&self) -> bool {
        self.0.paused.get()
    }

    /// Once true, stays true.
    pub fn is_finished(&self) -> bool {
        self.0.killed.is_tripped() || self.0.state.get() == TaskState::Done
    }

    pub fn has_result(&self) -> bool {
        self.0.result.borrow().is_some()
    }

    /// Takes the completion value of the coroutine if it has one of type `T`.
    pub fn take_result<T: Any>(&self) -> Option<T> {
        let value: Value = self.0.result.borrow_mut().take()?;
        match value.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(value) => {
                warn!("take_result(): unexpected result type (id={:?})", self.0.id);
                *self.0.result.borrow_mut() = Some(value);
                None
            },
        }
    }

    pub(crate) fn stage(&self, delivery: Delivery) {
        if let Some(previous) = self.0.staged.replace(Some(delivery)) {
            debug!(
                "stage(): overwriting a staged delivery (id={:?}, failure={:?})",
                self.0.id,
                previous.err()
            );
        }
    }

    /// Drops whatever was staged and not yet delivered.
    pub(crate) fn unstage(&self) -> Option<Delivery> {
        self.0.staged.borrow_mut().take()
    }

    pub(crate) fn set_kill_notice(&self, notice: Rc<Cell<bool>>) {
        *self.0.kill_notice.borrow_mut() = Some(notice);
    }

    pub(crate) fn set_result(&self, value: Value) {
        *self.0.result.borrow_mut() = Some(value);
    }

    pub(crate) fn get_placement(&self) -> Placement {
        self.0.placement.get()
    }

    pub(crate) fn set_placement(&self, placement: Placement) {
        self.0.placement.set(placement);
    }

    pub(crate) fn is_awaiting(&self) -> bool {
        self.0.awaiting.get()
    }

    pub(crate) fn set_awaiting(&self, awaiting: bool) {
        self.0.awaiting.set(awaiting);
    }

    pub(crate) fn has_rethrown(&self) -> bool {
        self.0.rethrown.get()
    }

    pub(crate) fn set_rethrown(&self, rethrown: bool) {
        self.0.rethrown.set(rethrown);
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TaskId> for u64 {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("state", &self.0.state.get())
            .field("killed", &self.0.killed.is_tripped())
            .field("paused", &self.0.paused.get())
            .finish()
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
