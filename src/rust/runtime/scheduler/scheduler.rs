// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Implementation of our cooperative scheduler.
//!
//! A pass of the scheduler (see [SharedScheduler::tick]) works as follows:
//! 1. Pending OS signals are dispatched to the tasks waiting on them.
//! 2. Tasks whose timer has elapsed move to the ready queue.
//! 3. Every task that was ready when the pass started runs once, in arrival order. Tasks that become ready while the
//!    pass is running wait for the next one.
//! 4. Read and write interests are handed to the readiness backend and every task waiting on a ready resource moves
//!    to the ready queue.
//!
//! Killing a task is lazy. The task is dropped the next time the scheduler finds it in one of its queues. Killed tasks
//! that sit in no queue (suspended on a signal nobody resumed yet, or parked while paused) are dropped at the start
//! and end of the next pass.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    config::{
        Config,
        SchedulerConfig,
    },
    runtime::{
        backend::{
            self,
            signals,
            Backend,
            Interest,
            Readiness,
        },
        fail::Fail,
        resource::ResourceId,
        scheduler::{
            coroutine::{
                Coroutine,
                FutureCoroutine,
                Step,
            },
            signal::SignalCoroutine,
            task::{
                Placement,
                Task,
                TaskId,
            },
            timer::Timer,
            yielder::Yielder,
        },
    },
};
use ::libc::c_int;
use ::slab::Slab;
use ::std::{
    any::Any,
    cell::{
        Cell,
        RefCell,
    },
    collections::{
        BTreeMap,
        HashMap,
        HashSet,
        VecDeque,
    },
    future::Future,
    mem,
    rc::{
        Rc,
        Weak,
    },
    time::{
        Duration,
        Instant,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

struct Scheduler {
    config: SchedulerConfig,
    backend: Box<dyn Backend>,
    /// Every task the scheduler knows about, whatever its placement.
    tasks: Slab<Task>,
    /// Maps external task identifiers to slots in the task table.
    ids: HashMap<TaskId, usize>,
    next_task_id: u64,
    ready: VecDeque<TaskId>,
    timers: BTreeMap<Instant, Vec<TaskId>>,
    read_waiters: HashMap<ResourceId, Vec<TaskId>>,
    write_waiters: HashMap<ResourceId, Vec<TaskId>>,
    signal_waiters: HashMap<c_int, Vec<TaskId>>,
    /// Resources that got new waiters since the last poll.
    changed: HashSet<ResourceId>,
    /// Tasks that were found paused when taken from the ready queue.
    paused: HashSet<TaskId>,
    /// Dropped tasks. Released once no borrow of the scheduler is held, so their destructors may call back in.
    graveyard: Vec<Task>,
    /// Raised by tasks of this scheduler when they are killed.
    kills: Rc<Cell<bool>>,
    current_task: Option<TaskId>,
    running: bool,
}

/// Handle to a scheduler. Clones share the same scheduler.
#[derive(Clone)]
pub struct SharedScheduler(Rc<RefCell<Scheduler>>);

/// Non-owning handle to a scheduler.
#[derive(Clone)]
pub struct WeakScheduler(Weak<RefCell<Scheduler>>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Scheduler {
    fn new(config: SchedulerConfig, backend: Box<dyn Backend>) -> Self {
        Self {
            config,
            backend,
            tasks: Slab::new(),
            ids: HashMap::new(),
            next_task_id: 1,
            ready: VecDeque::new(),
            timers: BTreeMap::new(),
            read_waiters: HashMap::new(),
            write_waiters: HashMap::new(),
            signal_waiters: HashMap::new(),
            changed: HashSet::new(),
            paused: HashSet::new(),
            graveyard: Vec::new(),
            kills: Rc::new(Cell::new(false)),
            current_task: None,
            running: false,
        }
    }

    fn allocate_id(&mut self) -> TaskId {
        let task_id: TaskId = TaskId(self.next_task_id);
        self.next_task_id += 1;
        task_id
    }

    fn insert(&mut self, task: Task) {
        let task_id: TaskId = task.get_id();
        task.set_kill_notice(self.kills.clone());
        let index: usize = self.tasks.insert(task);
        self.ids.insert(task_id, index);
    }

    fn lookup(&self, task_id: &TaskId) -> Option<Task> {
        let index: usize = *self.ids.get(task_id)?;
        self.tasks.get(index).cloned()
    }

    /// Removes a task from the task table. Stale identifiers left in other queues are ignored when found.
    fn drop_task(&mut self, task_id: TaskId, reason: &str) {
        if let Some(index) = self.ids.remove(&task_id) {
            let task: Task = self.tasks.remove(index);
            self.paused.remove(&task_id);
            // Handles to the task may outlive it, the undelivered input must not.
            task.unstage();
            if self.config.trace_tasks {
                info!("drop_task(): name={:?}, id={:?}, reason={}", task.get_name(), task_id, reason);
            }
            self.graveyard.push(task);
        }
    }

    fn check_known(&self, task: &Task, caller: &str) -> Result<(), Fail> {
        if self.ids.contains_key(&task.get_id()) {
            return Ok(());
        }
        let cause: String = format!("unknown task (name={:?}, id={:?})", task.get_name(), task.get_id());
        warn!("{}(): {}", caller, cause);
        Err(Fail::new(libc::ESRCH, &cause))
    }

    fn check_detached(&self, task: &Task, caller: &str) -> Result<(), Fail> {
        self.check_known(task, caller)?;
        match task.get_placement() {
            Placement::Detached => Ok(()),
            placement => {
                let cause: String = format!(
                    "task is already waiting (name={:?}, id={:?}, placement={:?})",
                    task.get_name(),
                    task.get_id(),
                    placement
                );
                warn!("{}(): {}", caller, cause);
                Err(Fail::new(libc::EBUSY, &cause))
            },
        }
    }

    fn place(&mut self, task: &Task, placement: Placement) {
        let task_id: TaskId = task.get_id();
        task.set_placement(placement);
        task.set_awaiting(false);
        match placement {
            Placement::Detached => (),
            Placement::Ready => self.ready.push_back(task_id),
            Placement::Timer(deadline) => self.timers.entry(deadline).or_default().push(task_id),
            Placement::ReadWait(resource) => {
                self.changed.insert(resource);
                self.read_waiters.entry(resource).or_default().push(task_id)
            },
            Placement::WriteWait(resource) => {
                self.changed.insert(resource);
                self.write_waiters.entry(resource).or_default().push(task_id)
            },
            Placement::SignalWait(signum) => self.signal_waiters.entry(signum).or_default().push(task_id),
        }
        if self.config.trace_tasks {
            info!("place(): name={:?}, id={:?}, placement={:?}", task.get_name(), task_id, placement);
        }
    }

    fn schedule(&mut self, task: &Task, deadline: Option<Instant>) -> Result<(), Fail> {
        match deadline {
            None if task.get_placement() == Placement::Ready => self.check_known(task, "schedule"),
            None => {
                self.check_detached(task, "schedule")?;
                self.place(task, Placement::Ready);
                Ok(())
            },
            Some(deadline) => {
                self.check_detached(task, "schedule")?;
                self.place(task, Placement::Timer(deadline));
                Ok(())
            },
        }
    }

    /// Moves a waiting task to the ready queue, or drops it if it was killed in the meantime.
    fn wake(&mut self, task_id: TaskId) {
        match self.lookup(&task_id) {
            Some(task) if task.is_finished() => self.drop_task(task_id, "killed while waiting"),
            Some(task) => self.place(&task, Placement::Ready),
            None => (),
        }
    }

    /// Drops killed tasks that no queue will hand back, if any task was killed since the last sweep.
    fn sweep_killed(&mut self) {
        if !self.kills.replace(false) {
            return;
        }
        let current: Option<TaskId> = self.current_task;
        let dead: Vec<TaskId> = self
            .tasks
            .iter()
            .map(|(_, task)| task)
            .filter(|task| {
                task.is_finished() && task.get_placement() == Placement::Detached && current != Some(task.get_id())
            })
            .map(|task| task.get_id())
            .collect();
        for task_id in dead {
            self.drop_task(task_id, "killed while detached");
        }
    }

    /// Takes a task from the ready queue for running.
    fn dequeue(&mut self, task_id: TaskId) -> Option<Task> {
        let task: Task = self.lookup(&task_id)?;
        task.set_placement(Placement::Detached);
        if task.is_finished() {
            self.drop_task(task_id, "killed while ready");
            return None;
        }
        if task.is_paused() {
            trace!("dequeue(): parking paused task (id={:?})", task_id);
            self.paused.insert(task_id);
            return None;
        }
        Some(task)
    }

    fn on_step(&mut self, scheduler: WeakScheduler, task: Task, step: Step) -> Result<(), Fail> {
        let task_id: TaskId = task.get_id();
        task.set_rethrown(false);
        match step {
            Step::Complete(value) => {
                task.set_result(value);
                self.drop_task(task_id, "completed");
            },
            _ if task.is_finished() => self.drop_task(task_id, "killed while running"),
            Step::Continue(_) => {
                // The body may already have placed itself somewhere.
                if task.get_placement() == Placement::Detached {
                    self.place(&task, Placement::Ready);
                }
            },
            Step::Suspend(signal) => {
                task.set_awaiting(true);
                let callback_id: TaskId = self.allocate_id();
                let name: String = format!("{}::signal", task.get_name());
                let coroutine: SignalCoroutine = SignalCoroutine::new(signal, task, scheduler);
                let callback: Task = Task::new(callback_id, &name, Box::new(coroutine));
                self.insert(callback.clone());
                self.place(&callback, Placement::Ready);
            },
        }
        Ok(())
    }

    /// A failed task gets the failure raised at its suspension point once. Failing again, or having nowhere to raise
    /// the failure, makes it escape the pass.
    fn on_failure(&mut self, task: Task, cause: Fail) -> Result<(), Fail> {
        let task_id: TaskId = task.get_id();
        if task.is_finished() || task.has_rethrown() {
            error!("on_failure(): task failed (name={:?}, id={:?}, cause={:?})", task.get_name(), task_id, cause);
            self.drop_task(task_id, "failed");
            return Err(cause);
        }
        warn!("on_failure(): raising failure in task (name={:?}, id={:?}, cause={:?})", task.get_name(), task_id, cause);
        task.set_rethrown(true);
        task.throw(cause);
        if task.get_placement() == Placement::Detached {
            self.place(&task, Placement::Ready);
        }
        Ok(())
    }

    fn fire_timers(&mut self, now: Instant) {
        while let Some(entry) = self.timers.first_entry() {
            if *entry.key() > now {
                break;
            }
            for task_id in entry.remove() {
                self.wake(task_id);
            }
        }
    }

    /// Drops timer buckets at the head of the timer table whose tasks were all killed.
    fn prune_timers(&mut self) {
        while let Some(entry) = self.timers.first_entry() {
            let all_dead: bool = entry.get().iter().all(|task_id| match self.ids.get(task_id) {
                Some(index) => self.tasks.get(*index).map_or(true, |task| task.is_finished()),
                None => true,
            });
            if !all_dead {
                break;
            }
            for task_id in entry.remove() {
                self.drop_task(task_id, "killed while sleeping");
            }
        }
    }

    fn next_timeout(&mut self, now: Instant) -> Duration {
        if !self.ready.is_empty() {
            return Duration::ZERO;
        }
        self.prune_timers();
        match self.timers.keys().next() {
            Some(deadline) => deadline.saturating_duration_since(now).min(self.config.idle_timeout),
            None => self.config.idle_timeout,
        }
    }

    /// Builds the interest set for the backend, dropping killed waiters on the way.
    fn collect_interests(&mut self) -> Vec<Interest> {
        let mut dead: Vec<TaskId> = Vec::new();
        let tasks: &Slab<Task> = &self.tasks;
        let ids: &HashMap<TaskId, usize> = &self.ids;
        let mut purge = |waiters: &mut Vec<TaskId>| {
            waiters.retain(|task_id| match ids.get(task_id).and_then(|index| tasks.get(*index)) {
                Some(task) if task.is_finished() => {
                    dead.push(*task_id);
                    false
                },
                Some(_) => true,
                None => false,
            });
            !waiters.is_empty()
        };
        self.read_waiters.retain(|_, waiters| purge(waiters));
        self.write_waiters.retain(|_, waiters| purge(waiters));
        for task_id in dead {
            self.drop_task(task_id, "killed while waiting on a resource");
        }

        let changed: HashSet<ResourceId> = mem::take(&mut self.changed);
        let mut interests: HashMap<ResourceId, Interest> = HashMap::new();
        for resource in self.read_waiters.keys() {
            interests.entry(*resource).or_insert_with(|| Interest::new(*resource)).readable = true;
        }
        for resource in self.write_waiters.keys() {
            interests.entry(*resource).or_insert_with(|| Interest::new(*resource)).writable = true;
        }
        for (resource, interest) in interests.iter_mut() {
            interest.changed = changed.contains(resource);
        }
        interests.into_values().collect()
    }

    fn poll_backend(&mut self, timeout: Duration) -> Result<(), Fail> {
        let interests: Vec<Interest> = self.collect_interests();
        if interests.is_empty() && self.ready.is_empty() && self.timers.is_empty() {
            return Ok(());
        }
        let timeout: Duration = timeout.min(self.next_timeout(Instant::now()));
        let events: Vec<Readiness> = self.backend.poll(&interests, timeout)?;
        for event in events {
            if event.readable {
                for task_id in self.read_waiters.remove(&event.resource).unwrap_or_default() {
                    self.wake(task_id);
                }
            }
            if event.writable {
                for task_id in self.write_waiters.remove(&event.resource).unwrap_or_default() {
                    self.wake(task_id);
                }
            }
        }
        Ok(())
    }

    fn dispatch_signals(&mut self) {
        let mut wanted: Vec<c_int> = self.signal_waiters.keys().copied().collect();
        if self.config.handle_signals {
            wanted.extend([libc::SIGINT, libc::SIGTERM]);
        }
        for signum in signals::take_pending(wanted) {
            match self.signal_waiters.remove(&signum) {
                Some(waiters) => {
                    for task_id in waiters {
                        self.wake(task_id);
                    }
                },
                None if self.config.handle_signals && signals::is_shutdown(signum) => {
                    info!("dispatch_signals(): shutdown requested (signum={:?})", signum);
                    self.running = false;
                },
                None => debug!("dispatch_signals(): nobody waits on signal (signum={:?})", signum),
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.ready.is_empty() && self.timers.is_empty() && self.read_waiters.is_empty() && self.write_waiters.is_empty()
    }
}

impl SharedScheduler {
    /// Creates a scheduler with the backend named in `config`.
    pub fn new(config: SchedulerConfig) -> Result<Self, Fail> {
        let backend: Box<dyn Backend> = backend::new_backend(config.backend)?;
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: SchedulerConfig, backend: Box<dyn Backend>) -> Self {
        Self(Rc::new(RefCell::new(Scheduler::new(config, backend))))
    }

    pub fn from_config(config: &Config) -> Result<Self, Fail> {
        Self::new(config.scheduler_config()?)
    }

    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler(Rc::downgrade(&self.0))
    }

    /// Registers a coroutine and queues it for the next pass.
    pub fn add(&self, name: &str, coroutine: Box<dyn Coroutine>) -> TaskId {
        self.create(name, coroutine).get_id()
    }

    /// Same as [SharedScheduler::add] but hands back the task.
    pub fn create(&self, name: &str, coroutine: Box<dyn Coroutine>) -> Task {
        let task: Task = self.insert_detached(name, coroutine);
        self.0.borrow_mut().place(&task, Placement::Ready);
        task
    }

    /// Builds a task from an async body and queues it.
    pub fn spawn<F, Fut, T>(&self, name: &str, factory: F) -> Task
    where
        F: FnOnce(Yielder) -> Fut,
        Fut: Future<Output = Result<T, Fail>> + 'static,
        T: Any,
    {
        let task_id: TaskId = self.0.borrow_mut().allocate_id();
        let coroutine: FutureCoroutine = FutureCoroutine::new(task_id, factory);
        let task: Task = Task::new(task_id, name, Box::new(coroutine));
        let mut scheduler = self.0.borrow_mut();
        scheduler.insert(task.clone());
        scheduler.place(&task, Placement::Ready);
        task
    }

    /// Registers a timer. It first runs when its initial deadline is reached.
    pub fn add_timer(&self, name: &str, timer: Timer) -> Task {
        let deadline: Instant = timer.next_fire();
        let task: Task = self.insert_detached(name, Box::new(timer));
        self.0.borrow_mut().place(&task, Placement::Timer(deadline));
        task
    }

    /// Queues a known task, now or once `deadline` is reached. Scheduling an already ready task now does nothing.
    pub fn schedule(&self, task: &Task, deadline: Option<Instant>) -> Result<(), Fail> {
        self.0.borrow_mut().schedule(task, deadline)
    }

    /// Parks `task` until `resource` is readable.
    pub fn on_read(&self, resource: ResourceId, task: &Task) -> Result<(), Fail> {
        let mut scheduler = self.0.borrow_mut();
        scheduler.check_detached(task, "on_read")?;
        scheduler.place(task, Placement::ReadWait(resource));
        Ok(())
    }

    /// Parks `task` until `resource` is writable.
    pub fn on_write(&self, resource: ResourceId, task: &Task) -> Result<(), Fail> {
        let mut scheduler = self.0.borrow_mut();
        scheduler.check_detached(task, "on_write")?;
        scheduler.place(task, Placement::WriteWait(resource));
        Ok(())
    }

    /// Parks `task` until the process receives `signum`. Signal waiters alone do not keep the loop alive.
    pub fn on_signal(&self, signum: c_int, task: &Task) -> Result<(), Fail> {
        let mut scheduler = self.0.borrow_mut();
        if !scheduler.backend.supports_signals() {
            let cause: String = format!("backend cannot wait on signals (backend={})", scheduler.backend.get_name());
            warn!("on_signal(): {}", cause);
            return Err(Fail::new(libc::ENOTSUP, &cause));
        }
        scheduler.check_detached(task, "on_signal")?;
        signals::install(signum)?;
        scheduler.place(task, Placement::SignalWait(signum));
        Ok(())
    }

    pub fn kill(&self, task_id: TaskId) -> Result<(), Fail> {
        self.lookup(task_id, "kill")?.kill();
        Ok(())
    }

    pub fn pause(&self, task_id: TaskId) -> Result<(), Fail> {
        self.lookup(task_id, "pause")?.pause();
        Ok(())
    }

    /// Clears the pause flag and requeues the task if it was parked.
    pub fn unpause(&self, task_id: TaskId) -> Result<(), Fail> {
        let task: Task = self.lookup(task_id, "unpause")?;
        task.unpause();
        let mut scheduler = self.0.borrow_mut();
        if scheduler.paused.remove(&task_id) && task.get_placement() == Placement::Detached {
            scheduler.place(&task, Placement::Ready);
        }
        Ok(())
    }

    /// Kills the target task once `timeout` elapses.
    pub fn kill_after(&self, task_id: TaskId, timeout: Duration) -> Result<Task, Fail> {
        let target: Task = self.lookup(task_id, "kill_after")?;
        let timer: Timer = Timer::once(timeout, move |_deadline: Instant| {
            target.kill();
            Ok(())
        });
        Ok(self.add_timer(&format!("kill_after::{}", task_id), timer))
    }

    /// Runs one pass of the scheduler.
    pub fn tick(&self) -> Result<(), Fail> {
        let (batch, timeout): (Vec<TaskId>, Duration) = {
            let mut scheduler = self.0.borrow_mut();
            scheduler.sweep_killed();
            scheduler.dispatch_signals();
            let timeout: Duration = scheduler.next_timeout(Instant::now());
            scheduler.fire_timers(Instant::now());
            (scheduler.ready.drain(..).collect(), timeout)
        };

        let mut pending = batch.into_iter();
        while let Some(task_id) = pending.next() {
            if let Err(cause) = self.run_task(task_id) {
                // Tasks that did not get to run stay at the head of the queue.
                let mut scheduler = self.0.borrow_mut();
                for (i, task_id) in pending.enumerate() {
                    scheduler.ready.insert(i, task_id);
                }
                drop(scheduler);
                self.bury();
                return Err(cause);
            }
        }

        let result: Result<(), Fail> = {
            let mut scheduler = self.0.borrow_mut();
            scheduler.sweep_killed();
            scheduler.poll_backend(timeout)
        };
        self.bury();
        result
    }

    /// Runs passes until there is nothing left to do or [SharedScheduler::stop] is called.
    pub fn start(&self) -> Result<(), Fail> {
        {
            let mut scheduler = self.0.borrow_mut();
            if scheduler.running {
                return Err(Fail::new(libc::EALREADY, "scheduler is already running"));
            }
            if scheduler.config.handle_signals {
                signals::install_shutdown_handlers()?;
            }
            scheduler.running = true;
            debug!("start(): backend={}", scheduler.backend.get_name());
        }

        let result: Result<(), Fail> = loop {
            // Killed tasks parked outside the queues must not outlive the loop.
            self.0.borrow_mut().sweep_killed();
            self.bury();
            if !self.0.borrow().running || self.is_idle() {
                break Ok(());
            }
            if let Err(cause) = self.tick() {
                break Err(cause);
            }
        };
        self.0.borrow_mut().running = false;
        result
    }

    /// Makes [SharedScheduler::start] return after the current pass.
    pub fn stop(&self) {
        self.0.borrow_mut().running = false;
    }

    pub fn is_running(&self) -> bool {
        self.0.borrow().running
    }

    pub fn is_idle(&self) -> bool {
        self.0.borrow().is_idle()
    }

    pub fn num_tasks(&self) -> usize {
        self.0.borrow().tasks.len()
    }

    pub fn get_task(&self, task_id: TaskId) -> Option<Task> {
        self.0.borrow().lookup(&task_id)
    }

    /// Identifier of the task being run, if any.
    pub fn current_task_id(&self) -> Option<TaskId> {
        self.0.borrow().current_task
    }

    /// Tasks waiting for `resource` to become readable, in arrival order.
    pub fn read_waiters(&self, resource: ResourceId) -> Vec<TaskId> {
        self.0.borrow().read_waiters.get(&resource).cloned().unwrap_or_default()
    }

    /// Tasks waiting for `resource` to become writable, in arrival order.
    pub fn write_waiters(&self, resource: ResourceId) -> Vec<TaskId> {
        self.0.borrow().write_waiters.get(&resource).cloned().unwrap_or_default()
    }

    pub fn get_config(&self) -> SchedulerConfig {
        self.0.borrow().config.clone()
    }

    fn insert_detached(&self, name: &str, coroutine: Box<dyn Coroutine>) -> Task {
        let mut scheduler = self.0.borrow_mut();
        let task: Task = Task::new(scheduler.allocate_id(), name, coroutine);
        scheduler.insert(task.clone());
        task
    }

    fn lookup(&self, task_id: TaskId, caller: &str) -> Result<Task, Fail> {
        match self.get_task(task_id) {
            Some(task) => Ok(task),
            None => {
                let cause: String = format!("no such task (id={:?})", task_id);
                warn!("{}(): {}", caller, cause);
                Err(Fail::new(libc::ESRCH, &cause))
            },
        }
    }

    fn run_task(&self, task_id: TaskId) -> Result<(), Fail> {
        let task: Task = {
            let mut scheduler = self.0.borrow_mut();
            match scheduler.dequeue(task_id) {
                Some(task) => {
                    scheduler.current_task = Some(task_id);
                    if scheduler.config.trace_tasks {
                        info!("run_task(): name={:?}, id={:?}", task.get_name(), task_id);
                    }
                    task
                },
                None => return Ok(()),
            }
        };

        // No borrow may be held while the coroutine runs.
        let result: Result<Step, Fail> = task.run();

        let weak: WeakScheduler = self.downgrade();
        let mut scheduler = self.0.borrow_mut();
        scheduler.current_task = None;
        match result {
            Ok(step) => scheduler.on_step(weak, task, step),
            Err(cause) => scheduler.on_failure(task, cause),
        }
    }

    /// Releases dropped tasks outside of any borrow.
    fn bury(&self) {
        let graveyard: Vec<Task> = mem::take(&mut self.0.borrow_mut().graveyard);
        drop(graveyard);
    }
}

impl WeakScheduler {
    pub fn upgrade(&self) -> Option<SharedScheduler> {
        self.0.upgrade().map(SharedScheduler)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for SharedScheduler {
    fn default() -> Self {
        Self::with_backend(SchedulerConfig::default(), Box::new(backend::PollBackend::new()))
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
