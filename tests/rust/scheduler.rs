// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#[macro_use]
mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::spindle::{
    runtime::{
        io,
        resource::{
            Resource,
            ResourceId,
            Stream,
        },
        scheduler::Delivery,
    },
    Coroutine,
    Fail,
    Resume,
    SchedulerConfig,
    SharedScheduler,
    Step,
    Task,
    TaskId,
    Timer,
    Yielder,
};
use ::std::{
    cell::RefCell,
    rc::Rc,
    time::{
        Duration,
        Instant,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Coroutine that fails on its first run and records what each run was handed.
struct Flaky {
    inputs: Rc<RefCell<Vec<Option<i32>>>>,
    /// Keeps failing even after a failure was raised in it.
    stubborn: bool,
    done: bool,
}

impl Coroutine for Flaky {
    fn resume(&mut self, input: Option<Delivery>) -> Result<Step, Fail> {
        let errno: Option<i32> = match input {
            Some(Err(e)) => Some(e.errno),
            _ => None,
        };
        self.inputs.borrow_mut().push(errno);
        if errno.is_none() || self.stubborn {
            return Err(Fail::new(libc::EIO, "flaky coroutine failed"));
        }
        self.done = true;
        Ok(Step::Complete(Box::new(())))
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

//======================================================================================================================
// Tests
//======================================================================================================================

/// Two tasks that each write to their own pipe and yield until they have gone around ten times.
#[test]
fn two_writers_finish_after_ten_passes() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let counters: Vec<Rc<RefCell<u32>>> = vec![Rc::new(RefCell::new(0)), Rc::new(RefCell::new(0))];
    let mut readers: Vec<Stream> = Vec::new();

    for (i, counter) in counters.iter().enumerate() {
        let (reader, mut writer): (Stream, Stream) = Stream::pipe()?;
        readers.push(reader);
        let counter: Rc<RefCell<u32>> = counter.clone();
        scheduler.spawn(&format!("writer-{}", i), move |yielder: Yielder| async move {
            loop {
                writer.write(b"x")?;
                *counter.borrow_mut() += 1;
                if *counter.borrow() == 10 {
                    break;
                }
                yielder.yield_once().await?;
            }
            Ok::<(), Fail>(())
        });
    }

    for _ in 0..10 {
        scheduler.tick()?;
    }

    for counter in &counters {
        ensure_eq!(*counter.borrow(), 10);
    }
    ensure_eq!(scheduler.is_idle(), true);
    ensure_eq!(scheduler.num_tasks(), 0);
    for reader in readers.iter_mut() {
        ensure_eq!(reader.read(64)?.len(), 10);
    }
    Ok(())
}

#[test]
fn repeating_timer_does_not_drift() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let interval: Duration = Duration::from_millis(1);
    let deadlines: Rc<RefCell<Vec<Instant>>> = Rc::new(RefCell::new(vec![]));

    let deadlines2: Rc<RefCell<Vec<Instant>>> = deadlines.clone();
    let timer: Timer = Timer::repeat_n(interval, 5, move |deadline: Instant| {
        deadlines2.borrow_mut().push(deadline);
        // Longer than the interval.
        std::thread::sleep(Duration::from_millis(3));
        Ok(())
    });
    let task: Task = scheduler.add_timer("drift", timer);
    scheduler.start()?;

    let deadlines: Vec<Instant> = deadlines.borrow().clone();
    ensure_eq!(deadlines.len(), 5);
    for pair in deadlines.windows(2) {
        ensure_eq!(pair[1] - pair[0], interval);
    }
    ensure_eq!(task.take_result::<usize>(), Some(5));
    Ok(())
}

#[test]
fn killed_reader_is_purged_without_running() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let (reader, mut writer): (Stream, Stream) = Stream::pipe()?;
    let resumed: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));

    let resumed2: Rc<RefCell<bool>> = resumed.clone();
    let resource: ResourceId = reader.resource_id();
    let task: Task = scheduler.spawn("reader", move |yielder: Yielder| async move {
        io::wait_readable(&yielder, resource).await?;
        *resumed2.borrow_mut() = true;
        Ok::<(), Fail>(())
    });

    // Suspend, then let the signal callback park the task.
    scheduler.tick()?;
    scheduler.tick()?;
    ensure_eq!(scheduler.read_waiters(resource), vec![task.get_id()]);

    scheduler.kill(task.get_id())?;
    ensure_eq!(scheduler.read_waiters(resource), vec![task.get_id()]);

    writer.write(b"x")?;
    scheduler.tick()?;
    ensure_eq!(scheduler.read_waiters(resource).is_empty(), true);
    ensure_eq!(scheduler.num_tasks(), 0);
    scheduler.tick()?;
    ensure_eq!(*resumed.borrow(), false);
    drop(reader);
    Ok(())
}

#[test]
fn readers_wake_in_arrival_order() -> Result<()> {
    for backend in common::backends() {
        let scheduler: SharedScheduler = common::scheduler_with(backend)?;
        let (reader, mut writer): (Stream, Stream) = Stream::pipe()?;
        let resource: ResourceId = reader.resource_id();
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(vec![]));

        let mut ids: Vec<TaskId> = Vec::new();
        for name in ["a", "b", "c"] {
            let order: Rc<RefCell<Vec<&'static str>>> = order.clone();
            let task: Task = scheduler.spawn(name, move |yielder: Yielder| async move {
                io::wait_readable(&yielder, resource).await?;
                order.borrow_mut().push(name);
                Ok::<(), Fail>(())
            });
            ids.push(task.get_id());
        }

        scheduler.tick()?;
        scheduler.tick()?;
        ensure_eq!(scheduler.read_waiters(resource), ids);
        ensure_eq!(order.borrow().is_empty(), true);

        writer.write(b"x")?;
        scheduler.start()?;
        ensure_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }
    Ok(())
}

#[test]
fn resume_handle_works_once() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let slot: Rc<RefCell<Option<Resume>>> = Rc::new(RefCell::new(None));

    let slot2: Rc<RefCell<Option<Resume>>> = slot.clone();
    let task: Task = scheduler.spawn("sleeper", move |yielder: Yielder| async move {
        yielder
            .signal(move |resume: Resume| {
                *slot2.borrow_mut() = Some(resume);
                Ok(())
            })
            .await?;
        Ok::<u8, Fail>(1)
    });

    scheduler.tick()?;
    scheduler.tick()?;
    let resume: Resume = match slot.borrow_mut().take() {
        Some(resume) => resume,
        None => anyhow::bail!("signal callback did not run"),
    };

    // Resumed behind the handle's back.
    scheduler.schedule(&task, None)?;
    match resume.wake() {
        Err(e) => ensure_eq!(e.errno, libc::EALREADY),
        Ok(()) => anyhow::bail!("a task must not be resumed twice"),
    }

    scheduler.start()?;
    ensure_eq!(task.take_result::<u8>(), Some(1));
    Ok(())
}

#[test]
fn resume_delivers_value() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let task: Task = scheduler.spawn("receiver", |yielder: Yielder| async move {
        let value: u32 = yielder.signal_value::<u32, _>(|resume: Resume| resume.resume_with(42u32)).await?;
        Ok::<u32, Fail>(value + 1)
    });

    scheduler.start()?;
    ensure_eq!(task.take_result::<u32>(), Some(43));
    Ok(())
}

#[test]
fn callback_failure_reaches_origin() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let task: Task = scheduler.spawn("origin", |yielder: Yielder| async move {
        match yielder.signal(|_resume: Resume| Err(Fail::new(libc::EIO, "callback failed"))).await {
            Ok(_) => Ok::<i32, Fail>(0),
            Err(e) => Ok(e.errno),
        }
    });

    scheduler.start()?;
    ensure_eq!(task.take_result::<i32>(), Some(libc::EIO));
    Ok(())
}

#[test]
fn failure_is_raised_once_then_escapes() -> Result<()> {
    // Recovers from the raised failure.
    let scheduler: SharedScheduler = common::scheduler()?;
    let inputs: Rc<RefCell<Vec<Option<i32>>>> = Rc::new(RefCell::new(vec![]));
    scheduler.add(
        "flaky",
        Box::new(Flaky {
            inputs: inputs.clone(),
            stubborn: false,
            done: false,
        }),
    );
    scheduler.start()?;
    ensure_eq!(*inputs.borrow(), vec![None, Some(libc::EIO)]);

    // Fails again.
    let scheduler: SharedScheduler = common::scheduler()?;
    let inputs: Rc<RefCell<Vec<Option<i32>>>> = Rc::new(RefCell::new(vec![]));
    scheduler.add(
        "stubborn",
        Box::new(Flaky {
            inputs: inputs.clone(),
            stubborn: true,
            done: false,
        }),
    );
    match scheduler.start() {
        Err(e) => ensure_eq!(e.errno, libc::EIO),
        Ok(()) => anyhow::bail!("second failure should escape the loop"),
    }
    ensure_eq!(*inputs.borrow(), vec![None, Some(libc::EIO)]);
    ensure_eq!(scheduler.num_tasks(), 0);
    Ok(())
}

#[test]
fn failed_body_leaves_other_tasks_queued() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    scheduler.spawn("bad", |_yielder: Yielder| async move {
        Err::<(), Fail>(Fail::new(libc::EIO, "body failed"))
    });
    let good: Task = scheduler.spawn("good", |yielder: Yielder| async move {
        yielder.yield_times(3).await?;
        Ok::<&'static str, Fail>("done")
    });

    match scheduler.start() {
        Err(e) => ensure_eq!(e.errno, libc::EIO),
        Ok(()) => anyhow::bail!("failure should escape the loop"),
    }
    ensure_eq!(scheduler.is_running(), false);
    ensure_eq!(good.has_result(), false);

    scheduler.start()?;
    ensure_eq!(good.take_result::<&'static str>(), Some("done"));
    Ok(())
}

#[test]
fn kill_after_cancels_long_sleep() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let woke: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));

    let woke2: Rc<RefCell<bool>> = woke.clone();
    let task: Task = scheduler.spawn("sleeper", move |yielder: Yielder| async move {
        io::sleep(&yielder, Duration::from_secs(10)).await?;
        *woke2.borrow_mut() = true;
        Ok::<(), Fail>(())
    });
    scheduler.kill_after(task.get_id(), Duration::from_millis(5))?;

    let start: Instant = Instant::now();
    scheduler.start()?;
    ensure_eq!(start.elapsed() < Duration::from_secs(2), true);
    ensure_eq!(*woke.borrow(), false);
    ensure_eq!(task.is_killed(), true);
    ensure_eq!(scheduler.num_tasks(), 0);
    Ok(())
}

#[test]
fn signal_wakes_waiting_task() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let woke: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));

    let woke2: Rc<RefCell<bool>> = woke.clone();
    scheduler.spawn("waiter", move |yielder: Yielder| async move {
        yielder.signal(|resume: Resume| resume.on_signal(libc::SIGUSR1)).await?;
        *woke2.borrow_mut() = true;
        Ok::<(), Fail>(())
    });

    scheduler.tick()?;
    scheduler.tick()?;
    ensure_eq!(*woke.borrow(), false);
    // Signal waiters do not keep the loop alive on their own.
    ensure_eq!(scheduler.is_idle(), true);

    ensure_eq!(unsafe { libc::raise(libc::SIGUSR1) }, 0);
    scheduler.tick()?;
    ensure_eq!(*woke.borrow(), true);
    ensure_eq!(scheduler.num_tasks(), 0);
    Ok(())
}

#[test]
fn stop_ends_the_loop() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let passes: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));

    let passes2: Rc<RefCell<u32>> = passes.clone();
    let scheduler2: SharedScheduler = scheduler.clone();
    scheduler.spawn("forever", move |yielder: Yielder| async move {
        while *passes2.borrow() < 100 {
            *passes2.borrow_mut() += 1;
            if *passes2.borrow() == 5 {
                scheduler2.stop();
            }
            yielder.yield_once().await?;
        }
        Ok::<(), Fail>(())
    });

    scheduler.start()?;
    ensure_eq!(*passes.borrow(), 5);
    ensure_eq!(scheduler.is_idle(), false);
    Ok(())
}

#[test]
fn killed_sleeper_is_dropped() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let captured: Rc<u32> = Rc::new(0);

    let captured2: Rc<u32> = captured.clone();
    let task_id: TaskId = scheduler
        .spawn("sleeper", move |yielder: Yielder| async move {
            io::sleep(&yielder, Duration::from_secs(10)).await?;
            Ok::<u32, Fail>(*captured2)
        })
        .get_id();
    scheduler.tick()?;
    scheduler.kill(task_id)?;

    let start: Instant = Instant::now();
    scheduler.start()?;
    ensure_eq!(start.elapsed() < Duration::from_secs(2), true);
    ensure_eq!(scheduler.num_tasks(), 0);
    ensure_eq!(scheduler.is_idle(), true);
    // The body went away with the task.
    ensure_eq!(Rc::strong_count(&captured), 1);
    Ok(())
}

#[test]
fn killed_paused_task_is_dropped() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let task: Task = scheduler.spawn("paused", |yielder: Yielder| async move {
        yielder.yield_times(100).await?;
        Ok::<(), Fail>(())
    });
    scheduler.tick()?;
    scheduler.pause(task.get_id())?;
    scheduler.tick()?;
    ensure_eq!(scheduler.num_tasks(), 1);

    scheduler.kill(task.get_id())?;
    scheduler.start()?;
    ensure_eq!(scheduler.num_tasks(), 0);
    ensure_eq!(scheduler.get_task(task.get_id()).is_none(), true);
    Ok(())
}

#[test]
fn killed_task_with_pending_resume_is_dropped() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let slot: Rc<RefCell<Option<Resume>>> = Rc::new(RefCell::new(None));

    let slot2: Rc<RefCell<Option<Resume>>> = slot.clone();
    let task: Task = scheduler.spawn("suspended", move |yielder: Yielder| async move {
        yielder
            .signal(move |resume: Resume| {
                *slot2.borrow_mut() = Some(resume);
                Ok(())
            })
            .await?;
        Ok::<(), Fail>(())
    });
    scheduler.tick()?;
    scheduler.tick()?;
    let resume: Resume = match slot.borrow_mut().take() {
        Some(resume) => resume,
        None => anyhow::bail!("signal callback did not run"),
    };

    scheduler.kill(task.get_id())?;
    scheduler.start()?;
    ensure_eq!(scheduler.num_tasks(), 0);

    // A late resume finds nobody to deliver to and keeps nothing.
    let value: Rc<u32> = Rc::new(7);
    match resume.resume_with(value.clone()) {
        Err(e) => ensure_eq!(e.errno, libc::ESRCH),
        Ok(()) => anyhow::bail!("a dropped task must not be resumed"),
    }
    ensure_eq!(Rc::strong_count(&value), 1);
    Ok(())
}

#[test]
fn shutdown_signal_stops_the_loop() -> Result<()> {
    let config: SchedulerConfig = SchedulerConfig {
        idle_timeout: common::TEST_IDLE_TIMEOUT,
        handle_signals: true,
        ..Default::default()
    };
    let scheduler: SharedScheduler = SharedScheduler::new(config)?;
    let passes: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));

    let passes2: Rc<RefCell<u32>> = passes.clone();
    scheduler.spawn("busy", move |yielder: Yielder| async move {
        while *passes2.borrow() < 1000 {
            *passes2.borrow_mut() += 1;
            if *passes2.borrow() == 3 {
                if unsafe { libc::raise(libc::SIGTERM) } != 0 {
                    return Err(Fail::last_os_error("failed to raise SIGTERM"));
                }
            }
            yielder.yield_once().await?;
        }
        Ok::<(), Fail>(())
    });

    scheduler.start()?;
    ensure_eq!(*passes.borrow() < 10, true);
    ensure_eq!(scheduler.is_running(), false);
    ensure_eq!(scheduler.num_tasks(), 1);
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn epoll_backend_refuses_signal_waits() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler_with(::spindle::BackendKind::Epoll)?;
    let task: Task = scheduler.spawn("waiter", |yielder: Yielder| async move {
        yielder.yield_once().await?;
        Ok::<(), Fail>(())
    });

    match scheduler.on_signal(libc::SIGUSR1, &task) {
        Err(e) => ensure_eq!(e.errno, libc::ENOTSUP),
        Ok(()) => anyhow::bail!("epoll backend cannot wait on signals"),
    }
    scheduler.start()?;
    ensure_eq!(scheduler.num_tasks(), 0);
    Ok(())
}

#[test]
fn traced_scheduler_runs_tasks() -> Result<()> {
    let config: SchedulerConfig = SchedulerConfig {
        idle_timeout: common::TEST_IDLE_TIMEOUT,
        trace_tasks: true,
        ..Default::default()
    };
    let scheduler: SharedScheduler = SharedScheduler::new(config)?;
    ensure_eq!(scheduler.get_config().trace_tasks, true);

    let first: Task = scheduler.spawn("first", |yielder: Yielder| async move {
        yielder.yield_times(2).await?;
        Ok::<u32, Fail>(1)
    });
    let second: Task = scheduler.spawn("second", |yielder: Yielder| async move {
        io::sleep(&yielder, Duration::from_millis(1)).await?;
        Ok::<u32, Fail>(2)
    });
    scheduler.start()?;
    ensure_eq!(first.take_result::<u32>(), Some(1));
    ensure_eq!(second.take_result::<u32>(), Some(2));
    ensure_eq!(scheduler.num_tasks(), 0);
    Ok(())
}
