// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#[macro_use]
mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::spindle::{
    sync::{
        BufferedChannel,
        Channel,
        LockMode,
        Mutex,
        ReadyChannel,
        UnbufferedChannel,
    },
    Fail,
    SharedScheduler,
    Task,
    Yielder,
};
use ::std::{
    cell::RefCell,
    rc::Rc,
};

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Sends `count` values from one task and collects everything a second task receives until the channel reports the
/// end.
fn pipeline<C: Channel<u32> + Clone + 'static>(
    scheduler: &SharedScheduler,
    channel: C,
    count: u32,
) -> Rc<RefCell<Vec<(Option<u32>, bool)>>> {
    let received: Rc<RefCell<Vec<(Option<u32>, bool)>>> = Rc::new(RefCell::new(vec![]));

    let sender: C = channel.clone();
    scheduler.spawn("producer", move |yielder: Yielder| async move {
        for value in 0..count {
            sender.send(&yielder, value).await?;
        }
        sender.close();
        Ok::<(), Fail>(())
    });

    let received2: Rc<RefCell<Vec<(Option<u32>, bool)>>> = received.clone();
    scheduler.spawn("consumer", move |yielder: Yielder| async move {
        loop {
            let (value, ok): (Option<u32>, bool) = channel.recv(&yielder).await?;
            received2.borrow_mut().push((value, ok));
            if !ok {
                break;
            }
        }
        Ok::<(), Fail>(())
    });
    received
}

//======================================================================================================================
// Tests
//======================================================================================================================

#[test]
fn buffered_channel_round_trip() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let channel: BufferedChannel<u32> = BufferedChannel::new(4)?;
    let received: Rc<RefCell<Vec<(Option<u32>, bool)>>> = pipeline(&scheduler, channel.clone(), 20);
    scheduler.start()?;

    let received: Vec<(Option<u32>, bool)> = received.borrow().clone();
    let values: Vec<u32> = received.iter().filter_map(|(value, _)| *value).collect();
    ensure_eq!(values, (0..20).collect::<Vec<u32>>());
    // Every value but the one that drained the closed channel reports more to come.
    match received.last() {
        Some((_, ok)) => ensure_eq!(*ok, false),
        None => anyhow::bail!("nothing was received"),
    }
    ensure_eq!(received.iter().filter(|(_, ok)| !*ok).count(), 1);
    ensure_eq!(channel.is_empty(), true);
    Ok(())
}

#[test]
fn send_on_closed_channel_is_dropped() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let channel: BufferedChannel<u32> = BufferedChannel::new(2)?;
    channel.close();

    let sender: BufferedChannel<u32> = channel.clone();
    scheduler.spawn("late-sender", move |yielder: Yielder| async move { sender.send(&yielder, 1).await });
    scheduler.start()?;
    ensure_eq!(channel.len(), 0);
    ensure_eq!(channel.is_open(), false);
    Ok(())
}

#[test]
fn unbuffered_send_waits_for_receiver() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let channel: UnbufferedChannel<u32> = UnbufferedChannel::new();
    let sent: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));

    let sender: UnbufferedChannel<u32> = channel.clone();
    let sent2: Rc<RefCell<bool>> = sent.clone();
    scheduler.spawn("sender", move |yielder: Yielder| async move {
        sender.send(&yielder, 42).await?;
        *sent2.borrow_mut() = true;
        Ok::<(), Fail>(())
    });

    for _ in 0..3 {
        scheduler.tick()?;
    }
    ensure_eq!(*sent.borrow(), false);

    let receiver: Task = scheduler.spawn("receiver", move |yielder: Yielder| async move {
        channel.recv(&yielder).await
    });
    scheduler.start()?;
    ensure_eq!(*sent.borrow(), true);
    ensure_eq!(receiver.take_result::<(Option<u32>, bool)>(), Some((Some(42), true)));
    Ok(())
}

#[test]
fn unbuffered_channel_round_trip() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let received: Rc<RefCell<Vec<(Option<u32>, bool)>>> = pipeline(&scheduler, UnbufferedChannel::new(), 5);
    scheduler.start()?;

    let received: Vec<(Option<u32>, bool)> = received.borrow().clone();
    ensure_eq!(
        received,
        vec![
            (Some(0), true),
            (Some(1), true),
            (Some(2), true),
            (Some(3), true),
            (Some(4), true),
            (None, false)
        ]
    );
    Ok(())
}

#[test]
fn ready_channel_round_trip() -> Result<()> {
    for backend in common::backends() {
        let scheduler: SharedScheduler = common::scheduler_with(backend)?;
        let channel: ReadyChannel<u32> = ReadyChannel::new()?;
        let received: Rc<RefCell<Vec<(Option<u32>, bool)>>> = pipeline(&scheduler, channel.clone(), 10);
        scheduler.start()?;

        let received: Vec<(Option<u32>, bool)> = received.borrow().clone();
        let values: Vec<u32> = received.iter().filter_map(|(value, _)| *value).collect();
        ensure_eq!(values, (0..10).collect::<Vec<u32>>());
        ensure_eq!(received.iter().filter(|(_, ok)| !*ok).count(), 1);
        ensure_eq!(channel.is_empty(), true);
    }
    Ok(())
}

#[test]
fn ready_channel_close_wakes_receiver() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let channel: ReadyChannel<u32> = ReadyChannel::new()?;

    let receiver: ReadyChannel<u32> = channel.clone();
    let task: Task = scheduler.spawn("receiver", move |yielder: Yielder| async move {
        receiver.recv(&yielder).await
    });

    // Suspend, then park on the notification socket.
    scheduler.tick()?;
    scheduler.tick()?;
    ensure_eq!(scheduler.read_waiters(channel.resource_id()), vec![task.get_id()]);

    channel.close();
    scheduler.start()?;
    ensure_eq!(task.take_result::<(Option<u32>, bool)>(), Some((None, false)));
    Ok(())
}

#[test]
fn mutex_serializes_tasks() -> Result<()> {
    let scheduler: SharedScheduler = common::scheduler()?;
    let mutex: Mutex = Mutex::new();
    let object: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(vec![]));

    for name in ["first", "second"] {
        let mutex: Mutex = mutex.clone();
        let object: Rc<RefCell<Vec<&'static str>>> = object.clone();
        scheduler.spawn(name, move |yielder: Yielder| async move {
            mutex.lock(&yielder, &object, LockMode::Exclusive).await?;
            object.borrow_mut().push(name);
            // Hold the lock across a few passes.
            yielder.yield_times(3).await?;
            object.borrow_mut().push(name);
            mutex.release(&object, yielder.task_id())
        });
    }

    scheduler.start()?;
    ensure_eq!(*object.borrow(), vec!["first", "first", "second", "second"]);
    ensure_eq!(mutex.is_locked(&object), false);
    Ok(())
}
