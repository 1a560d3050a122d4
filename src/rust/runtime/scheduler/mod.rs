// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

mod coroutine;
#[allow(clippy::module_inception)]
mod scheduler;
mod signal;
mod task;
mod timer;
mod yielder;

pub use self::{
    coroutine::{
        Coroutine,
        Delivery,
        FutureCoroutine,
        Step,
        Value,
    },
    scheduler::{
        SharedScheduler,
        WeakScheduler,
    },
    signal::{
        Resume,
        Signal,
        SignalCallback,
    },
    task::{
        KillSwitch,
        Placement,
        Task,
        TaskId,
        TaskState,
    },
    timer::{
        Timer,
        TimerBody,
        TimerMode,
    },
    yielder::Yielder,
};
