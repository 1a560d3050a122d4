// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::{
        coroutine::{
            Coroutine,
            Delivery,
            Step,
        },
        signal::{
            Resume,
            Signal,
        },
    },
};
use ::std::time::{
    Duration,
    Instant,
};

//==============================================================================
// Structures
//==============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerMode {
    Once,
    Repeating,
    Times(usize),
}

pub type TimerBody = Box<dyn FnMut(Instant) -> Result<(), Fail>>;

/// Coroutine that runs a body at a fixed interval. The body is handed the deadline it fires for.
pub struct Timer {
    interval: Duration,
    mode: TimerMode,
    next_fire: Instant,
    fired: usize,
    done: bool,
    body: TimerBody,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl Timer {
    /// Fires once, `interval` from now.
    pub fn once<F>(interval: Duration, body: F) -> Self
    where
        F: FnMut(Instant) -> Result<(), Fail> + 'static,
    {
        Self::new(interval, TimerMode::Once, body)
    }

    pub fn repeating<F>(interval: Duration, body: F) -> Self
    where
        F: FnMut(Instant) -> Result<(), Fail> + 'static,
    {
        Self::new(interval, TimerMode::Repeating, body)
    }

    /// Fires `times` times, one `interval` apart.
    pub fn repeat_n<F>(interval: Duration, times: usize, body: F) -> Self
    where
        F: FnMut(Instant) -> Result<(), Fail> + 'static,
    {
        Self::new(interval, TimerMode::Times(times), body)
    }

    fn new<F>(interval: Duration, mode: TimerMode, body: F) -> Self
    where
        F: FnMut(Instant) -> Result<(), Fail> + 'static,
    {
        Self {
            interval,
            mode,
            next_fire: Instant::now() + interval,
            fired: 0,
            done: mode == TimerMode::Times(0),
            body: Box::new(body),
        }
    }

    /// Deadline of the next firing.
    pub fn next_fire(&self) -> Instant {
        self.next_fire
    }

    pub fn fired(&self) -> usize {
        self.fired
    }

    pub fn get_mode(&self) -> TimerMode {
        self.mode
    }

    /// Suspends until the next deadline.
    fn rearm(&self) -> Step {
        let deadline: Instant = self.next_fire;
        Step::Suspend(Signal::new(move |resume: Resume| resume.schedule_at(deadline)))
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl Coroutine for Timer {
    fn resume(&mut self, input: Option<Delivery>) -> Result<Step, Fail> {
        if self.done {
            return Err(Fail::new(libc::EINVAL, "timer has already expired"));
        }
        if let Some(Err(cause)) = input {
            self.done = true;
            return Err(cause);
        }

        // Woken early.
        if Instant::now() < self.next_fire {
            return Ok(self.rearm());
        }

        let deadline: Instant = self.next_fire;
        (self.body)(deadline)?;
        self.fired += 1;

        let expired: bool = match self.mode {
            TimerMode::Once => true,
            TimerMode::Repeating => false,
            TimerMode::Times(times) => self.fired >= times,
        };
        if expired {
            self.done = true;
            return Ok(Step::Complete(Box::new(self.fired)));
        }

        // Deadlines advance by the interval, not from the time the body finished.
        self.next_fire = deadline + self.interval;
        Ok(self.rearm())
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
